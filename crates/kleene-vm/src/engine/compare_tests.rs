use kleene_bytecode::{
    ByteCode, CharClass, CharRange, CompileContext, ComparePiece, Program,
};
use kleene_core::{OptionFlags, StrView, encode_utf16};

use crate::engine::matcher::{MatchResult, Matcher};

fn char_piece(ch: char) -> ComparePiece {
    ComparePiece::Char {
        code_point: ch as u32,
    }
}

/// Program that runs one compare over the given pieces.
fn compare_program(pieces: &[ComparePiece], match_length_minimum: u64) -> Program {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.compare_terms(pieces);
    code.into_program(match_length_minimum)
}

fn search<'a>(program: &Program, options: OptionFlags, subject: &'a str) -> MatchResult<'a> {
    Matcher::new(program, options).match_view(StrView::from_bytes(subject.as_bytes()))
}

fn spans(result: &MatchResult<'_>) -> Vec<(usize, usize)> {
    result
        .matches
        .iter()
        .map(|m| {
            let length = m.view.map_or(0, |v| v.len());
            (m.column, m.column + length)
        })
        .collect()
}

#[test]
fn digit_class() {
    let program = compare_program(&[ComparePiece::Class { class: CharClass::Digit }], 1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "5")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "x").success);
}

#[test]
fn word_class_includes_underscore() {
    let program = compare_program(&[ComparePiece::Class { class: CharClass::Word }], 1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "_")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "-").success);
}

#[test]
fn space_class_covers_no_break_space() {
    let program = compare_program(&[ComparePiece::Class { class: CharClass::Space }], 1);

    let units = [0x00A0u16];
    let view = StrView::from_utf16(&units);
    let result = Matcher::new(&program, OptionFlags::NONE).match_view(view);

    assert!(result.success);
    assert_eq!(result.matches[0].column, 0);
}

#[test]
fn any_char_rejects_newline_without_dot_all() {
    let program = compare_program(&[ComparePiece::AnyChar], 1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "x")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "\n").success);

    let dot_all = OptionFlags::SINGLE_LINE | OptionFlags::CONSIDER_NEWLINE;
    assert!(search(&program, dot_all, "\n").success);
}

#[test]
fn inverse_excludes_listed_characters() {
    // [^a]
    let program = compare_program(&[ComparePiece::Inverse, char_piece('a')], 1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "b")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "a").success);
}

#[test]
fn or_takes_either_string() {
    let pieces = [
        ComparePiece::Or,
        ComparePiece::String {
            string: encode_utf16("ab"),
        },
        ComparePiece::String {
            string: encode_utf16("xy"),
        },
        ComparePiece::EndAndOr,
    ];
    let program = compare_program(&pieces, 2);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "ab")), [(0, 2)]);
    assert_eq!(spans(&search(&program, OptionFlags::NONE, "xy")), [(0, 2)]);
    assert!(!search(&program, OptionFlags::NONE, "zz").success);
}

#[test]
fn subtract_carves_out_of_a_range() {
    // [a-z--q] in set notation.
    let pieces = [
        ComparePiece::Subtract,
        ComparePiece::Range {
            range: CharRange {
                from: 'a' as u32,
                to: 'z' as u32,
            },
        },
        char_piece('q'),
        ComparePiece::EndAndOr,
    ];
    let program = compare_program(&pieces, 1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "m")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "q").success);
}

#[test]
fn insensitive_range_crosses_case() {
    let pieces = [ComparePiece::Range {
        range: CharRange {
            from: 'A' as u32,
            to: 'Z' as u32,
        },
    }];
    let program = compare_program(&pieces, 1);

    assert!(search(&program, OptionFlags::INSENSITIVE, "m").success);
    assert!(search(&program, OptionFlags::INSENSITIVE, "M").success);
    assert!(!search(&program, OptionFlags::NONE, "m").success);
}

#[test]
fn general_category_uppercase_letter() {
    let piece = ComparePiece::general_category("Lu", false).unwrap();
    let program = compare_program(&[piece], 1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "A")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "a").success);
}

#[test]
fn adjacent_singles_coalesce_into_one_table() {
    // Chars and ranges merge into a sorted lookup table; matching still
    // honors the gaps.
    let pieces = [
        char_piece('a'),
        char_piece('c'),
        char_piece('b'),
        ComparePiece::Range {
            range: CharRange {
                from: 'e' as u32,
                to: 'g' as u32,
            },
        },
    ];
    let program = compare_program(&pieces, 1);

    assert!(search(&program, OptionFlags::NONE, "b").success);
    assert!(search(&program, OptionFlags::NONE, "f").success);
    assert!(!search(&program, OptionFlags::NONE, "d").success);
}

#[test]
fn backreference_matches_captured_text() {
    // /(a)\1/ on "aa".
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.capture_group_left(1);
    code.compare_terms(&[char_piece('a')]);
    code.capture_group_right(1);
    code.compare_terms(&[ComparePiece::Reference { group: 1 }]);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "aa")), [(0, 2)]);
    assert!(!search(&program, OptionFlags::NONE, "ab").success);
}

#[test]
fn unset_backreference_matches_empty() {
    // /(a)?\1/ on "b": the group never ran, so the reference consumes
    // nothing.
    let mut context = CompileContext::new();
    let mut group = ByteCode::new(&mut context);
    group.capture_group_left(1);
    group.compare_terms(&[char_piece('a')]);
    group.capture_group_right(1);

    let mut code = ByteCode::new(&mut context);
    code.append(group.into_repetition_zero_or_one(true));
    code.compare_terms(&[ComparePiece::Reference { group: 1 }]);
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::NONE, "b");

    assert!(result.success);
    assert_eq!(spans(&result)[0], (0, 0));
}

#[test]
fn named_backreference_uses_last_committed_value() {
    // /(?<x>a)+\k<x>/ on "aa": the loop gives back its second iteration
    // and the reference reuses the first.
    let mut context = CompileContext::new();
    let mut group = ByteCode::new(&mut context);
    group.capture_group_left(1);
    group.compare_terms(&[char_piece('a')]);
    group.capture_group_right_named(1, "x");

    let mut code = ByteCode::new(&mut context);
    code.append(group.into_repetition_min_one(&mut context, true));
    code.compare_terms(&[ComparePiece::NamedReference {
        name: "x".to_string(),
    }]);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "aa")), [(0, 2)]);
}

#[test]
fn string_set_prefers_the_longest_alternative() {
    let pieces = [ComparePiece::StringSet {
        alternatives: vec![encode_utf16("cat"), encode_utf16("caterpillar")],
    }];
    let program = compare_program(&pieces, 3);

    assert_eq!(
        spans(&search(&program, OptionFlags::NONE, "caterpillar")),
        [(0, 11)]
    );
    assert_eq!(spans(&search(&program, OptionFlags::NONE, "cat")), [(0, 3)]);
}

#[test]
fn string_compare_ignores_case_when_asked() {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.compare_string(&encode_utf16("AbC"));
    let program = code.into_program(3);

    assert_eq!(
        spans(&search(&program, OptionFlags::INSENSITIVE, "aBc")),
        [(0, 3)]
    );
    assert!(!search(&program, OptionFlags::NONE, "aBc").success);
}
