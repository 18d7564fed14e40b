use kleene_bytecode::{
    BoundaryCheckType, ByteCode, CompileContext, ComparePiece, LookAroundKind, Program,
};
use kleene_core::{OptionFlags, StrView, encode_utf16};

use crate::engine::matcher::{MatchResult, Matcher};
use crate::engine::trace::PrintTracer;

fn char_piece(ch: char) -> ComparePiece {
    ComparePiece::Char {
        code_point: ch as u32,
    }
}

/// Fragment matching one literal character.
fn char_fragment(context: &mut CompileContext, ch: char) -> ByteCode {
    let mut code = ByteCode::new(context);
    code.compare_terms(&[char_piece(ch)]);
    code
}

/// Fragment matching `text` one character at a time.
fn literal(context: &mut CompileContext, text: &str) -> ByteCode {
    let mut code = ByteCode::new(context);
    for ch in text.chars() {
        code.compare_terms(&[char_piece(ch)]);
    }
    code
}

fn search<'a>(program: &Program, options: OptionFlags, subject: &'a str) -> MatchResult<'a> {
    Matcher::new(program, options).match_view(StrView::from_bytes(subject.as_bytes()))
}

/// `(start, end)` of every match, in subject order.
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

fn capture_text(result: &MatchResult<'_>, match_index: usize, group: usize) -> Option<String> {
    result.capture_group_matches[match_index][group - 1]
        .view
        .map(|v| v.to_string_lossy())
}

#[test]
fn single_literal_reports_span() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'a').into_program(1);

    let result = search(&program, OptionFlags::NONE, "xay");

    assert!(result.success);
    assert_eq!(result.match_count, 1);
    assert_eq!(spans(&result), [(1, 2)]);
    assert!(result.operations > 0);
}

#[test]
fn literal_absent_from_subject() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'q').into_program(1);

    let result = search(&program, OptionFlags::NONE, "xyz");

    assert!(!result.success);
    assert_eq!(result.match_count, 0);
    assert!(result.matches.is_empty());
    assert!(result.capture_group_matches.is_empty());
}

#[test]
fn global_finds_every_occurrence() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'a').into_program(1);

    let result = search(&program, OptionFlags::GLOBAL, "banana");

    assert_eq!(spans(&result), [(1, 2), (3, 4), (5, 6)]);
}

#[test]
fn empty_program_matches_empty_subject() {
    let mut context = CompileContext::new();
    let program = ByteCode::new(&mut context).into_program(0);

    let result = search(&program, OptionFlags::NONE, "");

    assert!(result.success);
    assert_eq!(spans(&result), [(0, 0)]);
}

#[test]
fn star_matches_empty_at_every_offset() {
    // /a*/g on "b": a zero-length match at 0 and another at 1.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'a');
    let mut code = ByteCode::new(&mut context);
    code.append(body.into_repetition_any(&mut context, true));
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::GLOBAL, "b");

    assert_eq!(spans(&result), [(0, 0), (1, 1)]);
}

#[test]
fn star_matches_the_empty_subject() {
    // /a*/ on "": zero iterations, one empty match.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'a');
    let mut code = ByteCode::new(&mut context);
    code.append(body.into_repetition_any(&mut context, true));
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::NONE, "");

    assert!(result.success);
    assert_eq!(spans(&result), [(0, 0)]);
}

#[test]
fn greedy_loop_gives_back_one_iteration() {
    // /a*a/ on "aa": the loop first eats both characters, then backtracks
    // far enough for the trailing literal.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'a');
    let mut code = ByteCode::new(&mut context);
    code.append(body.into_repetition_any(&mut context, true));
    code.compare_terms(&[char_piece('a')]);
    let program = code.into_program(1);

    let result = search(&program, OptionFlags::NONE, "aa");

    assert_eq!(spans(&result), [(0, 2)]);
}

#[test]
fn lazy_star_consumes_nothing_it_does_not_need() {
    // /a*?b/ on "aab" still has to grow through both 'a's.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'a');
    let mut code = ByteCode::new(&mut context);
    code.append(body.into_repetition_any(&mut context, false));
    code.compare_terms(&[char_piece('b')]);
    let program = code.into_program(1);

    let result = search(&program, OptionFlags::NONE, "aab");

    assert_eq!(spans(&result), [(0, 3)]);
}

#[test]
fn optional_group_left_unset() {
    // /(a)(b)?/ on "a": group 2 never commits.
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.capture_group_left(1);
    code.compare_terms(&[char_piece('a')]);
    code.capture_group_right(1);

    let mut optional = ByteCode::new(&mut context);
    optional.capture_group_left(2);
    optional.compare_terms(&[char_piece('b')]);
    optional.capture_group_right(2);
    code.append(optional.into_repetition_zero_or_one(true));

    let program = code.into_program(1);
    let result = search(&program, OptionFlags::NONE, "a");

    assert_eq!(spans(&result), [(0, 1)]);
    assert_eq!(capture_text(&result, 0, 1).as_deref(), Some("a"));
    assert_eq!(capture_text(&result, 0, 2), None);
}

#[test]
fn adjacent_plus_groups_split_the_subject() {
    // /(a+)(b+)/ on "aabbb".
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);

    code.capture_group_left(1);
    let a_plus = char_fragment(&mut context, 'a').into_repetition_min_one(&mut context, true);
    code.append(a_plus);
    code.capture_group_right(1);

    code.capture_group_left(2);
    let b_plus = char_fragment(&mut context, 'b').into_repetition_min_one(&mut context, true);
    code.append(b_plus);
    code.capture_group_right(2);

    let program = code.into_program(2);
    let result = search(&program, OptionFlags::NONE, "aabbb");

    assert_eq!(spans(&result), [(0, 5)]);
    assert_eq!(capture_text(&result, 0, 1).as_deref(), Some("aa"));
    assert_eq!(capture_text(&result, 0, 2).as_deref(), Some("bbb"));
}

#[test]
fn global_scan_reuses_rows_left_dirty_by_failed_attempts() {
    // /(a)/g on "aba": the failed attempt at offset 1 opens group 1 without
    // closing it; the attempt at offset 2 must overwrite that row.
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.capture_group_left(1);
    code.compare_terms(&[char_piece('a')]);
    code.capture_group_right(1);
    let program = code.into_program(1);

    let result = search(&program, OptionFlags::GLOBAL, "aba");

    assert_eq!(spans(&result), [(0, 1), (2, 3)]);
    assert_eq!(result.capture_group_matches.len(), 2);
    assert_eq!(result.capture_group_matches[0][0].column, 0);
    assert_eq!(result.capture_group_matches[1][0].column, 2);
}

#[test]
fn capture_rows_padded_for_branches_without_groups() {
    // /(?:a|(b))/g on "ab": the first match commits nothing, yet every
    // match still gets a full capture row.
    let mut context = CompileContext::new();
    let left = char_fragment(&mut context, 'a');
    let mut right = ByteCode::new(&mut context);
    right.capture_group_left(1);
    right.compare_terms(&[char_piece('b')]);
    right.capture_group_right(1);

    let mut code = ByteCode::new(&mut context);
    code.alternation(left, right);
    let program = code.into_program(1);

    let result = search(&program, OptionFlags::GLOBAL, "ab");

    assert_eq!(spans(&result), [(0, 1), (1, 2)]);
    assert_eq!(result.capture_group_matches.len(), 2);
    assert_eq!(capture_text(&result, 0, 1), None);
    assert_eq!(capture_text(&result, 1, 1).as_deref(), Some("b"));
}

#[test]
fn alternation_prefers_left_branch() {
    // /ab|a/: on "ab" the longer left branch wins; on "a" the right one
    // still matches.
    let mut context = CompileContext::new();
    let left = literal(&mut context, "ab");
    let right = literal(&mut context, "a");
    let mut code = ByteCode::new(&mut context);
    code.alternation(left, right);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "ab")), [(0, 2)]);
    assert_eq!(spans(&search(&program, OptionFlags::NONE, "a")), [(0, 1)]);
}

#[test]
fn line_start_alternative_skipped_mid_line() {
    // /^a|b/: past offset zero the anchored branch cannot apply, so the
    // conditional fork falls straight into the right branch.
    let mut context = CompileContext::new();
    let mut left = ByteCode::new(&mut context);
    left.check_begin();
    left.compare_terms(&[char_piece('a')]);
    let right = char_fragment(&mut context, 'b');
    let mut code = ByteCode::new(&mut context);
    code.alternation(left, right);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "xb")), [(1, 2)]);
    assert_eq!(spans(&search(&program, OptionFlags::NONE, "ab")), [(0, 1)]);
}

#[test]
fn sticky_only_matches_at_the_start() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'b').into_program(1);
    assert!(!search(&program, OptionFlags::STICKY, "ab").success);

    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'a').into_program(1);
    assert_eq!(spans(&search(&program, OptionFlags::STICKY, "ab")), [(0, 1)]);
}

#[test]
fn insensitive_matches_across_ascii_case() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'a').into_program(1);

    let result = search(&program, OptionFlags::INSENSITIVE, "A");

    assert_eq!(spans(&result), [(0, 1)]);
}

#[test]
fn lookahead_constrains_without_consuming() {
    // /a(?=b)/ matches "ab" but reports only the 'a'.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'b');
    let mut code = char_fragment(&mut context, 'a');
    code.lookaround(body, LookAroundKind::LookAhead, 1, true);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "ab")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "ac").success);
}

#[test]
fn negated_lookahead_rejects_on_body_match() {
    // /a(?!b)/.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'b');
    let mut code = char_fragment(&mut context, 'a');
    code.lookaround(body, LookAroundKind::NegatedLookAhead, 1, true);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "ac")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "ab").success);
}

#[test]
fn negated_lookahead_discards_the_forks_of_its_body() {
    // /(?!a|b)c/: when the body matches, the alternative branch it pushed
    // must die with it instead of resurrecting the attempt.
    let mut context = CompileContext::new();
    let left = char_fragment(&mut context, 'a');
    let right = char_fragment(&mut context, 'b');
    let mut body = ByteCode::new(&mut context);
    body.alternation(left, right);
    let mut code = ByteCode::new(&mut context);
    code.lookaround(body, LookAroundKind::NegatedLookAhead, 1, true);
    code.compare_terms(&[char_piece('c')]);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "c")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "a").success);
    assert!(!search(&program, OptionFlags::NONE, "b").success);
}

#[test]
fn lookbehind_matches_preceding_text() {
    // /(?<=ab)c/ on "abc".
    let mut context = CompileContext::new();
    let body = literal(&mut context, "ab");
    let mut code = ByteCode::new(&mut context);
    code.lookaround(body, LookAroundKind::LookBehind, 2, false);
    code.compare_terms(&[char_piece('c')]);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "abc")), [(2, 3)]);
    assert!(!search(&program, OptionFlags::NONE, "xbc").success);
}

#[test]
fn negated_lookbehind_rejects_only_after_its_body() {
    // /(?<!a)b/: fine in "xb", rejected in "ab".
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'a');
    let mut code = ByteCode::new(&mut context);
    code.lookaround(body, LookAroundKind::NegatedLookBehind, 1, false);
    code.compare_terms(&[char_piece('b')]);
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "xb")), [(1, 2)]);
    assert!(!search(&program, OptionFlags::NONE, "ab").success);
}

#[test]
fn empty_loop_body_terminates() {
    // /(?:a*)*/g on "b": the outer loop must not spin on the empty inner
    // match.
    let mut context = CompileContext::new();
    let inner = char_fragment(&mut context, 'a').into_repetition_any(&mut context, true);
    let outer = inner.into_repetition_any(&mut context, true);
    let mut code = ByteCode::new(&mut context);
    code.append(outer);
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::GLOBAL, "b");

    assert_eq!(spans(&result), [(0, 0), (1, 1)]);
}

#[test]
fn exact_repetition_needs_every_copy() {
    // /a{3}/.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'a');
    let mut code = ByteCode::new(&mut context);
    code.repeat_exact(&mut context, &body, 3);
    let program = code.into_program(3);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "aaa")), [(0, 3)]);
    assert!(!search(&program, OptionFlags::NONE, "aa").success);
}

#[test]
fn bounded_repetition_stops_at_max() {
    // /a{1,3}/: takes three characters when it can, two when it must.
    let mut context = CompileContext::new();
    let body = char_fragment(&mut context, 'a');
    let program = body
        .into_repetition_min_max(&mut context, 1, Some(3), true)
        .into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "aaaa")), [(0, 3)]);
    assert_eq!(spans(&search(&program, OptionFlags::NONE, "aa")), [(0, 2)]);
}

#[test]
fn word_boundaries_frame_word() {
    // /\bfoo\b/ on "a foo b".
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.check_boundary(BoundaryCheckType::Word);
    for ch in "foo".chars() {
        code.compare_terms(&[char_piece(ch)]);
    }
    code.check_boundary(BoundaryCheckType::Word);
    let program = code.into_program(3);

    let result = search(&program, OptionFlags::GLOBAL, "a foo b");

    assert_eq!(spans(&result), [(2, 5)]);
}

#[test]
fn non_word_boundary_matches_between_spaces() {
    // /\B/g on two spaces: empty matches at 0, 1 and 2.
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.check_boundary(BoundaryCheckType::NonWord);
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::GLOBAL, "  ");

    assert_eq!(spans(&result), [(0, 0), (1, 1), (2, 2)]);
}

#[test]
fn anchors_require_full_subject() {
    // /^a$/.
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.check_begin();
    code.compare_terms(&[char_piece('a')]);
    code.check_end();
    let program = code.into_program(1);

    assert_eq!(spans(&search(&program, OptionFlags::NONE, "a")), [(0, 1)]);
    assert!(!search(&program, OptionFlags::NONE, "ab").success);
    assert!(!search(&program, OptionFlags::NONE, "ba").success);
}

#[test]
fn multiline_caret_matches_after_newline() {
    // /^b/m on "a\nb".
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.check_begin();
    code.compare_terms(&[char_piece('b')]);
    let program = code.into_program(1);

    let options = OptionFlags::MULTILINE | OptionFlags::CONSIDER_NEWLINE;
    let result = search(&program, options, "a\nb");

    assert_eq!(spans(&result), [(2, 3)]);
}

#[test]
fn rseek_jumps_to_the_rightmost_occurrence() {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.rseek_to('=' as u32);
    code.compare_terms(&[char_piece('=')]);
    code.compare_terms(&[char_piece('a')]);
    let program = code.into_program(2);

    let result = search(&program, OptionFlags::NONE, "x=a");

    assert_eq!(spans(&result), [(0, 3)]);
}

#[test]
fn exhausted_rseek_ends_the_scan() {
    // Under SINGLE_LINE a seek that finds nothing ahead of the attempt
    // cannot succeed later either, so the whole scan stops.
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.rseek_to('z' as u32);
    code.compare_terms(&[char_piece('z')]);
    let program = code.into_program(1);

    let options = OptionFlags::GLOBAL | OptionFlags::SINGLE_LINE;
    let result = search(&program, options, "zab");

    assert_eq!(spans(&result), [(0, 1)]);
}

#[test]
fn single_match_stops_a_global_scan() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'a').into_program(1);

    let options = OptionFlags::GLOBAL | OptionFlags::SINGLE_MATCH;
    let result = search(&program, options, "aa");

    assert_eq!(spans(&result), [(0, 1)]);
}

#[test]
fn not_begin_of_line_skips_offset_zero() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'a').into_program(1);

    let options = OptionFlags::GLOBAL | OptionFlags::NOT_BEGIN_OF_LINE;
    let result = search(&program, options, "aa");

    assert_eq!(spans(&result), [(1, 2)]);
}

#[test]
fn not_end_of_line_drops_matches_at_the_end() {
    let mut context = CompileContext::new();
    let program = char_fragment(&mut context, 'a').into_program(1);

    let options = OptionFlags::GLOBAL | OptionFlags::NOT_END_OF_LINE;
    let result = search(&program, options, "aa");

    assert_eq!(spans(&result), [(0, 1)]);
}

#[test]
fn cleared_group_reports_unset() {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.capture_group_left(1);
    code.compare_terms(&[char_piece('a')]);
    code.capture_group_right(1);
    code.clear_capture_group(1);
    code.compare_terms(&[char_piece('b')]);
    let program = code.into_program(2);

    let result = search(&program, OptionFlags::NONE, "ab");

    assert_eq!(spans(&result), [(0, 2)]);
    assert_eq!(capture_text(&result, 0, 1), None);
}

#[test]
fn surrogate_pair_is_one_position() {
    // U+1F600 in a UTF-16 subject spans two code units but one code point.
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.compare_terms(&[ComparePiece::Char {
        code_point: 0x1F600,
    }]);
    let program = code.into_program(1);

    let units = encode_utf16("\u{1F600}x");
    let view = StrView::from_utf16(&units);
    let result = Matcher::new(&program, OptionFlags::UNICODE).match_view(view);

    assert!(result.success);
    assert_eq!(result.matches[0].column, 0);
    let matched = result.matches[0].view.unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched.to_string_lossy(), "\u{1F600}");
}

#[test]
fn minimum_length_prunes_short_tails() {
    // With two characters mandatory there is no point attempting at the
    // last offset of "aba".
    let mut context = CompileContext::new();
    let program = literal(&mut context, "ab").into_program(2);

    let mut tracer = PrintTracer::new();
    let result = Matcher::new(&program, OptionFlags::GLOBAL)
        .match_view_with(StrView::from_bytes(b"aba"), &mut tracer);

    assert_eq!(spans(&result), [(0, 2)]);
    let attempts = tracer
        .lines()
        .iter()
        .filter(|line| line.starts_with("attempt"))
        .count();
    assert_eq!(attempts, 1);
}
