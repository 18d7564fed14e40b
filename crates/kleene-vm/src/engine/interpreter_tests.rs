use kleene_bytecode::{ByteCode, CompileContext, ComparePiece, OpCodeId, Program};
use kleene_core::{OptionFlags, StrView};

use crate::engine::matcher::{MatchResult, Matcher};
use crate::engine::trace::PrintTracer;

fn char_piece(ch: char) -> ComparePiece {
    ComparePiece::Char {
        code_point: ch as u32,
    }
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
fn trace_single_literal() {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.compare_terms(&[char_piece('a')]);
    let program = code.into_program(1);

    let mut tracer = PrintTracer::new();
    let result = Matcher::new(&program, OptionFlags::NONE)
        .match_view_with(StrView::from_bytes(b"ab"), &mut tracer);

    assert!(result.success);
    insta::assert_snapshot!(tracer.text(), @r#"
    attempt at 0:
      000 CompareSimple              pos=1 continue
      004 Exit                       pos=1 matched
    "#);
}

#[test]
fn trace_star_scan() {
    // /a*/g on "b": both attempts enter the loop, fail the compare, and
    // fall back to the skip fork for a zero-length match.
    let mut context = CompileContext::new();
    let body = {
        let mut code = ByteCode::new(&mut context);
        code.compare_terms(&[char_piece('a')]);
        code
    };
    let mut code = ByteCode::new(&mut context);
    code.append(body.into_repetition_any(&mut context, true));
    let program = code.into_program(0);

    let mut tracer = PrintTracer::new();
    let result = Matcher::new(&program, OptionFlags::GLOBAL)
        .match_view_with(StrView::from_bytes(b"b"), &mut tracer);

    assert_eq!(result.match_count, 2);
    insta::assert_snapshot!(tracer.text(), @r#"
    attempt at 0:
      000 ForkStay                   pos=0 jumped
      002 Checkpoint                 pos=0 continue
      004 CompareSimple              pos=0 backtrack
      012 Exit                       pos=0 matched

    attempt at 1:
      000 ForkStay                   pos=1 jumped
      002 Checkpoint                 pos=1 continue
      004 CompareSimple              pos=1 backtrack
      012 Exit                       pos=1 matched
    "#);
}

#[test]
fn restore_without_save_fails_the_whole_attempt() {
    // A bare Restore reports a terminal failure: the pending fork would
    // reach the end of the program, but it must never get the chance.
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.push_op(OpCodeId::ForkStay);
    code.push_word(1);
    code.push_op(OpCodeId::Restore);
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::NONE, "");

    assert!(!result.success);
}

#[test]
fn pop_saved_always_backtracks() {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.push_op(OpCodeId::Save);
    code.push_op(OpCodeId::PopSaved);
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::NONE, "a");

    assert!(!result.success);
}

#[test]
fn go_back_rewinds_the_cursor() {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.compare_terms(&[char_piece('a')]);
    code.compare_terms(&[char_piece('b')]);
    code.push_op(OpCodeId::GoBack);
    code.push_word(2);
    code.compare_terms(&[char_piece('a')]);
    let program = code.into_program(1);

    let result = search(&program, OptionFlags::NONE, "ab");

    assert_eq!(spans(&result), [(0, 1)]);
}

#[test]
fn go_back_past_the_start_fails() {
    let mut context = CompileContext::new();
    let mut code = ByteCode::new(&mut context);
    code.push_op(OpCodeId::GoBack);
    code.push_word(3);
    let program = code.into_program(0);

    let result = search(&program, OptionFlags::NONE, "ab");

    assert!(!result.success);
}

#[test]
fn replace_fork_discards_earlier_giveback_points() {
    // An atomic loop re-executes its fork each iteration with the replace
    // form, so only the latest giveback point survives. The equivalent of
    // /(?>a*)a/ can then never match "aa", while the plain loop can.
    let mut context = CompileContext::new();
    let mut atomic = ByteCode::new(&mut context);
    atomic.push_op(OpCodeId::ForkReplaceStay);
    atomic.push_word(5 + 6);
    atomic.push_op(OpCodeId::Checkpoint);
    atomic.push_word(0);
    atomic.compare_terms(&[char_piece('a')]);
    atomic.push_op(OpCodeId::JumpNonEmpty);
    atomic.push_word((-13i64) as u64);
    atomic.push_word(0);
    atomic.push_word(OpCodeId::Jump.as_word());
    atomic.compare_terms(&[char_piece('a')]);
    let atomic_program = atomic.into_program(1);

    assert!(!search(&atomic_program, OptionFlags::NONE, "aa").success);

    let mut context = CompileContext::new();
    let body = {
        let mut code = ByteCode::new(&mut context);
        code.compare_terms(&[char_piece('a')]);
        code
    };
    let mut plain = ByteCode::new(&mut context);
    plain.append(body.into_repetition_any(&mut context, true));
    plain.compare_terms(&[char_piece('a')]);
    let plain_program = plain.into_program(1);

    assert_eq!(spans(&search(&plain_program, OptionFlags::NONE, "aa")), [(0, 2)]);
}
