//! Instruction dispatch for one match attempt.
//!
//! A [`Machine`] owns the fork stack of a single attempt and runs the
//! dispatch loop until a thread matches, fails terminally, or the last
//! fork is exhausted. Threads are explicit [`MatchState`] snapshots: the
//! fork opcodes push alternatives, the backtrack outcomes pop them, newest
//! first, so alternatives run in priority order.

use kleene_bytecode::{
    BoundaryCheckType, CompareTerm, CompareTermReader, ForkIfCondition, OpCode, OpCodeId, Program,
    jump_target,
};
use kleene_core::{
    Cursor, OptionFlags, StringTableIndex, canonicalize, is_line_terminator, is_word_character,
};

use super::compare::execute_compare;
use super::input::MatchInput;
use super::state::{Match, MatchState};
use super::trace::Tracer;

/// What dispatching one instruction did to the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StepOutcome {
    /// Fall through to the next instruction.
    Continue,
    /// The handler set the instruction pointer itself.
    Jumped,
    /// The whole attempt succeeded.
    Matched,
    /// The whole attempt failed; pending forks are abandoned.
    Failed,
    /// This thread failed; resume the newest fork.
    BacktrackLowPriority,
    /// This thread failed and no attempt at a later offset can succeed.
    BacktrackNoFurther,
}

impl StepOutcome {
    pub(super) fn name(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Jumped => "jumped",
            Self::Matched => "matched",
            Self::Failed => "failed",
            Self::BacktrackLowPriority => "backtrack",
            Self::BacktrackNoFurther => "no-further",
        }
    }
}

/// Verdict of one attempt at one starting offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AttemptResult {
    Matched,
    Failed,
    /// Failed, and later offsets cannot match either.
    FailedNoFurther,
}

/// Replace and priority flags encoded in a jump-form discriminant.
fn fork_kind(form: OpCodeId) -> (bool, bool) {
    let is_replace = matches!(
        form,
        OpCodeId::ForkReplaceJump | OpCodeId::ForkReplaceStay
    );
    let is_prio_low = matches!(form, OpCodeId::ForkStay | OpCodeId::ForkReplaceStay);
    (is_replace, is_prio_low)
}

/// One attempt's dispatch loop and fork stack.
pub(super) struct Machine<'a, 'b, T: Tracer> {
    program: &'b Program,
    input: &'b mut MatchInput<'a>,
    state: &'b mut MatchState<'a>,
    forks: Vec<MatchState<'a>>,
    tracer: &'b mut T,
    operations: &'b mut usize,
}

impl<'a, 'b, T: Tracer> Machine<'a, 'b, T> {
    pub(super) fn new(
        program: &'b Program,
        input: &'b mut MatchInput<'a>,
        state: &'b mut MatchState<'a>,
        tracer: &'b mut T,
        operations: &'b mut usize,
    ) -> Self {
        Self {
            program,
            input,
            state,
            forks: Vec::new(),
            tracer,
            operations,
        }
    }

    /// Runs the attempt to completion.
    pub(super) fn run(&mut self) -> AttemptResult {
        let repetitions = self.program.repetition_count() as usize;
        if self.state.repetition_marks.len() < repetitions {
            self.state.repetition_marks.resize(repetitions, 0);
        }
        let checkpoints = self.program.checkpoint_count() as usize;
        if self.state.checkpoints.len() < checkpoints {
            self.state.checkpoints.resize(checkpoints, 0);
        }

        loop {
            *self.operations += 1;
            let ip = self.state.ip;
            let op = self.program.opcode_at(ip);

            let outcome = if self.input.fail_counter > 0 {
                self.input.fail_counter -= 1;
                StepOutcome::BacktrackLowPriority
            } else {
                self.dispatch(&op)
            };

            self.tracer
                .step(ip, self.state.cursor.position(), &op, outcome.name());

            match outcome {
                StepOutcome::Continue => self.state.ip = ip + op.size(),
                StepOutcome::Jumped => {}
                StepOutcome::Matched => return AttemptResult::Matched,
                StepOutcome::Failed => return AttemptResult::Failed,
                StepOutcome::BacktrackLowPriority => {
                    if !self.backtrack() {
                        return AttemptResult::Failed;
                    }
                }
                StepOutcome::BacktrackNoFurther => {
                    if !self.backtrack() {
                        return AttemptResult::FailedNoFurther;
                    }
                }
            }
        }
    }

    /// Resumes the newest fork, or reports exhaustion.
    fn backtrack(&mut self) -> bool {
        match self.forks.pop() {
            Some(fork) => {
                *self.state = fork;
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, op: &OpCode<'b>) -> StepOutcome {
        match *op {
            OpCode::Compare {
                argument_count,
                arguments,
            } => execute_compare(self.program, self.input, self.state, argument_count, arguments),
            OpCode::CompareSimple { arguments } => self.exec_compare_simple(arguments),
            OpCode::Jump { offset } => self.exec_jump(offset, op.size()),
            OpCode::JumpNonEmpty {
                offset,
                checkpoint,
                form,
            } => self.exec_jump_non_empty(offset, checkpoint, form, op.size()),
            OpCode::ForkJump { offset } => self.exec_fork(offset, false, false, op.size()),
            OpCode::ForkStay { offset } => self.exec_fork(offset, false, true, op.size()),
            OpCode::ForkReplaceJump { offset } => self.exec_fork(offset, true, false, op.size()),
            OpCode::ForkReplaceStay { offset } => self.exec_fork(offset, true, true, op.size()),
            OpCode::ForkIf {
                offset,
                form,
                condition,
            } => self.exec_fork_if(offset, form, condition, op.size()),
            OpCode::FailForks => self.exec_fail_forks(),
            OpCode::PopSaved => self.exec_pop_saved(),
            OpCode::SaveLeftCaptureGroup { group } => self.exec_save_left(group),
            OpCode::SaveRightCaptureGroup { group } => self.exec_save_right(group),
            OpCode::SaveRightNamedCaptureGroup { name, group } => {
                self.exec_save_right_named(name, group)
            }
            OpCode::RSeekTo { code_point } => self.exec_rseek_to(code_point),
            OpCode::CheckBegin => self.exec_check_begin(),
            OpCode::CheckEnd => self.exec_check_end(),
            OpCode::CheckBoundary { kind } => self.exec_check_boundary(kind),
            OpCode::Save => self.exec_save(),
            OpCode::Restore => self.exec_restore(),
            OpCode::GoBack { count } => self.exec_go_back(count),
            OpCode::SetStepBack { count } => self.exec_set_step_back(count),
            OpCode::IncStepBack => self.exec_inc_step_back(),
            OpCode::CheckStepBack => self.exec_check_step_back(),
            OpCode::CheckSavedPosition => self.exec_check_saved_position(),
            OpCode::ClearCaptureGroup { group } => self.exec_clear_capture(group),
            OpCode::Repeat {
                back_offset,
                count,
                id,
            } => self.exec_repeat(back_offset, count, id),
            OpCode::ResetRepeat { id } => self.exec_reset_repeat(id),
            OpCode::Checkpoint { id } => self.exec_checkpoint(id),
            OpCode::Exit => self.exec_exit(),
        }
    }

    /// Schedules the fork prepared in `state.fork_at_position`.
    ///
    /// A replace-form fork overwrites the pending fork it spawned on an
    /// earlier visit instead of stacking a new one; the address to look for
    /// sits in `input.fork_to_replace` and is consumed either way.
    fn handle_fork(&mut self, is_replace: bool, is_prio_low: bool, size: usize) {
        let fork_ip = self.state.ip;
        let continuation_ip = self.state.ip + size;
        let fork_target = self.state.fork_at_position;
        let resume_ip = if is_prio_low { fork_target } else { continuation_ip };

        let mut replaced = false;
        if is_replace
            && let Some(to_replace) = self.input.fork_to_replace.take()
            && let Some(slot) = self
                .forks
                .iter_mut()
                .rev()
                .find(|fork| fork.initiating_fork == Some(to_replace))
        {
            *slot = self.state.clone();
            slot.ip = resume_ip;
            slot.initiating_fork = Some(to_replace);
            replaced = true;
        }
        if !replaced {
            let mut fork = self.state.clone();
            fork.ip = resume_ip;
            fork.initiating_fork = Some(fork_ip);
            self.forks.push(fork);
            self.state.forks_since_last_save += 1;
        }

        if is_prio_low {
            self.state.ip = continuation_ip;
            self.state.rseek_origin = None;
        } else {
            self.state.ip = fork_target;
        }
    }

    fn exec_jump(&mut self, offset: i64, size: usize) -> StepOutcome {
        self.state.ip = jump_target(self.state.ip, size, offset);
        StepOutcome::Jumped
    }

    fn exec_fork(
        &mut self,
        offset: i64,
        is_replace: bool,
        is_prio_low: bool,
        size: usize,
    ) -> StepOutcome {
        self.state.fork_at_position = jump_target(self.state.ip, size, offset);
        if is_replace {
            self.input.fork_to_replace = Some(self.state.ip);
        }
        self.handle_fork(is_replace, is_prio_low, size);
        StepOutcome::Jumped
    }

    /// Loops jump back only while the last iteration consumed input, keyed
    /// by the checkpoint the loop entry recorded.
    fn exec_jump_non_empty(
        &mut self,
        offset: i64,
        checkpoint: u64,
        form: OpCodeId,
        size: usize,
    ) -> StepOutcome {
        let position = self.state.cursor.position() as u64;
        let value = self
            .state
            .checkpoints
            .get(checkpoint as usize)
            .copied()
            .unwrap_or(0);

        if value != 0 && value != position + 1 {
            if form == OpCodeId::Jump {
                self.state.ip = jump_target(self.state.ip, size, offset);
                return StepOutcome::Jumped;
            }
            self.state.fork_at_position = jump_target(self.state.ip, size, offset);
            let (is_replace, is_prio_low) = fork_kind(form);
            if is_replace {
                self.input.fork_to_replace = Some(self.state.ip);
            }
            self.handle_fork(is_replace, is_prio_low, size);
            return StepOutcome::Jumped;
        }

        if form == OpCodeId::Jump && self.state.cursor.position() < self.input.view.len() {
            return StepOutcome::BacktrackLowPriority;
        }
        StepOutcome::Continue
    }

    fn exec_fork_if(
        &mut self,
        offset: i64,
        form: OpCodeId,
        condition: ForkIfCondition,
        size: usize,
    ) -> StepOutcome {
        let do_fork = match condition {
            ForkIfCondition::AtStartOfLine => !self.input.in_the_middle_of_a_line,
            ForkIfCondition::Invalid => panic!("invalid fork condition"),
        };

        if do_fork {
            self.state.fork_at_position = jump_target(self.state.ip, size, offset);
            let (is_replace, is_prio_low) = fork_kind(form);
            if is_replace {
                self.input.fork_to_replace = Some(self.state.ip);
            }
            self.handle_fork(is_replace, is_prio_low, size);
            return StepOutcome::Jumped;
        }

        match form {
            OpCodeId::ForkStay | OpCodeId::ForkReplaceStay => {
                self.state.ip = jump_target(self.state.ip, size, offset);
                StepOutcome::Jumped
            }
            _ => StepOutcome::Continue,
        }
    }

    /// Fails this thread and the forks created since the last `Save`,
    /// which implements negative lookaround.
    fn exec_fail_forks(&mut self) -> StepOutcome {
        self.input.fail_counter += self.state.forks_since_last_save;
        StepOutcome::BacktrackLowPriority
    }

    fn exec_pop_saved(&mut self) -> StepOutcome {
        if self.input.saved_positions.pop().is_some() {
            self.input.saved_forks_since_last_save.pop();
        }
        StepOutcome::BacktrackLowPriority
    }

    fn exec_save_left(&mut self, group: u64) -> StepOutcome {
        self.state.ensure_capture_row(self.input.match_index);
        let position = self.state.cursor.position();
        self.state
            .capture_mut(self.input.match_index, group)
            .left_column = position;
        StepOutcome::Continue
    }

    fn exec_save_right(&mut self, group: u64) -> StepOutcome {
        let match_index = self.input.match_index;
        self.state.ensure_capture_row(match_index);
        let position = self.state.cursor.position();
        let existing = *self.state.capture(match_index, group);

        let start = existing.left_column;
        if position < start {
            return StepOutcome::BacktrackLowPriority;
        }
        let length = position - start;

        // Inside a lookbehind the cursor legitimately revisits earlier
        // positions; outside one, a commit that starts before the existing
        // capture is a stale loop iteration and is dropped.
        if start < existing.column && self.state.step_backs.is_empty() {
            return StepOutcome::Continue;
        }

        // A zero-length commit directly after a nonempty capture of the
        // same group would erase it; keep the earlier capture.
        if length == 0
            && let Some(view) = existing.view
            && !view.is_empty()
            && existing.column + view.len() == position
        {
            return StepOutcome::Continue;
        }

        debug_assert!(start + length <= self.input.view.len());
        let captured = self.input.view.substring_view(start, length);
        *self.state.capture_mut(match_index, group) =
            Match::committed(captured, start, self.input.global_offset + start);
        StepOutcome::Continue
    }

    fn exec_save_right_named(&mut self, name: StringTableIndex, group: u64) -> StepOutcome {
        let match_index = self.input.match_index;
        self.state.ensure_capture_row(match_index);
        let position = self.state.cursor.position();
        let existing = *self.state.capture(match_index, group);

        let start = existing.left_column;
        if position < start {
            return StepOutcome::BacktrackLowPriority;
        }
        let length = position - start;

        if start < existing.column {
            return StepOutcome::Continue;
        }

        if length == 0
            && let Some(view) = existing.view
            && !view.is_empty()
            && existing.column + view.len() == position
        {
            return StepOutcome::Continue;
        }

        debug_assert!(start + length <= self.input.view.len());
        let captured = self.input.view.substring_view(start, length);
        let mut capture = Match::committed(captured, start, self.input.global_offset + start);
        capture.capture_group_name = Some(name);
        *self.state.capture_mut(match_index, group) = capture;
        StepOutcome::Continue
    }

    /// Moves the cursor to the previous occurrence of `code_point`,
    /// scanning right to left from the end of the current line on the
    /// first visit and from the cursor afterwards.
    fn exec_rseek_to(&mut self, code_point: u32) -> StepOutcome {
        let view = self.input.view;
        let single_line = self.input.has(OptionFlags::SINGLE_LINE);

        let (origin, search_from, line_limited) = match self.state.rseek_origin {
            None => {
                let origin = self.state.cursor;
                self.state.rseek_origin = Some(origin);
                if single_line {
                    (origin, usize::MAX, false)
                } else {
                    let end_of_line = view.find_end_of_line(origin);
                    (origin, end_of_line.position() + 1, true)
                }
            }
            Some(origin) => (origin, self.state.cursor.position(), !single_line),
        };

        match view.find_index_of_previous(code_point, search_from) {
            Some(found) if found.position() >= origin.position() => {
                self.state.cursor = found;
                StepOutcome::Continue
            }
            _ if line_limited => StepOutcome::BacktrackLowPriority,
            _ => StepOutcome::BacktrackNoFurther,
        }
    }

    fn exec_check_begin(&mut self) -> StepOutcome {
        let view = self.input.view;
        let position = self.state.cursor.position();

        let multiline_boundary = self.input.has(OptionFlags::MULTILINE)
            && self.input.has(OptionFlags::CONSIDER_NEWLINE)
            && position > 0
            && {
                let mut previous = self.state.cursor;
                previous.retreat(&view, 1);
                is_line_terminator(view.matching_code_point_at(previous.unit_offset()))
            };
        let at_boundary = position == 0 || multiline_boundary;

        if at_boundary != self.input.has(OptionFlags::NOT_BEGIN_OF_LINE) {
            StepOutcome::Continue
        } else {
            StepOutcome::BacktrackLowPriority
        }
    }

    fn exec_check_end(&mut self) -> StepOutcome {
        let view = self.input.view;
        let position = self.state.cursor.position();

        let multiline_boundary = self.input.has(OptionFlags::MULTILINE)
            && self.input.has(OptionFlags::CONSIDER_NEWLINE)
            && position < view.len()
            && is_line_terminator(view.matching_code_point_at(self.state.cursor.unit_offset()));
        let at_boundary = position == view.len() || multiline_boundary;

        let not_end = self.input.has(OptionFlags::NOT_END_OF_LINE);
        let not_begin = self.input.has(OptionFlags::NOT_BEGIN_OF_LINE);
        if (at_boundary && !not_end) || (!at_boundary && (not_end || not_begin)) {
            StepOutcome::Continue
        } else {
            StepOutcome::BacktrackLowPriority
        }
    }

    fn exec_check_boundary(&mut self, kind: BoundaryCheckType) -> StepOutcome {
        let view = self.input.view;
        let insensitive = self.input.has(OptionFlags::INSENSITIVE);
        let position = self.state.cursor.position();
        let word_at = |cursor: &Cursor| {
            is_word_character(
                view.matching_code_point_at(cursor.unit_offset()),
                insensitive,
                view.unicode(),
            )
        };

        let at_boundary = if position == view.len() {
            position > 0 && {
                let mut previous = self.state.cursor;
                previous.retreat(&view, 1);
                word_at(&previous)
            }
        } else if position == 0 {
            word_at(&self.state.cursor)
        } else {
            let mut previous = self.state.cursor;
            previous.retreat(&view, 1);
            word_at(&self.state.cursor) != word_at(&previous)
        };

        let pass = match kind {
            BoundaryCheckType::Word => at_boundary,
            BoundaryCheckType::NonWord => !at_boundary,
        };
        if pass {
            StepOutcome::Continue
        } else {
            StepOutcome::BacktrackLowPriority
        }
    }

    fn exec_save(&mut self) -> StepOutcome {
        self.input.saved_positions.push(self.state.cursor);
        self.input
            .saved_forks_since_last_save
            .push(self.state.forks_since_last_save);
        self.state.forks_since_last_save = 0;
        StepOutcome::Continue
    }

    fn exec_restore(&mut self) -> StepOutcome {
        match (
            self.input.saved_positions.pop(),
            self.input.saved_forks_since_last_save.pop(),
        ) {
            (Some(position), Some(forks)) => {
                self.state.cursor = position;
                self.state.forks_since_last_save = forks;
                StepOutcome::Continue
            }
            _ => StepOutcome::Failed,
        }
    }

    fn exec_go_back(&mut self, count: u64) -> StepOutcome {
        if count > self.state.cursor.position() as u64 {
            return StepOutcome::BacktrackLowPriority;
        }
        self.state.cursor.retreat(&self.input.view, count as usize);
        StepOutcome::Continue
    }

    fn exec_set_step_back(&mut self, count: u64) -> StepOutcome {
        self.state.step_backs.push(count);
        StepOutcome::Continue
    }

    fn exec_inc_step_back(&mut self) -> StepOutcome {
        let Some(top) = self.state.step_backs.last_mut() else {
            return StepOutcome::BacktrackLowPriority;
        };
        *top = top.wrapping_add(1);
        let amount = *top;
        if amount > self.state.cursor.position() as u64 {
            return StepOutcome::BacktrackLowPriority;
        }
        self.state.cursor.retreat(&self.input.view, amount as usize);
        StepOutcome::Continue
    }

    fn exec_check_step_back(&mut self) -> StepOutcome {
        let Some(&amount) = self.state.step_backs.last() else {
            return StepOutcome::BacktrackLowPriority;
        };
        let Some(&saved) = self.input.saved_positions.last() else {
            return StepOutcome::BacktrackLowPriority;
        };
        if amount > saved.position() as u64 {
            return StepOutcome::BacktrackLowPriority;
        }
        self.state.cursor = saved;
        StepOutcome::Continue
    }

    fn exec_check_saved_position(&mut self) -> StepOutcome {
        let Some(saved) = self.input.saved_positions.last() else {
            return StepOutcome::BacktrackLowPriority;
        };
        if self.state.cursor.position() != saved.position() {
            return StepOutcome::BacktrackLowPriority;
        }
        if self.state.step_backs.pop().is_none() {
            return StepOutcome::BacktrackLowPriority;
        }
        StepOutcome::Continue
    }

    fn exec_clear_capture(&mut self, group: u64) -> StepOutcome {
        if self.input.match_index < self.state.capture_rows() {
            *self.state.capture_mut(self.input.match_index, group) = Match::default();
        }
        StepOutcome::Continue
    }

    fn exec_repeat(&mut self, back_offset: u64, count: u64, id: u64) -> StepOutcome {
        assert!(count > 0, "repeat with zero count");
        let index = id as usize;
        if self.state.repetition_marks.len() <= index {
            self.state.repetition_marks.resize(index + 1, 0);
        }
        if self.state.repetition_marks[index] == count - 1 {
            self.state.repetition_marks[index] = 0;
            return StepOutcome::Continue;
        }
        self.state.ip -= back_offset as usize;
        self.state.repetition_marks[index] += 1;
        StepOutcome::Jumped
    }

    fn exec_reset_repeat(&mut self, id: u64) -> StepOutcome {
        let index = id as usize;
        if self.state.repetition_marks.len() <= index {
            self.state.repetition_marks.resize(index + 1, 0);
        }
        self.state.repetition_marks[index] = 0;
        StepOutcome::Continue
    }

    fn exec_checkpoint(&mut self, id: u64) -> StepOutcome {
        let index = id as usize;
        if self.state.checkpoints.len() <= index {
            self.state.checkpoints.resize(index + 1, 0);
        }
        // Positions are stored offset by one so zero means never visited.
        self.state.checkpoints[index] = self.state.cursor.position() as u64 + 1;
        StepOutcome::Continue
    }

    fn exec_exit(&mut self) -> StepOutcome {
        if self.state.cursor.position() > self.input.view.len()
            || self.state.ip >= self.program.len()
        {
            return StepOutcome::Matched;
        }
        // An embedded Exit marks an unreachable branch; executing it fails
        // the whole attempt.
        StepOutcome::Failed
    }

    fn exec_compare_simple(&mut self, arguments: &[u64]) -> StepOutcome {
        // Single-character comparisons skip the term loop entirely.
        if let Some(CompareTerm::Char { code_point }) = CompareTermReader::new(arguments).next() {
            let view = self.input.view;
            if self.state.cursor.position() >= view.len() {
                return StepOutcome::BacktrackLowPriority;
            }
            let actual = view.matching_code_point_at(self.state.cursor.unit_offset());
            let equal = if self.input.has(OptionFlags::INSENSITIVE) {
                canonicalize(actual, view.unicode()) == canonicalize(code_point, view.unicode())
            } else {
                actual == code_point
            };
            if !equal {
                return StepOutcome::BacktrackLowPriority;
            }
            self.state.cursor.advance_past(&view, code_point);
            return StepOutcome::Continue;
        }
        execute_compare(self.program, self.input, self.state, 1, arguments)
    }
}
