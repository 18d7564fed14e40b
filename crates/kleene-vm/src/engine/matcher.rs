//! Outer search driver.
//!
//! A [`Matcher`] pairs a compiled [`Program`] with option flags and runs
//! match attempts at successive starting offsets until the scan policy says
//! to stop. Each attempt gets a fresh fork stack and instruction pointer;
//! capture rows and the operation count accumulate across attempts.

use kleene_bytecode::Program;
use kleene_core::{Cursor, OptionFlags, StrView};

use super::input::MatchInput;
use super::interpreter::{AttemptResult, Machine};
use super::state::{Match, MatchState};
use super::trace::{NoopTracer, Tracer};

/// Everything one search produced.
#[derive(Debug, Clone, Default)]
pub struct MatchResult<'a> {
    /// At least one match was found.
    pub success: bool,
    /// Number of entries in `matches`.
    pub match_count: usize,
    /// The overall match per successful attempt, in subject order.
    pub matches: Vec<Match<'a>>,
    /// One capture row per match, each `capture_group_count` long.
    pub capture_group_matches: Vec<Vec<Match<'a>>>,
    /// Instructions dispatched over the whole search.
    pub operations: usize,
}

/// Drives a compiled program over a subject view.
pub struct Matcher<'p> {
    program: &'p Program,
    options: OptionFlags,
}

impl<'p> Matcher<'p> {
    pub fn new(program: &'p Program, options: OptionFlags) -> Self {
        Self { program, options }
    }

    pub fn program(&self) -> &Program {
        self.program
    }

    pub fn options(&self) -> OptionFlags {
        self.options
    }

    /// Searches `view`, discarding trace output.
    pub fn match_view<'a>(&self, view: StrView<'a>) -> MatchResult<'a> {
        self.match_view_with(view, &mut NoopTracer)
    }

    /// Searches `view`, reporting every attempt and dispatched instruction
    /// to `tracer`.
    pub fn match_view_with<'a, T: Tracer>(
        &self,
        view: StrView<'a>,
        tracer: &mut T,
    ) -> MatchResult<'a> {
        let view = view.with_unicode(self.options.contains(OptionFlags::UNICODE));
        let mut input = MatchInput::new(view, self.options);
        let mut state = MatchState::new(self.program.capture_group_count() as usize);
        let mut operations = 0usize;
        let mut match_count = 0usize;

        let sticky = self.options.contains(OptionFlags::STICKY);
        let continue_search = self.options.contains(OptionFlags::GLOBAL) && !sticky;
        let single_match_only = self.options.contains(OptionFlags::SINGLE_MATCH);
        let minimum_length = self.program.match_length_minimum();

        let view_length = view.len();
        let mut view_index = input.start_offset;

        if view_index == view_length && minimum_length == 0 {
            // Starting at the end with nothing mandatory to consume: run the
            // program once so non-consuming patterns can match the empty
            // remainder. The attempt only counts if it consumed nothing.
            let mut attempt_operations = operations;
            input.match_index = match_count;
            state.cursor = Cursor::at(&view, view_index);
            state.ip = 0;
            state.repetition_marks.clear();
            tracer.attempt(view_index);
            let result =
                Machine::new(self.program, &mut input, &mut state, tracer, &mut attempt_operations)
                    .run();
            if result == AttemptResult::Matched && state.cursor.position() <= view_index {
                operations = attempt_operations;
                if match_count == 0 {
                    if state.matches.len() == match_count {
                        state.matches.push(Match::default());
                    }
                    state.matches[match_count] = Match::committed(
                        view.substring_view(view_index, 0),
                        view_index,
                        input.global_offset + view_index,
                    );
                    match_count += 1;
                    // Keeps a pattern like ".*" from matching the empty
                    // subject a second time in the loop below.
                    if view_index == 0 && view_length == 0 {
                        view_index += 1;
                    }
                }
            }
        }

        while view_index <= view_length {
            if view_index == view_length && self.options.contains(OptionFlags::MULTILINE) {
                break;
            }
            if minimum_length != 0 && minimum_length > (view_length - view_index) as u64 {
                break;
            }

            input.match_index = match_count;
            state.cursor = Cursor::at(&view, view_index);
            state.ip = 0;
            state.repetition_marks.clear();
            state.rseek_origin = None;
            tracer.attempt(view_index);
            let result =
                Machine::new(self.program, &mut input, &mut state, tracer, &mut operations).run();

            match result {
                AttemptResult::Matched => {
                    let position = state.cursor.position();
                    let discard = (input.has(OptionFlags::NOT_END_OF_LINE)
                        && position == view_length)
                        || (input.has(OptionFlags::NOT_BEGIN_OF_LINE) && view_index == 0);
                    if discard {
                        if !continue_search {
                            break;
                        }
                    } else {
                        match_count += 1;
                        Self::append_match(&input, &mut state, view_index);
                        if !continue_search {
                            break;
                        }
                        // Step to the match end; a zero-length match must
                        // advance by one or the scan would never move.
                        let zero_length = position == view_index;
                        view_index = position - usize::from(!zero_length);
                        if single_match_only {
                            break;
                        }
                    }
                }
                AttemptResult::FailedNoFurther => break,
                AttemptResult::Failed => {
                    if sticky {
                        break;
                    }
                }
            }

            view_index += 1;
            input.in_the_middle_of_a_line = true;
        }

        let capture_group_count = state.capture_group_count;
        let needed = capture_group_count * match_count;
        if state.flat_captures.len() < needed {
            state.flat_captures.resize(needed, Match::default());
        }
        let capture_group_matches = if match_count == 0 {
            Vec::new()
        } else if capture_group_count == 0 {
            vec![Vec::new(); match_count]
        } else {
            state
                .flat_captures
                .chunks(capture_group_count)
                .take(match_count)
                .map(<[Match]>::to_vec)
                .collect()
        };

        MatchResult {
            success: match_count != 0,
            match_count,
            matches: state.matches,
            capture_group_matches,
            operations,
        }
    }

    /// Commits the span from `start` to the cursor as the overall match for
    /// the current attempt's row.
    fn append_match<'a>(input: &MatchInput<'a>, state: &mut MatchState<'a>, start: usize) {
        if state.matches.len() == input.match_index {
            state.matches.push(Match::default());
        }
        let position = state.cursor.position();
        debug_assert!(position <= input.view.len());
        state.matches[input.match_index] = Match::committed(
            input.view.substring_view(start, position - start),
            start,
            input.global_offset + start,
        );
    }
}
