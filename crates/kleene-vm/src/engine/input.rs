//! Subject description handed to the matcher, plus the scratch the
//! interpreter keeps across forks of one attempt.

use kleene_core::{Cursor, OptionFlags, StrView};

/// What to match against and under which options.
///
/// The saved-position stacks and the fork bookkeeping live here rather than
/// in [`MatchState`](super::state::MatchState) because they must survive a
/// backtrack: a fork snapshot restores the thread, not the lookaround
/// bookkeeping that `Save` and `Restore` manage explicitly.
pub struct MatchInput<'a> {
    /// The subject text.
    pub view: StrView<'a>,
    /// Match options for this run.
    pub options: OptionFlags,
    /// Logical position scanning starts from.
    pub start_offset: usize,
    /// Offset of the view inside the surrounding haystack, added to
    /// reported capture positions.
    pub global_offset: usize,
    /// Row the current attempt writes its captures into.
    pub match_index: usize,
    /// Clear only for the attempt at the very start of the subject.
    pub in_the_middle_of_a_line: bool,
    /// Positions saved by `Save`, restored by `Restore`, popped by
    /// `PopSaved`.
    pub saved_positions: Vec<Cursor>,
    /// Fork counts saved in lock step with `saved_positions`.
    pub saved_forks_since_last_save: Vec<usize>,
    /// Forks left to fail unconditionally, set by `FailForks`.
    pub fail_counter: usize,
    /// Address of the fork instruction the next replace-form fork should
    /// overwrite instead of pushing.
    pub fork_to_replace: Option<usize>,
}

impl<'a> MatchInput<'a> {
    pub fn new(view: StrView<'a>, options: OptionFlags) -> Self {
        Self {
            view,
            options,
            start_offset: 0,
            global_offset: 0,
            match_index: 0,
            in_the_middle_of_a_line: false,
            saved_positions: Vec::new(),
            saved_forks_since_last_save: Vec::new(),
            fail_counter: 0,
            fork_to_replace: None,
        }
    }

    pub fn has(&self, flag: OptionFlags) -> bool {
        self.options.contains(flag)
    }
}
