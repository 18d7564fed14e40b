//! Per-thread execution state and the capture records it produces.

use kleene_core::{Cursor, StrView, StringTableIndex};

/// One committed capture: the overall match or a capture group's slice.
///
/// A group that never committed keeps `view` as `None`, which is distinct
/// from a committed zero-length capture (`Some` of an empty view).
#[derive(Debug, Clone, Copy, Default)]
pub struct Match<'a> {
    /// Captured slice of the subject, set when a right boundary commits.
    pub view: Option<StrView<'a>>,
    /// Name table entry, set for named capture groups.
    pub capture_group_name: Option<StringTableIndex>,
    /// Line of the capture start. Always zero over a single view.
    pub line: usize,
    /// Logical position of the capture start within the view.
    pub column: usize,
    /// Capture start plus the view's offset in the surrounding haystack.
    pub global_offset: usize,
    /// Pending left boundary recorded ahead of the right-boundary commit.
    pub left_column: usize,
}

impl<'a> Match<'a> {
    /// A committed capture of `view` starting at `column`.
    pub fn committed(view: StrView<'a>, column: usize, global_offset: usize) -> Self {
        Self {
            view: Some(view),
            capture_group_name: None,
            line: 0,
            column,
            global_offset,
            left_column: column,
        }
    }
}

/// One backtracking thread: a position, an instruction pointer, and every
/// piece of state a fork must be able to roll back.
///
/// Capture groups live in `flat_captures` as rows of `capture_group_count`
/// cells, one row per overall match; cell `i` of a row belongs to group
/// `i + 1`. Rows only grow whole, so `flat_captures.len()` is always a
/// multiple of the group count.
#[derive(Debug, Clone)]
pub struct MatchState<'a> {
    /// Current position in the subject.
    pub cursor: Cursor,
    /// Next instruction to dispatch.
    pub ip: usize,
    /// Pending fork target, set by the fork opcodes before scheduling.
    pub fork_at_position: usize,
    /// Forks created since the last `Save`, consumed by `FailForks`.
    pub forks_since_last_save: usize,
    /// Address of the fork instruction this thread was spawned by.
    pub initiating_fork: Option<usize>,
    /// Where the current right-to-left seek started, reset per attempt.
    pub rseek_origin: Option<Cursor>,
    /// Overall match records, one per completed match.
    pub matches: Vec<Match<'a>>,
    /// Capture rows, `capture_group_count` cells per overall match.
    pub flat_captures: Vec<Match<'a>>,
    /// Cells per capture row.
    pub capture_group_count: usize,
    /// Iteration counters keyed by repetition id.
    pub repetition_marks: Vec<u64>,
    /// Loop positions keyed by checkpoint id, offset by one so zero means
    /// never visited.
    pub checkpoints: Vec<u64>,
    /// Lookbehind widths, innermost last.
    pub step_backs: Vec<u64>,
}

impl<'a> MatchState<'a> {
    pub fn new(capture_group_count: usize) -> Self {
        Self {
            cursor: Cursor::start(),
            ip: 0,
            fork_at_position: 0,
            forks_since_last_save: 0,
            initiating_fork: None,
            rseek_origin: None,
            matches: Vec::new(),
            flat_captures: Vec::new(),
            capture_group_count,
            repetition_marks: Vec::new(),
            checkpoints: Vec::new(),
            step_backs: Vec::new(),
        }
    }

    /// Number of complete capture rows.
    pub fn capture_rows(&self) -> usize {
        if self.capture_group_count == 0 {
            0
        } else {
            self.flat_captures.len() / self.capture_group_count
        }
    }

    /// Grows `flat_captures` by whole default rows until row `match_index`
    /// exists. Does nothing when the program has no capture groups.
    pub fn ensure_capture_row(&mut self, match_index: usize) {
        if self.capture_group_count == 0 {
            return;
        }
        let wanted = (match_index + 1) * self.capture_group_count;
        if self.flat_captures.len() < wanted {
            self.flat_captures.resize(wanted, Match::default());
        }
    }

    /// Cell for group `group` (one-based) of match `match_index`.
    ///
    /// Panics if the row does not exist or the group is out of range; both
    /// indicate a malformed program or an interpreter bug.
    pub fn capture(&self, match_index: usize, group: u64) -> &Match<'a> {
        &self.flat_captures[self.capture_index(match_index, group)]
    }

    pub fn capture_mut(&mut self, match_index: usize, group: u64) -> &mut Match<'a> {
        let index = self.capture_index(match_index, group);
        &mut self.flat_captures[index]
    }

    /// Capture row for match `match_index`, if it was ever grown.
    pub fn capture_row(&self, match_index: usize) -> Option<&[Match<'a>]> {
        if self.capture_group_count == 0 || match_index >= self.capture_rows() {
            return None;
        }
        let start = match_index * self.capture_group_count;
        Some(&self.flat_captures[start..start + self.capture_group_count])
    }

    fn capture_index(&self, match_index: usize, group: u64) -> usize {
        assert!(
            group >= 1 && (group as usize) <= self.capture_group_count,
            "capture group {group} out of range 1..={}",
            self.capture_group_count
        );
        assert!(
            match_index < self.capture_rows(),
            "capture row {match_index} not grown (have {})",
            self.capture_rows()
        );
        match_index * self.capture_group_count + (group as usize - 1)
    }
}
