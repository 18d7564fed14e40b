//! Dual-coordinate position tracking.

use crate::view::StrView;

/// A position in subject text, tracked simultaneously as a logical position
/// (code points under Unicode matching, code units otherwise) and as a
/// code-unit offset into the backing storage.
///
/// The two coordinates move in lock-step. Mutators take the view so they can
/// size code-unit moves correctly; [`Cursor::check_consistency`] asserts the
/// pairing in debug builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    position: usize,
    unit_offset: usize,
}

impl Cursor {
    /// Cursor at the start of any view.
    #[inline]
    pub fn start() -> Self {
        Self::default()
    }

    /// Cursor at logical position `position` of `view`, recomputing the
    /// code-unit offset from scratch.
    pub fn at(view: &StrView, position: usize) -> Self {
        let unit_offset = if view.unicode() {
            view.code_unit_offset_of(position)
        } else {
            position
        };
        Self {
            position,
            unit_offset,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn unit_offset(&self) -> usize {
        self.unit_offset
    }

    /// Whether the cursor sits at or past the logical end of `view`.
    #[inline]
    pub fn at_end(&self, view: &StrView) -> bool {
        self.position >= view.len()
    }

    /// Whether the cursor has run past the logical end of `view`.
    #[inline]
    pub fn past_end(&self, view: &StrView) -> bool {
        self.position > view.len()
    }

    /// Advance one logical step, decoding the code point under the cursor to
    /// size the code-unit move. Advancing at the end of a Unicode view bumps
    /// only the logical position.
    pub fn advance(&mut self, view: &StrView) {
        if view.unicode() {
            if self.unit_offset < view.len_in_code_units() {
                let code_point = view.code_point_at(self.unit_offset);
                self.unit_offset += view.length_of_code_point(code_point);
            }
        } else {
            self.unit_offset += 1;
        }
        self.position += 1;
    }

    /// Advance one logical step past `code_point`, already read at the
    /// cursor.
    pub fn advance_past(&mut self, view: &StrView, code_point: u32) {
        if view.unicode() {
            self.unit_offset += view.length_of_code_point(code_point);
        } else {
            self.unit_offset += 1;
        }
        self.position += 1;
    }

    /// Advance by a matched sub-view's logical and code-unit lengths.
    pub fn advance_by_lengths(&mut self, positions: usize, units: usize) {
        self.position += positions;
        self.unit_offset += units;
    }

    /// Move `amount` logical steps backward, recomputing the code-unit
    /// offset. Panics if `amount` exceeds the current position.
    pub fn retreat(&mut self, view: &StrView, amount: usize) {
        assert!(self.position >= amount, "cursor retreat past start");
        self.position -= amount;
        if view.unicode() {
            self.unit_offset = view.code_unit_offset_of(self.position);
        } else {
            self.unit_offset -= amount;
        }
    }

    /// Debug-assert that the code-unit offset matches a from-scratch
    /// recomputation. Positions past the end are not checked; a Unicode
    /// cursor advanced past the end stops tracking code units.
    pub fn check_consistency(&self, view: &StrView) {
        if self.position > view.len() {
            return;
        }
        let expected = if view.unicode() {
            view.code_unit_offset_of(self.position)
        } else {
            self.position
        };
        debug_assert_eq!(
            self.unit_offset, expected,
            "cursor coordinates out of sync at position {}",
            self.position
        );
    }
}
