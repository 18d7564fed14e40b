//! Dual-coordinate string views over single-byte and UTF-16 text.
//!
//! A [`StrView`] exposes two coordinate spaces at once: logical positions
//! (code points when Unicode matching is on, code units otherwise) and raw
//! code-unit offsets into the backing storage. Character reads index by code
//! units; capture extraction and anchors work in logical positions. The
//! matcher keeps both coordinates in lock-step through
//! [`Cursor`](crate::Cursor).

use crate::cursor::Cursor;

/// U+2028 LINE SEPARATOR.
pub const LINE_SEPARATOR: u32 = 0x2028;
/// U+2029 PARAGRAPH SEPARATOR.
pub const PARAGRAPH_SEPARATOR: u32 = 0x2029;

/// Line terminators recognized by anchors and line-limited seeks.
#[inline]
pub fn is_line_terminator(code_point: u32) -> bool {
    matches!(code_point, 0x0A | 0x0D | LINE_SEPARATOR | PARAGRAPH_SEPARATOR)
}

/// Encode `s` as UTF-16 code units.
pub fn encode_utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Backing text of a [`StrView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewData<'a> {
    /// Single-byte text: every byte is one code unit and one code point.
    Bytes(&'a [u8]),
    /// UTF-16 text: a surrogate pair forms one code point from two code units.
    Utf16(&'a [u16]),
}

/// A borrowed view of subject text.
///
/// The `unicode` flag selects the logical coordinate space: code points when
/// set, code units when clear. For byte views the two spaces coincide.
#[derive(Debug, Clone, Copy)]
pub struct StrView<'a> {
    data: ViewData<'a>,
    unicode: bool,
}

impl<'a> StrView<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self {
            data: ViewData::Bytes(bytes),
            unicode: false,
        }
    }

    pub fn from_utf16(units: &'a [u16]) -> Self {
        Self {
            data: ViewData::Utf16(units),
            unicode: false,
        }
    }

    /// Switch the logical coordinate space to code points (true) or code
    /// units (false).
    pub fn with_unicode(mut self, unicode: bool) -> Self {
        self.unicode = unicode;
        self
    }

    #[inline]
    pub fn unicode(&self) -> bool {
        self.unicode
    }

    #[inline]
    pub fn data(&self) -> ViewData<'a> {
        self.data
    }

    /// Logical length: code points under Unicode matching, code units
    /// otherwise.
    pub fn len(&self) -> usize {
        if self.unicode {
            self.len_in_code_points()
        } else {
            self.len_in_code_units()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len_in_code_units() == 0
    }

    pub fn len_in_code_units(&self) -> usize {
        match self.data {
            ViewData::Bytes(bytes) => bytes.len(),
            ViewData::Utf16(units) => units.len(),
        }
    }

    pub fn len_in_code_points(&self) -> usize {
        match self.data {
            ViewData::Bytes(bytes) => bytes.len(),
            ViewData::Utf16(units) => {
                let mut offset = 0;
                let mut count = 0;
                while offset < units.len() {
                    offset += pair_len(units, offset);
                    count += 1;
                }
                count
            }
        }
    }

    /// Code units occupied by `code_point` in this view's encoding.
    #[inline]
    pub fn length_of_code_point(&self, code_point: u32) -> usize {
        match self.data {
            ViewData::Bytes(_) => 1,
            ViewData::Utf16(_) => {
                if code_point >= 0x10000 {
                    2
                } else {
                    1
                }
            }
        }
    }

    /// Raw code unit at `unit_offset`. Panics when out of range.
    #[inline]
    pub fn code_unit_at(&self, unit_offset: usize) -> u32 {
        match self.data {
            ViewData::Bytes(bytes) => bytes[unit_offset] as u32,
            ViewData::Utf16(units) => units[unit_offset] as u32,
        }
    }

    /// Code point starting at `unit_offset`. An unpaired surrogate is
    /// returned as-is.
    pub fn code_point_at(&self, unit_offset: usize) -> u32 {
        match self.data {
            ViewData::Bytes(bytes) => bytes[unit_offset] as u32,
            ViewData::Utf16(units) => decode_utf16_at(units, unit_offset),
        }
    }

    /// Code point for matching at `unit_offset`: surrogate-aware under
    /// Unicode matching, the raw code unit otherwise.
    #[inline]
    pub fn matching_code_point_at(&self, unit_offset: usize) -> u32 {
        if self.unicode {
            self.code_point_at(unit_offset)
        } else {
            self.code_unit_at(unit_offset)
        }
    }

    /// Convert a code-point index to a code-unit offset by walking from the
    /// start. An index past the end saturates to the total unit count.
    pub fn code_unit_offset_of(&self, code_point_index: usize) -> usize {
        match self.data {
            ViewData::Bytes(_) => code_point_index,
            ViewData::Utf16(units) => {
                let mut offset = 0;
                let mut remaining = code_point_index;
                while remaining > 0 && offset < units.len() {
                    offset += pair_len(units, offset);
                    remaining -= 1;
                }
                offset
            }
        }
    }

    /// Sub-view covering `length` logical positions starting at `start`.
    pub fn substring_view(&self, start: usize, length: usize) -> StrView<'a> {
        let data = match self.data {
            ViewData::Bytes(bytes) => ViewData::Bytes(&bytes[start..start + length]),
            ViewData::Utf16(units) => {
                if self.unicode {
                    let from = self.code_unit_offset_of(start);
                    let mut to = from;
                    for _ in 0..length {
                        to += pair_len(units, to);
                    }
                    ViewData::Utf16(&units[from..to])
                } else {
                    ViewData::Utf16(&units[start..start + length])
                }
            }
        };
        StrView {
            data,
            unicode: self.unicode,
        }
    }

    /// Iterate code points, always decoding surrogate pairs.
    pub fn iter_code_points(&self) -> CodePoints<'a> {
        CodePoints {
            data: self.data,
            unit_offset: 0,
        }
    }

    /// Iterate logical items: code points under Unicode matching, raw code
    /// units otherwise.
    pub fn iter_logical(&self) -> LogicalItems<'a> {
        LogicalItems {
            view: *self,
            unit_offset: 0,
        }
    }

    /// Logical-item equality, tolerant of mixed encodings.
    pub fn equals(&self, other: &StrView) -> bool {
        self.len() == other.len() && self.iter_logical().eq(other.iter_logical())
    }

    /// Logical-item equality after canonicalizing each side.
    pub fn equals_ignoring_case(&self, other: &StrView, unicode: bool) -> bool {
        self.len() == other.len()
            && self
                .iter_logical()
                .map(|cp| crate::case::canonicalize(cp, unicode))
                .eq(other
                    .iter_logical()
                    .map(|cp| crate::case::canonicalize(cp, unicode)))
    }

    /// Position of the first line terminator at or after `from`, or the end
    /// of the view when none follows.
    pub fn find_end_of_line(&self, from: Cursor) -> Cursor {
        let mut cursor = from;
        while cursor.position() < self.len() {
            if is_line_terminator(self.matching_code_point_at(cursor.unit_offset())) {
                break;
            }
            cursor.advance(self);
        }
        cursor
    }

    /// Rightmost occurrence of `code_point` strictly before logical position
    /// `before`. `usize::MAX` searches the whole view.
    pub fn find_index_of_previous(&self, code_point: u32, before: usize) -> Option<Cursor> {
        let mut found = None;
        let mut cursor = Cursor::start();
        while cursor.position() < self.len() && cursor.position() < before {
            if self.matching_code_point_at(cursor.unit_offset()) == code_point {
                found = Some(cursor);
            }
            cursor.advance(self);
        }
        found
    }

    /// Decode to an owned string, replacing unpaired surrogates.
    pub fn to_string_lossy(&self) -> String {
        self.iter_code_points()
            .map(|cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

/// Iterator over decoded code points of a view.
pub struct CodePoints<'a> {
    data: ViewData<'a>,
    unit_offset: usize,
}

impl Iterator for CodePoints<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self.data {
            ViewData::Bytes(bytes) => {
                let byte = *bytes.get(self.unit_offset)?;
                self.unit_offset += 1;
                Some(byte as u32)
            }
            ViewData::Utf16(units) => {
                if self.unit_offset >= units.len() {
                    return None;
                }
                let code_point = decode_utf16_at(units, self.unit_offset);
                self.unit_offset += pair_len(units, self.unit_offset);
                Some(code_point)
            }
        }
    }
}

/// Iterator over a view's logical items.
pub struct LogicalItems<'a> {
    view: StrView<'a>,
    unit_offset: usize,
}

impl Iterator for LogicalItems<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.unit_offset >= self.view.len_in_code_units() {
            return None;
        }
        let item = self.view.matching_code_point_at(self.unit_offset);
        self.unit_offset += if self.view.unicode() {
            self.view.length_of_code_point(item)
        } else {
            1
        };
        Some(item)
    }
}

#[inline]
fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

#[inline]
fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

fn decode_utf16_at(units: &[u16], offset: usize) -> u32 {
    let unit = units[offset];
    if is_high_surrogate(unit) && offset + 1 < units.len() && is_low_surrogate(units[offset + 1]) {
        0x10000 + (((unit as u32 - 0xD800) << 10) | (units[offset + 1] as u32 - 0xDC00))
    } else {
        unit as u32
    }
}

/// Code units of the code point starting at `offset` (1, or 2 for a valid
/// surrogate pair).
fn pair_len(units: &[u16], offset: usize) -> usize {
    if is_high_surrogate(units[offset])
        && offset + 1 < units.len()
        && is_low_surrogate(units[offset + 1])
    {
        2
    } else {
        1
    }
}
