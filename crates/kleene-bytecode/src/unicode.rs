//! Unicode property resolution.
//!
//! Property, general-category, script and script-extension terms are resolved
//! while a program is built, through `regex-syntax`, into explicit code point
//! range lists stored in a side table. The interpreter then only ever binary
//! searches a range list; no Unicode tables are consulted at match time.

use indexmap::IndexMap;
use regex_syntax::ParserBuilder;
use regex_syntax::hir::{Class, HirKind};
use serde::{Deserialize, Serialize};

/// First local index handed out by a table, matching the interned-string
/// tables so stale zero-initialized indices stand out in dumps.
const FIRST_LOCAL_INDEX: u32 = 0x4242;

/// Failure to resolve a property name.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("unknown unicode property: {name}")]
    Unknown {
        name: String,
        #[source]
        source: Box<regex_syntax::Error>,
    },
    #[error("property {name} did not resolve to a character class")]
    NotAClass { name: String },
    #[error("malformed property name: {name}")]
    MalformedName { name: String },
}

/// A resolved property: sorted non-overlapping inclusive code point ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRanges {
    ranges: Vec<(u32, u32)>,
}

impl PropertyRanges {
    /// Build from ranges that are already sorted and non-overlapping.
    pub fn from_sorted_ranges(ranges: Vec<(u32, u32)>) -> Self {
        debug_assert!(
            ranges.windows(2).all(|pair| pair[0].1 < pair[1].0),
            "property ranges must be sorted and disjoint"
        );
        Self { ranges }
    }

    pub fn contains(&self, code_point: u32) -> bool {
        let slot = self.ranges.partition_point(|&(from, _)| from <= code_point);
        slot > 0 && self.ranges[slot - 1].1 >= code_point
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.ranges.iter().copied()
    }
}

/// Resolve a property name like `Greek`, `Lu`, `Alphabetic` or
/// `Script_Extensions=Katakana` into code point ranges. With `insensitive`
/// set the ranges are closed under simple case folding.
pub fn resolve_property(name: &str, insensitive: bool) -> Result<PropertyRanges, PropertyError> {
    if name.is_empty() || !name.chars().all(is_property_name_char) {
        return Err(PropertyError::MalformedName {
            name: name.to_string(),
        });
    }
    let pattern = format!("\\p{{{name}}}");
    let hir = ParserBuilder::new()
        .unicode(true)
        .utf8(false)
        .case_insensitive(insensitive)
        .build()
        .parse(&pattern)
        .map_err(|source| PropertyError::Unknown {
            name: name.to_string(),
            source: Box::new(source),
        })?;
    match hir.into_kind() {
        HirKind::Class(Class::Unicode(class)) => Ok(PropertyRanges {
            ranges: class
                .ranges()
                .iter()
                .map(|range| (range.start() as u32, range.end() as u32))
                .collect(),
        }),
        _ => Err(PropertyError::NotAClass {
            name: name.to_string(),
        }),
    }
}

fn is_property_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '=' | ':' | '-' | ' ')
}

/// Global handle to a resolved property.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct PropertyIndex(u64);

impl PropertyIndex {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Serial-keyed table of resolved properties.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertyTable {
    serial: u32,
    next_local: u32,
    properties: IndexMap<u64, PropertyRanges>,
}

impl PropertyTable {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            next_local: FIRST_LOCAL_INDEX,
            properties: IndexMap::new(),
        }
    }

    #[inline]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn insert(&mut self, ranges: PropertyRanges) -> PropertyIndex {
        let raw = ((self.serial as u64) << 32) | self.next_local as u64;
        self.next_local += 1;
        self.properties.insert(raw, ranges);
        PropertyIndex(raw)
    }

    /// Resolve a handle.
    ///
    /// # Panics
    /// Panics on an index this table never issued or merged in.
    pub fn get(&self, index: PropertyIndex) -> &PropertyRanges {
        self.properties.get(&index.as_u64()).unwrap_or_else(|| {
            panic!("property index {:#x} not present", index.as_u64())
        })
    }

    pub fn try_get(&self, index: PropertyIndex) -> Option<&PropertyRanges> {
        self.properties.get(&index.as_u64())
    }

    /// Fold `other` into this table. The same global index must resolve to
    /// the same ranges in both tables.
    pub fn merge_from(&mut self, other: &PropertyTable) {
        for (&raw, ranges) in &other.properties {
            match self.properties.get(&raw) {
                Some(existing) => assert!(
                    existing == ranges,
                    "property index {raw:#x} maps to conflicting ranges"
                ),
                None => {
                    self.properties.insert(raw, ranges.clone());
                }
            }
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyIndex, &PropertyRanges)> {
        self.properties
            .iter()
            .map(|(&raw, ranges)| (PropertyIndex(raw), ranges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_binary_searches_the_ranges() {
        let ranges =
            PropertyRanges::from_sorted_ranges(vec![(0x41, 0x5A), (0x61, 0x7A), (0x391, 0x3A9)]);
        assert!(ranges.contains(0x41));
        assert!(ranges.contains(0x5A));
        assert!(!ranges.contains(0x5B));
        assert!(ranges.contains(0x3A0));
        assert!(!ranges.contains(0x40));
        assert!(!ranges.contains(0x10FFFF));
    }

    #[test]
    fn scripts_resolve_to_their_code_points() {
        let greek = resolve_property("Greek", false).unwrap();
        assert!(greek.contains(0x3B1));
        assert!(!greek.contains(u32::from(b'a')));
    }

    #[test]
    fn general_categories_resolve() {
        let upper = resolve_property("Lu", false).unwrap();
        assert!(upper.contains(u32::from(b'A')));
        assert!(!upper.contains(u32::from(b'a')));
    }

    #[test]
    fn insensitive_resolution_folds_case() {
        let upper = resolve_property("Lu", true).unwrap();
        assert!(upper.contains(u32::from(b'a')));
    }

    #[test]
    fn unknown_property_is_an_error() {
        assert!(matches!(
            resolve_property("NoSuchProperty", false),
            Err(PropertyError::Unknown { .. })
        ));
        assert!(matches!(
            resolve_property("a}b", false),
            Err(PropertyError::MalformedName { .. })
        ));
    }

    #[test]
    fn table_issues_and_merges_serial_keyed_indices() {
        let mut left = PropertyTable::new(1);
        let mut right = PropertyTable::new(2);
        let digits = PropertyRanges::from_sorted_ranges(vec![(0x30, 0x39)]);
        let index = right.insert(digits.clone());
        left.merge_from(&right);
        assert_eq!(left.get(index), &digits);
    }

    #[test]
    #[should_panic(expected = "conflicting")]
    fn merge_panics_when_an_index_resolves_differently() {
        let mut left = PropertyTable::new(3);
        let mut right = PropertyTable::new(3);
        left.insert(PropertyRanges::from_sorted_ranges(vec![(1, 2)]));
        right.insert(PropertyRanges::from_sorted_ranges(vec![(3, 4)]));
        left.merge_from(&right);
    }
}
