//! Serial-keyed interned-string tables.
//!
//! Compare literals and group names live out of line, referenced from
//! bytecode by a global index `(serial << 32) | local`. The serial is issued
//! by the compilation context, so fragments built independently can merge
//! without index collisions; the same global index resolving to two
//! different strings is a builder bug and panics on merge.

use std::hash::Hash;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// First local index handed out by a table. Starting away from zero makes
/// stale zero-initialized indices stand out in dumps.
const FIRST_LOCAL_INDEX: u32 = 0x4242;

/// Global handle to an interned string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct StringTableIndex(u64);

impl StringTableIndex {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Serial of the issuing table.
    #[inline]
    pub fn serial(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Index local to the issuing table.
    #[inline]
    pub fn local(self) -> u32 {
        self.0 as u32
    }
}

/// Interned-string table, generic over the stored string type.
///
/// Two concrete tables exist side by side in a program: byte strings for
/// group names and UTF-16 strings for compare literals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StringTable<S: Eq + Hash> {
    serial: u32,
    next_local: u32,
    by_index: IndexMap<u64, S>,
    by_value: IndexMap<S, u64>,
}

impl<S: Clone + Eq + Hash> StringTable<S> {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            next_local: FIRST_LOCAL_INDEX,
            by_index: IndexMap::new(),
            by_value: IndexMap::new(),
        }
    }

    #[inline]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Intern `value`, returning the existing handle on a repeat insertion.
    pub fn insert(&mut self, value: S) -> StringTableIndex {
        if let Some(&raw) = self.by_value.get(&value) {
            return StringTableIndex(raw);
        }
        let raw = ((self.serial as u64) << 32) | self.next_local as u64;
        self.next_local += 1;
        self.by_index.insert(raw, value.clone());
        self.by_value.insert(value, raw);
        StringTableIndex(raw)
    }

    /// Resolve a handle.
    ///
    /// # Panics
    /// Panics on an index this table never issued or merged in.
    pub fn get(&self, index: StringTableIndex) -> &S {
        self.by_index.get(&index.as_u64()).unwrap_or_else(|| {
            panic!("string table index {:#x} not present", index.as_u64())
        })
    }

    pub fn try_get(&self, index: StringTableIndex) -> Option<&S> {
        self.by_index.get(&index.as_u64())
    }

    /// Fold `other` into this table.
    ///
    /// A global index present in both tables must resolve to the same
    /// string; a clash means two fragments disagree about interned content.
    pub fn merge_from(&mut self, other: &StringTable<S>) {
        for (&raw, value) in &other.by_index {
            match self.by_index.get(&raw) {
                Some(existing) => assert!(
                    existing == value,
                    "string table index {raw:#x} maps to conflicting strings"
                ),
                None => {
                    self.by_index.insert(raw, value.clone());
                }
            }
            self.by_value.insert(value.clone(), raw);
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StringTableIndex, &S)> {
        self.by_index
            .iter()
            .map(|(&raw, value)| (StringTableIndex(raw), value))
    }
}

/// Byte-string table (group names).
pub type ByteStringTable = StringTable<String>;

/// UTF-16 string table (compare literals).
pub type Utf16StringTable = StringTable<Vec<u16>>;
