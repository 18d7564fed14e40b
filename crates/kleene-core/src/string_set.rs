//! Trie-backed string-set tables for alternation-of-literals matching.
//!
//! A string set holds the alternatives of a literal alternation as two
//! coordinated prefix trees built from the same strings: one keyed by code
//! points, one by UTF-16 code units. The matcher descends the trie that
//! matches the subject's encoding and commits the longest terminal it saw.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::view::StrView;

/// First local index handed out by a table, matching the interned-string
/// tables so stale zero-initialized indices stand out in dumps.
const FIRST_LOCAL_INDEX: u32 = 0x4242;

/// Index of a trie node within its arena.
pub type TrieNodeId = u32;

/// One trie node: child edges sorted by key, plus a terminal marker set at
/// the end of every inserted string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TrieNode {
    children: Vec<(u32, TrieNodeId)>,
    terminal: bool,
}

/// Arena-allocated prefix tree keyed by `u32` symbols.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Trie {
    pub const ROOT: TrieNodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }

    /// Insert one key sequence, marking its end node terminal. An empty
    /// sequence marks the root itself.
    pub fn insert(&mut self, keys: impl IntoIterator<Item = u32>) {
        let mut node = Self::ROOT;
        for key in keys {
            node = match self.child(node, key) {
                Some(next) => next,
                None => {
                    let next = self.nodes.len() as TrieNodeId;
                    self.nodes.push(TrieNode::default());
                    let children = &mut self.nodes[node as usize].children;
                    let slot = children.partition_point(|&(k, _)| k < key);
                    children.insert(slot, (key, next));
                    next
                }
            };
        }
        self.nodes[node as usize].terminal = true;
    }

    /// Exact child lookup by binary search.
    pub fn child(&self, node: TrieNodeId, key: u32) -> Option<TrieNodeId> {
        let children = &self.nodes[node as usize].children;
        children
            .binary_search_by_key(&key, |&(k, _)| k)
            .ok()
            .map(|slot| children[slot].1)
    }

    /// Iterate child edges of `node` in key order.
    pub fn children(&self, node: TrieNodeId) -> impl Iterator<Item = (u32, TrieNodeId)> + '_ {
        self.nodes[node as usize].children.iter().copied()
    }

    #[inline]
    pub fn is_terminal(&self, node: TrieNodeId) -> bool {
        self.nodes[node as usize].terminal
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

/// The coordinated trie pair for one string set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringSet {
    by_code_point: Trie,
    by_code_unit: Trie,
}

impl StringSet {
    /// Build both tries from UTF-16 alternatives.
    pub fn from_alternatives<'a>(alternatives: impl IntoIterator<Item = &'a [u16]>) -> Self {
        let mut by_code_point = Trie::new();
        let mut by_code_unit = Trie::new();
        for alternative in alternatives {
            by_code_point.insert(StrView::from_utf16(alternative).iter_code_points());
            by_code_unit.insert(alternative.iter().map(|&unit| unit as u32));
        }
        Self {
            by_code_point,
            by_code_unit,
        }
    }

    /// Trie keyed by code points, for byte subjects.
    #[inline]
    pub fn by_code_point(&self) -> &Trie {
        &self.by_code_point
    }

    /// Trie keyed by UTF-16 code units, for UTF-16 subjects.
    #[inline]
    pub fn by_code_unit(&self) -> &Trie {
        &self.by_code_unit
    }
}

/// Global handle to a string set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct StringSetIndex(u64);

impl StringSetIndex {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Serial-keyed table of string sets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StringSetTable {
    serial: u32,
    next_local: u32,
    sets: IndexMap<u64, StringSet>,
}

impl StringSetTable {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            next_local: FIRST_LOCAL_INDEX,
            sets: IndexMap::new(),
        }
    }

    #[inline]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn insert(&mut self, set: StringSet) -> StringSetIndex {
        let raw = ((self.serial as u64) << 32) | self.next_local as u64;
        self.next_local += 1;
        self.sets.insert(raw, set);
        StringSetIndex(raw)
    }

    /// Resolve a handle.
    ///
    /// # Panics
    /// Panics on an index this table never issued or merged in.
    pub fn get(&self, index: StringSetIndex) -> &StringSet {
        self.sets.get(&index.as_u64()).unwrap_or_else(|| {
            panic!("string set index {:#x} not present", index.as_u64())
        })
    }

    pub fn try_get(&self, index: StringSetIndex) -> Option<&StringSet> {
        self.sets.get(&index.as_u64())
    }

    /// Fold `other` into this table. The same global index must resolve to
    /// the same set in both tables.
    pub fn merge_from(&mut self, other: &StringSetTable) {
        for (&raw, set) in &other.sets {
            match self.sets.get(&raw) {
                Some(existing) => assert!(
                    existing == set,
                    "string set index {raw:#x} maps to conflicting sets"
                ),
                None => {
                    self.sets.insert(raw, set.clone());
                }
            }
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StringSetIndex, &StringSet)> {
        self.sets.iter().map(|(&raw, set)| (StringSetIndex(raw), set))
    }
}
