#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Shared primitives for the matching engine.
//!
//! This crate carries the pieces both the compiler and the interpreter need:
//! [`StrView`], an encoding-aware subject view that exposes positions in two
//! coordinate systems at once (logical code points and raw code units),
//! [`Cursor`], the paired position that travels through a view, match option
//! flags, and the serial-keyed side tables (interned strings and literal
//! string sets) that programs reference by global index so independently
//! compiled fragments can be concatenated without renumbering.

mod case;
mod cursor;
mod flags;
mod string_set;
mod strings;
mod view;

#[cfg(test)]
mod strings_tests;
#[cfg(test)]
mod view_tests;

// Re-export commonly used items at crate root
pub use case::{canonicalize, code_point_matches_range_ignoring_case, is_word_character};
pub use cursor::Cursor;
pub use flags::OptionFlags;
pub use string_set::{StringSet, StringSetIndex, StringSetTable, Trie, TrieNodeId};
pub use strings::{ByteStringTable, StringTable, StringTableIndex, Utf16StringTable};
pub use view::{
    LINE_SEPARATOR, PARAGRAPH_SEPARATOR, StrView, ViewData, encode_utf16, is_line_terminator,
};
