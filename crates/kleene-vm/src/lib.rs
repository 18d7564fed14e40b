#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Backtracking virtual machine executing compiled Kleene programs.
//!
//! [`Matcher`] runs a [`kleene_bytecode::Program`] over a
//! [`kleene_core::StrView`], attempting a match at successive offsets.
//! Within an attempt, alternatives are explored in priority order through
//! an explicit fork stack, so the first match found is the leftmost match
//! the pattern's structure prefers. Results come back as [`Match`] spans
//! plus one capture row per match.

mod engine;

// Re-export commonly used items at crate root
pub use engine::matcher::{MatchResult, Matcher};
pub use engine::state::Match;
pub use engine::trace::{NoopTracer, PrintTracer, Tracer};
