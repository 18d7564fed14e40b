//! Backtracking match engine.

pub mod compare;
pub mod input;
pub mod interpreter;
pub mod matcher;
pub mod state;
pub mod trace;

#[cfg(test)]
mod compare_tests;
#[cfg(test)]
mod interpreter_tests;
#[cfg(test)]
mod matcher_tests;
