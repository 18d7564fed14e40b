#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Instruction set and program builder for the matching engine.
//!
//! A pattern compiler drives the [`ByteCode`] emitters to assemble
//! instruction fragments, concatenates and combines them, and flattens the
//! result with [`ByteCode::into_program`] into an executable [`Program`]:
//! a flat `u64` word sequence plus the side tables its instructions
//! reference. Interpretation decodes words lazily through [`OpCode`];
//! [`verify`] checks untrusted words once so the interpreter never has to.

mod builder;
mod dump;
mod opcode;
mod program;
mod serialize;
mod unicode;
mod verify;

#[cfg(test)]
mod serialize_tests;

// Re-export commonly used items at crate root
pub use builder::{ComparePiece, LookAroundKind};
pub use dump::dump;
pub use opcode::{
    BoundaryCheckType, CharClass, CharRange, CharacterCompareType, CompareTerm, CompareTermReader,
    DecodeError, ForkIfCondition, OpCode, OpCodeId, jump_target,
};
pub use program::{ByteCode, CompileContext, Program};
pub use serialize::{HEADER_SIZE, MAGIC, ProgramFileError, VERSION};
pub use unicode::{PropertyError, PropertyIndex, PropertyRanges, PropertyTable, resolve_property};
pub use verify::{VerifyError, verify};
