//! Structural verification of finished programs.
//!
//! Deserialized words are arbitrary until proven otherwise; the interpreter
//! assumes a verified program and panics on malformed input. [`verify`] walks
//! every instruction once, then checks every jump against the instruction
//! boundaries the walk established.

use kleene_core::{StringSetIndex, StringTableIndex};

use crate::opcode::{
    CharClass, CharRange, CharacterCompareType, DecodeError, ForkIfCondition, OpCode,
};
use crate::program::Program;
use crate::unicode::PropertyIndex;

/// Why a program failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("jump at position {ip} escapes the program: target {target}")]
    JumpOutOfBounds { ip: usize, target: i64 },
    #[error("jump at position {ip} lands inside an instruction: target {target}")]
    JumpInsideInstruction { ip: usize, target: usize },
    #[error("conditional fork at position {ip} carries the invalid condition")]
    InvalidForkCondition { ip: usize },
    #[error("repeat at position {ip} reaches back {back} words, before the program start")]
    RepeatOutOfBounds { ip: usize, back: u64 },
    #[error("repeat at position {ip} has a zero count")]
    RepeatZeroCount { ip: usize },
    #[error("capture group id 0 at position {ip}; group ids are 1-based")]
    CaptureGroupZero { ip: usize },
    #[error("unknown compare term type {word} at position {ip}")]
    UnknownCompareType { ip: usize, word: u64 },
    #[error("compare term type {word} at position {ip} is not executable")]
    UnexecutableCompareType { ip: usize, word: u64 },
    #[error("compare arguments at position {ip} are truncated")]
    CompareTruncated { ip: usize },
    #[error("unknown character class {word} at position {ip}")]
    UnknownCharClass { ip: usize, word: u64 },
    #[error("inverted character range {from:#x}..{to:#x} at position {ip}")]
    InvertedCharRange { ip: usize, from: u32, to: u32 },
    #[error("unresolved string index {index:#x} at position {ip}")]
    UnresolvedString { ip: usize, index: u64 },
    #[error("unresolved group name index {index:#x} at position {ip}")]
    UnresolvedGroupName { ip: usize, index: u64 },
    #[error("unresolved property index {index:#x} at position {ip}")]
    UnresolvedProperty { ip: usize, index: u64 },
    #[error("unresolved string set index {index:#x} at position {ip}")]
    UnresolvedStringSet { ip: usize, index: u64 },
}

/// Check that every instruction decodes, every jump lands on an instruction
/// boundary, and every side-table reference resolves.
pub fn verify(program: &Program) -> Result<(), VerifyError> {
    let words = program.words();

    // Pass 1: decode everything, collect instruction boundaries.
    let mut starts = Vec::new();
    let mut ip = 0;
    while ip < words.len() {
        let op = OpCode::try_decode(words, ip)?;
        starts.push(ip);
        ip += op.size();
    }

    // Pass 2: jumps and operands against the now-complete boundary set.
    let check_target = |ip: usize, size: usize, offset: i64| -> Result<(), VerifyError> {
        let target = ip as i64 + size as i64 + offset;
        if target < 0 || target > words.len() as i64 {
            return Err(VerifyError::JumpOutOfBounds { ip, target });
        }
        let target = target as usize;
        if target != words.len() && starts.binary_search(&target).is_err() {
            return Err(VerifyError::JumpInsideInstruction { ip, target });
        }
        Ok(())
    };
    let check_group = |ip: usize, group: u64| -> Result<(), VerifyError> {
        if group == 0 {
            return Err(VerifyError::CaptureGroupZero { ip });
        }
        Ok(())
    };

    for &ip in &starts {
        let op = OpCode::try_decode(words, ip)?;
        let size = op.size();
        match op {
            OpCode::Jump { offset }
            | OpCode::ForkJump { offset }
            | OpCode::ForkStay { offset }
            | OpCode::ForkReplaceJump { offset }
            | OpCode::ForkReplaceStay { offset }
            | OpCode::JumpNonEmpty { offset, .. } => check_target(ip, size, offset)?,
            OpCode::ForkIf {
                offset, condition, ..
            } => {
                if condition == ForkIfCondition::Invalid {
                    return Err(VerifyError::InvalidForkCondition { ip });
                }
                check_target(ip, size, offset)?;
            }
            OpCode::Repeat {
                back_offset, count, ..
            } => {
                if count == 0 {
                    return Err(VerifyError::RepeatZeroCount { ip });
                }
                let Some(target) = ip.checked_sub(back_offset as usize) else {
                    return Err(VerifyError::RepeatOutOfBounds {
                        ip,
                        back: back_offset,
                    });
                };
                if starts.binary_search(&target).is_err() {
                    return Err(VerifyError::JumpInsideInstruction { ip, target });
                }
            }
            OpCode::SaveLeftCaptureGroup { group }
            | OpCode::SaveRightCaptureGroup { group }
            | OpCode::ClearCaptureGroup { group } => check_group(ip, group)?,
            OpCode::SaveRightNamedCaptureGroup { name, group } => {
                check_group(ip, group)?;
                if program.group_names().try_get(name).is_none() {
                    return Err(VerifyError::UnresolvedGroupName {
                        ip,
                        index: name.as_u64(),
                    });
                }
            }
            OpCode::Compare { arguments, .. } | OpCode::CompareSimple { arguments } => {
                verify_compare_arguments(ip, arguments, program)?;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Walk one compare argument list term by term without the panicking reader.
fn verify_compare_arguments(
    ip: usize,
    arguments: &[u64],
    program: &Program,
) -> Result<(), VerifyError> {
    let mut offset = 0;
    while offset < arguments.len() {
        let type_word = arguments[offset];
        let compare_type = CharacterCompareType::try_from_word(type_word).ok_or(
            VerifyError::UnknownCompareType {
                ip,
                word: type_word,
            },
        )?;
        offset += 1;

        let value_words = match compare_type.value_word_count() {
            Some(count) => count,
            // Lookup table: two counts, then that many packed ranges.
            None => {
                if offset + 2 > arguments.len() {
                    return Err(VerifyError::CompareTruncated { ip });
                }
                let sensitive = arguments[offset] as usize;
                let insensitive = arguments[offset + 1] as usize;
                2 + sensitive + insensitive
            }
        };
        if offset + value_words > arguments.len() {
            return Err(VerifyError::CompareTruncated { ip });
        }
        let values = &arguments[offset..offset + value_words];

        match compare_type {
            CharacterCompareType::Undefined | CharacterCompareType::RangeExpressionDummy => {
                return Err(VerifyError::UnexecutableCompareType {
                    ip,
                    word: type_word,
                });
            }
            CharacterCompareType::CharClass => {
                if CharClass::try_from_word(values[0]).is_none() {
                    return Err(VerifyError::UnknownCharClass {
                        ip,
                        word: values[0],
                    });
                }
            }
            CharacterCompareType::CharRange => {
                let range = CharRange::from_raw(values[0]);
                if range.from > range.to {
                    return Err(VerifyError::InvertedCharRange {
                        ip,
                        from: range.from,
                        to: range.to,
                    });
                }
            }
            CharacterCompareType::Reference => {
                if values[0] == 0 {
                    return Err(VerifyError::CaptureGroupZero { ip });
                }
            }
            CharacterCompareType::String => {
                let index = StringTableIndex::from_raw(values[0]);
                if program.strings().try_get(index).is_none() {
                    return Err(VerifyError::UnresolvedString {
                        ip,
                        index: values[0],
                    });
                }
            }
            CharacterCompareType::NamedReference => {
                let index = StringTableIndex::from_raw(values[0]);
                if program.group_names().try_get(index).is_none() {
                    return Err(VerifyError::UnresolvedGroupName {
                        ip,
                        index: values[0],
                    });
                }
            }
            CharacterCompareType::Property
            | CharacterCompareType::GeneralCategory
            | CharacterCompareType::Script
            | CharacterCompareType::ScriptExtension => {
                let index = PropertyIndex::from_raw(values[0]);
                if program.properties().try_get(index).is_none() {
                    return Err(VerifyError::UnresolvedProperty {
                        ip,
                        index: values[0],
                    });
                }
            }
            CharacterCompareType::StringSet => {
                let index = StringSetIndex::from_raw(values[0]);
                if program.string_sets().try_get(index).is_none() {
                    return Err(VerifyError::UnresolvedStringSet {
                        ip,
                        index: values[0],
                    });
                }
            }
            _ => {}
        }
        offset += value_words;
    }
    Ok(())
}
