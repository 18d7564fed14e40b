//! Instruction set of the matching engine.
//!
//! Programs are flat `u64` word sequences. Each instruction is a tag word
//! followed by its argument words; [`OpCode::decode`] lifts the words at an
//! instruction boundary into a typed view. Jump arguments are end-relative:
//! the target is the instruction's end plus the stored signed offset, so
//! fragments can be concatenated without relocation.

use kleene_core::{StringSetIndex, StringTableIndex};

use crate::unicode::PropertyIndex;

// ==== Instruction tags ====

/// Instruction tag. The numbering is part of the serialized program format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCodeId {
    Compare,
    Jump,
    JumpNonEmpty,
    ForkJump,
    ForkStay,
    ForkReplaceJump,
    ForkReplaceStay,
    ForkIf,
    FailForks,
    PopSaved,
    SaveLeftCaptureGroup,
    SaveRightCaptureGroup,
    SaveRightNamedCaptureGroup,
    RSeekTo,
    CheckBegin,
    CheckEnd,
    CheckBoundary,
    Save,
    Restore,
    GoBack,
    SetStepBack,
    IncStepBack,
    CheckStepBack,
    CheckSavedPosition,
    ClearCaptureGroup,
    Repeat,
    ResetRepeat,
    Checkpoint,
    CompareSimple,
    Exit,
}

impl OpCodeId {
    /// Decode from a tag word, or `None` for an unknown tag.
    pub fn try_from_word(word: u64) -> Option<Self> {
        Some(match word {
            0 => Self::Compare,
            1 => Self::Jump,
            2 => Self::JumpNonEmpty,
            3 => Self::ForkJump,
            4 => Self::ForkStay,
            5 => Self::ForkReplaceJump,
            6 => Self::ForkReplaceStay,
            7 => Self::ForkIf,
            8 => Self::FailForks,
            9 => Self::PopSaved,
            10 => Self::SaveLeftCaptureGroup,
            11 => Self::SaveRightCaptureGroup,
            12 => Self::SaveRightNamedCaptureGroup,
            13 => Self::RSeekTo,
            14 => Self::CheckBegin,
            15 => Self::CheckEnd,
            16 => Self::CheckBoundary,
            17 => Self::Save,
            18 => Self::Restore,
            19 => Self::GoBack,
            20 => Self::SetStepBack,
            21 => Self::IncStepBack,
            22 => Self::CheckStepBack,
            23 => Self::CheckSavedPosition,
            24 => Self::ClearCaptureGroup,
            25 => Self::Repeat,
            26 => Self::ResetRepeat,
            27 => Self::Checkpoint,
            28 => Self::CompareSimple,
            29 => Self::Exit,
            _ => return None,
        })
    }

    /// Decode from a tag word.
    ///
    /// # Panics
    /// Panics on an unknown tag.
    pub fn from_word(word: u64) -> Self {
        Self::try_from_word(word).unwrap_or_else(|| panic!("invalid opcode word: {word}"))
    }

    /// Encode as a tag word.
    pub fn as_word(self) -> u64 {
        match self {
            Self::Compare => 0,
            Self::Jump => 1,
            Self::JumpNonEmpty => 2,
            Self::ForkJump => 3,
            Self::ForkStay => 4,
            Self::ForkReplaceJump => 5,
            Self::ForkReplaceStay => 6,
            Self::ForkIf => 7,
            Self::FailForks => 8,
            Self::PopSaved => 9,
            Self::SaveLeftCaptureGroup => 10,
            Self::SaveRightCaptureGroup => 11,
            Self::SaveRightNamedCaptureGroup => 12,
            Self::RSeekTo => 13,
            Self::CheckBegin => 14,
            Self::CheckEnd => 15,
            Self::CheckBoundary => 16,
            Self::Save => 17,
            Self::Restore => 18,
            Self::GoBack => 19,
            Self::SetStepBack => 20,
            Self::IncStepBack => 21,
            Self::CheckStepBack => 22,
            Self::CheckSavedPosition => 23,
            Self::ClearCaptureGroup => 24,
            Self::Repeat => 25,
            Self::ResetRepeat => 26,
            Self::Checkpoint => 27,
            Self::CompareSimple => 28,
            Self::Exit => 29,
        }
    }

    /// Tag name for dumps.
    pub fn name(self) -> &'static str {
        match self {
            Self::Compare => "Compare",
            Self::Jump => "Jump",
            Self::JumpNonEmpty => "JumpNonEmpty",
            Self::ForkJump => "ForkJump",
            Self::ForkStay => "ForkStay",
            Self::ForkReplaceJump => "ForkReplaceJump",
            Self::ForkReplaceStay => "ForkReplaceStay",
            Self::ForkIf => "ForkIf",
            Self::FailForks => "FailForks",
            Self::PopSaved => "PopSaved",
            Self::SaveLeftCaptureGroup => "SaveLeftCaptureGroup",
            Self::SaveRightCaptureGroup => "SaveRightCaptureGroup",
            Self::SaveRightNamedCaptureGroup => "SaveRightNamedCaptureGroup",
            Self::RSeekTo => "RSeekTo",
            Self::CheckBegin => "CheckBegin",
            Self::CheckEnd => "CheckEnd",
            Self::CheckBoundary => "CheckBoundary",
            Self::Save => "Save",
            Self::Restore => "Restore",
            Self::GoBack => "GoBack",
            Self::SetStepBack => "SetStepBack",
            Self::IncStepBack => "IncStepBack",
            Self::CheckStepBack => "CheckStepBack",
            Self::CheckSavedPosition => "CheckSavedPosition",
            Self::ClearCaptureGroup => "ClearCaptureGroup",
            Self::Repeat => "Repeat",
            Self::ResetRepeat => "ResetRepeat",
            Self::Checkpoint => "Checkpoint",
            Self::CompareSimple => "CompareSimple",
            Self::Exit => "Exit",
        }
    }
}

// ==== Argument vocabularies ====

/// What a boundary assertion checks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryCheckType {
    Word,
    NonWord,
}

impl BoundaryCheckType {
    pub fn try_from_word(word: u64) -> Option<Self> {
        match word {
            0 => Some(Self::Word),
            1 => Some(Self::NonWord),
            _ => None,
        }
    }

    pub fn as_word(self) -> u64 {
        match self {
            Self::Word => 0,
            Self::NonWord => 1,
        }
    }
}

/// Condition tested by a conditional fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkIfCondition {
    AtStartOfLine,
    Invalid,
}

impl ForkIfCondition {
    pub fn try_from_word(word: u64) -> Option<Self> {
        match word {
            0 => Some(Self::AtStartOfLine),
            1 => Some(Self::Invalid),
            _ => None,
        }
    }

    pub fn as_word(self) -> u64 {
        match self {
            Self::AtStartOfLine => 0,
            Self::Invalid => 1,
        }
    }
}

/// Compare term type. The numbering is part of the serialized program format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterCompareType {
    Undefined,
    Inverse,
    TemporaryInverse,
    AnyChar,
    Char,
    String,
    CharClass,
    CharRange,
    Reference,
    NamedReference,
    Property,
    GeneralCategory,
    Script,
    ScriptExtension,
    RangeExpressionDummy,
    LookupTable,
    And,
    Or,
    EndAndOr,
    Subtract,
    StringSet,
}

impl CharacterCompareType {
    pub fn try_from_word(word: u64) -> Option<Self> {
        Some(match word {
            0 => Self::Undefined,
            1 => Self::Inverse,
            2 => Self::TemporaryInverse,
            3 => Self::AnyChar,
            4 => Self::Char,
            5 => Self::String,
            6 => Self::CharClass,
            7 => Self::CharRange,
            8 => Self::Reference,
            9 => Self::NamedReference,
            10 => Self::Property,
            11 => Self::GeneralCategory,
            12 => Self::Script,
            13 => Self::ScriptExtension,
            14 => Self::RangeExpressionDummy,
            15 => Self::LookupTable,
            16 => Self::And,
            17 => Self::Or,
            18 => Self::EndAndOr,
            19 => Self::Subtract,
            20 => Self::StringSet,
            _ => return None,
        })
    }

    pub fn from_word(word: u64) -> Self {
        Self::try_from_word(word)
            .unwrap_or_else(|| panic!("invalid compare type word: {word}"))
    }

    pub fn as_word(self) -> u64 {
        match self {
            Self::Undefined => 0,
            Self::Inverse => 1,
            Self::TemporaryInverse => 2,
            Self::AnyChar => 3,
            Self::Char => 4,
            Self::String => 5,
            Self::CharClass => 6,
            Self::CharRange => 7,
            Self::Reference => 8,
            Self::NamedReference => 9,
            Self::Property => 10,
            Self::GeneralCategory => 11,
            Self::Script => 12,
            Self::ScriptExtension => 13,
            Self::RangeExpressionDummy => 14,
            Self::LookupTable => 15,
            Self::And => 16,
            Self::Or => 17,
            Self::EndAndOr => 18,
            Self::Subtract => 19,
            Self::StringSet => 20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Inverse => "Inverse",
            Self::TemporaryInverse => "TemporaryInverse",
            Self::AnyChar => "AnyChar",
            Self::Char => "Char",
            Self::String => "String",
            Self::CharClass => "CharClass",
            Self::CharRange => "CharRange",
            Self::Reference => "Reference",
            Self::NamedReference => "NamedReference",
            Self::Property => "Property",
            Self::GeneralCategory => "GeneralCategory",
            Self::Script => "Script",
            Self::ScriptExtension => "ScriptExtension",
            Self::RangeExpressionDummy => "RangeExpressionDummy",
            Self::LookupTable => "LookupTable",
            Self::And => "And",
            Self::Or => "Or",
            Self::EndAndOr => "EndAndOr",
            Self::Subtract => "Subtract",
            Self::StringSet => "StringSet",
        }
    }

    /// Argument words following the type word, or `None` for the
    /// variable-length lookup table.
    pub fn value_word_count(self) -> Option<usize> {
        match self {
            Self::Undefined
            | Self::Inverse
            | Self::TemporaryInverse
            | Self::AnyChar
            | Self::RangeExpressionDummy
            | Self::And
            | Self::Or
            | Self::EndAndOr
            | Self::Subtract => Some(0),
            Self::Char
            | Self::String
            | Self::CharClass
            | Self::CharRange
            | Self::Reference
            | Self::NamedReference
            | Self::Property
            | Self::GeneralCategory
            | Self::Script
            | Self::ScriptExtension
            | Self::StringSet => Some(1),
            Self::LookupTable => None,
        }
    }
}

/// POSIX-style character class tested by a [`CharacterCompareType::CharClass`]
/// term. The numbering is part of the serialized program format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Alnum,
    Cntrl,
    Lower,
    Space,
    Alpha,
    Digit,
    Print,
    Upper,
    Blank,
    Graph,
    Punct,
    Word,
    Xdigit,
}

impl CharClass {
    pub fn try_from_word(word: u64) -> Option<Self> {
        Some(match word {
            0 => Self::Alnum,
            1 => Self::Cntrl,
            2 => Self::Lower,
            3 => Self::Space,
            4 => Self::Alpha,
            5 => Self::Digit,
            6 => Self::Print,
            7 => Self::Upper,
            8 => Self::Blank,
            9 => Self::Graph,
            10 => Self::Punct,
            11 => Self::Word,
            12 => Self::Xdigit,
            _ => return None,
        })
    }

    pub fn from_word(word: u64) -> Self {
        Self::try_from_word(word)
            .unwrap_or_else(|| panic!("invalid character class word: {word}"))
    }

    pub fn as_word(self) -> u64 {
        match self {
            Self::Alnum => 0,
            Self::Cntrl => 1,
            Self::Lower => 2,
            Self::Space => 3,
            Self::Alpha => 4,
            Self::Digit => 5,
            Self::Print => 6,
            Self::Upper => 7,
            Self::Blank => 8,
            Self::Graph => 9,
            Self::Punct => 10,
            Self::Word => 11,
            Self::Xdigit => 12,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Alnum => "alnum",
            Self::Cntrl => "cntrl",
            Self::Lower => "lower",
            Self::Space => "space",
            Self::Alpha => "alpha",
            Self::Digit => "digit",
            Self::Print => "print",
            Self::Upper => "upper",
            Self::Blank => "blank",
            Self::Graph => "graph",
            Self::Punct => "punct",
            Self::Word => "word",
            Self::Xdigit => "xdigit",
        }
    }
}

/// Inclusive code point range packed into one argument word as
/// `(from << 32) | to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRange {
    pub from: u32,
    pub to: u32,
}

impl CharRange {
    pub fn new(from: u32, to: u32) -> Self {
        assert!(from <= to, "inverted character range {from:#x}..{to:#x}");
        Self { from, to }
    }

    #[inline]
    pub fn from_raw(word: u64) -> Self {
        Self {
            from: (word >> 32) as u32,
            to: word as u32,
        }
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        ((self.from as u64) << 32) | self.to as u64
    }

    #[inline]
    pub fn contains(self, code_point: u32) -> bool {
        self.from <= code_point && code_point <= self.to
    }
}

// ==== Decoded instructions ====

/// A decoded instruction, borrowing argument slices from the program words.
///
/// Offsets are signed and end-relative. Capture group arguments are 1-based;
/// checkpoint and repetition ids index dense per-program slot vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode<'a> {
    Compare {
        argument_count: u64,
        arguments: &'a [u64],
    },
    Jump {
        offset: i64,
    },
    JumpNonEmpty {
        offset: i64,
        checkpoint: u64,
        form: OpCodeId,
    },
    ForkJump {
        offset: i64,
    },
    ForkStay {
        offset: i64,
    },
    ForkReplaceJump {
        offset: i64,
    },
    ForkReplaceStay {
        offset: i64,
    },
    ForkIf {
        offset: i64,
        form: OpCodeId,
        condition: ForkIfCondition,
    },
    FailForks,
    PopSaved,
    SaveLeftCaptureGroup {
        group: u64,
    },
    SaveRightCaptureGroup {
        group: u64,
    },
    SaveRightNamedCaptureGroup {
        name: StringTableIndex,
        group: u64,
    },
    RSeekTo {
        code_point: u32,
    },
    CheckBegin,
    CheckEnd,
    CheckBoundary {
        kind: BoundaryCheckType,
    },
    Save,
    Restore,
    GoBack {
        count: u64,
    },
    SetStepBack {
        count: u64,
    },
    IncStepBack,
    CheckStepBack,
    CheckSavedPosition,
    ClearCaptureGroup {
        group: u64,
    },
    Repeat {
        back_offset: u64,
        count: u64,
        id: u64,
    },
    ResetRepeat {
        id: u64,
    },
    Checkpoint {
        id: u64,
    },
    CompareSimple {
        arguments: &'a [u64],
    },
    Exit,
}

/// Instruction decoding failure. Verified programs never produce one; the
/// verifier reports these before a program reaches the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode {word} at position {ip}")]
    UnknownOpCode { ip: usize, word: u64 },
    #[error("instruction at position {ip} runs past the end of the program")]
    Truncated { ip: usize },
    #[error("unknown jump form {word} at position {ip}")]
    BadJumpForm { ip: usize, word: u64 },
    #[error("unknown boundary kind {word} at position {ip}")]
    BadBoundaryKind { ip: usize, word: u64 },
    #[error("unknown fork condition {word} at position {ip}")]
    BadForkCondition { ip: usize, word: u64 },
}

impl<'a> OpCode<'a> {
    /// Decode the instruction starting at word position `ip`. A position at
    /// or past the end of the program decodes as a synthetic [`OpCode::Exit`].
    ///
    /// # Panics
    /// Panics on malformed words; run the verifier first for untrusted
    /// programs.
    pub fn decode(words: &'a [u64], ip: usize) -> Self {
        Self::try_decode(words, ip).unwrap_or_else(|err| panic!("malformed program: {err}"))
    }

    /// Fallible form of [`OpCode::decode`].
    pub fn try_decode(words: &'a [u64], ip: usize) -> Result<Self, DecodeError> {
        if ip >= words.len() {
            return Ok(Self::Exit);
        }
        let id = OpCodeId::try_from_word(words[ip])
            .ok_or(DecodeError::UnknownOpCode { ip, word: words[ip] })?;
        let arg = |slot: usize| -> Result<u64, DecodeError> {
            words
                .get(ip + 1 + slot)
                .copied()
                .ok_or(DecodeError::Truncated { ip })
        };
        Ok(match id {
            OpCodeId::Compare => {
                let argument_count = arg(0)?;
                let args_size = arg(1)? as usize;
                let start = ip + 3;
                if start + args_size > words.len() {
                    return Err(DecodeError::Truncated { ip });
                }
                Self::Compare {
                    argument_count,
                    arguments: &words[start..start + args_size],
                }
            }
            OpCodeId::Jump => Self::Jump {
                offset: arg(0)? as i64,
            },
            OpCodeId::JumpNonEmpty => {
                let form_word = arg(2)?;
                let form = OpCodeId::try_from_word(form_word)
                    .filter(|form| {
                        matches!(
                            form,
                            OpCodeId::Jump
                                | OpCodeId::ForkJump
                                | OpCodeId::ForkStay
                                | OpCodeId::ForkReplaceJump
                                | OpCodeId::ForkReplaceStay
                        )
                    })
                    .ok_or(DecodeError::BadJumpForm { ip, word: form_word })?;
                Self::JumpNonEmpty {
                    offset: arg(0)? as i64,
                    checkpoint: arg(1)?,
                    form,
                }
            }
            OpCodeId::ForkJump => Self::ForkJump {
                offset: arg(0)? as i64,
            },
            OpCodeId::ForkStay => Self::ForkStay {
                offset: arg(0)? as i64,
            },
            OpCodeId::ForkReplaceJump => Self::ForkReplaceJump {
                offset: arg(0)? as i64,
            },
            OpCodeId::ForkReplaceStay => Self::ForkReplaceStay {
                offset: arg(0)? as i64,
            },
            OpCodeId::ForkIf => {
                let form_word = arg(1)?;
                let form = OpCodeId::try_from_word(form_word)
                    .filter(|form| {
                        matches!(
                            form,
                            OpCodeId::ForkJump
                                | OpCodeId::ForkStay
                                | OpCodeId::ForkReplaceJump
                                | OpCodeId::ForkReplaceStay
                        )
                    })
                    .ok_or(DecodeError::BadJumpForm { ip, word: form_word })?;
                let condition_word = arg(2)?;
                let condition = ForkIfCondition::try_from_word(condition_word).ok_or(
                    DecodeError::BadForkCondition {
                        ip,
                        word: condition_word,
                    },
                )?;
                Self::ForkIf {
                    offset: arg(0)? as i64,
                    form,
                    condition,
                }
            }
            OpCodeId::FailForks => Self::FailForks,
            OpCodeId::PopSaved => Self::PopSaved,
            OpCodeId::SaveLeftCaptureGroup => Self::SaveLeftCaptureGroup { group: arg(0)? },
            OpCodeId::SaveRightCaptureGroup => Self::SaveRightCaptureGroup { group: arg(0)? },
            OpCodeId::SaveRightNamedCaptureGroup => Self::SaveRightNamedCaptureGroup {
                name: StringTableIndex::from_raw(arg(0)?),
                group: arg(1)?,
            },
            OpCodeId::RSeekTo => Self::RSeekTo {
                code_point: arg(0)? as u32,
            },
            OpCodeId::CheckBegin => Self::CheckBegin,
            OpCodeId::CheckEnd => Self::CheckEnd,
            OpCodeId::CheckBoundary => {
                let kind_word = arg(0)?;
                let kind = BoundaryCheckType::try_from_word(kind_word).ok_or(
                    DecodeError::BadBoundaryKind {
                        ip,
                        word: kind_word,
                    },
                )?;
                Self::CheckBoundary { kind }
            }
            OpCodeId::Save => Self::Save,
            OpCodeId::Restore => Self::Restore,
            OpCodeId::GoBack => Self::GoBack { count: arg(0)? },
            OpCodeId::SetStepBack => Self::SetStepBack { count: arg(0)? },
            OpCodeId::IncStepBack => Self::IncStepBack,
            OpCodeId::CheckStepBack => Self::CheckStepBack,
            OpCodeId::CheckSavedPosition => Self::CheckSavedPosition,
            OpCodeId::ClearCaptureGroup => Self::ClearCaptureGroup { group: arg(0)? },
            OpCodeId::Repeat => Self::Repeat {
                back_offset: arg(0)?,
                count: arg(1)?,
                id: arg(2)?,
            },
            OpCodeId::ResetRepeat => Self::ResetRepeat { id: arg(0)? },
            OpCodeId::Checkpoint => Self::Checkpoint { id: arg(0)? },
            OpCodeId::CompareSimple => {
                let args_size = arg(0)? as usize;
                let start = ip + 2;
                if start + args_size > words.len() {
                    return Err(DecodeError::Truncated { ip });
                }
                Self::CompareSimple {
                    arguments: &words[start..start + args_size],
                }
            }
            OpCodeId::Exit => Self::Exit,
        })
    }

    /// Instruction tag.
    pub fn id(&self) -> OpCodeId {
        match self {
            Self::Compare { .. } => OpCodeId::Compare,
            Self::Jump { .. } => OpCodeId::Jump,
            Self::JumpNonEmpty { .. } => OpCodeId::JumpNonEmpty,
            Self::ForkJump { .. } => OpCodeId::ForkJump,
            Self::ForkStay { .. } => OpCodeId::ForkStay,
            Self::ForkReplaceJump { .. } => OpCodeId::ForkReplaceJump,
            Self::ForkReplaceStay { .. } => OpCodeId::ForkReplaceStay,
            Self::ForkIf { .. } => OpCodeId::ForkIf,
            Self::FailForks => OpCodeId::FailForks,
            Self::PopSaved => OpCodeId::PopSaved,
            Self::SaveLeftCaptureGroup { .. } => OpCodeId::SaveLeftCaptureGroup,
            Self::SaveRightCaptureGroup { .. } => OpCodeId::SaveRightCaptureGroup,
            Self::SaveRightNamedCaptureGroup { .. } => OpCodeId::SaveRightNamedCaptureGroup,
            Self::RSeekTo { .. } => OpCodeId::RSeekTo,
            Self::CheckBegin => OpCodeId::CheckBegin,
            Self::CheckEnd => OpCodeId::CheckEnd,
            Self::CheckBoundary { .. } => OpCodeId::CheckBoundary,
            Self::Save => OpCodeId::Save,
            Self::Restore => OpCodeId::Restore,
            Self::GoBack { .. } => OpCodeId::GoBack,
            Self::SetStepBack { .. } => OpCodeId::SetStepBack,
            Self::IncStepBack => OpCodeId::IncStepBack,
            Self::CheckStepBack => OpCodeId::CheckStepBack,
            Self::CheckSavedPosition => OpCodeId::CheckSavedPosition,
            Self::ClearCaptureGroup { .. } => OpCodeId::ClearCaptureGroup,
            Self::Repeat { .. } => OpCodeId::Repeat,
            Self::ResetRepeat { .. } => OpCodeId::ResetRepeat,
            Self::Checkpoint { .. } => OpCodeId::Checkpoint,
            Self::CompareSimple { .. } => OpCodeId::CompareSimple,
            Self::Exit => OpCodeId::Exit,
        }
    }

    /// Total size in words, tag included.
    pub fn size(&self) -> usize {
        match self {
            Self::Compare { arguments, .. } => 3 + arguments.len(),
            Self::CompareSimple { arguments } => 2 + arguments.len(),
            Self::JumpNonEmpty { .. } | Self::ForkIf { .. } | Self::Repeat { .. } => 4,
            Self::SaveRightNamedCaptureGroup { .. } => 3,
            Self::Jump { .. }
            | Self::ForkJump { .. }
            | Self::ForkStay { .. }
            | Self::ForkReplaceJump { .. }
            | Self::ForkReplaceStay { .. }
            | Self::SaveLeftCaptureGroup { .. }
            | Self::SaveRightCaptureGroup { .. }
            | Self::RSeekTo { .. }
            | Self::CheckBoundary { .. }
            | Self::GoBack { .. }
            | Self::SetStepBack { .. }
            | Self::ClearCaptureGroup { .. }
            | Self::ResetRepeat { .. }
            | Self::Checkpoint { .. } => 2,
            Self::FailForks
            | Self::PopSaved
            | Self::CheckBegin
            | Self::CheckEnd
            | Self::Save
            | Self::Restore
            | Self::IncStepBack
            | Self::CheckStepBack
            | Self::CheckSavedPosition
            | Self::Exit => 1,
        }
    }
}

/// Absolute target of an end-relative jump argument.
#[inline]
pub fn jump_target(ip: usize, size: usize, offset: i64) -> usize {
    (ip as i64 + size as i64 + offset) as usize
}

// ==== Compare terms ====

/// One term of a compare instruction's argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareTerm<'a> {
    Inverse,
    TemporaryInverse,
    AnyChar,
    Char {
        code_point: u32,
    },
    String {
        index: StringTableIndex,
    },
    Class {
        class: CharClass,
    },
    Range {
        range: CharRange,
    },
    Reference {
        group: u64,
    },
    NamedReference {
        name: StringTableIndex,
    },
    Property {
        property: PropertyIndex,
    },
    GeneralCategory {
        property: PropertyIndex,
    },
    Script {
        property: PropertyIndex,
    },
    ScriptExtension {
        property: PropertyIndex,
    },
    LookupTable {
        sensitive: &'a [u64],
        insensitive: &'a [u64],
    },
    And,
    Or,
    EndAndOr,
    Subtract,
    StringSet {
        index: StringSetIndex,
    },
}

impl CompareTerm<'_> {
    pub fn compare_type(&self) -> CharacterCompareType {
        match self {
            Self::Inverse => CharacterCompareType::Inverse,
            Self::TemporaryInverse => CharacterCompareType::TemporaryInverse,
            Self::AnyChar => CharacterCompareType::AnyChar,
            Self::Char { .. } => CharacterCompareType::Char,
            Self::String { .. } => CharacterCompareType::String,
            Self::Class { .. } => CharacterCompareType::CharClass,
            Self::Range { .. } => CharacterCompareType::CharRange,
            Self::Reference { .. } => CharacterCompareType::Reference,
            Self::NamedReference { .. } => CharacterCompareType::NamedReference,
            Self::Property { .. } => CharacterCompareType::Property,
            Self::GeneralCategory { .. } => CharacterCompareType::GeneralCategory,
            Self::Script { .. } => CharacterCompareType::Script,
            Self::ScriptExtension { .. } => CharacterCompareType::ScriptExtension,
            Self::LookupTable { .. } => CharacterCompareType::LookupTable,
            Self::And => CharacterCompareType::And,
            Self::Or => CharacterCompareType::Or,
            Self::EndAndOr => CharacterCompareType::EndAndOr,
            Self::Subtract => CharacterCompareType::Subtract,
            Self::StringSet { .. } => CharacterCompareType::StringSet,
        }
    }
}

/// Streaming reader over the argument words of a compare instruction.
///
/// # Panics
/// Panics on truncated or non-executable terms; the verifier rejects both
/// before a program reaches the interpreter.
pub struct CompareTermReader<'a> {
    words: &'a [u64],
    offset: usize,
}

impl<'a> CompareTermReader<'a> {
    pub fn new(arguments: &'a [u64]) -> Self {
        Self {
            words: arguments,
            offset: 0,
        }
    }

    fn take(&mut self) -> u64 {
        assert!(
            self.offset < self.words.len(),
            "compare arguments truncated at word {}",
            self.offset
        );
        let word = self.words[self.offset];
        self.offset += 1;
        word
    }

    fn take_slice(&mut self, count: usize) -> &'a [u64] {
        assert!(
            self.offset + count <= self.words.len(),
            "compare arguments truncated at word {}",
            self.offset
        );
        let slice = &self.words[self.offset..self.offset + count];
        self.offset += count;
        slice
    }
}

impl<'a> Iterator for CompareTermReader<'a> {
    type Item = CompareTerm<'a>;

    fn next(&mut self) -> Option<CompareTerm<'a>> {
        if self.offset >= self.words.len() {
            return None;
        }
        let compare_type = CharacterCompareType::from_word(self.take());
        Some(match compare_type {
            CharacterCompareType::Inverse => CompareTerm::Inverse,
            CharacterCompareType::TemporaryInverse => CompareTerm::TemporaryInverse,
            CharacterCompareType::AnyChar => CompareTerm::AnyChar,
            CharacterCompareType::Char => CompareTerm::Char {
                code_point: self.take() as u32,
            },
            CharacterCompareType::String => CompareTerm::String {
                index: StringTableIndex::from_raw(self.take()),
            },
            CharacterCompareType::CharClass => CompareTerm::Class {
                class: CharClass::from_word(self.take()),
            },
            CharacterCompareType::CharRange => CompareTerm::Range {
                range: CharRange::from_raw(self.take()),
            },
            CharacterCompareType::Reference => CompareTerm::Reference { group: self.take() },
            CharacterCompareType::NamedReference => CompareTerm::NamedReference {
                name: StringTableIndex::from_raw(self.take()),
            },
            CharacterCompareType::Property => CompareTerm::Property {
                property: PropertyIndex::from_raw(self.take()),
            },
            CharacterCompareType::GeneralCategory => CompareTerm::GeneralCategory {
                property: PropertyIndex::from_raw(self.take()),
            },
            CharacterCompareType::Script => CompareTerm::Script {
                property: PropertyIndex::from_raw(self.take()),
            },
            CharacterCompareType::ScriptExtension => CompareTerm::ScriptExtension {
                property: PropertyIndex::from_raw(self.take()),
            },
            CharacterCompareType::LookupTable => {
                let sensitive_count = self.take() as usize;
                let insensitive_count = self.take() as usize;
                let sensitive = self.take_slice(sensitive_count);
                let insensitive = self.take_slice(insensitive_count);
                CompareTerm::LookupTable {
                    sensitive,
                    insensitive,
                }
            }
            CharacterCompareType::And => CompareTerm::And,
            CharacterCompareType::Or => CompareTerm::Or,
            CharacterCompareType::EndAndOr => CompareTerm::EndAndOr,
            CharacterCompareType::Subtract => CompareTerm::Subtract,
            CharacterCompareType::StringSet => CompareTerm::StringSet {
                index: StringSetIndex::from_raw(self.take()),
            },
            CharacterCompareType::Undefined | CharacterCompareType::RangeExpressionDummy => {
                panic!("compare type {} is not executable", compare_type.name())
            }
        })
    }
}
