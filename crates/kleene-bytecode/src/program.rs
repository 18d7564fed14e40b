//! Program containers and the flattening pass.
//!
//! A [`ByteCode`] is a program under construction: instruction words plus the
//! side tables its terms reference. Fragments append to each other without
//! relocation because jumps are end-relative and table indices are global.
//! [`ByteCode::into_program`] flattens the result into an immutable
//! [`Program`], rewriting single-character compares into their fast form and
//! precomputing the slot counts the interpreter sizes its state from.

use indexmap::IndexMap;
use kleene_core::{ByteStringTable, StringSetTable, StringTableIndex, Utf16StringTable};
use serde::{Deserialize, Serialize};

use crate::opcode::{
    CharacterCompareType, CompareTerm, CompareTermReader, OpCode, OpCodeId, jump_target,
};
use crate::unicode::PropertyTable;

/// Issues the serials and dense ids one compilation needs.
///
/// Side tables key entries by a per-fragment serial so independently built
/// fragments merge without renumbering. Checkpoint and repetition ids are
/// dense slots into per-program vectors sized at flattening.
#[derive(Debug)]
pub struct CompileContext {
    next_serial: u32,
    next_checkpoint_id: u64,
    next_repetition_id: u64,
}

impl CompileContext {
    pub fn new() -> Self {
        Self {
            next_serial: 1,
            next_checkpoint_id: 0,
            next_repetition_id: 0,
        }
    }

    pub fn next_serial(&mut self) -> u32 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    pub fn next_checkpoint_id(&mut self) -> u64 {
        let id = self.next_checkpoint_id;
        self.next_checkpoint_id += 1;
        id
    }

    pub fn next_repetition_id(&mut self) -> u64 {
        let id = self.next_repetition_id;
        self.next_repetition_id += 1;
        id
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A program under construction.
#[derive(Debug, Clone)]
pub struct ByteCode {
    pub(crate) words: Vec<u64>,
    pub(crate) strings: Utf16StringTable,
    pub(crate) group_names: ByteStringTable,
    pub(crate) string_sets: StringSetTable,
    pub(crate) properties: PropertyTable,
    /// Capture slot (group id minus one) to interned group name.
    pub(crate) named_groups: IndexMap<u64, StringTableIndex>,
}

impl ByteCode {
    pub fn new(context: &mut CompileContext) -> Self {
        let serial = context.next_serial();
        Self {
            words: Vec::new(),
            strings: Utf16StringTable::new(serial),
            group_names: ByteStringTable::new(serial),
            string_sets: StringSetTable::new(serial),
            properties: PropertyTable::new(serial),
            named_groups: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Append `other`, merging its side tables. Global indices make the
    /// concatenated words valid as-is.
    pub fn append(&mut self, other: ByteCode) {
        self.words.extend_from_slice(&other.words);
        self.merge_tables(&other);
    }

    /// Merge `other`'s side tables and group names without taking its words.
    pub(crate) fn merge_tables(&mut self, other: &ByteCode) {
        self.strings.merge_from(&other.strings);
        self.group_names.merge_from(&other.group_names);
        self.string_sets.merge_from(&other.string_sets);
        self.properties.merge_from(&other.properties);
        for (&slot, &name) in &other.named_groups {
            match self.named_groups.get(&slot) {
                Some(existing) => assert!(
                    *existing == name,
                    "capture slot {slot} is named twice with different names"
                ),
                None => {
                    self.named_groups.insert(slot, name);
                }
            }
        }
    }

    /// Flatten into an executable program.
    ///
    /// Single-term compares holding one character are rewritten into
    /// [`OpCodeId::CompareSimple`]; every end-relative jump spanning a
    /// rewritten instruction is relocated to keep its target.
    pub fn into_program(self, match_length_minimum: u64) -> Program {
        let words = &self.words;

        // Pass 1: instruction boundaries, which compares shrink, new layout.
        let mut old_starts = Vec::new();
        let mut old_sizes = Vec::new();
        let mut shrinks = Vec::new();
        let mut ip = 0;
        while ip < words.len() {
            let op = OpCode::decode(words, ip);
            let size = op.size();
            old_starts.push(ip);
            old_sizes.push(size);
            shrinks.push(is_single_char_compare(&op));
            ip += size;
        }
        let mut new_starts = Vec::with_capacity(old_starts.len());
        let mut new_len = 0usize;
        for (slot, &size) in old_sizes.iter().enumerate() {
            new_starts.push(new_len);
            new_len += if shrinks[slot] { size - 1 } else { size };
        }
        let old_len = words.len();
        let relocate_boundary = |old: usize| -> usize {
            if old == old_len {
                return new_len;
            }
            match old_starts.binary_search(&old) {
                Ok(slot) => new_starts[slot],
                Err(_) => panic!("jump target {old} is not an instruction boundary"),
            }
        };

        // Pass 2: emit, adjusting every relative jump for the new layout.
        let mut out = Vec::with_capacity(new_len);
        for (slot, &old_start) in old_starts.iter().enumerate() {
            let op = OpCode::decode(words, old_start);
            let old_size = old_sizes[slot];
            let new_start = new_starts[slot];
            let new_end = new_start + if shrinks[slot] { old_size - 1 } else { old_size };
            let relocate = |offset: i64| -> u64 {
                let target = jump_target(old_start, old_size, offset);
                (relocate_boundary(target) as i64 - new_end as i64) as u64
            };
            match op {
                OpCode::Compare { arguments, .. } if shrinks[slot] => {
                    out.push(OpCodeId::CompareSimple.as_word());
                    out.push(arguments.len() as u64);
                    out.extend_from_slice(arguments);
                }
                OpCode::Jump { offset } => {
                    out.push(OpCodeId::Jump.as_word());
                    out.push(relocate(offset));
                }
                OpCode::JumpNonEmpty {
                    offset,
                    checkpoint,
                    form,
                } => {
                    out.push(OpCodeId::JumpNonEmpty.as_word());
                    out.push(relocate(offset));
                    out.push(checkpoint);
                    out.push(form.as_word());
                }
                OpCode::ForkJump { offset } => {
                    out.push(OpCodeId::ForkJump.as_word());
                    out.push(relocate(offset));
                }
                OpCode::ForkStay { offset } => {
                    out.push(OpCodeId::ForkStay.as_word());
                    out.push(relocate(offset));
                }
                OpCode::ForkReplaceJump { offset } => {
                    out.push(OpCodeId::ForkReplaceJump.as_word());
                    out.push(relocate(offset));
                }
                OpCode::ForkReplaceStay { offset } => {
                    out.push(OpCodeId::ForkReplaceStay.as_word());
                    out.push(relocate(offset));
                }
                OpCode::ForkIf {
                    offset,
                    form,
                    condition,
                } => {
                    out.push(OpCodeId::ForkIf.as_word());
                    out.push(relocate(offset));
                    out.push(form.as_word());
                    out.push(condition.as_word());
                }
                OpCode::Repeat {
                    back_offset,
                    count,
                    id,
                } => {
                    let target = relocate_boundary(old_start - back_offset as usize);
                    out.push(OpCodeId::Repeat.as_word());
                    out.push((new_start - target) as u64);
                    out.push(count);
                    out.push(id);
                }
                _ => out.extend_from_slice(&words[old_start..old_start + old_size]),
            }
        }

        let (capture_group_count, checkpoint_count, repetition_count) = scan_counts(&out);
        Program {
            words: out,
            strings: self.strings,
            group_names: self.group_names,
            string_sets: self.string_sets,
            properties: self.properties,
            named_groups: self.named_groups,
            capture_group_count,
            checkpoint_count,
            repetition_count,
            match_length_minimum,
        }
    }
}

fn is_single_char_compare(op: &OpCode) -> bool {
    matches!(
        op,
        OpCode::Compare {
            argument_count: 1,
            arguments,
        } if arguments.len() == 2 && arguments[0] == CharacterCompareType::Char.as_word()
    )
}

/// Walk a finished word sequence for the counts the interpreter presizes
/// state vectors from.
fn scan_counts(words: &[u64]) -> (u64, u64, u64) {
    let mut groups = 0u64;
    let mut checkpoints = 0u64;
    let mut repetitions = 0u64;
    let mut ip = 0;
    while ip < words.len() {
        let op = OpCode::decode(words, ip);
        match op {
            OpCode::SaveLeftCaptureGroup { group }
            | OpCode::SaveRightCaptureGroup { group }
            | OpCode::SaveRightNamedCaptureGroup { group, .. }
            | OpCode::ClearCaptureGroup { group } => groups = groups.max(group),
            OpCode::Checkpoint { id } => checkpoints = checkpoints.max(id + 1),
            OpCode::JumpNonEmpty { checkpoint, .. } => {
                checkpoints = checkpoints.max(checkpoint + 1)
            }
            OpCode::Repeat { id, .. } | OpCode::ResetRepeat { id } => {
                repetitions = repetitions.max(id + 1)
            }
            OpCode::Compare { arguments, .. } | OpCode::CompareSimple { arguments } => {
                for term in CompareTermReader::new(arguments) {
                    if let CompareTerm::Reference { group } = term {
                        groups = groups.max(group);
                    }
                }
            }
            _ => {}
        }
        ip += op.size();
    }
    (groups, checkpoints, repetitions)
}

/// A finished, executable program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    words: Vec<u64>,
    strings: Utf16StringTable,
    group_names: ByteStringTable,
    string_sets: StringSetTable,
    properties: PropertyTable,
    named_groups: IndexMap<u64, StringTableIndex>,
    capture_group_count: u64,
    checkpoint_count: u64,
    repetition_count: u64,
    match_length_minimum: u64,
}

impl Program {
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Decode the instruction at `ip`. Positions at or past the end decode
    /// as [`OpCode::Exit`].
    #[inline]
    pub fn opcode_at(&self, ip: usize) -> OpCode<'_> {
        OpCode::decode(&self.words, ip)
    }

    #[inline]
    pub fn strings(&self) -> &Utf16StringTable {
        &self.strings
    }

    #[inline]
    pub fn group_names(&self) -> &ByteStringTable {
        &self.group_names
    }

    #[inline]
    pub fn string_sets(&self) -> &StringSetTable {
        &self.string_sets
    }

    #[inline]
    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    /// Total capture groups, sized from the highest 1-based group id used.
    pub fn capture_group_count(&self) -> u64 {
        self.capture_group_count
    }

    pub fn checkpoint_count(&self) -> u64 {
        self.checkpoint_count
    }

    pub fn repetition_count(&self) -> u64 {
        self.repetition_count
    }

    pub fn match_length_minimum(&self) -> u64 {
        self.match_length_minimum
    }

    /// Name carried by a capture slot, if the group was named.
    pub fn group_name_of_slot(&self, slot: u64) -> Option<&str> {
        self.named_groups
            .get(&slot)
            .map(|&index| self.group_names.get(index).as_str())
    }

    /// Capture slots whose groups carry `name`, in declaration order.
    /// Several groups may share a name; reference resolution prefers the
    /// one holding content.
    pub fn named_group_slots<'s>(&'s self, name: &'s str) -> impl Iterator<Item = u64> + 's {
        self.named_groups
            .iter()
            .filter_map(move |(&slot, &index)| {
                (self.group_names.get(index).as_str() == name).then_some(slot)
            })
    }

    /// Iterate (slot, name) pairs of named groups in declaration order.
    pub fn named_groups(&self) -> impl Iterator<Item = (u64, &str)> {
        self.named_groups
            .iter()
            .map(|(&slot, &index)| (slot, self.group_names.get(index).as_str()))
    }

    /// Mutable word access for corruption tests.
    #[cfg(test)]
    pub(crate) fn words_mut(&mut self) -> &mut Vec<u64> {
        &mut self.words
    }
}
