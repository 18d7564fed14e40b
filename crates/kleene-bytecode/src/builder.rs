//! Structural emitters that assemble instruction templates into a
//! [`ByteCode`].
//!
//! Jump offsets are relative to the end of the instruction carrying them, so
//! every template keeps working wherever the fragment is appended. The layout
//! comments next to each template are the source of truth for the offset
//! arithmetic below them.

use std::collections::BTreeMap;

use kleene_core::{StringSet, canonicalize};

use crate::opcode::{
    BoundaryCheckType, CharClass, CharRange, CharacterCompareType, ForkIfCondition, OpCode,
    OpCodeId,
};
use crate::program::{ByteCode, CompileContext};
use crate::unicode::{PropertyError, PropertyRanges, resolve_property};

/// One term of a comparison, in builder form.
///
/// Valued pieces carry their payload inline; emission interns strings, string
/// sets and property ranges into the owning program's side tables and writes
/// the resulting global indices into the argument words.
#[derive(Debug, Clone)]
pub enum ComparePiece {
    Inverse,
    TemporaryInverse,
    AnyChar,
    Char { code_point: u32 },
    String { string: Vec<u16> },
    Class { class: CharClass },
    Range { range: CharRange },
    Reference { group: u64 },
    NamedReference { name: String },
    Property { ranges: PropertyRanges },
    GeneralCategory { ranges: PropertyRanges },
    Script { ranges: PropertyRanges },
    ScriptExtension { ranges: PropertyRanges },
    And,
    Or,
    EndAndOr,
    Subtract,
    StringSet { alternatives: Vec<Vec<u16>> },
}

impl ComparePiece {
    /// Resolve a binary Unicode property name, e.g. `Alphabetic`.
    pub fn binary_property(name: &str, insensitive: bool) -> Result<Self, PropertyError> {
        Ok(Self::Property {
            ranges: resolve_property(name, insensitive)?,
        })
    }

    /// Resolve a general category name, e.g. `Lu`.
    pub fn general_category(name: &str, insensitive: bool) -> Result<Self, PropertyError> {
        Ok(Self::GeneralCategory {
            ranges: resolve_property(&format!("gc={name}"), insensitive)?,
        })
    }

    /// Resolve a script name, e.g. `Greek`.
    pub fn script(name: &str, insensitive: bool) -> Result<Self, PropertyError> {
        Ok(Self::Script {
            ranges: resolve_property(&format!("sc={name}"), insensitive)?,
        })
    }

    /// Resolve a script extension name, e.g. `Hiragana`.
    pub fn script_extension(name: &str, insensitive: bool) -> Result<Self, PropertyError> {
        Ok(Self::ScriptExtension {
            ranges: resolve_property(&format!("scx={name}"), insensitive)?,
        })
    }
}

/// Which lookaround template wraps a body fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookAroundKind {
    LookAhead,
    LookBehind,
    NegatedLookAhead,
    NegatedLookBehind,
}

impl ByteCode {
    /// Append a bare opcode tag word.
    pub fn push_op(&mut self, op: OpCodeId) {
        self.words.push(op.as_word());
    }

    /// Append one raw operand word.
    pub fn push_word(&mut self, word: u64) {
        self.words.push(word);
    }

    pub fn check_begin(&mut self) {
        self.push_op(OpCodeId::CheckBegin);
    }

    pub fn check_end(&mut self) {
        self.push_op(OpCodeId::CheckEnd);
    }

    pub fn check_boundary(&mut self, kind: BoundaryCheckType) {
        self.push_op(OpCodeId::CheckBoundary);
        self.push_word(kind.as_word());
    }

    pub fn clear_capture_group(&mut self, group: u64) {
        self.push_op(OpCodeId::ClearCaptureGroup);
        self.push_word(group);
    }

    /// Open capture group `group` (1-based) at the current position.
    pub fn capture_group_left(&mut self, group: u64) {
        self.push_op(OpCodeId::SaveLeftCaptureGroup);
        self.push_word(group);
    }

    /// Close capture group `group` (1-based) at the current position.
    pub fn capture_group_right(&mut self, group: u64) {
        self.push_op(OpCodeId::SaveRightCaptureGroup);
        self.push_word(group);
    }

    /// Close capture group `group`, recording `name` for it.
    pub fn capture_group_right_named(&mut self, group: u64, name: &str) {
        let name_index = self.group_names.insert(name.to_owned());
        self.push_op(OpCodeId::SaveRightNamedCaptureGroup);
        self.push_word(name_index.as_u64());
        self.push_word(group);
        self.named_groups.insert(group - 1, name_index);
    }

    /// Seek backwards to the previous occurrence of `code_point` before
    /// running what follows.
    pub fn rseek_to(&mut self, code_point: u32) {
        self.push_op(OpCodeId::RSeekTo);
        self.push_word(code_point as u64);
    }

    /// Compare one literal UTF-16 string at the current position.
    pub fn compare_string(&mut self, string: &[u16]) {
        let index = self.strings.insert(string.to_vec());
        self.push_op(OpCodeId::Compare);
        self.push_word(1);
        self.push_word(2);
        self.push_word(CharacterCompareType::String.as_word());
        self.push_word(index.as_u64());
    }

    /// Emit one `Compare` instruction over `pieces`, coalescing runs of
    /// characters and ranges into sorted lookup tables.
    ///
    /// A temporary inversion routes the run into a second table emitted
    /// behind a `TemporaryInverse` marker; `And`/`Subtract` scopes flush
    /// pending tables so evaluation order inside the scope is preserved.
    /// Pieces that cannot live in a table are emitted verbatim.
    pub fn compare_terms(&mut self, pieces: &[ComparePiece]) {
        let mut arguments: Vec<u64> = Vec::new();
        let mut argument_count: u64 = 0;

        if pieces.len() <= 1 {
            for piece in pieces {
                self.emit_term(&mut arguments, piece);
                argument_count += 1;
            }
        } else {
            let mut table: BTreeMap<u32, CharRange> = BTreeMap::new();
            let mut inverted_table: BTreeMap<u32, CharRange> = BTreeMap::new();
            let mut insert_into_inverted = false;
            let mut invert_for_next_iteration = false;
            let mut is_currently_inverted = false;
            let mut flush_on_every_insertion = false;

            for piece in pieces {
                let invert_after_this_iteration = invert_for_next_iteration;
                invert_for_next_iteration = false;

                let placement = {
                    let current = if insert_into_inverted {
                        &mut inverted_table
                    } else {
                        &mut table
                    };
                    place_in_table(current, piece)
                };
                match placement {
                    TablePlacement::Placed => {
                        if flush_on_every_insertion {
                            flush_tables(
                                &mut arguments,
                                &mut argument_count,
                                &mut table,
                                &mut inverted_table,
                            );
                        }
                    }
                    TablePlacement::AnyChar => {
                        table.clear();
                        inverted_table.clear();
                        arguments.push(CharacterCompareType::AnyChar.as_word());
                        argument_count += 1;
                    }
                    TablePlacement::TemporaryInversion => {
                        insert_into_inverted = !insert_into_inverted;
                        invert_for_next_iteration = true;
                        is_currently_inverted = !is_currently_inverted;
                    }
                    TablePlacement::PermanentInversion => {
                        flush_tables(
                            &mut arguments,
                            &mut argument_count,
                            &mut table,
                            &mut inverted_table,
                        );
                        arguments.push(CharacterCompareType::Inverse.as_word());
                        argument_count += 1;
                    }
                    TablePlacement::Flush | TablePlacement::FinishFlush
                    | TablePlacement::CannotPlace => {
                        if placement != TablePlacement::CannotPlace {
                            flush_tables(
                                &mut arguments,
                                &mut argument_count,
                                &mut table,
                                &mut inverted_table,
                            );
                            flush_on_every_insertion = placement == TablePlacement::Flush;
                        }
                        if is_currently_inverted {
                            arguments.push(CharacterCompareType::TemporaryInverse.as_word());
                            argument_count += 1;
                        }
                        self.emit_term(&mut arguments, piece);
                        argument_count += 1;
                    }
                }

                if invert_after_this_iteration {
                    insert_into_inverted = !insert_into_inverted;
                    is_currently_inverted = !is_currently_inverted;
                }
            }

            flush_tables(
                &mut arguments,
                &mut argument_count,
                &mut table,
                &mut inverted_table,
            );
        }

        self.push_op(OpCodeId::Compare);
        self.push_word(argument_count);
        self.push_word(arguments.len() as u64);
        self.words.extend_from_slice(&arguments);
    }

    /// Append `A|B` over the two finished fragments.
    ///
    /// Layout:
    /// ```text
    /// prefix
    /// ForkJump _L
    /// right middle
    /// Jump _END
    /// _L: left middle
    /// _END: suffix
    /// ```
    /// Common instruction-aligned pre- and postfixes are hoisted out of both
    /// branches. A branch whose middle opens with a line start assertion gets
    /// the assertion lifted onto the fork itself, so the branch is skipped
    /// without forking mid-line.
    pub fn alternation(&mut self, left: ByteCode, right: ByteCode) {
        self.merge_tables(&left);
        self.merge_tables(&right);
        if left.is_empty() && right.is_empty() {
            return;
        }

        let (prefix_len, suffix_len) = common_affixes(&left.words, &right.words);
        let left_mid = &left.words[prefix_len..left.words.len() - suffix_len];
        let right_mid = &right.words[prefix_len..right.words.len() - suffix_len];

        self.words.extend_from_slice(&left.words[..prefix_len]);

        if left_mid.is_empty() && right_mid.is_empty() {
            self.words
                .extend_from_slice(&left.words[left.words.len() - suffix_len..]);
            return;
        }

        let fork_offset = right_mid.len() as u64 + 2;
        if left_mid.first() == Some(&OpCodeId::CheckBegin.as_word()) {
            self.push_op(OpCodeId::ForkIf);
            self.push_word(fork_offset);
            self.push_word(OpCodeId::ForkJump.as_word());
            self.push_word(ForkIfCondition::AtStartOfLine.as_word());
        } else {
            self.push_op(OpCodeId::ForkJump);
            self.push_word(fork_offset);
        }
        self.words.extend_from_slice(right_mid);
        self.push_op(OpCodeId::Jump);
        self.push_word(left_mid.len() as u64);
        self.words.extend_from_slice(left_mid);
        self.words
            .extend_from_slice(&left.words[left.words.len() - suffix_len..]);
    }

    /// Append a lookaround wrapping `body`.
    ///
    /// `match_length` is the fixed code point length of the body and is only
    /// read by the lookbehind templates; `greedy` selects whether a positive
    /// lookbehind keeps searching for earlier starting points after its
    /// first success.
    pub fn lookaround(
        &mut self,
        body: ByteCode,
        kind: LookAroundKind,
        match_length: u64,
        greedy: bool,
    ) {
        match kind {
            LookAroundKind::LookAhead => {
                // Save
                // ForkJump _BODY
                // PopSaved
                // _BODY: body
                // Restore
                self.push_op(OpCodeId::Save);
                self.push_op(OpCodeId::ForkJump);
                self.push_word(1);
                self.push_op(OpCodeId::PopSaved);
                self.append(body);
                self.push_op(OpCodeId::Restore);
            }
            LookAroundKind::NegatedLookAhead => {
                // Jump _A
                // _L: body
                // FailForks
                // _A: Save
                // ForkJump _L
                // Restore
                let body_length = body.len() as i64;
                self.push_op(OpCodeId::Jump);
                self.push_word((body_length + 1) as u64);
                self.append(body);
                self.push_op(OpCodeId::FailForks);
                self.push_op(OpCodeId::Save);
                self.push_op(OpCodeId::ForkJump);
                self.push_word((-(body_length + 4)) as u64);
                self.push_op(OpCodeId::Restore);
            }
            LookAroundKind::LookBehind => {
                // Save
                // SetStepBack match_length-1
                // _START: IncStepBack
                // ForkJump _BODY
                // CheckStepBack
                // Jump _START
                // _BODY: body
                // [greedy: ForkJump _START]
                // CheckSavedPosition
                // Restore
                let body_length = body.len() as i64;
                self.push_op(OpCodeId::Save);
                self.push_op(OpCodeId::SetStepBack);
                self.push_word(match_length.wrapping_sub(1));
                self.push_op(OpCodeId::IncStepBack);
                self.push_op(OpCodeId::ForkJump);
                self.push_word(3);
                self.push_op(OpCodeId::CheckStepBack);
                self.push_op(OpCodeId::Jump);
                self.push_word((-6i64) as u64);
                self.append(body);
                if greedy {
                    self.push_op(OpCodeId::ForkJump);
                    self.push_word((-(body_length + 8)) as u64);
                }
                self.push_op(OpCodeId::CheckSavedPosition);
                self.push_op(OpCodeId::Restore);
            }
            LookAroundKind::NegatedLookBehind => {
                // Jump _A
                // _L: GoBack match_length
                // body
                // FailForks
                // _A: Save
                // ForkJump _L
                // Restore
                let body_length = body.len() as i64;
                self.push_op(OpCodeId::Jump);
                self.push_word((body_length + 3) as u64);
                self.push_op(OpCodeId::GoBack);
                self.push_word(match_length);
                self.append(body);
                self.push_op(OpCodeId::FailForks);
                self.push_op(OpCodeId::Save);
                self.push_op(OpCodeId::ForkJump);
                self.push_word((-(body_length + 6)) as u64);
                self.push_op(OpCodeId::Restore);
            }
        }
    }

    /// Append `body` repeated exactly `n` times.
    ///
    /// ```text
    /// _LOOP: body
    /// Repeat _LOOP n-1
    /// body
    /// ```
    /// The trailing copy sits outside the loop so callers can keep appending
    /// to the final iteration.
    pub fn repeat_exact(&mut self, context: &mut CompileContext, body: &ByteCode, n: u64) {
        if n == 0 {
            return;
        }

        self.append(body.clone());

        if n > 1 {
            let id = context.next_repetition_id();
            self.push_op(OpCodeId::Repeat);
            self.push_word(body.len() as u64);
            self.push_word(n - 1);
            self.push_word(id);
            self.append(body.clone());
        }
    }

    /// Wrap this fragment as `{minimum,maximum}`.
    ///
    /// An open maximum with `minimum` 0 or 1 delegates to the `*` and `+`
    /// templates. Otherwise the `{minimum}` unroll is followed by either a
    /// fork-guarded loop over the remaining optional copies:
    /// ```text
    /// _MAX_LOOP: Fork _END
    /// body
    /// Repeat _MAX_LOOP maximum-minimum-1
    /// Fork _END
    /// body
    /// _END: ResetRepeat
    /// ```
    /// or, for an open maximum, a checkpointed loop over the final unrolled
    /// copy. Greedy repetition exits through a low-priority fork.
    pub fn into_repetition_min_max(
        self,
        context: &mut CompileContext,
        minimum: u64,
        maximum: Option<u64>,
        greedy: bool,
    ) -> ByteCode {
        if maximum.is_none() {
            if minimum == 0 {
                return self.into_repetition_any(context, greedy);
            }
            if minimum == 1 {
                return self.into_repetition_min_one(context, greedy);
            }
        }

        let body = self;
        let mut out = ByteCode::new(context);
        out.repeat_exact(context, &body, minimum);

        match maximum {
            Some(maximum) if maximum > minimum => {
                let fork = if greedy {
                    OpCodeId::ForkStay
                } else {
                    OpCodeId::ForkJump
                };
                out.push_op(fork);
                out.push_word(0);
                let pre_fork_end = out.len();
                out.append(body.clone());
                let repetitions = maximum - minimum;
                let mut fork_target = out.len();
                if repetitions > 1 {
                    let id = context.next_repetition_id();
                    out.push_op(OpCodeId::Repeat);
                    out.push_word(body.len() as u64 + 2);
                    out.push_word(repetitions - 1);
                    out.push_word(id);
                    out.push_op(fork);
                    out.push_word(0);
                    let post_fork_end = out.len();
                    out.append(body.clone());
                    fork_target = out.len();
                    out.words[post_fork_end - 1] = (fork_target - post_fork_end) as u64;
                    out.push_op(OpCodeId::ResetRepeat);
                    out.push_word(id);
                }
                out.words[pre_fork_end - 1] = (fork_target - pre_fork_end) as u64;
            }
            Some(_) => {}
            None => {
                // _START: Checkpoint
                // body
                // JumpNonEmpty _START Fork
                //
                // Safe because the unroll leaves one body copy outside its
                // Repeat loop; the checkpoint wraps only that copy.
                let checkpoint = context.next_checkpoint_id();
                let insert_at = out.len() - body.len();
                out.words.splice(
                    insert_at..insert_at,
                    [OpCodeId::Checkpoint.as_word(), checkpoint],
                );
                let fork = if greedy {
                    OpCodeId::ForkJump
                } else {
                    OpCodeId::ForkStay
                };
                out.push_op(OpCodeId::JumpNonEmpty);
                out.push_word((-(body.len() as i64) - 6) as u64);
                out.push_word(checkpoint);
                out.push_word(fork.as_word());
            }
        }
        out
    }

    /// Wrap this fragment as `+`.
    ///
    /// ```text
    /// _START: Checkpoint
    /// body
    /// JumpNonEmpty _START Fork
    /// ```
    /// The loop only re-enters while an iteration consumed input, so a body
    /// that can match empty terminates after one idle pass.
    pub fn into_repetition_min_one(mut self, context: &mut CompileContext, greedy: bool) -> ByteCode {
        let checkpoint = context.next_checkpoint_id();
        self.words
            .splice(0..0, [OpCodeId::Checkpoint.as_word(), checkpoint]);

        let fork = if greedy {
            OpCodeId::ForkJump
        } else {
            OpCodeId::ForkStay
        };
        let offset = -(self.len() as i64) - 4;
        self.push_op(OpCodeId::JumpNonEmpty);
        self.push_word(offset as u64);
        self.push_word(checkpoint);
        self.push_word(fork.as_word());
        self
    }

    /// Wrap this fragment as `*`.
    ///
    /// ```text
    /// _START: Fork _END
    /// Checkpoint
    /// body
    /// JumpNonEmpty _START Jump
    /// _END:
    /// ```
    pub fn into_repetition_any(self, context: &mut CompileContext, greedy: bool) -> ByteCode {
        let body = self;
        let mut out = ByteCode::new(context);

        let fork = if greedy {
            OpCodeId::ForkStay
        } else {
            OpCodeId::ForkJump
        };
        out.push_op(fork);
        out.push_word(body.len() as u64 + 6);

        let checkpoint = context.next_checkpoint_id();
        out.push_op(OpCodeId::Checkpoint);
        out.push_word(checkpoint);

        let body_length = body.len() as i64;
        out.append(body);

        out.push_op(OpCodeId::JumpNonEmpty);
        out.push_word((-body_length - 8) as u64);
        out.push_word(checkpoint);
        out.push_word(OpCodeId::Jump.as_word());
        out
    }

    /// Wrap this fragment as `?`.
    ///
    /// ```text
    /// Fork _END
    /// body
    /// _END:
    /// ```
    pub fn into_repetition_zero_or_one(mut self, greedy: bool) -> ByteCode {
        let fork = if greedy {
            OpCodeId::ForkStay
        } else {
            OpCodeId::ForkJump
        };
        let body_length = self.len() as u64;
        self.words.splice(0..0, [fork.as_word(), body_length]);
        self
    }

    /// Append `piece`'s type word and value words, interning payloads.
    fn emit_term(&mut self, arguments: &mut Vec<u64>, piece: &ComparePiece) {
        match piece {
            ComparePiece::Inverse => arguments.push(CharacterCompareType::Inverse.as_word()),
            ComparePiece::TemporaryInverse => {
                arguments.push(CharacterCompareType::TemporaryInverse.as_word())
            }
            ComparePiece::AnyChar => arguments.push(CharacterCompareType::AnyChar.as_word()),
            ComparePiece::Char { code_point } => {
                arguments.push(CharacterCompareType::Char.as_word());
                arguments.push(*code_point as u64);
            }
            ComparePiece::String { string } => {
                let index = self.strings.insert(string.clone());
                arguments.push(CharacterCompareType::String.as_word());
                arguments.push(index.as_u64());
            }
            ComparePiece::Class { class } => {
                arguments.push(CharacterCompareType::CharClass.as_word());
                arguments.push(class.as_word());
            }
            ComparePiece::Range { range } => {
                arguments.push(CharacterCompareType::CharRange.as_word());
                arguments.push(range.to_raw());
            }
            ComparePiece::Reference { group } => {
                arguments.push(CharacterCompareType::Reference.as_word());
                arguments.push(*group);
            }
            ComparePiece::NamedReference { name } => {
                let index = self.group_names.insert(name.clone());
                arguments.push(CharacterCompareType::NamedReference.as_word());
                arguments.push(index.as_u64());
            }
            ComparePiece::Property { ranges } => {
                let index = self.properties.insert(ranges.clone());
                arguments.push(CharacterCompareType::Property.as_word());
                arguments.push(index.as_u64());
            }
            ComparePiece::GeneralCategory { ranges } => {
                let index = self.properties.insert(ranges.clone());
                arguments.push(CharacterCompareType::GeneralCategory.as_word());
                arguments.push(index.as_u64());
            }
            ComparePiece::Script { ranges } => {
                let index = self.properties.insert(ranges.clone());
                arguments.push(CharacterCompareType::Script.as_word());
                arguments.push(index.as_u64());
            }
            ComparePiece::ScriptExtension { ranges } => {
                let index = self.properties.insert(ranges.clone());
                arguments.push(CharacterCompareType::ScriptExtension.as_word());
                arguments.push(index.as_u64());
            }
            ComparePiece::And => arguments.push(CharacterCompareType::And.as_word()),
            ComparePiece::Or => arguments.push(CharacterCompareType::Or.as_word()),
            ComparePiece::EndAndOr => arguments.push(CharacterCompareType::EndAndOr.as_word()),
            ComparePiece::Subtract => arguments.push(CharacterCompareType::Subtract.as_word()),
            ComparePiece::StringSet { alternatives } => {
                let set =
                    StringSet::from_alternatives(alternatives.iter().map(|alt| alt.as_slice()));
                let index = self.string_sets.insert(set);
                arguments.push(CharacterCompareType::StringSet.as_word());
                arguments.push(index.as_u64());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TablePlacement {
    Placed,
    CannotPlace,
    AnyChar,
    TemporaryInversion,
    PermanentInversion,
    Flush,
    FinishFlush,
}

/// Try to place `piece` into the pending range table.
///
/// Ranges sharing a starting point widen the stored range instead of
/// replacing it.
fn place_in_table(table: &mut BTreeMap<u32, CharRange>, piece: &ComparePiece) -> TablePlacement {
    let range = match piece {
        ComparePiece::Inverse => return TablePlacement::PermanentInversion,
        ComparePiece::TemporaryInverse => return TablePlacement::TemporaryInversion,
        ComparePiece::AnyChar => return TablePlacement::AnyChar,
        ComparePiece::Char { code_point } => CharRange::new(*code_point, *code_point),
        ComparePiece::Range { range } => *range,
        ComparePiece::And | ComparePiece::Subtract => return TablePlacement::Flush,
        ComparePiece::EndAndOr => return TablePlacement::FinishFlush,
        _ => return TablePlacement::CannotPlace,
    };
    table
        .entry(range.from)
        .and_modify(|existing| existing.to = existing.to.max(range.to))
        .or_insert(range);
    TablePlacement::Placed
}

/// Emit and clear both pending tables, the inverted one behind a
/// `TemporaryInverse` marker.
fn flush_tables(
    arguments: &mut Vec<u64>,
    argument_count: &mut u64,
    table: &mut BTreeMap<u32, CharRange>,
    inverted_table: &mut BTreeMap<u32, CharRange>,
) {
    if !table.is_empty() {
        append_lookup_table(arguments, argument_count, table);
        table.clear();
    }
    if !inverted_table.is_empty() {
        arguments.push(CharacterCompareType::TemporaryInverse.as_word());
        *argument_count += 1;
        append_lookup_table(arguments, argument_count, inverted_table);
        inverted_table.clear();
    }
}

/// Emit one `LookupTable` term: merged case-sensitive ranges, then an
/// ASCII-lowercased copy when any bound differs under lowercasing.
fn append_lookup_table(
    arguments: &mut Vec<u64>,
    argument_count: &mut u64,
    table: &BTreeMap<u32, CharRange>,
) {
    *argument_count += 1;
    arguments.push(CharacterCompareType::LookupTable.as_word());
    let sensitive_slot = arguments.len();
    arguments.push(0);
    let insensitive_slot = arguments.len();
    arguments.push(0);

    // Walk in from-order, merging overlapping or adjacent ranges. The +1
    // comparisons run in u64 to survive ranges ending at u32::MAX.
    let mut merged: Vec<CharRange> = Vec::new();
    for &range in table.values() {
        match merged.last_mut() {
            Some(active) if u64::from(range.from) <= u64::from(active.to) + 1 => {
                active.to = active.to.max(range.to);
            }
            _ => merged.push(range),
        }
    }
    arguments.extend(merged.iter().map(|range| range.to_raw()));
    arguments[sensitive_slot] = merged.len() as u64;

    let lower = |code_point: u32| canonicalize(code_point, false);
    if merged
        .iter()
        .any(|range| range.from != lower(range.from) || range.to != lower(range.to))
    {
        // Lowercased bounds may cross, e.g. [Z-a] becomes [z-a]; such a
        // range simply never matches. Sorted by start, not re-merged.
        let mut lowered: Vec<CharRange> = merged
            .iter()
            .map(|range| CharRange {
                from: lower(range.from),
                to: lower(range.to),
            })
            .collect();
        lowered.sort_by_key(|range| range.from);
        arguments.extend(lowered.iter().map(|range| range.to_raw()));
        arguments[insensitive_slot] = lowered.len() as u64;
    }
}

/// Instruction start offsets of a finished fragment, in order.
fn instruction_starts(words: &[u64]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut ip = 0;
    while ip < words.len() {
        starts.push(ip);
        ip += OpCode::decode(words, ip).size();
    }
    starts
}

/// Instructions safe to hoist out of an alternation branch. Anything
/// carrying a relative jump stays put: moving it would change what its
/// offset is measured against.
fn hoistable(id: OpCodeId) -> bool {
    !matches!(
        id,
        OpCodeId::Jump
            | OpCodeId::JumpNonEmpty
            | OpCodeId::ForkJump
            | OpCodeId::ForkStay
            | OpCodeId::ForkReplaceJump
            | OpCodeId::ForkReplaceStay
            | OpCodeId::ForkIf
            | OpCodeId::Repeat
    )
}

/// Longest instruction-aligned common prefix and suffix of two fragments,
/// in words. The two regions never overlap within either fragment.
fn common_affixes(left: &[u64], right: &[u64]) -> (usize, usize) {
    let mut prefix = 0;
    while prefix < left.len() && prefix < right.len() {
        let op = OpCode::decode(left, prefix);
        let size = op.size();
        if !hoistable(op.id()) || prefix + size > right.len() {
            break;
        }
        if left[prefix..prefix + size] != right[prefix..prefix + size] {
            break;
        }
        prefix += size;
    }

    let left_starts = instruction_starts(left);
    let right_starts = instruction_starts(right);
    let mut suffix = 0;
    let mut left_slot = left_starts.len();
    let mut right_slot = right_starts.len();
    while left_slot > 0 && right_slot > 0 {
        let left_start = left_starts[left_slot - 1];
        let right_start = right_starts[right_slot - 1];
        if left_start < prefix || right_start < prefix {
            break;
        }
        let op = OpCode::decode(left, left_start);
        let size = op.size();
        if !hoistable(op.id()) || OpCode::decode(right, right_start).size() != size {
            break;
        }
        if left[left_start..left_start + size] != right[right_start..right_start + size] {
            break;
        }
        suffix += size;
        left_slot -= 1;
        right_slot -= 1;
    }

    (prefix, suffix)
}
