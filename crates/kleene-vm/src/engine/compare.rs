//! Term-by-term evaluation of `Compare` argument lists.
//!
//! A compare instruction carries a flat list of terms with prefix operators:
//! `Inverse` and `TemporaryInverse` flip the match sense, `And`/`Or`/
//! `Subtract` open a boolean group that `EndAndOr` closes. Terms run against
//! the current cursor; the instruction as a whole succeeds when the cursor
//! moved (or a zero-length term explicitly matched) and the cursor is still
//! inside the subject.

use kleene_bytecode::{
    CharClass, CharRange, CharacterCompareType, CompareTerm, CompareTermReader, Program,
    PropertyRanges,
};
use kleene_core::{
    Cursor, LINE_SEPARATOR, OptionFlags, PARAGRAPH_SEPARATOR, StrView, Trie, ViewData,
    canonicalize, code_point_matches_range_ignoring_case, is_word_character,
};

use super::input::MatchInput;
use super::interpreter::StepOutcome;
use super::state::MatchState;

/// Progress of one boolean group between its opening term and `EndAndOr`.
///
/// Each operand term runs from `initial` and folds its verdict into `fail`;
/// `any_operand_suffices` selects the OR fold, `operands_share_end`
/// additionally requires every accepted operand to stop at the same
/// position.
#[derive(Debug, Default, Clone, Copy)]
struct DisjunctionState {
    active: bool,
    any_operand_suffices: bool,
    is_subtraction: bool,
    operands_share_end: bool,
    fail: bool,
    inverse_matched: bool,
    subtraction_operand_index: usize,
    initial: Cursor,
    last_accepted: Option<Cursor>,
}

/// Runs the argument list of a `Compare` or `CompareSimple` instruction.
///
/// On success the cursor has consumed the matched text; on failure it is
/// left wherever the failing term stopped, which the caller discards by
/// backtracking.
pub(super) fn execute_compare<'a>(
    program: &Program,
    input: &MatchInput<'a>,
    state: &mut MatchState<'a>,
    argument_count: u64,
    arguments: &[u64],
) -> StepOutcome {
    let view = input.view;
    let insensitive = input.has(OptionFlags::INSENSITIVE);
    let has_single_argument = argument_count == 1;

    let entry = state.cursor;

    let mut inverse = false;
    let mut temporary_inverse = false;
    let mut reset_temp_inverse = false;
    let mut inverse_matched = false;
    let mut had_zero_length_match = false;

    let mut has_string_set = false;
    let mut string_set_matched = false;
    let mut best = entry;

    let mut disjunctions = vec![DisjunctionState {
        initial: entry,
        ..DisjunctionState::default()
    }];

    let mut last_compare_type = CharacterCompareType::Undefined;
    let mut reader = CompareTermReader::new(arguments);

    for _ in 0..argument_count {
        if state.cursor.position() > entry.position() {
            break;
        }
        if has_string_set {
            if let Some(top) = disjunctions.last() {
                state.cursor = top.initial;
            }
        }

        let Some(term) = reader.next() else {
            break;
        };

        let compare_type = term.compare_type();
        if reset_temp_inverse {
            reset_temp_inverse = false;
            // A property query directly after a string set keeps the
            // temporary inversion alive for one more term.
            if compare_type != CharacterCompareType::Property
                || last_compare_type != CharacterCompareType::StringSet
            {
                temporary_inverse = false;
            }
        } else {
            reset_temp_inverse = true;
        }
        last_compare_type = compare_type;

        let inversion = temporary_inverse ^ inverse;

        match term {
            CompareTerm::Inverse => {
                inverse = !inverse;
                continue;
            }
            CompareTerm::TemporaryInverse => {
                // Negates the inversion state for the next term only, so it
                // cannot be the last term.
                temporary_inverse = true;
                reset_temp_inverse = false;
                continue;
            }
            CompareTerm::Char { code_point } => {
                if view.len() <= state.cursor.position() {
                    return StepOutcome::BacktrackLowPriority;
                }
                compare_char(input, state, code_point, inversion, &mut inverse_matched);
            }
            CompareTerm::AnyChar => {
                if view.len() <= state.cursor.position() {
                    return StepOutcome::BacktrackLowPriority;
                }
                let code_point = view.matching_code_point_at(state.cursor.unit_offset());
                let is_newline = code_point == u32::from(b'\n')
                    || (input.has(OptionFlags::CONSIDER_NEWLINE)
                        && (code_point == u32::from(b'\r')
                            || code_point == LINE_SEPARATOR
                            || code_point == PARAGRAPH_SEPARATOR));
                if !is_newline
                    || (input.has(OptionFlags::SINGLE_LINE)
                        && input.has(OptionFlags::CONSIDER_NEWLINE))
                {
                    if inversion {
                        inverse_matched = true;
                    } else {
                        state.cursor.advance_past(&view, code_point);
                    }
                }
            }
            CompareTerm::String { index } => {
                assert!(!inversion, "string comparison cannot be inverted");
                let pattern =
                    StrView::from_utf16(program.strings().get(index)).with_unicode(view.unicode());
                if view.unicode() {
                    if view.len() < state.cursor.position() + pattern.len_in_code_points() {
                        return StepOutcome::BacktrackLowPriority;
                    }
                } else if view.len_in_code_units()
                    < state.cursor.unit_offset() + pattern.len_in_code_units()
                {
                    return StepOutcome::BacktrackLowPriority;
                }
                compare_string(input, state, pattern, &mut had_zero_length_match);
            }
            CompareTerm::Class { class } => {
                if view.len_in_code_units() <= state.cursor.unit_offset() {
                    return StepOutcome::BacktrackLowPriority;
                }
                let code_point = view.matching_code_point_at(state.cursor.unit_offset());
                if matches_character_class(class, code_point, insensitive, view.unicode()) {
                    if inversion {
                        inverse_matched = true;
                    } else {
                        state.cursor.advance_past(&view, code_point);
                    }
                }
            }
            CompareTerm::Range { range } => {
                if view.len() <= state.cursor.position() {
                    return StepOutcome::BacktrackLowPriority;
                }
                let code_point = view.matching_code_point_at(state.cursor.unit_offset());
                let matched = if insensitive {
                    code_point_matches_range_ignoring_case(
                        code_point,
                        range.from,
                        range.to,
                        view.unicode(),
                    )
                } else {
                    range.contains(code_point)
                };
                if matched {
                    if inversion {
                        inverse_matched = true;
                    } else {
                        state.cursor.advance_past(&view, code_point);
                    }
                }
            }
            CompareTerm::LookupTable {
                sensitive,
                insensitive: insensitive_ranges,
            } => {
                if view.len() <= state.cursor.position() {
                    return StepOutcome::BacktrackLowPriority;
                }
                let mut code_point = view.matching_code_point_at(state.cursor.unit_offset());
                if insensitive {
                    code_point = canonicalize(code_point, view.unicode());
                }
                let ranges = if insensitive && !insensitive_ranges.is_empty() {
                    insensitive_ranges
                } else {
                    sensitive
                };
                if range_words_contain(ranges, code_point) {
                    if inversion {
                        inverse_matched = true;
                    } else {
                        state.cursor.advance_past(&view, code_point);
                    }
                }
            }
            CompareTerm::Reference { group } => {
                if input.match_index >= state.capture_rows()
                    || group < 1
                    || group as usize > state.capture_group_count
                {
                    had_zero_length_match = true;
                    if inversion {
                        inverse_matched = true;
                    }
                } else {
                    let captured = state
                        .capture(input.match_index, group)
                        .view
                        .unwrap_or_else(|| StrView::from_bytes(&[]));
                    if view.len() < state.cursor.position() + captured.len() {
                        return StepOutcome::BacktrackLowPriority;
                    }
                    if compare_string(input, state, captured, &mut had_zero_length_match)
                        && inversion
                    {
                        inverse_matched = true;
                    }
                }
            }
            CompareTerm::NamedReference { name } => {
                if input.match_index >= state.capture_rows() {
                    had_zero_length_match = true;
                    if inversion {
                        inverse_matched = true;
                    }
                } else {
                    let target = program.group_names().get(name).as_str();
                    let mut captured = StrView::from_bytes(&[]);
                    for slot in program.named_group_slots(target) {
                        if let Some(capture) = state.capture(input.match_index, slot + 1).view {
                            captured = capture;
                            break;
                        }
                    }
                    if view.len() < state.cursor.position() + captured.len() {
                        return StepOutcome::BacktrackLowPriority;
                    }
                    if compare_string(input, state, captured, &mut had_zero_length_match)
                        && inversion
                    {
                        inverse_matched = true;
                    }
                }
            }
            CompareTerm::Property { property } | CompareTerm::GeneralCategory { property } => {
                let ranges = program.properties().get(property);
                compare_property(
                    input,
                    state,
                    ranges,
                    inversion,
                    temporary_inverse && inverse,
                    &mut inverse_matched,
                );
            }
            CompareTerm::Script { property } | CompareTerm::ScriptExtension { property } => {
                if state.cursor.position() < view.len() {
                    let code_point = view.code_point_at(state.cursor.unit_offset());
                    if program.properties().get(property).contains(code_point) {
                        if inversion {
                            inverse_matched = true;
                        } else {
                            state.cursor.advance_past(&view, code_point);
                        }
                    }
                }
            }
            CompareTerm::StringSet { index } => {
                has_string_set = true;
                let set = program.string_sets().get(index);
                let trie = match view.data() {
                    ViewData::Bytes(_) => set.by_code_point(),
                    ViewData::Utf16(_) => set.by_code_unit(),
                };
                if let Some((length, units)) =
                    find_longest_in_trie(&view, trie, state.cursor.unit_offset(), insensitive)
                {
                    if length == 0 {
                        had_zero_length_match = true;
                    }
                    if inversion {
                        inverse_matched = true;
                    } else {
                        state.cursor.advance_by_lengths(length, units);
                    }
                }
            }
            CompareTerm::And => {
                disjunctions.push(DisjunctionState {
                    active: true,
                    any_operand_suffices: inversion,
                    operands_share_end: true,
                    fail: inversion,
                    inverse_matched: inversion,
                    initial: state.cursor,
                    ..DisjunctionState::default()
                });
                continue;
            }
            CompareTerm::Subtract => {
                disjunctions.push(DisjunctionState {
                    active: true,
                    any_operand_suffices: true,
                    is_subtraction: true,
                    fail: true,
                    inverse_matched: false,
                    initial: state.cursor,
                    ..DisjunctionState::default()
                });
                continue;
            }
            CompareTerm::Or => {
                disjunctions.push(DisjunctionState {
                    active: true,
                    any_operand_suffices: !inversion,
                    fail: !inversion,
                    inverse_matched: !inversion,
                    initial: state.cursor,
                    ..DisjunctionState::default()
                });
                continue;
            }
            CompareTerm::EndAndOr => {
                let popped = match disjunctions.pop() {
                    Some(popped) if !disjunctions.is_empty() => popped,
                    _ => panic!("unbalanced boolean grouping in compare terms"),
                };
                if !popped.fail {
                    state.cursor = popped.last_accepted.unwrap_or(popped.initial);
                } else if has_string_set {
                    string_set_matched = false;
                    best = popped.initial;
                }
                inverse_matched = popped.inverse_matched || popped.fail;
            }
        }

        let top_active = disjunctions.last().is_some_and(|top| top.active);
        if inversion && (!inverse || top_active) && !inverse_matched {
            state.cursor.advance(&view);
            inverse_matched = true;
        }

        if has_string_set && state.cursor.position() > best.position() {
            best = state.cursor;
            string_set_matched = true;
        }

        if !has_single_argument
            && let Some(top) = disjunctions.last_mut()
            && top.active
        {
            let position = state.cursor.position();
            let mut failed = (!had_zero_length_match && entry.position() == position)
                || position > view.len();
            if !failed
                && top.operands_share_end
                && top.last_accepted.is_some_and(|last| last.position() != position)
            {
                failed = true;
            }
            if !failed {
                top.last_accepted = Some(state.cursor);
                top.inverse_matched |= inverse_matched;
            }
            if top.is_subtraction {
                if top.subtraction_operand_index == 0 {
                    top.fail = failed && top.fail;
                } else if !failed && (!has_string_set || position >= best.position()) {
                    top.fail = true;
                }
                top.subtraction_operand_index += 1;
            } else if top.any_operand_suffices {
                top.fail = failed && top.fail;
            } else {
                top.fail = failed || top.fail;
            }
            state.cursor = top.initial;
            inverse_matched = false;
        }
    }

    let inversion = temporary_inverse ^ inverse;

    if !has_single_argument
        && let Some(top) = disjunctions.last()
        && top.active
        && !top.fail
    {
        state.cursor = top.last_accepted.unwrap_or(top.initial);
    }

    if has_string_set
        && string_set_matched
        && (has_single_argument || best.position() > entry.position())
    {
        state.cursor = best;
    }

    if inversion && !inverse_matched && state.cursor.position() == entry.position() {
        state.cursor.advance(&view);
    }

    if (!had_zero_length_match && entry.position() == state.cursor.position())
        || state.cursor.position() > view.len()
    {
        return StepOutcome::BacktrackLowPriority;
    }

    StepOutcome::Continue
}

/// Compares one pattern code point at the cursor, advancing on a match.
fn compare_char(
    input: &MatchInput<'_>,
    state: &mut MatchState<'_>,
    pattern: u32,
    inverse: bool,
    inverse_matched: &mut bool,
) {
    let view = input.view;
    if state.cursor.position() == view.len() {
        return;
    }

    let actual = view.matching_code_point_at(state.cursor.unit_offset());
    let equal = if input.has(OptionFlags::INSENSITIVE) {
        canonicalize(actual, view.unicode()) == canonicalize(pattern, view.unicode())
    } else {
        actual == pattern
    };

    if equal {
        if inverse {
            *inverse_matched = true;
        } else {
            state.cursor.advance_past(&view, pattern);
        }
    }
}

/// Compares `pattern` against the subject at the cursor, advancing past it
/// on a match. A zero-length pattern matches anywhere and records that the
/// match consumed nothing.
fn compare_string<'a>(
    input: &MatchInput<'a>,
    state: &mut MatchState<'a>,
    pattern: StrView<'_>,
    had_zero_length_match: &mut bool,
) -> bool {
    let view = input.view;
    if state.cursor.position() + pattern.len() > view.len() {
        if pattern.is_empty() {
            *had_zero_length_match = true;
            return true;
        }
        return false;
    }

    if pattern.is_empty() {
        *had_zero_length_match = true;
        return true;
    }

    if pattern.len() == 1 {
        // No advance on mismatch; the caller's no-progress check turns that
        // into a failure.
        let mut inverse_matched = false;
        compare_char(
            input,
            state,
            pattern.code_point_at(0),
            false,
            &mut inverse_matched,
        );
        return !inverse_matched;
    }

    let subject = view.substring_view(state.cursor.position(), pattern.len());
    let equal = if input.has(OptionFlags::INSENSITIVE) {
        subject.equals_ignoring_case(&pattern, view.unicode())
    } else {
        subject.equals(&pattern)
    };

    if equal {
        state
            .cursor
            .advance_by_lengths(pattern.len(), pattern.len_in_code_units());
    }
    equal
}

/// Walks a string-set trie from `start_units`, returning the longest
/// alternative found as `(logical length, code unit length)`.
fn find_longest_in_trie(
    view: &StrView<'_>,
    trie: &Trie,
    start_units: usize,
    insensitive: bool,
) -> Option<(usize, usize)> {
    let mut node = Trie::ROOT;
    let mut units = start_units;
    let mut longest = trie.is_terminal(node).then_some((0, 0));

    while units < view.len_in_code_units() {
        let value = match view.data() {
            ViewData::Bytes(_) => view.code_point_at(units),
            ViewData::Utf16(_) => view.code_unit_at(units),
        };
        let next = if insensitive {
            trie.children(node).find_map(|(key, child)| {
                (canonicalize(key, view.unicode()) == canonicalize(value, view.unicode()))
                    .then_some(child)
            })
        } else {
            trie.child(node, value)
        };
        let Some(next) = next else {
            break;
        };
        node = next;
        units += 1;
        if trie.is_terminal(node) {
            longest = Some((
                logical_span(view, start_units, units),
                units - start_units,
            ));
        }
    }
    longest
}

/// Logical length of the unit range `start_units..end_units`.
fn logical_span(view: &StrView<'_>, start_units: usize, end_units: usize) -> usize {
    match view.data() {
        ViewData::Utf16(_) if view.unicode() => {
            let mut units = start_units;
            let mut count = 0;
            while units < end_units {
                let code_point = view.code_point_at(units);
                units += if code_point >= 0x10000 { 2 } else { 1 };
                count += 1;
            }
            count
        }
        _ => end_units - start_units,
    }
}

/// Binary search over `CharRange` words sorted by range start.
fn range_words_contain(words: &[u64], code_point: u32) -> bool {
    words
        .binary_search_by(|&word| {
            let range = CharRange::from_raw(word);
            if range.contains(code_point) {
                std::cmp::Ordering::Equal
            } else if range.to < code_point {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        })
        .is_ok()
}

/// Matches a code point against a range set from the property side table.
///
/// Case folding happens after complementing: an inverted property matches
/// when any case variant of the code point lacks the property, and a
/// double-negated one only when every variant has it.
fn compare_property(
    input: &MatchInput<'_>,
    state: &mut MatchState<'_>,
    ranges: &PropertyRanges,
    inverse: bool,
    is_double_negation: bool,
    inverse_matched: &mut bool,
) {
    let view = input.view;
    if state.cursor.position() == view.len() {
        return;
    }

    let code_point = view.code_point_at(state.cursor.unit_offset());
    let case_insensitive = input.has(OptionFlags::INSENSITIVE) && view.unicode();

    if (inverse || is_double_negation) && case_insensitive {
        let any_variant_lacks = case_variants(code_point)
            .into_iter()
            .any(|variant| !ranges.contains(variant));
        if is_double_negation {
            if any_variant_lacks {
                return;
            }
            state.cursor.advance_past(&view, code_point);
        } else if !any_variant_lacks {
            *inverse_matched = true;
        }
    } else {
        let matched = ranges.contains(code_point)
            || (case_insensitive
                && !inverse
                && case_variants(code_point)
                    .into_iter()
                    .any(|variant| ranges.contains(variant)));
        if matched {
            if inverse {
                *inverse_matched = true;
            } else {
                state.cursor.advance_past(&view, code_point);
            }
        }
    }
}

/// The code point with its simple lowercase and uppercase mappings.
fn case_variants(code_point: u32) -> [u32; 3] {
    let Some(c) = char::from_u32(code_point) else {
        return [code_point; 3];
    };
    [
        code_point,
        single_char(c.to_lowercase(), code_point),
        single_char(c.to_uppercase(), code_point),
    ]
}

fn single_char(mut chars: impl Iterator<Item = char>, fallback: u32) -> u32 {
    match (chars.next(), chars.next()) {
        (Some(c), None) => c as u32,
        _ => fallback,
    }
}

/// POSIX-style class membership, ASCII except for `space` and `word`.
fn matches_character_class(
    class: CharClass,
    code_point: u32,
    insensitive: bool,
    unicode: bool,
) -> bool {
    let ascii = char::from_u32(code_point).filter(char::is_ascii);
    match class {
        CharClass::Alnum => ascii.is_some_and(|c| c.is_ascii_alphanumeric()),
        CharClass::Alpha => ascii.is_some_and(|c| c.is_ascii_alphabetic()),
        CharClass::Blank => code_point == u32::from(b' ') || code_point == u32::from(b'\t'),
        CharClass::Cntrl => ascii.is_some_and(|c| c.is_ascii_control()),
        CharClass::Digit => ascii.is_some_and(|c| c.is_ascii_digit()),
        CharClass::Graph => ascii.is_some_and(|c| c.is_ascii_graphic()),
        CharClass::Lower => ascii.is_some_and(|c| {
            c.is_ascii_lowercase() || (insensitive && c.is_ascii_uppercase())
        }),
        CharClass::Print => ascii.is_some_and(|c| c.is_ascii_graphic() || c == ' '),
        CharClass::Punct => ascii.is_some_and(|c| c.is_ascii_punctuation()),
        CharClass::Space => is_space_or_line_terminator(code_point),
        CharClass::Upper => ascii.is_some_and(|c| {
            c.is_ascii_uppercase() || (insensitive && c.is_ascii_lowercase())
        }),
        CharClass::Word => is_word_character(code_point, insensitive, unicode),
        CharClass::Xdigit => ascii.is_some_and(|c| c.is_ascii_hexdigit()),
    }
}

fn is_space_or_line_terminator(code_point: u32) -> bool {
    matches!(
        code_point,
        0x0a | 0x0d | LINE_SEPARATOR | PARAGRAPH_SEPARATOR | 0x09 | 0x0b | 0x0c | 0xfeff
    ) || matches!(
        code_point,
        0x20 | 0xa0 | 0x1680 | 0x2000..=0x200a | 0x202f | 0x205f | 0x3000
    )
}
