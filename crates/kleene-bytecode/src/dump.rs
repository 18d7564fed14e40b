//! Human-readable program dump for debugging and snapshots.
//!
//! One line per instruction: zero-padded address, opcode name, operands.
//! Jump operands print the end-relative offset together with the resolved
//! absolute target so control flow can be followed without arithmetic.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use kleene_core::{StringSetIndex, StringTableIndex, Trie, TrieNodeId};

use crate::opcode::{CharRange, CompareTerm, CompareTermReader, OpCode, jump_target};
use crate::program::Program;
use crate::unicode::PropertyIndex;

/// Generate a human-readable dump of a compiled program.
pub fn dump(program: &Program) -> String {
    let mut out = String::new();
    let ctx = DumpContext::new(program);

    dump_summary(&mut out, program);
    dump_strings(&mut out, program, &ctx);
    dump_group_names(&mut out, program);
    dump_named_groups(&mut out, program);
    dump_string_sets(&mut out, program);
    dump_properties(&mut out, program);
    dump_code(&mut out, program, &ctx);

    out
}

/// Digits needed to print the largest value below `count`.
fn width_for_count(count: usize) -> usize {
    if count <= 1 {
        1
    } else {
        ((count - 1) as f64).log10().floor() as usize + 1
    }
}

/// Context for dump formatting, precomputes ordinals for the serial-keyed
/// table indexes so listings stay stable across fragment serials.
struct DumpContext {
    /// Maps raw string-table index to its listing position.
    string_ordinals: BTreeMap<u64, usize>,
    /// Maps raw group-name index to its listing position.
    name_ordinals: BTreeMap<u64, usize>,
    /// Maps raw string-set index to its listing position.
    set_ordinals: BTreeMap<u64, usize>,
    /// Maps raw property index to its listing position.
    property_ordinals: BTreeMap<u64, usize>,
    /// Width for instruction addresses.
    ip_width: usize,
}

impl DumpContext {
    fn new(program: &Program) -> Self {
        let string_ordinals = program
            .strings()
            .iter()
            .enumerate()
            .map(|(ordinal, (index, _))| (index.as_u64(), ordinal))
            .collect();
        let name_ordinals = program
            .group_names()
            .iter()
            .enumerate()
            .map(|(ordinal, (index, _))| (index.as_u64(), ordinal))
            .collect();
        let set_ordinals = program
            .string_sets()
            .iter()
            .enumerate()
            .map(|(ordinal, (index, _))| (index.as_u64(), ordinal))
            .collect();
        let property_ordinals = program
            .properties()
            .iter()
            .enumerate()
            .map(|(ordinal, (index, _))| (index.as_u64(), ordinal))
            .collect();
        let ip_width = width_for_count(program.len() + 1);

        Self {
            string_ordinals,
            name_ordinals,
            set_ordinals,
            property_ordinals,
            ip_width,
        }
    }

    fn string_label(&self, index: StringTableIndex) -> String {
        match self.string_ordinals.get(&index.as_u64()) {
            Some(ordinal) => format!("S{ordinal}"),
            None => format!("S?{:#x}", index.as_u64()),
        }
    }

    fn name_label(&self, index: StringTableIndex) -> String {
        match self.name_ordinals.get(&index.as_u64()) {
            Some(ordinal) => format!("N{ordinal}"),
            None => format!("N?{:#x}", index.as_u64()),
        }
    }

    fn set_label(&self, index: StringSetIndex) -> String {
        match self.set_ordinals.get(&index.as_u64()) {
            Some(ordinal) => format!("W{ordinal}"),
            None => format!("W?{:#x}", index.as_u64()),
        }
    }

    fn property_label(&self, index: PropertyIndex) -> String {
        match self.property_ordinals.get(&index.as_u64()) {
            Some(ordinal) => format!("P{ordinal}"),
            None => format!("P?{:#x}", index.as_u64()),
        }
    }
}

fn dump_summary(out: &mut String, program: &Program) {
    writeln!(out, "[program]").unwrap();
    writeln!(out, "words                 {}", program.len()).unwrap();
    writeln!(out, "capture groups        {}", program.capture_group_count()).unwrap();
    writeln!(out, "checkpoints           {}", program.checkpoint_count()).unwrap();
    writeln!(out, "repetitions           {}", program.repetition_count()).unwrap();
    writeln!(out, "match length minimum  {}", program.match_length_minimum()).unwrap();
    out.push('\n');
}

fn dump_strings(out: &mut String, program: &Program, ctx: &DumpContext) {
    if program.strings().is_empty() {
        return;
    }
    writeln!(out, "[strings]").unwrap();
    for (index, units) in program.strings().iter() {
        let label = ctx.string_label(index);
        writeln!(out, "{label} {:?}", String::from_utf16_lossy(units)).unwrap();
    }
    out.push('\n');
}

fn dump_group_names(out: &mut String, program: &Program) {
    if program.group_names().is_empty() {
        return;
    }
    writeln!(out, "[group_names]").unwrap();
    for (ordinal, (_, name)) in program.group_names().iter().enumerate() {
        writeln!(out, "N{ordinal} {name:?}").unwrap();
    }
    out.push('\n');
}

fn dump_named_groups(out: &mut String, program: &Program) {
    if program.named_groups().next().is_none() {
        return;
    }
    writeln!(out, "[named_groups]").unwrap();
    for (slot, name) in program.named_groups() {
        writeln!(out, "group {} → {name:?}", slot + 1).unwrap();
    }
    out.push('\n');
}

fn dump_string_sets(out: &mut String, program: &Program) {
    if program.string_sets().is_empty() {
        return;
    }
    writeln!(out, "[string_sets]").unwrap();
    for (ordinal, (_, set)) in program.string_sets().iter().enumerate() {
        let alternatives = trie_alternatives(set.by_code_point());
        writeln!(out, "W{ordinal} {{{}}}", alternatives.join(", ")).unwrap();
    }
    out.push('\n');
}

/// Reconstruct the inserted strings by walking every terminal path.
fn trie_alternatives(trie: &Trie) -> Vec<String> {
    let mut alternatives = Vec::new();
    let mut path = Vec::new();
    collect_alternatives(trie, Trie::ROOT, &mut path, &mut alternatives);
    alternatives
}

fn collect_alternatives(
    trie: &Trie,
    node: TrieNodeId,
    path: &mut Vec<u32>,
    out: &mut Vec<String>,
) {
    if trie.is_terminal(node) {
        let text: String = path
            .iter()
            .map(|&cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        out.push(format!("{text:?}"));
    }
    for (key, child) in trie.children(node) {
        path.push(key);
        collect_alternatives(trie, child, path, out);
        path.pop();
    }
}

fn dump_properties(out: &mut String, program: &Program) {
    if program.properties().is_empty() {
        return;
    }
    writeln!(out, "[properties]").unwrap();
    for (ordinal, (_, ranges)) in program.properties().iter().enumerate() {
        writeln!(out, "P{ordinal} {} ranges", ranges.len()).unwrap();
    }
    out.push('\n');
}

fn dump_code(out: &mut String, program: &Program, ctx: &DumpContext) {
    writeln!(out, "[code]").unwrap();
    let w = ctx.ip_width;
    let mut ip = 0usize;
    while ip < program.len() {
        let op = program.opcode_at(ip);
        let size = op.size();
        let body = format_instruction(ip, &op, program, ctx);
        writeln!(out, "{ip:0w$} {body}").unwrap();
        ip += size;
    }
}

fn format_instruction(ip: usize, op: &OpCode<'_>, program: &Program, ctx: &DumpContext) -> String {
    let w = ctx.ip_width;
    let size = op.size();
    match *op {
        OpCode::Compare {
            argument_count,
            arguments,
        } => {
            let terms = format_terms(arguments, program, ctx);
            format!("Compare {argument_count} [{terms}]")
        }
        OpCode::CompareSimple { arguments } => {
            let terms = format_terms(arguments, program, ctx);
            format!("CompareSimple [{terms}]")
        }
        OpCode::Jump { offset } => {
            format!("Jump {offset:+} → {:0w$}", jump_target(ip, size, offset))
        }
        OpCode::JumpNonEmpty {
            offset,
            checkpoint,
            form,
        } => format!(
            "JumpNonEmpty {offset:+} → {:0w$} checkpoint {checkpoint} {}",
            jump_target(ip, size, offset),
            form.name()
        ),
        OpCode::ForkJump { offset } => {
            format!("ForkJump {offset:+} → {:0w$}", jump_target(ip, size, offset))
        }
        OpCode::ForkStay { offset } => {
            format!("ForkStay {offset:+} → {:0w$}", jump_target(ip, size, offset))
        }
        OpCode::ForkReplaceJump { offset } => format!(
            "ForkReplaceJump {offset:+} → {:0w$}",
            jump_target(ip, size, offset)
        ),
        OpCode::ForkReplaceStay { offset } => format!(
            "ForkReplaceStay {offset:+} → {:0w$}",
            jump_target(ip, size, offset)
        ),
        OpCode::ForkIf {
            offset,
            form,
            condition,
        } => format!(
            "ForkIf {} {offset:+} → {:0w$} if {condition:?}",
            form.name(),
            jump_target(ip, size, offset)
        ),
        OpCode::FailForks => "FailForks".to_string(),
        OpCode::PopSaved => "PopSaved".to_string(),
        OpCode::SaveLeftCaptureGroup { group } => format!("SaveLeftCaptureGroup {group}"),
        OpCode::SaveRightCaptureGroup { group } => format!("SaveRightCaptureGroup {group}"),
        OpCode::SaveRightNamedCaptureGroup { name, group } => {
            let resolved = program
                .group_names()
                .try_get(name)
                .map(|name| format!("{name:?}"))
                .unwrap_or_else(|| "?".to_string());
            format!(
                "SaveRightNamedCaptureGroup {group} {} {resolved}",
                ctx.name_label(name)
            )
        }
        OpCode::RSeekTo { code_point } => format!("RSeekTo {}", format_code_point(code_point)),
        OpCode::CheckBegin => "CheckBegin".to_string(),
        OpCode::CheckEnd => "CheckEnd".to_string(),
        OpCode::CheckBoundary { kind } => format!("CheckBoundary {kind:?}"),
        OpCode::Save => "Save".to_string(),
        OpCode::Restore => "Restore".to_string(),
        OpCode::GoBack { count } => format!("GoBack {count}"),
        OpCode::SetStepBack { count } => format!("SetStepBack {count}"),
        OpCode::IncStepBack => "IncStepBack".to_string(),
        OpCode::CheckStepBack => "CheckStepBack".to_string(),
        OpCode::CheckSavedPosition => "CheckSavedPosition".to_string(),
        OpCode::ClearCaptureGroup { group } => format!("ClearCaptureGroup {group}"),
        OpCode::Repeat {
            back_offset,
            count,
            id,
        } => {
            let target = ip
                .checked_sub(back_offset as usize)
                .map(|target| format!("{target:0w$}"))
                .unwrap_or_else(|| "?".to_string());
            format!("Repeat -{back_offset} → {target} count {count} id {id}")
        }
        OpCode::ResetRepeat { id } => format!("ResetRepeat {id}"),
        OpCode::Checkpoint { id } => format!("Checkpoint {id}"),
        OpCode::Exit => "Exit".to_string(),
    }
}

fn format_terms(arguments: &[u64], program: &Program, ctx: &DumpContext) -> String {
    CompareTermReader::new(arguments)
        .map(|term| format_term(&term, program, ctx))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_term(term: &CompareTerm<'_>, program: &Program, ctx: &DumpContext) -> String {
    match *term {
        CompareTerm::Inverse => "inverse".to_string(),
        CompareTerm::TemporaryInverse => "temp-inverse".to_string(),
        CompareTerm::AnyChar => "any".to_string(),
        CompareTerm::Char { code_point } => format!("char {}", format_code_point(code_point)),
        CompareTerm::String { index } => {
            let resolved = program
                .strings()
                .try_get(index)
                .map(|units| format!("{:?}", String::from_utf16_lossy(units)))
                .unwrap_or_else(|| "?".to_string());
            format!("string {} {resolved}", ctx.string_label(index))
        }
        CompareTerm::Class { class } => format!("class {}", class.name()),
        CompareTerm::Range { range } => format!("range {}", format_range(range)),
        CompareTerm::Reference { group } => format!("reference {group}"),
        CompareTerm::NamedReference { name } => {
            let resolved = program
                .group_names()
                .try_get(name)
                .map(|name| format!("{name:?}"))
                .unwrap_or_else(|| "?".to_string());
            format!("named-reference {} {resolved}", ctx.name_label(name))
        }
        CompareTerm::Property { property } => {
            format!("property {}", ctx.property_label(property))
        }
        CompareTerm::GeneralCategory { property } => {
            format!("general-category {}", ctx.property_label(property))
        }
        CompareTerm::Script { property } => format!("script {}", ctx.property_label(property)),
        CompareTerm::ScriptExtension { property } => {
            format!("script-extension {}", ctx.property_label(property))
        }
        CompareTerm::LookupTable {
            sensitive,
            insensitive,
        } => {
            let mut text = format!("table [{}]", format_packed_ranges(sensitive));
            if !insensitive.is_empty() {
                write!(text, " /i [{}]", format_packed_ranges(insensitive)).unwrap();
            }
            text
        }
        CompareTerm::And => "and".to_string(),
        CompareTerm::Or => "or".to_string(),
        CompareTerm::EndAndOr => "end-and-or".to_string(),
        CompareTerm::Subtract => "subtract".to_string(),
        CompareTerm::StringSet { index } => format!("string-set {}", ctx.set_label(index)),
    }
}

fn format_packed_ranges(words: &[u64]) -> String {
    words
        .iter()
        .map(|&word| format_range(CharRange::from_raw(word)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_range(range: CharRange) -> String {
    if range.from == range.to {
        format_code_point(range.from)
    } else {
        format!(
            "{}-{}",
            format_code_point(range.from),
            format_code_point(range.to)
        )
    }
}

/// Printable ASCII shows quoted, everything else as U+XXXX.
fn format_code_point(code_point: u32) -> String {
    match char::from_u32(code_point) {
        Some(c) if (0x20..0x7f).contains(&code_point) => format!("'{c}'"),
        _ => format!("U+{code_point:04X}"),
    }
}
