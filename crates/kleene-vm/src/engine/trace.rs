//! Execution tracing for debugging the interpreter.
//!
//! The tracer is a zero-cost abstraction: [`NoopTracer`] methods are empty
//! and `#[inline(always)]`, so the generic dispatch loop compiles down to
//! untraced code. [`PrintTracer`] collects one line per dispatched
//! instruction for snapshotting in tests and for the disassembly-style
//! debug output.

use kleene_bytecode::OpCode;

/// Instrumentation hooks for the dispatch loop.
///
/// All methods receive raw data the interpreter already has; formatting
/// happens in the tracer implementation.
pub trait Tracer {
    /// Called when the driver begins an attempt at a subject offset.
    fn attempt(&mut self, offset: usize);

    /// Called after each dispatched instruction with its outcome.
    fn step(&mut self, ip: usize, position: usize, op: &OpCode<'_>, outcome: &'static str);
}

/// No-op tracer that gets optimized away completely.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn attempt(&mut self, _offset: usize) {}

    #[inline(always)]
    fn step(&mut self, _ip: usize, _position: usize, _op: &OpCode<'_>, _outcome: &'static str) {}
}

/// Tracer that collects an execution transcript for debugging.
#[derive(Default)]
pub struct PrintTracer {
    lines: Vec<String>,
}

impl PrintTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected trace lines, one per dispatched instruction.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The whole transcript as one newline-joined string.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl Tracer for PrintTracer {
    fn attempt(&mut self, offset: usize) {
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.push(format!("attempt at {offset}:"));
    }

    fn step(&mut self, ip: usize, position: usize, op: &OpCode<'_>, outcome: &'static str) {
        self.lines.push(format!(
            "  {ip:03} {:<26} pos={position} {outcome}",
            op.id().name()
        ));
    }
}
