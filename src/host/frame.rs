use serde::Serialize;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Namespace, Value};

static NEXT_ROUTINE: AtomicU64 = AtomicU64::new(1);

/// Identity of one compiled routine. All calls of that routine share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoutineId(u64);

impl RoutineId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocate an id no other `fresh()` call in this process will return.
    pub fn fresh() -> Self {
        Self(NEXT_ROUTINE.fetch_add(1, Ordering::Relaxed) | (1 << 63))
    }
}

/// Trace event delivered by the host tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Call,
    Line,
    Return,
    Exception,
}

/// A live invocation on the host call stack. Borrowed for the duration of a
/// single trace event only.
pub trait ActivationRecord {
    fn routine(&self) -> RoutineId;

    fn caller(&self) -> Option<&dyn ActivationRecord>;

    fn local(&self, name: &str) -> Option<Value>;

    fn locals(&self) -> Namespace;

    fn globals(&self) -> Namespace;

    fn source_file(&self) -> &Path;

    fn source_line(&self) -> u32;
}

/// Receives a trace event for every activation record the host runs.
/// `Break` detaches and unwinds the debuggee.
pub trait Tracer {
    fn trace(&mut self, frame: &dyn ActivationRecord, event: EventKind) -> ControlFlow<()>;
}

/// Stack from `frame` outward, innermost first.
pub fn collect_stack(frame: &dyn ActivationRecord) -> Vec<&dyn ActivationRecord> {
    let mut stack = Vec::new();
    let mut current = Some(frame);
    while let Some(f) = current {
        stack.push(f);
        current = f.caller();
    }
    stack
}

/// Number of records from `frame` down to the stack base, inclusive.
pub fn stack_depth(frame: &dyn ActivationRecord) -> usize {
    let mut depth = 0;
    let mut current = Some(frame);
    while let Some(f) = current {
        depth += 1;
        current = f.caller();
    }
    depth
}
