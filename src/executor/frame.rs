use std::path::{Path, PathBuf};

use crate::host::{ActivationRecord, Namespace, RoutineId, Value};

/// Activation record of the demo engine. Lives on the Rust stack for exactly
/// as long as the routine it describes is running.
pub struct EngineFrame<'a> {
    pub routine: RoutineId,
    pub caller: Option<&'a dyn ActivationRecord>,
    pub locals: Namespace,
    pub globals: Namespace,
    pub file: PathBuf,
    pub line: u32,
}

impl<'a> EngineFrame<'a> {
    pub fn new(
        routine: RoutineId,
        caller: Option<&'a dyn ActivationRecord>,
        file: impl Into<PathBuf>,
        line: u32,
    ) -> Self {
        Self {
            routine,
            caller,
            locals: Namespace::new(),
            globals: Namespace::new(),
            file: file.into(),
            line,
        }
    }

    pub fn with_local(mut self, name: &str, value: Value) -> Self {
        self.locals.insert(name.to_string(), value);
        self
    }
}

impl ActivationRecord for EngineFrame<'_> {
    fn routine(&self) -> RoutineId {
        self.routine
    }

    fn caller(&self) -> Option<&dyn ActivationRecord> {
        self.caller
    }

    fn local(&self, name: &str) -> Option<Value> {
        self.locals.get(name).cloned()
    }

    fn locals(&self) -> Namespace {
        self.locals.clone()
    }

    fn globals(&self) -> Namespace {
        self.globals.clone()
    }

    fn source_file(&self) -> &Path {
        &self.file
    }

    fn source_line(&self) -> u32 {
        self.line
    }
}
