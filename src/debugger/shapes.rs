//! Exception-reporting shapes of the supported engine versions.
//!
//! Each engine generation reports template errors through a different routine
//! and keeps the failing node in a different place. The probes below are tried
//! in order against the loaded modules; the first that resolves wins.

use log::debug;
use std::sync::Arc;

use super::engine::EngineHandle;
use crate::host::{ActivationRecord, HostType, RoutineId, Value};

/// Where to find the failing node (and its context) in a reporting frame.
#[derive(Debug, Clone)]
pub enum ExceptionShape {
    /// The node list renderer holds the node in its `node` local; no context.
    NodeListLocal,
    /// The reporting routine is called from the failing node's own `render`,
    /// so node and context live in the caller's `self` and `context` locals.
    EnclosingNode { node_type: Arc<HostType> },
}

/// The active exception-reporting routine and how to read it.
#[derive(Debug, Clone)]
pub struct ExceptionBinding {
    name: &'static str,
    routine: RoutineId,
    shape: ExceptionShape,
}

impl ExceptionBinding {
    pub fn new(name: &'static str, routine: RoutineId, shape: ExceptionShape) -> Self {
        Self {
            name,
            routine,
            shape,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn routine(&self) -> RoutineId {
        self.routine
    }

    pub fn shape(&self) -> &ExceptionShape {
        &self.shape
    }

    /// `(context, node)` for a frame running the reporting routine.
    pub fn extract(&self, frame: &dyn ActivationRecord) -> (Option<Value>, Option<Value>) {
        match &self.shape {
            ExceptionShape::NodeListLocal => (None, frame.local("node")),
            ExceptionShape::EnclosingNode { node_type } => {
                let Some(enclosing) = frame.caller() else {
                    return (None, None);
                };
                let (Some(node), Some(context)) = (enclosing.local("self"), enclosing.local("context"))
                else {
                    return (None, None);
                };
                if node.is_instance(node_type) {
                    (Some(context), Some(node))
                } else {
                    (None, None)
                }
            }
        }
    }
}

type Probe = fn(&EngineHandle<'_>) -> Option<ExceptionBinding>;

/// Probe order matters: older engines also ship the newer base module.
const PROBES: &[(&str, Probe)] = &[
    ("legacy node list", probe_legacy_node_list),
    ("modern exception info", probe_modern_exception_info),
];

fn probe_legacy_node_list(engine: &EngineHandle<'_>) -> Option<ExceptionBinding> {
    let profile = engine.profile();
    let routine = engine.method_of(
        &profile.legacy_debug_module,
        &profile.legacy_node_list_type,
        &profile.legacy_render_node_method,
    )?;
    Some(ExceptionBinding::new(
        "legacy node list",
        routine,
        ExceptionShape::NodeListLocal,
    ))
}

fn probe_modern_exception_info(engine: &EngineHandle<'_>) -> Option<ExceptionBinding> {
    let profile = engine.profile();
    let routine = engine.method_of(
        &profile.base_module,
        &profile.template_type,
        &profile.exception_info_method,
    )?;
    let node_type = engine.base_node_type()?;
    Some(ExceptionBinding::new(
        "modern exception info",
        routine,
        ExceptionShape::EnclosingNode { node_type },
    ))
}

/// Try every known shape in order and return the first that resolves.
pub fn probe_exception_binding(engine: &EngineHandle<'_>) -> Option<ExceptionBinding> {
    for (name, probe) in PROBES {
        if let Some(binding) = probe(engine) {
            debug!("exception shape resolved: {} ({:?})", name, binding.routine());
            return Some(binding);
        }
        debug!("exception shape {} not available", name);
    }
    None
}
