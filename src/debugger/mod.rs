//! Template-level debugging on top of a host-language tracer.
//!
//! The host tracer reports every activation record; [`TemplateBridge`] tells
//! which of them evaluate template nodes, whether a step should stop there,
//! and where in the template source that is. [`DebugContext`] is the stepping
//! driver that sits between the tracer and the user.

mod breakpoints;
mod bridge;
mod cache;
mod classify;
mod context;
mod engine;
mod scope;
mod shapes;
mod step_out;
mod stepping;
mod translate;
mod visibility;

#[cfg(test)]
mod tests;

pub use breakpoints::Breakpoints;
pub use bridge::{FrameClassifier, TemplateBridge};
pub use cache::CapabilityCache;
pub use classify::{
    is_implementation_file, marker_frames, module_path_rules, sub_language_frames, FrameKind,
    ModulePathRule,
};
pub use context::{DebugContext, StackEntry, Stop, StopHandler, StopReason};
pub use engine::{detect_engine, EngineHandle};
pub use scope::{template_locals, ExecMode, HostEvaluator};
pub use shapes::{probe_exception_binding, ExceptionBinding, ExceptionShape};
pub use step_out::step_out_target;
pub use stepping::{should_stop, StepAction};
pub use translate::{locate, normalize_filename, translate, Location, NodeLocation, VirtualFrame};
pub use visibility::is_visible;
