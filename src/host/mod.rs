//! Interfaces to the host interpreter the debuggee runs in.
//!
//! Activation records, the loaded-module registry and host values are owned by
//! the host tracer; the debugger only borrows them while an event is delivered.

mod frame;
mod registry;
mod value;

pub use frame::{collect_stack, stack_depth, ActivationRecord, EventKind, RoutineId, Tracer};
pub use registry::{HostModule, LoadedModules, Member, ModuleRegistry};
pub use value::{HostObject, HostType, Namespace, Value};
