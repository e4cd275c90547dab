use log::trace;
use serde::Serialize;

use super::shapes::ExceptionBinding;
use crate::host::{ActivationRecord, EventKind};

/// Last stepping request made by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepAction {
    RunFree,
    StepInto,
    StepOver,
    StepOut,
}

/// Stop/continue decision for a frame already classified as sub-language.
///
/// A node evaluation is the smallest steppable unit, so only `Call` events can
/// stop a step, and only the exception-reporting routine stops on exceptions.
pub fn should_stop(
    frame: &dyn ActivationRecord,
    event: EventKind,
    action: StepAction,
    binding: Option<&ExceptionBinding>,
) -> bool {
    let reports_exceptions = binding.is_some_and(|b| b.routine() == frame.routine());

    let stop = match event {
        EventKind::Exception => reports_exceptions,
        EventKind::Call if reports_exceptions => false,
        EventKind::Call => matches!(action, StepAction::StepInto | StepAction::StepOver),
        EventKind::Line | EventKind::Return => false,
    };

    trace!(
        "stop decision {:?} {:?} {:?} at {}:{} -> {}",
        event,
        action,
        frame.routine(),
        frame.source_file().display(),
        frame.source_line(),
        stop
    );
    stop
}
