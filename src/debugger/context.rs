use log::{debug, info};
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::breakpoints::Breakpoints;
use super::bridge::{FrameClassifier, TemplateBridge};
use super::classify::{is_implementation_file, FrameKind};
use super::stepping::StepAction;
use super::translate::{normalize_filename, Location};
use crate::error::EvalError;
use crate::host::{collect_stack, stack_depth, ActivationRecord, EventKind, Namespace, Tracer, Value};

/// Why execution paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Step,
    Breakpoint,
    Exception,
}

/// One line of the stack shown to the user, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackEntry {
    pub name: String,
    pub filename: PathBuf,
    pub line: Option<usize>,
    /// Byte span in the template file; host entries have none
    pub location: Option<Location>,
    pub source: Option<String>,
    pub template: bool,
}

impl StackEntry {
    fn host(frame: &dyn ActivationRecord) -> Self {
        let filename = frame.source_file().to_path_buf();
        let name = filename
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            filename,
            line: Some(frame.source_line() as usize),
            location: None,
            source: None,
            template: false,
        }
    }
}

/// A paused debuggee, handed to the [`StopHandler`].
pub struct Stop<'a> {
    pub reason: StopReason,
    pub event: EventKind,
    pub frame: &'a dyn ActivationRecord,
    pub stack: Vec<StackEntry>,
    scope: &'a dyn ActivationRecord,
    bridge: &'a TemplateBridge,
    breakpoints: &'a mut Breakpoints,
}

impl Stop<'_> {
    /// Where execution paused.
    pub fn location(&self) -> Option<&StackEntry> {
        self.stack.first()
    }

    pub fn locals(&self) -> Namespace {
        self.bridge.locals(self.scope)
    }

    pub fn evaluate(&self, expr: &str) -> Result<Value, EvalError> {
        self.bridge.evaluate(expr, self.scope)
    }

    pub fn execute(&self, source: &str) -> Result<(), EvalError> {
        self.bridge.execute(source, self.scope)
    }

    pub fn add_breakpoint(&mut self, file: impl AsRef<Path>, line: usize) {
        let file = normalize_filename(
            file.as_ref().to_path_buf(),
            self.bridge.config().paths.case_insensitive(),
        );
        self.breakpoints.add(file, line);
    }

    pub fn remove_breakpoint(&mut self, file: impl AsRef<Path>, line: usize) -> bool {
        let file = normalize_filename(
            file.as_ref().to_path_buf(),
            self.bridge.config().paths.case_insensitive(),
        );
        self.breakpoints.remove(&file, line)
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        self.breakpoints
    }
}

/// The user side of the debugger: decides what happens after each stop.
pub trait StopHandler {
    /// The next step action, or `None` to detach and abort the render.
    fn on_stop(&mut self, stop: &mut Stop<'_>) -> Option<StepAction>;
}

impl<F> StopHandler for F
where
    F: FnMut(&mut Stop<'_>) -> Option<StepAction>,
{
    fn on_stop(&mut self, stop: &mut Stop<'_>) -> Option<StepAction> {
        self(stop)
    }
}

/// Host-side stepping state driving a [`TemplateBridge`].
pub struct DebugContext<H> {
    bridge: Arc<TemplateBridge>,
    handler: H,
    breakpoints: Breakpoints,
    action: StepAction,
    step_over_depth: Option<usize>,
    step_out_depth: Option<usize>,
    /// Classification for the registry generation it was built from
    classifier: Option<(u64, Arc<FrameClassifier>)>,
}

impl<H: StopHandler> DebugContext<H> {
    pub fn new(bridge: Arc<TemplateBridge>, handler: H) -> Self {
        Self {
            bridge,
            handler,
            breakpoints: Breakpoints::new(),
            action: StepAction::RunFree,
            step_over_depth: None,
            step_out_depth: None,
            classifier: None,
        }
    }

    pub fn bridge(&self) -> &TemplateBridge {
        &self.bridge
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn action(&self) -> StepAction {
        self.action
    }

    /// Set the action the debuggee starts with.
    pub fn set_action(&mut self, action: StepAction) {
        self.action = action;
        self.step_over_depth = None;
        self.step_out_depth = None;
    }

    pub fn add_breakpoint(&mut self, file: impl AsRef<Path>, line: usize) {
        let file = normalize_filename(
            file.as_ref().to_path_buf(),
            self.bridge.config().paths.case_insensitive(),
        );
        self.breakpoints.add(file, line);
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Frame classification, rebuilt only after the registry changed or a
    /// stop handed control to the user.
    pub fn classifier(&mut self) -> Arc<FrameClassifier> {
        let generation = self.bridge.registry_generation();
        if let Some((built_for, classifier)) = &self.classifier {
            if *built_for == generation {
                return Arc::clone(classifier);
            }
        }
        debug!("classifying frames for registry generation {}", generation);
        let classifier = Arc::new(self.bridge.classifier());
        self.classifier = Some((generation, Arc::clone(&classifier)));
        classifier
    }

    pub fn on_event(&mut self, frame: &dyn ActivationRecord, event: EventKind) -> ControlFlow<()> {
        let classifier = self.classifier();
        let kind = classifier.kind(frame);
        if !matches!(kind, FrameKind::SubLanguage | FrameKind::ExceptionReport) {
            return ControlFlow::Continue(());
        }

        let reason = self
            .stepping_stop(frame, event)
            .or_else(|| self.step_out_reached(frame, event, kind))
            .or_else(|| self.breakpoint_hit(frame, event, kind));
        match reason {
            Some(reason) => self.stop(frame, event, reason, &classifier),
            None => ControlFlow::Continue(()),
        }
    }

    fn stepping_stop(&self, frame: &dyn ActivationRecord, event: EventKind) -> Option<StopReason> {
        if !self.bridge.should_stop(frame, event, self.action) {
            return None;
        }
        if event == EventKind::Exception {
            return Some(StopReason::Exception);
        }
        match (self.action, self.step_over_depth) {
            (StepAction::StepOver, Some(depth)) if stack_depth(frame) > depth => None,
            _ => Some(StopReason::Step),
        }
    }

    fn step_out_reached(
        &self,
        frame: &dyn ActivationRecord,
        event: EventKind,
        kind: FrameKind,
    ) -> Option<StopReason> {
        let target = self.step_out_depth?;
        let reached = self.action == StepAction::StepOut
            && event == EventKind::Call
            && kind == FrameKind::SubLanguage
            && stack_depth(frame) <= target;
        reached.then_some(StopReason::Step)
    }

    fn breakpoint_hit(
        &self,
        frame: &dyn ActivationRecord,
        event: EventKind,
        kind: FrameKind,
    ) -> Option<StopReason> {
        if self.breakpoints.is_empty() || event != EventKind::Call || kind != FrameKind::SubLanguage {
            return None;
        }
        let virtual_frame = self.bridge.translate(frame, false)?;
        let line = virtual_frame.location.line()?;
        self.breakpoints
            .contains(&virtual_frame.filename, line)
            .then_some(StopReason::Breakpoint)
    }

    fn stop(
        &mut self,
        frame: &dyn ActivationRecord,
        event: EventKind,
        reason: StopReason,
        classifier: &FrameClassifier,
    ) -> ControlFlow<()> {
        let stack = self.visible_stack(frame, classifier);
        if let Some(top) = stack.first() {
            info!(
                "stopped ({:?}) at {}:{} {}",
                reason,
                top.filename.display(),
                top.line.unwrap_or(0),
                top.name
            );
        }

        // The modern reporting routine has no context of its own; the
        // failing node's record does.
        let scope = match frame.caller() {
            Some(caller)
                if classifier.kind(frame) == FrameKind::ExceptionReport
                    && frame.local("context").is_none() =>
            {
                caller
            }
            _ => frame,
        };

        let mut stop = Stop {
            reason,
            event,
            frame,
            stack,
            scope,
            bridge: self.bridge.as_ref(),
            breakpoints: &mut self.breakpoints,
        };
        let next = self.handler.on_stop(&mut stop);
        self.classifier = None;
        match next {
            Some(action) => {
                self.resume(frame, action);
                ControlFlow::Continue(())
            }
            None => {
                info!("debugger detached");
                ControlFlow::Break(())
            }
        }
    }

    fn resume(&mut self, frame: &dyn ActivationRecord, action: StepAction) {
        self.action = action;
        self.step_over_depth = None;
        self.step_out_depth = None;
        match action {
            StepAction::StepOver => self.step_over_depth = Some(stack_depth(frame)),
            StepAction::StepOut => {
                self.step_out_depth = self.bridge.step_out_target(frame).map(stack_depth);
                if self.step_out_depth.is_none() {
                    debug!("step out leaves the debuggee; running free");
                }
            }
            StepAction::RunFree | StepAction::StepInto => {}
        }
        debug!(
            "resume with {:?} (step over depth {:?}, step out depth {:?})",
            action, self.step_over_depth, self.step_out_depth
        );
    }

    /// The stopping record first, then every other record the user should see.
    fn visible_stack(&self, frame: &dyn ActivationRecord, classifier: &FrameClassifier) -> Vec<StackEntry> {
        let frames = collect_stack(frame);
        let rules = self.bridge.module_path_rules();
        let mut entries: Vec<StackEntry> = Vec::new();

        for (idx, f) in frames.iter().enumerate() {
            let entry = match classifier.kind(*f) {
                FrameKind::Marker => None,
                FrameKind::SubLanguage | FrameKind::ExceptionReport
                    if idx == 0 || self.bridge.is_visible(&frames, idx) =>
                {
                    self.template_entry(*f)
                }
                FrameKind::SubLanguage | FrameKind::ExceptionReport => None,
                FrameKind::Host => (is_implementation_file(&rules, f.source_file()) != Some(true))
                    .then(|| StackEntry::host(*f)),
            };
            if let Some(entry) = entry {
                if entries.last() != Some(&entry) {
                    entries.push(entry);
                }
            }
        }
        entries
    }

    fn template_entry(&self, frame: &dyn ActivationRecord) -> Option<StackEntry> {
        let span = self.bridge.translate(frame, true)?;
        let line = self.bridge.translate(frame, false).and_then(|vf| vf.location.line());
        Some(StackEntry {
            name: span.display_name,
            filename: span.filename,
            line,
            location: Some(span.location),
            source: Some(span.source_snippet),
            template: true,
        })
    }
}

impl<H: StopHandler> Tracer for DebugContext<H> {
    fn trace(&mut self, frame: &dyn ActivationRecord, event: EventKind) -> ControlFlow<()> {
        self.on_event(frame, event)
    }
}
