use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use super::cache::CapabilityCache;
use super::classify::{self, FrameKind, ModulePathRule};
use super::engine::{detect_engine, EngineHandle};
use super::scope::{self, HostEvaluator};
use super::shapes::{probe_exception_binding, ExceptionBinding};
use super::stepping::{self, StepAction};
use super::translate::{self, NodeLocation, VirtualFrame};
use super::{step_out, visibility};
use crate::config::BridgeConfig;
use crate::error::EvalError;
use crate::host::{ActivationRecord, EventKind, ModuleRegistry, Namespace, RoutineId, Value};

/// Classification sets captured once per stack walk.
#[derive(Debug, Clone, Default)]
pub struct FrameClassifier {
    pub markers: HashSet<RoutineId>,
    pub sub_language: HashSet<RoutineId>,
    pub exception_routine: Option<RoutineId>,
}

impl FrameClassifier {
    pub fn kind(&self, frame: &dyn ActivationRecord) -> FrameKind {
        let routine = frame.routine();
        if self.exception_routine == Some(routine) {
            FrameKind::ExceptionReport
        } else if self.sub_language.contains(&routine) {
            FrameKind::SubLanguage
        } else if self.markers.contains(&routine) {
            FrameKind::Marker
        } else {
            FrameKind::Host
        }
    }

    /// True for frames the stepping decision applies to.
    pub fn is_sub_language(&self, frame: &dyn ActivationRecord) -> bool {
        matches!(
            self.kind(frame),
            FrameKind::SubLanguage | FrameKind::ExceptionReport
        )
    }
}

/// Debugger bridge for templates rendered by an engine running in the host.
pub struct TemplateBridge {
    registry: Arc<dyn ModuleRegistry>,
    config: BridgeConfig,
    cache: Arc<CapabilityCache>,
    evaluator: Arc<dyn HostEvaluator + Send + Sync>,
}

impl TemplateBridge {
    pub fn new(
        registry: Arc<dyn ModuleRegistry>,
        config: BridgeConfig,
        evaluator: Arc<dyn HostEvaluator + Send + Sync>,
    ) -> Self {
        Self::with_cache(registry, config, evaluator, Arc::new(CapabilityCache::new()))
    }

    /// Share discovered capabilities with other bridges over the same host.
    pub fn with_cache(
        registry: Arc<dyn ModuleRegistry>,
        config: BridgeConfig,
        evaluator: Arc<dyn HostEvaluator + Send + Sync>,
        cache: Arc<CapabilityCache>,
    ) -> Self {
        Self {
            registry,
            config,
            cache,
            evaluator,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CapabilityCache> {
        &self.cache
    }

    /// Moves whenever the host loads or unloads a module.
    pub fn registry_generation(&self) -> u64 {
        self.registry.generation()
    }

    pub fn engine(&self) -> Option<EngineHandle<'_>> {
        detect_engine(self.registry.as_ref(), &self.config.engine)
    }

    pub fn exception_binding(&self) -> Option<ExceptionBinding> {
        self.cache
            .exception_binding(|| probe_exception_binding(&self.engine()?))
    }

    pub fn marker_frames(&self) -> HashSet<RoutineId> {
        classify::marker_frames(self.engine().as_ref())
    }

    pub fn sub_language_frames(&self) -> HashSet<RoutineId> {
        let binding = self.exception_binding();
        classify::sub_language_frames(self.engine().as_ref(), binding.as_ref())
    }

    pub fn module_path_rules(&self) -> Vec<ModulePathRule> {
        self.cache
            .module_path_rules(|| classify::module_path_rules(self.engine().as_ref()))
            .unwrap_or_default()
    }

    pub fn classifier(&self) -> FrameClassifier {
        let binding = self.exception_binding();
        let engine = self.engine();
        FrameClassifier {
            markers: classify::marker_frames(engine.as_ref()),
            sub_language: classify::sub_language_frames(engine.as_ref(), binding.as_ref()),
            exception_routine: binding.map(|b| b.routine()),
        }
    }

    pub fn should_stop(
        &self,
        frame: &dyn ActivationRecord,
        event: EventKind,
        action: StepAction,
    ) -> bool {
        let binding = self.exception_binding();
        stepping::should_stop(frame, event, action, binding.as_ref())
    }

    /// Node location for a frame, with the filename already case-normalized.
    pub fn locate(&self, frame: &dyn ActivationRecord) -> Option<NodeLocation> {
        let binding = self.exception_binding();
        let template_type = self.engine().and_then(|e| e.base_template_type());
        translate::locate(
            frame,
            binding.as_ref(),
            template_type.as_deref(),
            self.config.paths.case_insensitive(),
        )
    }

    pub fn translate(
        &self,
        frame: &dyn ActivationRecord,
        use_positions: bool,
    ) -> Option<VirtualFrame> {
        translate::translate(self.locate(frame)?, use_positions)
    }

    pub fn is_visible(&self, stack: &[&dyn ActivationRecord], idx: usize) -> bool {
        let markers = self.marker_frames();
        visibility::is_visible(stack, idx, &markers, |f| {
            self.locate(f).map(|loc| loc.filename)
        })
    }

    pub fn step_out_target<'a>(
        &self,
        frame: &'a dyn ActivationRecord,
    ) -> Option<&'a dyn ActivationRecord> {
        let classifier = self.classifier();
        step_out::step_out_target(
            frame,
            classifier.is_sub_language(frame),
            &classifier.markers,
            |f| self.translated_filename(f),
        )
    }

    pub fn locals(&self, frame: &dyn ActivationRecord) -> Namespace {
        scope::template_locals(frame)
    }

    /// Templates have no scope beyond their context.
    pub fn globals(&self, _frame: &dyn ActivationRecord) -> Namespace {
        Namespace::new()
    }

    pub fn evaluate(&self, expr: &str, frame: &dyn ActivationRecord) -> Result<Value, EvalError> {
        scope::evaluate(self.evaluator.as_ref(), expr, frame)
    }

    pub fn execute(&self, source: &str, frame: &dyn ActivationRecord) -> Result<(), EvalError> {
        scope::execute(self.evaluator.as_ref(), source, frame)
    }

    fn translated_filename(&self, frame: &dyn ActivationRecord) -> Option<PathBuf> {
        self.translate(frame, true).map(|vf| vf.filename)
    }
}
