//! Sub-language support that activates once its indicator module is loaded.
//!
//! Each supported sub-language names the host modules whose presence means
//! the debuggee uses it, and builds a [`SubLanguageHook`] over the registry.
//! Discovery never imports anything: a hook appears the first time its
//! indicator module shows up in the registry.

use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::debugger::{HostEvaluator, ModulePathRule, StepAction, TemplateBridge, VirtualFrame};
use crate::error::EvalError;
use crate::host::{ActivationRecord, EventKind, ModuleRegistry, Namespace, RoutineId, Value};

/// Debugger support for a language interpreted by code running in the host.
pub trait SubLanguageHook: Send + Sync {
    fn name(&self) -> &str;

    /// Routines whose activation means "entering the sub-language".
    fn marker_frames(&self) -> HashSet<RoutineId>;

    /// Host paths that belong to the sub-language's implementation.
    fn module_path_rules(&self) -> Vec<ModulePathRule>;

    fn sub_language_frames(&self) -> HashSet<RoutineId>;

    fn should_stop(&self, frame: &dyn ActivationRecord, event: EventKind, action: StepAction) -> bool;

    fn translate(&self, frame: &dyn ActivationRecord, use_positions: bool) -> Option<VirtualFrame>;

    fn is_visible(&self, stack: &[&dyn ActivationRecord], idx: usize) -> bool;

    fn step_out_target<'a>(&self, frame: &'a dyn ActivationRecord) -> Option<&'a dyn ActivationRecord>;

    fn locals(&self, frame: &dyn ActivationRecord) -> Namespace;

    fn globals(&self, frame: &dyn ActivationRecord) -> Namespace;

    fn evaluate(&self, expr: &str, frame: &dyn ActivationRecord) -> Result<Value, EvalError>;

    fn execute(&self, source: &str, frame: &dyn ActivationRecord) -> Result<(), EvalError>;
}

impl SubLanguageHook for TemplateBridge {
    fn name(&self) -> &str {
        "templates"
    }

    fn marker_frames(&self) -> HashSet<RoutineId> {
        TemplateBridge::marker_frames(self)
    }

    fn module_path_rules(&self) -> Vec<ModulePathRule> {
        TemplateBridge::module_path_rules(self)
    }

    fn sub_language_frames(&self) -> HashSet<RoutineId> {
        TemplateBridge::sub_language_frames(self)
    }

    fn should_stop(&self, frame: &dyn ActivationRecord, event: EventKind, action: StepAction) -> bool {
        TemplateBridge::should_stop(self, frame, event, action)
    }

    fn translate(&self, frame: &dyn ActivationRecord, use_positions: bool) -> Option<VirtualFrame> {
        TemplateBridge::translate(self, frame, use_positions)
    }

    fn is_visible(&self, stack: &[&dyn ActivationRecord], idx: usize) -> bool {
        TemplateBridge::is_visible(self, stack, idx)
    }

    fn step_out_target<'a>(&self, frame: &'a dyn ActivationRecord) -> Option<&'a dyn ActivationRecord> {
        TemplateBridge::step_out_target(self, frame)
    }

    fn locals(&self, frame: &dyn ActivationRecord) -> Namespace {
        TemplateBridge::locals(self, frame)
    }

    fn globals(&self, frame: &dyn ActivationRecord) -> Namespace {
        TemplateBridge::globals(self, frame)
    }

    fn evaluate(&self, expr: &str, frame: &dyn ActivationRecord) -> Result<Value, EvalError> {
        TemplateBridge::evaluate(self, expr, frame)
    }

    fn execute(&self, source: &str, frame: &dyn ActivationRecord) -> Result<(), EvalError> {
        TemplateBridge::execute(self, source, frame)
    }
}

type Evaluator = Arc<dyn HostEvaluator + Send + Sync>;

/// A supported sub-language and how to recognize it.
pub struct SubLanguageExtension {
    pub name: &'static str,
    pub indicator_modules: fn(&BridgeConfig) -> Vec<String>,
    pub build: fn(Arc<dyn ModuleRegistry>, BridgeConfig, Evaluator) -> Arc<dyn SubLanguageHook>,
}

pub const SUPPORTED_SUB_LANGUAGES: &[SubLanguageExtension] = &[SubLanguageExtension {
    name: "templates",
    indicator_modules: template_indicators,
    build: build_template_bridge,
}];

fn template_indicators(config: &BridgeConfig) -> Vec<String> {
    vec![config.engine.indicator_module.clone()]
}

fn build_template_bridge(
    registry: Arc<dyn ModuleRegistry>,
    config: BridgeConfig,
    evaluator: Evaluator,
) -> Arc<dyn SubLanguageHook> {
    Arc::new(TemplateBridge::new(registry, config, evaluator))
}

/// Hooks for every sub-language whose indicator module is loaded right now.
pub fn discover(
    registry: &Arc<dyn ModuleRegistry>,
    config: &BridgeConfig,
    evaluator: &Evaluator,
) -> Vec<Arc<dyn SubLanguageHook>> {
    SUPPORTED_SUB_LANGUAGES
        .iter()
        .filter(|ext| {
            let present = (ext.indicator_modules)(config)
                .iter()
                .any(|name| registry.loaded(name).is_some());
            if !present {
                debug!("sub-language {} not in use yet", ext.name);
            }
            present
        })
        .map(|ext| (ext.build)(registry.clone(), config.clone(), evaluator.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{EngineLayout, EngineShape, SimpleEvaluator};
    use crate::host::LoadedModules;

    #[test]
    fn test_hook_appears_once_indicator_module_loads() {
        let modules = Arc::new(LoadedModules::new());
        let registry: Arc<dyn ModuleRegistry> = modules.clone();
        let config = BridgeConfig::default();
        let evaluator: Evaluator = Arc::new(SimpleEvaluator::new());

        assert!(discover(&registry, &config, &evaluator).is_empty());

        let layout = EngineLayout::new(EngineShape::Modern, "/opt/django");
        layout.install(&modules);
        let hooks = discover(&registry, &config, &evaluator);
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].name(), "templates");
        assert!(hooks[0].marker_frames().contains(&layout.template_render));
        assert!(hooks[0]
            .sub_language_frames()
            .contains(&layout.node_render(&layout.if_node)));
    }

    #[test]
    fn test_indicator_follows_profile() {
        let modules = Arc::new(LoadedModules::new());
        let registry: Arc<dyn ModuleRegistry> = modules.clone();
        let mut config = BridgeConfig::default();
        config.engine.indicator_module = "jinja.runtime".to_string();
        let evaluator: Evaluator = Arc::new(SimpleEvaluator::new());

        EngineLayout::new(EngineShape::Modern, "/opt/django").install(&modules);
        assert!(discover(&registry, &config, &evaluator).is_empty());
    }
}
