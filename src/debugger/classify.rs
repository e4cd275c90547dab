use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::engine::EngineHandle;
use super::shapes::ExceptionBinding;
use crate::host::RoutineId;

/// What a host activation record means to the template debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameKind {
    /// Ordinary host code
    Host,
    /// Entry into a template evaluation, e.g. rendering a compiled template
    Marker,
    /// One node evaluation; the unit of stepping in templates
    SubLanguage,
    /// The routine that reports template evaluation errors
    ExceptionReport,
}

/// Routines whose invocation begins a nested template evaluation.
pub fn marker_frames(engine: Option<&EngineHandle<'_>>) -> HashSet<RoutineId> {
    let mut markers = HashSet::new();
    let render = engine.and_then(|engine| {
        engine
            .template_type()?
            .method(&engine.profile().render_method)
    });
    match render {
        Some(routine) => {
            markers.insert(routine);
        }
        None => debug!("marker frames empty"),
    }
    markers
}

/// Node evaluation routines in every template submodule loaded so far, plus
/// the exception-reporting routine.
pub fn sub_language_frames(
    engine: Option<&EngineHandle<'_>>,
    binding: Option<&ExceptionBinding>,
) -> HashSet<RoutineId> {
    let mut routines = HashSet::new();

    if let Some(engine) = engine {
        let profile = engine.profile();
        match engine.node_type() {
            Some(node_type) => {
                for name in &profile.template_modules {
                    let Some(module) = engine.submodule(name) else {
                        debug!("template module {} not yet imported", name);
                        continue;
                    };
                    for ty in module.types() {
                        if !ty.is_subclass_of(&node_type) {
                            continue;
                        }
                        if let Some(routine) = ty.method(&profile.render_method) {
                            routines.insert(routine);
                        }
                    }
                }
            }
            None => debug!("node base type not available yet"),
        }
    }

    if let Some(binding) = binding {
        routines.insert(binding.routine());
    }
    routines
}

/// `(path, is_implementation)`: host code under an implementation path is
/// hidden from host-level stepping while templates are being debugged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModulePathRule {
    pub path: PathBuf,
    pub is_implementation: bool,
}

impl ModulePathRule {
    pub fn new(path: impl Into<PathBuf>, is_implementation: bool) -> Self {
        Self {
            path: path.into(),
            is_implementation,
        }
    }

    /// Rules name either a directory or a module file without its extension.
    pub fn applies_to(&self, file: &Path) -> bool {
        file.starts_with(&self.path) || file.with_extension("") == self.path
    }
}

/// Ordered rules, add-on exceptions first so they win over contrib and core.
pub fn module_path_rules(engine: Option<&EngineHandle<'_>>) -> Option<Vec<ModulePathRule>> {
    let engine = engine?;
    let Some(install_dir) = engine.install_dir() else {
        debug!("module paths empty: engine location unknown");
        return None;
    };
    let profile = engine.profile();
    let contrib = install_dir.join(&profile.contrib_dir);

    let mut rules: Vec<ModulePathRule> = profile
        .addon_tag_modules
        .iter()
        .map(|rel| ModulePathRule::new(contrib.join(rel), true))
        .collect();
    rules.push(ModulePathRule::new(contrib, false));
    rules.push(ModulePathRule::new(install_dir, true));
    Some(rules)
}

/// First matching rule decides; `None` when no rule applies.
pub fn is_implementation_file(rules: &[ModulePathRule], file: &Path) -> Option<bool> {
    rules
        .iter()
        .find(|rule| rule.applies_to(file))
        .map(|rule| rule.is_implementation)
}
