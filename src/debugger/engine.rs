use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EngineProfile;
use crate::host::{HostModule, HostType, Member, ModuleRegistry, RoutineId};

/// The template engine as currently visible in the loaded-module registry.
///
/// Re-derived on each query: the debuggee may import the engine (or more of
/// its submodules) at any time after the debugger attaches.
pub struct EngineHandle<'a> {
    registry: &'a dyn ModuleRegistry,
    profile: &'a EngineProfile,
    root: Arc<HostModule>,
}

/// Look up the engine's indicator module without importing anything.
pub fn detect_engine<'a>(
    registry: &'a dyn ModuleRegistry,
    profile: &'a EngineProfile,
) -> Option<EngineHandle<'a>> {
    match registry.loaded(&profile.indicator_module) {
        Some(root) => Some(EngineHandle {
            registry,
            profile,
            root,
        }),
        None => {
            debug!("engine module {} not loaded yet", profile.indicator_module);
            None
        }
    }
}

impl<'a> EngineHandle<'a> {
    pub fn profile(&self) -> &'a EngineProfile {
        self.profile
    }

    pub fn submodule(&self, name: &str) -> Option<Arc<HostModule>> {
        self.registry.loaded(name)
    }

    pub fn node_type(&self) -> Option<Arc<HostType>> {
        self.root.type_named(&self.profile.node_type)
    }

    pub fn template_type(&self) -> Option<Arc<HostType>> {
        self.root.type_named(&self.profile.template_type)
    }

    /// Template type as defined in the base module, used by the composition fallback.
    pub fn base_template_type(&self) -> Option<Arc<HostType>> {
        self.submodule(&self.profile.base_module)?
            .type_named(&self.profile.template_type)
    }

    pub fn base_node_type(&self) -> Option<Arc<HostType>> {
        self.submodule(&self.profile.base_module)?
            .type_named(&self.profile.node_type)
    }

    /// Method routine of a type exported by `module`.
    pub fn method_of(&self, module: &str, type_name: &str, method: &str) -> Option<RoutineId> {
        let module = self.submodule(module)?;
        match module.member(type_name)? {
            Member::Type(ty) => ty.method(method),
            _ => None,
        }
    }

    /// Directory the engine package is installed in: two levels above the
    /// indicator module's file.
    pub fn install_dir(&self) -> Option<PathBuf> {
        let file = self.root.file()?;
        Some(file.parent()?.parent()?.to_path_buf())
    }
}
