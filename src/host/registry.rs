use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{HostType, RoutineId, Value};

#[derive(Debug, Clone)]
pub enum Member {
    Type(Arc<HostType>),
    Routine(RoutineId),
    Value(Value),
}

/// A module as seen in the host's loaded-module table.
#[derive(Debug, Clone)]
pub struct HostModule {
    name: String,
    file: Option<PathBuf>,
    members: BTreeMap<String, Member>,
}

impl HostModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            members: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_type(mut self, ty: Arc<HostType>) -> Self {
        let short = ty.name().rsplit('.').next().unwrap_or(ty.name()).to_string();
        self.members.insert(short, Member::Type(ty));
        self
    }

    pub fn with_member(mut self, name: impl Into<String>, member: Member) -> Self {
        self.members.insert(name.into(), member);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn type_named(&self, name: &str) -> Option<Arc<HostType>> {
        match self.members.get(name) {
            Some(Member::Type(ty)) => Some(ty.clone()),
            _ => None,
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &Arc<HostType>> {
        self.members.values().filter_map(|m| match m {
            Member::Type(ty) => Some(ty),
            _ => None,
        })
    }
}

/// The host's table of already-imported modules. Lookups never import.
pub trait ModuleRegistry: Send + Sync {
    fn loaded(&self, name: &str) -> Option<Arc<HostModule>>;

    /// Changes whenever the set of loaded modules changes.
    fn generation(&self) -> u64;
}

/// In-memory registry that hosts fill as their modules finish importing.
#[derive(Debug, Default)]
pub struct LoadedModules {
    modules: RwLock<HashMap<String, Arc<HostModule>>>,
    generation: AtomicU64,
}

impl LoadedModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, module: HostModule) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.insert(module.name().to_string(), Arc::new(module));
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn remove(&self, name: &str) -> Option<Arc<HostModule>> {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let removed = modules.remove(name);
        if removed.is_some() {
            self.generation.fetch_add(1, Ordering::Release);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModuleRegistry for LoadedModules {
    fn loaded(&self, name: &str) -> Option<Arc<HostModule>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
