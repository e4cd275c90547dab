use std::sync::{Mutex, PoisonError, RwLock};

use super::classify::ModulePathRule;
use super::shapes::ExceptionBinding;

/// Engine capabilities discovered so far.
///
/// Slots stay empty until discovery succeeds, so an engine that was not
/// imported yet is probed again on the next query. Filling happens under a
/// single guard because two debugged threads may walk their stacks at once.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    binding: RwLock<Option<ExceptionBinding>>,
    path_rules: RwLock<Option<Vec<ModulePathRule>>>,
    fill: Mutex<()>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exception_binding(
        &self,
        discover: impl FnOnce() -> Option<ExceptionBinding>,
    ) -> Option<ExceptionBinding> {
        self.get_or_fill(&self.binding, discover)
    }

    /// Memoized binding without triggering discovery.
    pub fn known_exception_binding(&self) -> Option<ExceptionBinding> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn module_path_rules(
        &self,
        discover: impl FnOnce() -> Option<Vec<ModulePathRule>>,
    ) -> Option<Vec<ModulePathRule>> {
        self.get_or_fill(&self.path_rules, discover)
    }

    /// Forget everything; the next query rediscovers from the registry.
    pub fn invalidate(&self) {
        let _guard = self.fill.lock().unwrap_or_else(PoisonError::into_inner);
        *self.binding.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.path_rules.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn get_or_fill<T: Clone>(
        &self,
        slot: &RwLock<Option<T>>,
        discover: impl FnOnce() -> Option<T>,
    ) -> Option<T> {
        if let Some(value) = slot.read().unwrap_or_else(PoisonError::into_inner).clone() {
            return Some(value);
        }

        let _guard = self.fill.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.read().unwrap_or_else(PoisonError::into_inner).clone() {
            return Some(value);
        }

        let value = discover()?;
        *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
        Some(value)
    }
}
