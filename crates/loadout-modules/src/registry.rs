//! Module registry.
//!
//! The static catalog of module descriptors and the factories that produce
//! module instances. Populated once at process start, then shared read-only.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::ModuleId;
use crate::descriptor::ModuleDescriptor;
use crate::error::{ModuleError, ModuleResult};
use crate::module::{Module, ModuleFactory};
use crate::resolver;

struct RegistryEntry {
    descriptor: ModuleDescriptor,
    factory: ModuleFactory,
}

/// Catalog of every module the process knows how to load.
#[derive(Default)]
pub struct ModuleRegistry {
    entries: BTreeMap<ModuleId, RegistryEntry>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module descriptor with its factory.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::AlreadyRegistered`] if a module with the same
    /// ID is already in the registry.
    pub fn register<F>(&mut self, descriptor: ModuleDescriptor, factory: F) -> ModuleResult<()>
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.register_factory(descriptor, Arc::new(factory))
    }

    /// Register a module descriptor with an already shared factory.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::AlreadyRegistered`] if a module with the same
    /// ID is already in the registry.
    pub fn register_factory(
        &mut self,
        descriptor: ModuleDescriptor,
        factory: ModuleFactory,
    ) -> ModuleResult<()> {
        let id = descriptor.id.clone();
        if self.entries.contains_key(&id) {
            return Err(ModuleError::AlreadyRegistered(id));
        }
        debug!(module_id = %id, priority = descriptor.priority, "Registered module descriptor");
        self.entries.insert(
            id,
            RegistryEntry {
                descriptor,
                factory,
            },
        );
        Ok(())
    }

    /// Look up a descriptor.
    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<&ModuleDescriptor> {
        self.entries.get(id).map(|e| &e.descriptor)
    }

    /// Look up a descriptor, failing if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::NotFound`] if the module is not registered.
    pub fn require(&self, id: &ModuleId) -> ModuleResult<&ModuleDescriptor> {
        self.get(id).ok_or_else(|| ModuleError::NotFound(id.clone()))
    }

    /// Whether the module is registered.
    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.entries.contains_key(id)
    }

    /// Every registered module ID.
    #[must_use]
    pub fn ids(&self) -> BTreeSet<ModuleId> {
        self.entries.keys().cloned().collect()
    }

    /// Every registered descriptor, in ID order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modules whose own descriptor declares membership in `profile`,
    /// including every "all profiles" module.
    #[must_use]
    pub fn members_of(&self, profile: &str) -> BTreeSet<ModuleId> {
        self.descriptors()
            .filter(|d| d.profiles.includes(profile))
            .map(|d| d.id.clone())
            .collect()
    }

    /// Produce a fresh instance of a module.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::NotFound`] if the module is not registered.
    pub fn instantiate(&self, id: &ModuleId) -> ModuleResult<Box<dyn Module>> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| ModuleError::NotFound(id.clone()))?;
        Ok((entry.factory)())
    }

    /// Check the whole dependency graph: every dependency must be registered
    /// and the graph must be acyclic.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UnknownDependency`] or
    /// [`ModuleError::CircularDependency`].
    pub fn validate(&self) -> ModuleResult<()> {
        for descriptor in self.descriptors() {
            if let Some(dependency) = descriptor
                .dependencies
                .iter()
                .find(|dep| !self.contains(dep))
            {
                return Err(ModuleError::UnknownDependency {
                    module_id: descriptor.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        resolver::topological_order(self, &self.ids())?;
        info!(modules = self.len(), "Module registry validated");
        Ok(())
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RegistrationContext;

    struct Noop;

    #[async_trait::async_trait]
    impl Module for Noop {
        async fn register(&mut self, _ctx: &mut RegistrationContext<'_>) -> ModuleResult<usize> {
            Ok(0)
        }
    }

    fn noop() -> Box<dyn Module> {
        Box::new(Noop)
    }

    fn id(s: &str) -> ModuleId {
        ModuleId::from_static(s)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = ModuleRegistry::new();
        reg.register(ModuleDescriptor::new(id("workspace")).in_profile("core"), noop)
            .unwrap();
        reg.register(ModuleDescriptor::new(id("logging")).in_all_profiles(), noop)
            .unwrap();

        assert_eq!(reg.len(), 2);
        assert!(reg.contains(&id("workspace")));
        assert!(reg.get(&id("missing")).is_none());
        assert!(matches!(
            reg.require(&id("missing")),
            Err(ModuleError::NotFound(_))
        ));
        assert_eq!(
            reg.members_of("core"),
            BTreeSet::from([id("logging"), id("workspace")])
        );
        assert_eq!(reg.members_of("dev"), BTreeSet::from([id("logging")]));
        assert!(reg.instantiate(&id("workspace")).is_ok());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = ModuleRegistry::new();
        reg.register(ModuleDescriptor::new(id("a")), noop).unwrap();
        let err = reg.register(ModuleDescriptor::new(id("a")), noop).unwrap_err();
        assert_eq!(err, ModuleError::AlreadyRegistered(id("a")));
    }

    #[test]
    fn test_validate_unknown_dependency() {
        let mut reg = ModuleRegistry::new();
        reg.register(ModuleDescriptor::new(id("a")).depends_on(id("ghost")), noop)
            .unwrap();
        assert_eq!(
            reg.validate().unwrap_err(),
            ModuleError::UnknownDependency {
                module_id: id("a"),
                dependency: id("ghost"),
            }
        );
    }

    #[test]
    fn test_validate_cycle() {
        let mut reg = ModuleRegistry::new();
        reg.register(ModuleDescriptor::new(id("c")).depends_on(id("d")), noop)
            .unwrap();
        reg.register(ModuleDescriptor::new(id("d")).depends_on(id("c")), noop)
            .unwrap();
        reg.register(ModuleDescriptor::new(id("e")), noop).unwrap();
        assert_eq!(
            reg.validate().unwrap_err(),
            ModuleError::CircularDependency {
                modules: vec![id("c"), id("d")],
            }
        );
    }
}
