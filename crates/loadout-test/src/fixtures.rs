//! Test fixtures for registries and configuration.

use std::sync::Arc;

use loadout_config::ProfilesConfig;
use loadout_modules::{ModuleDescriptor, ModuleId, ModuleRegistry};

use crate::mocks::ModuleScript;

/// Build a [`ModuleId`] without validation.
#[must_use]
pub fn module_id(id: &str) -> ModuleId {
    ModuleId::from_static(id)
}

fn describe(id: &str, dependencies: &[&str], profiles: &[&str]) -> ModuleDescriptor {
    let mut descriptor = ModuleDescriptor::new(module_id(id));
    for dep in dependencies {
        descriptor = descriptor.depends_on(module_id(dep));
    }
    for profile in profiles {
        descriptor = if *profile == "all" {
            descriptor.in_all_profiles()
        } else {
            descriptor.in_profile(*profile)
        };
    }
    descriptor
}

/// Incrementally build a [`ModuleRegistry`] of scripted modules.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: ModuleRegistry,
}

impl RegistryBuilder {
    /// Start with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module with dependencies and profile membership.
    ///
    /// A profile named `"all"` makes the module a member of every profile.
    ///
    /// # Panics
    ///
    /// Panics if the ID is already registered.
    #[must_use]
    pub fn module(
        self,
        id: &str,
        dependencies: &[&str],
        profiles: &[&str],
        script: ModuleScript,
    ) -> Self {
        self.descriptor(describe(id, dependencies, profiles), script)
    }

    /// Like [`RegistryBuilder::module`], with resources the module should
    /// register lazily.
    ///
    /// # Panics
    ///
    /// Panics if the ID is already registered.
    #[must_use]
    pub fn deferred_module(
        self,
        id: &str,
        dependencies: &[&str],
        profiles: &[&str],
        deferred: &[&str],
        script: ModuleScript,
    ) -> Self {
        let descriptor = deferred
            .iter()
            .fold(describe(id, dependencies, profiles), |d, resource| {
                d.with_deferred_resource(*resource)
            });
        self.descriptor(descriptor, script)
    }

    /// Add a module from a full descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the ID is already registered.
    #[must_use]
    pub fn descriptor(mut self, descriptor: ModuleDescriptor, script: ModuleScript) -> Self {
        let id = descriptor.id.clone();
        if let Err(e) = self.registry.register(descriptor, script.into_factory()) {
            panic!("failed to register test module {id}: {e}");
        }
        self
    }

    /// The registry, without validation.
    #[must_use]
    pub fn build_unchecked(self) -> Arc<ModuleRegistry> {
        Arc::new(self.registry)
    }

    /// The validated registry.
    ///
    /// # Panics
    ///
    /// Panics if the dependency graph is invalid.
    #[must_use]
    pub fn build(self) -> Arc<ModuleRegistry> {
        if let Err(e) = self.registry.validate() {
            panic!("invalid test registry: {e}");
        }
        Arc::new(self.registry)
    }
}

/// Parse and validate a profile configuration.
///
/// # Panics
///
/// Panics if the TOML is malformed or invalid.
#[must_use]
pub fn config_from_toml(toml: &str) -> ProfilesConfig {
    match ProfilesConfig::from_toml(toml) {
        Ok(config) => config,
        Err(e) => panic!("invalid test configuration: {e}"),
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; repeated calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
