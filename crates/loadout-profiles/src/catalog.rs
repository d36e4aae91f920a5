//! Profile catalog.
//!
//! Declarative profile definitions checked against the module registry and
//! expanded into concrete module sets.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use loadout_config::{ModuleSelection, ProfilesConfig};
use loadout_modules::{ModuleId, ModuleRegistry, resolver};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ProfileError, ProfileResult};

/// One profile, with module IDs already checked against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileDescriptor {
    /// Profile name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Modules the profile selects itself.
    pub modules: ProfileModules,
    /// Parent profile whose modules are inherited.
    pub extends: Option<String>,
}

/// A profile's own module selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileModules {
    /// The whole registry.
    All,
    /// An explicit list.
    Explicit(BTreeSet<ModuleId>),
}

/// Every profile the process knows, bound to one module registry.
#[derive(Debug)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, ProfileDescriptor>,
    default_profile: String,
    registry: Arc<ModuleRegistry>,
}

impl ProfileCatalog {
    /// Build the catalog from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownModule`] if a profile names a module the
    /// registry does not know, and [`ProfileError::UnknownProfile`] or
    /// [`ProfileError::InheritanceCycle`] for broken `extends` chains or a
    /// missing default profile.
    pub fn from_config(config: &ProfilesConfig, registry: Arc<ModuleRegistry>) -> ProfileResult<Self> {
        let mut profiles = Vec::with_capacity(config.profiles.len());
        for (name, section) in &config.profiles {
            let modules = match &section.modules {
                ModuleSelection::All => ProfileModules::All,
                ModuleSelection::Explicit(ids) => {
                    let mut set = BTreeSet::new();
                    for raw in ids {
                        let id = ModuleId::new(raw.as_str())
                            .ok()
                            .filter(|id| registry.contains(id))
                            .ok_or_else(|| ProfileError::UnknownModule {
                                profile: name.clone(),
                                module: raw.clone(),
                            })?;
                        set.insert(id);
                    }
                    ProfileModules::Explicit(set)
                },
            };
            profiles.push(ProfileDescriptor {
                name: name.clone(),
                description: section.description.clone(),
                modules,
                extends: section.extends.clone(),
            });
        }
        Self::new(profiles, config.default_profile.clone(), registry)
    }

    /// Build the catalog from descriptors.
    ///
    /// # Errors
    ///
    /// Same as [`ProfileCatalog::from_config`].
    pub fn new(
        profiles: Vec<ProfileDescriptor>,
        default_profile: impl Into<String>,
        registry: Arc<ModuleRegistry>,
    ) -> ProfileResult<Self> {
        let catalog = Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
            default_profile: default_profile.into(),
            registry,
        };

        if !catalog.contains(&catalog.default_profile) {
            return Err(ProfileError::UnknownProfile(catalog.default_profile.clone()));
        }
        for profile in catalog.profiles.values() {
            if let ProfileModules::Explicit(ids) = &profile.modules
                && let Some(missing) = ids.iter().find(|id| !catalog.registry.contains(id))
            {
                return Err(ProfileError::UnknownModule {
                    profile: profile.name.clone(),
                    module: missing.to_string(),
                });
            }
            catalog.lineage(&profile.name)?;
        }

        info!(
            profiles = catalog.profiles.len(),
            default = %catalog.default_profile,
            "Profile catalog loaded"
        );
        Ok(catalog)
    }

    /// The registry profiles are resolved against.
    #[must_use]
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// The profile activated at startup.
    #[must_use]
    pub fn default_profile(&self) -> &str {
        &self.default_profile
    }

    /// Look up a profile.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProfileDescriptor> {
        self.profiles.get(name)
    }

    /// Whether the profile exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Every profile name, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Every profile, sorted by name.
    pub fn profiles(&self) -> impl Iterator<Item = &ProfileDescriptor> {
        self.profiles.values()
    }

    /// Number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// `name` followed by its ancestors, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownProfile`] for a missing profile or
    /// parent and [`ProfileError::InheritanceCycle`] for a loop.
    pub fn lineage(&self, name: &str) -> ProfileResult<Vec<&ProfileDescriptor>> {
        let mut chain: Vec<&ProfileDescriptor> = Vec::new();
        let mut next = Some(name);
        while let Some(current) = next {
            if let Some(pos) = chain.iter().position(|p| p.name == current) {
                let mut profiles: Vec<String> =
                    chain.iter().skip(pos).map(|p| p.name.clone()).collect();
                profiles.push(current.to_string());
                return Err(ProfileError::InheritanceCycle { profiles });
            }
            let profile = self
                .get(current)
                .ok_or_else(|| ProfileError::UnknownProfile(current.to_string()))?;
            chain.push(profile);
            next = profile.extends.as_deref();
        }
        Ok(chain)
    }

    /// Expand a profile into the concrete set of modules it requires.
    ///
    /// Inherited modules come first, then the profile's own list and every
    /// module whose descriptor declares membership in the profile or one of
    /// its ancestors. `"all"` anywhere in the chain selects the whole
    /// registry. The result is closed under dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownProfile`] if the profile does not
    /// exist, plus any inheritance or dependency error.
    pub fn resolve(&self, name: &str) -> ProfileResult<BTreeSet<ModuleId>> {
        let lineage = self.lineage(name)?;

        if lineage.iter().any(|p| p.modules == ProfileModules::All) {
            debug!(profile = name, "Profile selects every module");
            return Ok(self.registry.ids());
        }

        let mut selected = BTreeSet::new();
        for profile in lineage.iter().rev() {
            if let ProfileModules::Explicit(ids) = &profile.modules {
                selected.extend(ids.iter().cloned());
            }
            selected.extend(self.registry.members_of(&profile.name));
        }

        let resolved = resolver::dependency_closure(&self.registry, &selected)?;
        debug!(profile = name, modules = resolved.len(), "Profile resolved");
        Ok(resolved)
    }

    /// Resolve a profile and order its modules for loading.
    ///
    /// # Errors
    ///
    /// Same as [`ProfileCatalog::resolve`], plus
    /// [`ModuleError::CircularDependency`](loadout_modules::ModuleError::CircularDependency).
    pub fn load_order(&self, name: &str) -> ProfileResult<Vec<ModuleId>> {
        let modules = self.resolve(name)?;
        Ok(resolver::topological_order(&self.registry, &modules)?)
    }

    /// Resolve every profile that resolves cleanly.
    #[must_use]
    pub fn resolve_all(&self) -> BTreeMap<String, BTreeSet<ModuleId>> {
        self.profiles
            .keys()
            .filter_map(|name| self.resolve(name).ok().map(|set| (name.clone(), set)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use loadout_modules::ModuleError;
    use loadout_test::{ModuleScript, RegistryBuilder, config_from_toml, module_id};

    use super::*;

    fn ids(list: &[&str]) -> BTreeSet<ModuleId> {
        list.iter().map(|s| module_id(s)).collect()
    }

    fn registry() -> Arc<ModuleRegistry> {
        RegistryBuilder::new()
            .module("workspace", &[], &[], ModuleScript::new())
            .module("git", &["workspace"], &[], ModuleScript::new())
            .module("logging", &[], &["all"], ModuleScript::new())
            .module("search", &[], &["research"], ModuleScript::new())
            .build()
    }

    const CONFIG: &str = r#"
        default_profile = "core"

        [profiles.core]
        modules = ["workspace"]

        [profiles.dev]
        extends = "core"
        modules = ["git"]

        [profiles.research]
        extends = "core"

        [profiles.full]
        modules = ["all"]

        [profiles.tools]
        modules = ["git"]
    "#;

    fn catalog() -> ProfileCatalog {
        ProfileCatalog::from_config(&config_from_toml(CONFIG), registry()).unwrap()
    }

    #[test]
    fn test_resolve_with_inheritance() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("core").unwrap(), ids(&["logging", "workspace"]));
        assert_eq!(
            catalog.resolve("dev").unwrap(),
            ids(&["git", "logging", "workspace"])
        );
    }

    #[test]
    fn test_resolve_membership_declared_by_module() {
        assert_eq!(
            catalog().resolve("research").unwrap(),
            ids(&["logging", "search", "workspace"])
        );
    }

    #[test]
    fn test_resolve_all() {
        assert_eq!(
            catalog().resolve("full").unwrap(),
            ids(&["git", "logging", "search", "workspace"])
        );
    }

    #[test]
    fn test_resolve_adds_dependencies() {
        assert_eq!(
            catalog().resolve("tools").unwrap(),
            ids(&["git", "logging", "workspace"])
        );
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let catalog = catalog();
        let first = catalog.load_order("dev").unwrap();
        for _ in 0..5 {
            assert_eq!(catalog.load_order("dev").unwrap(), first);
        }
        let git = first.iter().position(|id| id.as_str() == "git").unwrap();
        let workspace = first.iter().position(|id| id.as_str() == "workspace").unwrap();
        assert!(workspace < git);
    }

    #[test]
    fn test_unknown_profile() {
        assert!(matches!(
            catalog().resolve("ghost"),
            Err(ProfileError::UnknownProfile(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_unknown_module_rejected() {
        let config = config_from_toml(
            r#"
            default_profile = "core"
            [profiles.core]
            modules = ["nope"]
            "#,
        );
        assert!(matches!(
            ProfileCatalog::from_config(&config, registry()),
            Err(ProfileError::UnknownModule { module, .. }) if module == "nope"
        ));
    }

    #[test]
    fn test_inheritance_cycle_rejected() {
        let registry = registry();
        let profile = |name: &str, parent: &str| ProfileDescriptor {
            name: name.into(),
            description: String::new(),
            modules: ProfileModules::Explicit(BTreeSet::new()),
            extends: Some(parent.into()),
        };
        let err = ProfileCatalog::new(vec![profile("a", "b"), profile("b", "a")], "a", registry)
            .unwrap_err();
        assert!(matches!(err, ProfileError::InheritanceCycle { .. }));
    }

    #[test]
    fn test_cycle_in_selected_modules() {
        let registry = RegistryBuilder::new()
            .module("c", &["d"], &["loop"], ModuleScript::new())
            .module("d", &["c"], &[], ModuleScript::new())
            .build_unchecked();
        let catalog = ProfileCatalog::new(
            vec![ProfileDescriptor {
                name: "loop".into(),
                description: String::new(),
                modules: ProfileModules::Explicit(BTreeSet::new()),
                extends: None,
            }],
            "loop",
            registry,
        )
        .unwrap();

        assert_eq!(catalog.resolve("loop").unwrap(), ids(&["c", "d"]));
        assert!(matches!(
            catalog.load_order("loop"),
            Err(ProfileError::Module(ModuleError::CircularDependency { modules }))
                if modules == vec![module_id("c"), module_id("d")]
        ));
    }
}
