//! Static module descriptors.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ModuleId;

/// Which profiles a module declares itself part of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMembership {
    /// Active in every profile.
    All,
    /// Active in the named profiles (and profiles extending them).
    Named(BTreeSet<String>),
}

impl ProfileMembership {
    /// Whether the module is a member of `profile`.
    #[must_use]
    pub fn includes(&self, profile: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(profile),
        }
    }
}

impl Default for ProfileMembership {
    fn default() -> Self {
        Self::Named(BTreeSet::new())
    }
}

/// Immutable description of a module, fixed at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique module ID.
    pub id: ModuleId,
    /// Display name.
    pub name: String,
    /// What the module provides.
    pub description: String,
    /// Profiles the module declares membership in.
    pub profiles: ProfileMembership,
    /// Load-order tie-break among independent modules; lower loads first.
    pub priority: i32,
    /// Modules that must be loaded before this one.
    pub dependencies: Vec<ModuleId>,
    /// Resource names the module defers full initialization for.
    pub deferred_resources: Vec<String>,
    /// Module version.
    pub version: String,
}

impl ModuleDescriptor {
    /// A descriptor with no dependencies, priority 0 and no profile membership.
    #[must_use]
    pub fn new(id: ModuleId) -> Self {
        Self {
            name: id.to_string(),
            id,
            description: String::new(),
            profiles: ProfileMembership::default(),
            priority: 0,
            dependencies: Vec::new(),
            deferred_resources: Vec::new(),
            version: "0.1.0".to_string(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a dependency.
    #[must_use]
    pub fn depends_on(mut self, dependency: ModuleId) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Declare membership in a named profile.
    #[must_use]
    pub fn in_profile(mut self, profile: impl Into<String>) -> Self {
        match &mut self.profiles {
            ProfileMembership::All => {},
            ProfileMembership::Named(names) => {
                names.insert(profile.into());
            },
        }
        self
    }

    /// Declare membership in every profile.
    #[must_use]
    pub fn in_all_profiles(mut self) -> Self {
        self.profiles = ProfileMembership::All;
        self
    }

    /// Declare a deferred-initialization resource hint.
    #[must_use]
    pub fn with_deferred_resource(mut self, resource: impl Into<String>) -> Self {
        self.deferred_resources.push(resource.into());
        self
    }

    /// Set the version string.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let d = ModuleDescriptor::new(ModuleId::from_static("git"))
            .with_priority(-1)
            .depends_on(ModuleId::from_static("workspace"))
            .depends_on(ModuleId::from_static("workspace"))
            .in_profile("dev")
            .with_deferred_resource("git_log");

        assert_eq!(d.name, "git");
        assert_eq!(d.priority, -1);
        assert_eq!(d.dependencies.len(), 1);
        assert!(d.profiles.includes("dev"));
        assert!(!d.profiles.includes("core"));
        assert_eq!(d.deferred_resources, vec!["git_log"]);
    }

    #[test]
    fn test_all_membership_wins() {
        let d = ModuleDescriptor::new(ModuleId::from_static("core"))
            .in_all_profiles()
            .in_profile("dev");
        assert_eq!(d.profiles, ProfileMembership::All);
        assert!(d.profiles.includes("anything"));
    }
}
