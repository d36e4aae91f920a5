//! Global resource registry.
//!
//! Maps every registered resource name to the single module that owns it.

use std::collections::BTreeMap;

use tracing::debug;

use crate::ModuleId;
use crate::error::{ModuleError, ModuleResult};

/// Resource name to owning module.
///
/// At most one owner exists per name at any time. A claim by a different
/// module is a [`ModuleError::ResourceCollision`]; a repeated claim by the
/// current owner is accepted and changes nothing.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    owners: BTreeMap<String, ModuleId>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `resource` for `owner`.
    ///
    /// Returns `true` when the claim is new and `false` when `owner` already
    /// held it.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::ResourceCollision`] if another module owns the
    /// resource.
    pub fn claim(&mut self, resource: &str, owner: &ModuleId) -> ModuleResult<bool> {
        match self.owners.get(resource) {
            Some(existing) if existing == owner => Ok(false),
            Some(existing) => Err(ModuleError::ResourceCollision {
                resource: resource.to_string(),
                owner: existing.clone(),
                claimant: owner.clone(),
            }),
            None => {
                debug!(resource, module_id = %owner, "Resource claimed");
                self.owners.insert(resource.to_string(), owner.clone());
                Ok(true)
            },
        }
    }

    /// Release one resource if `owner` holds it.
    pub fn release(&mut self, resource: &str, owner: &ModuleId) -> bool {
        if self.owners.get(resource) == Some(owner) {
            self.owners.remove(resource);
            true
        } else {
            false
        }
    }

    /// Release every resource owned by `owner`, returning their names.
    pub fn release_owner(&mut self, owner: &ModuleId) -> Vec<String> {
        let released = self.resources_of(owner);
        self.owners.retain(|_, o| o != owner);
        if !released.is_empty() {
            debug!(module_id = %owner, count = released.len(), "Resources released");
        }
        released
    }

    /// The owner of `resource`, if any.
    #[must_use]
    pub fn owner(&self, resource: &str) -> Option<&ModuleId> {
        self.owners.get(resource)
    }

    /// Every resource owned by `owner`, sorted.
    #[must_use]
    pub fn resources_of(&self, owner: &ModuleId) -> Vec<String> {
        self.owners
            .iter()
            .filter(|(_, o)| *o == owner)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no resources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Iterate `(resource, owner)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleId)> {
        self.owners.iter().map(|(name, owner)| (name.as_str(), owner))
    }

    /// Owned copy of the mapping.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, ModuleId> {
        self.owners.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_collision() {
        let mut reg = ResourceRegistry::new();
        let a = ModuleId::from_static("a");
        let b = ModuleId::from_static("b");

        assert!(reg.claim("build", &a).unwrap());
        assert!(!reg.claim("build", &a).unwrap());

        let err = reg.claim("build", &b).unwrap_err();
        assert!(matches!(
            err,
            ModuleError::ResourceCollision { ref owner, ref claimant, .. }
                if owner == &a && claimant == &b
        ));
        assert_eq!(reg.owner("build"), Some(&a));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_release_owner() {
        let mut reg = ResourceRegistry::new();
        let a = ModuleId::from_static("a");
        let b = ModuleId::from_static("b");
        reg.claim("x", &a).unwrap();
        reg.claim("y", &a).unwrap();
        reg.claim("z", &b).unwrap();

        assert_eq!(reg.release_owner(&a), vec!["x", "y"]);
        assert_eq!(reg.len(), 1);
        assert!(reg.release_owner(&a).is_empty());
        assert_eq!(reg.owner("z"), Some(&b));
    }

    #[test]
    fn test_release_checks_owner() {
        let mut reg = ResourceRegistry::new();
        let a = ModuleId::from_static("a");
        let b = ModuleId::from_static("b");
        reg.claim("x", &a).unwrap();

        assert!(!reg.release("x", &b));
        assert!(reg.release("x", &a));
        assert!(reg.is_empty());
    }
}
