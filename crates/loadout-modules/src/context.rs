//! Registration context handed to a module while it loads.

use tracing::Span;

use crate::ModuleId;
use crate::error::{ModuleError, ModuleResult};
use crate::module::HostHandle;
use crate::resources::ResourceRegistry;

/// Everything a module sees during [`Module::register`](crate::Module::register).
///
/// Resource claims go straight into the global registry. The loader reads
/// back what was claimed so it can roll the claims back if the load fails.
pub struct RegistrationContext<'a> {
    module_id: &'a ModuleId,
    deferred_resources: &'a [String],
    host: &'a HostHandle,
    span: Span,
    resources: &'a mut ResourceRegistry,
    registered: Vec<String>,
    collision: Option<ModuleError>,
}

impl<'a> RegistrationContext<'a> {
    pub(crate) fn new(
        module_id: &'a ModuleId,
        deferred_resources: &'a [String],
        host: &'a HostHandle,
        span: Span,
        resources: &'a mut ResourceRegistry,
    ) -> Self {
        Self {
            module_id,
            deferred_resources,
            host,
            span,
            resources,
            registered: Vec::new(),
            collision: None,
        }
    }

    /// ID of the module being loaded.
    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        self.module_id
    }

    /// Resource names whose full initialization the module defers.
    #[must_use]
    pub fn deferred_resources(&self) -> &[String] {
        self.deferred_resources
    }

    /// Whether `resource` is declared as deferred for this module.
    #[must_use]
    pub fn is_deferred(&self, resource: &str) -> bool {
        self.deferred_resources.iter().any(|r| r == resource)
    }

    /// Opaque handle to the host application.
    #[must_use]
    pub fn host(&self) -> &HostHandle {
        self.host
    }

    /// Module-scoped logging span.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Claim a named resource for this module.
    ///
    /// Claiming a name this module already owns is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::ResourceCollision`] if another module owns the
    /// name. The collision is remembered, so the load fails even if the
    /// module ignores this error.
    pub fn register_resource(&mut self, name: impl Into<String>) -> ModuleResult<()> {
        let name = name.into();
        match self.resources.claim(&name, self.module_id) {
            Ok(true) => {
                self.span.in_scope(|| {
                    tracing::trace!(resource = %name, "Registered resource");
                });
                self.registered.push(name);
                Ok(())
            },
            Ok(false) => Ok(()),
            Err(e) => {
                if self.collision.is_none() {
                    self.collision = Some(e.clone());
                }
                Err(e)
            },
        }
    }

    /// Resources claimed through this context so far, in claim order.
    #[must_use]
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    pub(crate) fn into_outcome(self) -> (Vec<String>, Option<ModuleError>) {
        (self.registered, self.collision)
    }
}

impl std::fmt::Debug for RegistrationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationContext")
            .field("module_id", self.module_id)
            .field("deferred_resources", &self.deferred_resources)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_tracks_claims() {
        let id = ModuleId::from_static("git");
        let deferred = vec!["git_log".to_string()];
        let host = HostHandle::empty();
        let mut registry = ResourceRegistry::new();

        let mut ctx = RegistrationContext::new(&id, &deferred, &host, Span::none(), &mut registry);
        assert!(ctx.is_deferred("git_log"));
        ctx.register_resource("git_status").unwrap();
        ctx.register_resource("git_status").unwrap();
        ctx.register_resource("git_log").unwrap();
        assert_eq!(ctx.registered(), ["git_status", "git_log"]);

        let (registered, collision) = ctx.into_outcome();
        assert_eq!(registered.len(), 2);
        assert!(collision.is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_collision_is_remembered() {
        let owner = ModuleId::from_static("shell");
        let id = ModuleId::from_static("build");
        let host = HostHandle::empty();
        let mut registry = ResourceRegistry::new();
        registry.claim("build", &owner).unwrap();

        let mut ctx = RegistrationContext::new(&id, &[], &host, Span::none(), &mut registry);
        let _ = ctx.register_resource("build");
        ctx.register_resource("lint").unwrap();

        let (registered, collision) = ctx.into_outcome();
        assert_eq!(registered, vec!["lint"]);
        assert!(matches!(
            collision,
            Some(ModuleError::ResourceCollision { ref resource, .. }) if resource == "build"
        ));
        assert_eq!(registry.owner("build"), Some(&owner));
    }
}
