//! Module provider contract.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RegistrationContext;
use crate::error::ModuleResult;

/// An optional unit of functionality that can be loaded and unloaded.
///
/// A fresh instance is created by the module's factory for every load.
#[async_trait]
pub trait Module: Send + Sync {
    /// Register the module's resources with the host.
    ///
    /// Every resource must be claimed through
    /// [`RegistrationContext::register_resource`]. Returns the number of
    /// resources registered.
    async fn register(&mut self, ctx: &mut RegistrationContext<'_>) -> ModuleResult<usize>;

    /// Release whatever `register` set up. Called on unload, bounded by the
    /// loader's unload timeout.
    async fn cleanup(&mut self) -> ModuleResult<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module").finish_non_exhaustive()
    }
}

/// Creates module instances. Resolved by module ID at process start.
pub type ModuleFactory = Arc<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// Opaque reference to the surrounding application, passed through to
/// modules unexamined.
#[derive(Clone)]
pub struct HostHandle(Arc<dyn Any + Send + Sync>);

impl HostHandle {
    /// Wrap a host object.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(host: T) -> Self {
        Self(Arc::new(host))
    }

    /// Wrap an already shared host object.
    #[must_use]
    pub fn from_arc(host: Arc<dyn Any + Send + Sync>) -> Self {
        Self(host)
    }

    /// A handle carrying no host.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(())
    }

    /// Borrow the host as `T`, if that is what it is.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Default for HostHandle {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Host {
        name: &'static str,
    }

    #[test]
    fn test_host_downcast() {
        let handle = HostHandle::new(Host { name: "app" });
        assert_eq!(handle.downcast_ref::<Host>().unwrap().name, "app");
        assert!(handle.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_empty_host() {
        let handle = HostHandle::default();
        assert!(handle.downcast_ref::<()>().is_some());
    }

    #[tokio::test]
    async fn test_default_cleanup_is_ok() {
        struct Bare;

        #[async_trait]
        impl Module for Bare {
            async fn register(&mut self, _ctx: &mut RegistrationContext<'_>) -> ModuleResult<usize> {
                Ok(0)
            }
        }

        assert!(Bare.cleanup().await.is_ok());
    }
}
