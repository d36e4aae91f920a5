//! Loadout Modules - the module side of the loadout module manager.
//!
//! This crate provides:
//! - [`ModuleDescriptor`] and the static [`ModuleRegistry`] of descriptors and factories
//! - Deterministic dependency ordering with cycle detection ([`resolver`])
//! - The [`Module`] provider contract and its [`RegistrationContext`]
//! - [`ModuleLoader`], which loads and unloads modules and owns the global
//!   [`ResourceRegistry`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use loadout_modules::{
//!     HostHandle, Module, ModuleDescriptor, ModuleId, ModuleLoader, ModuleRegistry,
//!     ModuleResult, RegistrationContext,
//! };
//!
//! struct Workspace;
//!
//! #[async_trait::async_trait]
//! impl Module for Workspace {
//!     async fn register(&mut self, ctx: &mut RegistrationContext<'_>) -> ModuleResult<usize> {
//!         ctx.register_resource("read_file")?;
//!         Ok(1)
//!     }
//! }
//!
//! # async fn example() -> ModuleResult<()> {
//! let mut registry = ModuleRegistry::new();
//! registry.register(
//!     ModuleDescriptor::new(ModuleId::new("workspace")?).in_profile("core"),
//!     || Box::new(Workspace) as Box<dyn Module>,
//! )?;
//! registry.validate()?;
//!
//! let mut loader = ModuleLoader::new(Arc::new(registry), HostHandle::empty());
//! let report = loader.load_module(&ModuleId::new("workspace")?).await;
//! assert!(report.is_loaded());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;
pub mod resolver;

mod context;
mod descriptor;
mod error;
mod id;
mod loader;
mod module;
mod registry;
mod resources;

pub use context::RegistrationContext;
pub use descriptor::{ModuleDescriptor, ProfileMembership};
pub use error::{ModuleError, ModuleResult, panic_message};
pub use id::ModuleId;
pub use loader::{
    DEFAULT_UNLOAD_TIMEOUT, LoadStats, LoadedModuleInfo, ModuleLoadReport, ModuleLoader,
};
pub use loadout_events::ModuleLoadStatus;
pub use module::{HostHandle, Module, ModuleFactory};
pub use registry::ModuleRegistry;
pub use resources::ResourceRegistry;
