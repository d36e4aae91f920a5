//! Prelude module - commonly used types for convenient import.
//!
//! Use `use loadout_modules::prelude::*;` to import all essential types.

pub use crate::{
    HostHandle, Module, ModuleDescriptor, ModuleError, ModuleId, ModuleLoader, ModuleRegistry,
    ModuleResult, RegistrationContext,
};
