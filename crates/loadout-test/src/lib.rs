//! Loadout Test - Shared test utilities for the loadout module manager.
//!
//! This crate provides scripted module implementations and registry fixtures
//! that can be used across loadout crates as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! loadout-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use loadout_test::{Journal, ModuleScript, RegistryBuilder};
//!
//! let journal = Journal::new();
//! let registry = RegistryBuilder::new()
//!     .module("workspace", &[], &["core"], ModuleScript::new().with_journal(&journal))
//!     .build();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
