#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Declarative profile configuration for the loadout module manager.
//!
//! This crate provides the [`ProfilesConfig`] type read from `profiles.toml`:
//! profile definitions (explicit module lists or `"all"`, single-parent
//! `extends`), recommender tables, switch settings and logging settings.
//!
//! # Usage
//!
//! ```rust,no_run
//! use loadout_config::{LoadOptions, ProfilesConfig};
//!
//! let loaded = ProfilesConfig::load(&LoadOptions::from_env().with_workspace(".")).unwrap();
//! println!("default profile: {}", loaded.config.default_profile);
//! ```
//!
//! # Discovery
//!
//! First existing file wins:
//!
//! 1. An explicit path
//! 2. `$LOADOUT_CONFIG`
//! 3. `{workspace}/.loadout/profiles.toml`
//! 4. `~/.loadout/profiles.toml`
//!
//! When none exists the embedded `defaults.toml` is written to the first
//! location that accepts it and loaded from there.
//!
//! # Design
//!
//! This crate has **no dependencies on other internal loadout crates**.
//! Module ids are plain strings here; the profile catalog checks them against
//! the module registry.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_ENV_VAR, DEFAULTS_TOML, LoadOptions, LoadedConfig};
pub use types::*;

impl ProfilesConfig {
    /// Locate and load the configuration, synthesizing defaults if needed.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is malformed, invalid,
    /// or cannot be found or synthesized anywhere.
    pub fn load(options: &LoadOptions) -> ConfigResult<LoadedConfig> {
        loader::load(options)
    }

    /// Load configuration from a single file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the text is malformed or fails validation.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        loader::load_str(content, "<inline>")
    }
}
