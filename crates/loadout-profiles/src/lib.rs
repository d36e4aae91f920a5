//! Loadout Profiles - profile catalog and switching for the loadout module
//! manager.
//!
//! This crate provides:
//! - [`ProfileCatalog`]: profiles from configuration, expanded into module sets
//! - [`ProfileManager`]: the serialized, transactional profile switch
//! - [`ProfileRecommender`]: picks a profile from contextual signals
//! - [`UsageTracker`]: suggests broader profiles from recent tool usage
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use loadout_config::{LoadOptions, ProfilesConfig};
//! use loadout_modules::{HostHandle, ModuleRegistry};
//! use loadout_profiles::ProfileManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loaded = ProfilesConfig::load(&LoadOptions::from_env())?;
//! let registry = Arc::new(ModuleRegistry::new());
//! let manager = ProfileManager::from_config(&loaded.config, registry, HostHandle::empty())?;
//!
//! let report = manager.initialize().await;
//! assert!(report.success);
//!
//! let report = manager.switch_profile("full", false).await;
//! if !report.success {
//!     eprintln!("switch failed: {:?}", report.failure);
//! }
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

mod catalog;
mod error;
mod manager;
mod plan;
mod recommender;
mod usage;

pub use catalog::{ProfileCatalog, ProfileDescriptor, ProfileModules};
pub use error::{ProfileError, ProfileResult};
pub use manager::{ActiveProfileState, ProfileManager, SwitchFailure, SwitchReport, SwitchState};
pub use plan::SwitchPlan;
pub use recommender::{
    ProfileRecommender, Recommendation, RecommendationContext, RecommendationSource,
};
pub use usage::{DEFAULT_UPGRADE_THRESHOLD, DEFAULT_USAGE_WINDOW, UpgradeSuggestion, UsageTracker};
