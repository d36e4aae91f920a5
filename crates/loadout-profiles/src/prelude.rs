//! Prelude module - commonly used types for convenient import.
//!
//! Use `use loadout_profiles::prelude::*;` to import all essential types.

pub use crate::{
    ActiveProfileState, ProfileCatalog, ProfileError, ProfileManager, ProfileRecommender,
    ProfileResult, RecommendationContext, SwitchReport,
};
