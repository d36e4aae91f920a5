//! Profile error types.

use loadout_config::ConfigError;
use loadout_modules::ModuleError;

/// Errors from catalog construction, profile resolution and recommender setup.
///
/// Switch failures are not errors; see
/// [`SwitchReport`](crate::SwitchReport).
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The profile is not in the catalog.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    /// A profile lists a module the registry does not know.
    #[error("profile {profile} references unknown module {module}")]
    UnknownModule {
        /// The referencing profile.
        profile: String,
        /// The unknown module ID.
        module: String,
    },

    /// `extends` chains loop back on themselves.
    #[error("profile inheritance cycle: {}", .profiles.join(" -> "))]
    InheritanceCycle {
        /// The profiles on the cycle, in `extends` order.
        profiles: Vec<String>,
    },

    /// A recommender or usage glob failed to compile.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// Module registry or resolver error.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for profile operations.
pub type ProfileResult<T> = Result<T, ProfileError>;
