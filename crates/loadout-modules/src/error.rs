//! Module error types.

use std::any::Any;

use crate::ModuleId;

/// Errors from module registry, resolver and loader operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// The module ID is malformed.
    #[error("invalid module id: {0}")]
    InvalidId(String),

    /// The requested module is not in the registry.
    #[error("module not found: {0}")]
    NotFound(ModuleId),

    /// A module with this ID is already in the registry.
    #[error("module already registered: {0}")]
    AlreadyRegistered(ModuleId),

    /// A module declares a dependency the registry does not know.
    #[error("module {module_id} depends on unknown module {dependency}")]
    UnknownDependency {
        /// The declaring module.
        module_id: ModuleId,
        /// The unknown dependency.
        dependency: ModuleId,
    },

    /// The dependency graph could not be ordered.
    #[error("circular dependency among modules: {}", join_ids(.modules))]
    CircularDependency {
        /// Every module that could not be ordered, sorted.
        modules: Vec<ModuleId>,
    },

    /// A resource name is already owned by another module.
    #[error("resource '{resource}' claimed by {claimant} is already owned by {owner}")]
    ResourceCollision {
        /// The contested resource name.
        resource: String,
        /// The module that owns it.
        owner: ModuleId,
        /// The module that tried to claim it.
        claimant: ModuleId,
    },

    /// The module's own registration logic failed.
    #[error("module {module_id} failed to register: {message}")]
    RegistrationFailed {
        /// The failing module.
        module_id: ModuleId,
        /// Failure reason.
        message: String,
    },

    /// A dependency was not loaded when the module was loaded.
    #[error("module {module_id} requires {dependency}, which is not loaded")]
    MissingDependency {
        /// The module being loaded.
        module_id: ModuleId,
        /// The absent dependency.
        dependency: ModuleId,
    },

    /// A dependency failed earlier in the same batch.
    #[error("module {module_id} skipped because dependency {dependency} failed")]
    DependencyFailed {
        /// The skipped module.
        module_id: ModuleId,
        /// The dependency that failed.
        dependency: ModuleId,
    },

    /// The module's cleanup hook returned an error.
    #[error("module {module_id} cleanup failed: {message}")]
    CleanupFailed {
        /// The module being unloaded.
        module_id: ModuleId,
        /// Failure reason.
        message: String,
    },

    /// The module's cleanup hook did not finish in time.
    #[error("module {module_id} cleanup timed out after {timeout_ms} ms")]
    UnloadTimeout {
        /// The module being unloaded.
        module_id: ModuleId,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },
}

impl ModuleError {
    /// Build a [`ModuleError::RegistrationFailed`].
    pub fn registration(module_id: &ModuleId, message: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            module_id: module_id.clone(),
            message: message.into(),
        }
    }

    /// The module the error is about, when there is exactly one.
    #[must_use]
    pub fn module_id(&self) -> Option<&ModuleId> {
        match self {
            Self::NotFound(id) | Self::AlreadyRegistered(id) => Some(id),
            Self::UnknownDependency { module_id, .. }
            | Self::RegistrationFailed { module_id, .. }
            | Self::MissingDependency { module_id, .. }
            | Self::DependencyFailed { module_id, .. }
            | Self::CleanupFailed { module_id, .. }
            | Self::UnloadTimeout { module_id, .. } => Some(module_id),
            Self::ResourceCollision { claimant, .. } => Some(claimant),
            Self::InvalidId(_) | Self::CircularDependency { .. } => None,
        }
    }
}

fn join_ids(ids: &[ModuleId]) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Text of a caught panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
