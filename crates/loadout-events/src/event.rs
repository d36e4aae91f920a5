//! Event types for the loadout event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Correlation ID tying together events from one switch.
    pub correlation_id: Option<Uuid>,
    /// Source component that generated the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: None,
            source: source.into(),
        }
    }

    /// Set correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Outcome of a single module load attempt, as reported on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleLoadStatus {
    /// The module registered successfully.
    Success,
    /// The module failed to register and was left unloaded.
    Failed,
    /// The module was already loaded; nothing happened.
    Skipped,
}

impl std::fmt::Display for ModuleLoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

/// All events emitted by the module manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadoutEvent {
    /// A switch committed and the active profile changed.
    ProfileChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// Previous profile, `None` on first activation.
        from: Option<String>,
        /// New profile.
        to: String,
        /// Modules that stayed loaded.
        kept: usize,
        /// Modules that were unloaded.
        unloaded: usize,
        /// Modules that were loaded.
        loaded: usize,
        /// Whether load failures were forced past.
        forced: bool,
        /// Total switch duration in milliseconds.
        duration_ms: u64,
    },

    /// A module load attempt finished.
    ModuleLoaded {
        /// Event metadata.
        metadata: EventMetadata,
        /// Module ID.
        module_id: String,
        /// Outcome.
        status: ModuleLoadStatus,
        /// Resources the module registered.
        resource_count: usize,
        /// Load duration in milliseconds.
        duration_ms: u64,
        /// Error message when the load failed.
        error: Option<String>,
    },

    /// A module was unloaded.
    ModuleUnloaded {
        /// Event metadata.
        metadata: EventMetadata,
        /// Module ID.
        module_id: String,
        /// Whether the module's cleanup finished cleanly within its timeout.
        clean: bool,
    },

    /// A switch failed and the previous module set was restored.
    SwitchRolledBack {
        /// Event metadata.
        metadata: EventMetadata,
        /// Profile that stayed active.
        profile: Option<String>,
        /// Profile that was attempted.
        attempted: String,
        /// Errors that caused the rollback.
        errors: Vec<String>,
    },

    /// Recent tool usage suggests a broader profile.
    UpgradeSuggested {
        /// Event metadata.
        metadata: EventMetadata,
        /// Capability category seen in recent usage.
        category: String,
        /// Module providing the category.
        module_id: String,
        /// Profile that would include the module.
        profile: String,
        /// Matching invocations in the usage window.
        hits: usize,
    },
}

impl LoadoutEvent {
    /// Stable, snake-case name of the event variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProfileChanged { .. } => "profile_changed",
            Self::ModuleLoaded { .. } => "module_loaded",
            Self::ModuleUnloaded { .. } => "module_unloaded",
            Self::SwitchRolledBack { .. } => "switch_rolled_back",
            Self::UpgradeSuggested { .. } => "upgrade_suggested",
        }
    }

    /// Metadata of the event.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::ProfileChanged { metadata, .. }
            | Self::ModuleLoaded { metadata, .. }
            | Self::ModuleUnloaded { metadata, .. }
            | Self::SwitchRolledBack { metadata, .. }
            | Self::UpgradeSuggested { metadata, .. } => metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = LoadoutEvent::ModuleUnloaded {
            metadata: EventMetadata::new("test"),
            module_id: "git".into(),
            clean: true,
        };
        assert_eq!(event.event_type(), "module_unloaded");
        assert_eq!(event.metadata().source, "test");
    }

    #[test]
    fn test_profile_changed_serializes_with_tag() {
        let event = LoadoutEvent::ProfileChanged {
            metadata: EventMetadata::new("manager"),
            from: Some("core".into()),
            to: "dev".into(),
            kept: 2,
            unloaded: 0,
            loaded: 1,
            forced: false,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "profile_changed");
        assert_eq!(json["to"], "dev");
        assert_eq!(json["loaded"], 1);
    }

    #[test]
    fn test_correlation_id() {
        let id = Uuid::new_v4();
        let meta = EventMetadata::new("manager").with_correlation_id(id);
        assert_eq!(meta.correlation_id, Some(id));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ModuleLoadStatus::Skipped.to_string(), "skipped");
    }
}
