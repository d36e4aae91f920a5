//! Shared test harness for integration tests.

use std::sync::Arc;

use loadout_events::{EventBus, EventReceiver};
use loadout_modules::{HostHandle, ModuleRegistry};
use loadout_profiles::ProfileManager;
use loadout_test::{Journal, TestHost, config_from_toml, init_test_logging};

/// Name of the [`TestHost`] every harness hands to its modules.
#[allow(dead_code)]
pub const HOST_NAME: &str = "integration";

/// A manager wired to an event bus, with a receiver subscribed before any
/// switch runs.
#[allow(dead_code)]
pub struct Harness {
    /// The manager under test.
    pub manager: Arc<ProfileManager>,
    /// Every event the manager publishes.
    pub events: EventReceiver,
    /// Lifecycle journal shared by the scripted modules.
    pub journal: Journal,
}

#[allow(dead_code)]
impl Harness {
    /// Build a harness from a registry and a TOML profile configuration.
    pub fn new(registry: Arc<ModuleRegistry>, config: &str, journal: Journal) -> Self {
        init_test_logging();
        let bus = EventBus::new();
        let events = bus.subscribe();
        let manager = ProfileManager::from_config(
            &config_from_toml(config),
            registry,
            HostHandle::new(TestHost::new(HOST_NAME)),
        )
        .expect("manager should build")
        .with_event_bus(bus);
        Self {
            manager: Arc::new(manager),
            events,
            journal,
        }
    }

    /// Names of the loaded modules, sorted.
    pub fn loaded(&self) -> Vec<String> {
        self.manager
            .active()
            .module_ids()
            .into_iter()
            .map(|id| id.to_string())
            .collect()
    }

    /// Event type names received so far.
    pub fn event_types(&mut self) -> Vec<&'static str> {
        self.events
            .drain()
            .iter()
            .map(|e| e.event_type())
            .collect()
    }
}
