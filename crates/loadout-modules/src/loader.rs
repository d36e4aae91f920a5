//! Module loader.
//!
//! Loads and unloads individual modules, invoking their registration and
//! cleanup contracts, and owns the global resource registry.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use loadout_events::{EventBus, EventMetadata, LoadoutEvent, ModuleLoadStatus};

use crate::ModuleId;
use crate::context::RegistrationContext;
use crate::error::{ModuleError, ModuleResult, panic_message};
use crate::module::{HostHandle, Module};
use crate::registry::ModuleRegistry;
use crate::resolver;
use crate::resources::ResourceRegistry;

/// Default bound on a single module's cleanup.
pub const DEFAULT_UNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_SOURCE: &str = "loadout-modules";

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Outcome of one load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLoadReport {
    /// Module the attempt was for.
    pub module_id: ModuleId,
    /// What happened.
    pub status: ModuleLoadStatus,
    /// Resources the module holds after the attempt.
    pub resource_count: usize,
    /// Wall time of the attempt in milliseconds.
    pub duration_ms: u64,
    /// Why the attempt failed.
    pub error: Option<ModuleError>,
}

impl ModuleLoadReport {
    fn skipped(module_id: ModuleId, resource_count: usize) -> Self {
        Self {
            module_id,
            status: ModuleLoadStatus::Skipped,
            resource_count,
            duration_ms: 0,
            error: None,
        }
    }

    fn failed(module_id: ModuleId, error: ModuleError, duration_ms: u64) -> Self {
        Self {
            module_id,
            status: ModuleLoadStatus::Failed,
            resource_count: 0,
            duration_ms,
            error: Some(error),
        }
    }

    /// Whether the module is loaded after this attempt.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.status != ModuleLoadStatus::Failed
    }

    /// Whether the attempt failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == ModuleLoadStatus::Failed
    }
}

/// Per-module load statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// How long registration took.
    pub load_time_ms: u64,
    /// How many resources the module registered.
    pub resource_count: usize,
}

/// Snapshot of one loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedModuleInfo {
    /// Module ID.
    pub module_id: ModuleId,
    /// Resources the module registered, in registration order.
    pub resources: Vec<String>,
    /// When the load finished.
    pub loaded_at: DateTime<Utc>,
    /// How long registration took.
    pub load_duration_ms: u64,
}

struct LoadedModule {
    instance: Box<dyn Module>,
    resources: Vec<String>,
    loaded_at: DateTime<Utc>,
    load_duration_ms: u64,
}

impl LoadedModule {
    fn info(&self, module_id: &ModuleId) -> LoadedModuleInfo {
        LoadedModuleInfo {
            module_id: module_id.clone(),
            resources: self.resources.clone(),
            loaded_at: self.loaded_at,
            load_duration_ms: self.load_duration_ms,
        }
    }
}

/// Loads and unloads modules and tracks which module owns which resource.
pub struct ModuleLoader {
    registry: Arc<ModuleRegistry>,
    host: HostHandle,
    resources: ResourceRegistry,
    loaded: BTreeMap<ModuleId, LoadedModule>,
    unload_timeout: Duration,
    event_bus: Option<EventBus>,
    correlation_id: Option<Uuid>,
}

impl ModuleLoader {
    /// Create a loader with nothing loaded.
    #[must_use]
    pub fn new(registry: Arc<ModuleRegistry>, host: HostHandle) -> Self {
        Self {
            registry,
            host,
            resources: ResourceRegistry::new(),
            loaded: BTreeMap::new(),
            unload_timeout: DEFAULT_UNLOAD_TIMEOUT,
            event_bus: None,
            correlation_id: None,
        }
    }

    /// Bound each module's cleanup by `timeout`.
    #[must_use]
    pub fn with_unload_timeout(mut self, timeout: Duration) -> Self {
        self.unload_timeout = timeout;
        self
    }

    /// Publish per-module events on `bus`.
    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Replace the cleanup bound.
    pub fn set_unload_timeout(&mut self, timeout: Duration) {
        self.unload_timeout = timeout;
    }

    /// Replace (or remove) the event bus.
    pub fn set_event_bus(&mut self, bus: Option<EventBus>) {
        self.event_bus = bus;
    }

    /// Tag subsequent events with a correlation ID.
    pub fn set_correlation_id(&mut self, id: Option<Uuid>) {
        self.correlation_id = id;
    }

    /// The registry modules are loaded from.
    #[must_use]
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// The cleanup bound.
    #[must_use]
    pub fn unload_timeout(&self) -> Duration {
        self.unload_timeout
    }

    /// The global resource registry.
    #[must_use]
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Whether a module is loaded.
    #[must_use]
    pub fn is_loaded(&self, id: &ModuleId) -> bool {
        self.loaded.contains_key(id)
    }

    /// IDs of every loaded module.
    #[must_use]
    pub fn loaded_ids(&self) -> BTreeSet<ModuleId> {
        self.loaded.keys().cloned().collect()
    }

    /// Number of loaded modules.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Snapshot of one loaded module.
    #[must_use]
    pub fn loaded_module(&self, id: &ModuleId) -> Option<LoadedModuleInfo> {
        self.loaded.get(id).map(|m| m.info(id))
    }

    /// Snapshot of every loaded module, in ID order.
    #[must_use]
    pub fn loaded_info(&self) -> Vec<LoadedModuleInfo> {
        self.loaded.iter().map(|(id, m)| m.info(id)).collect()
    }

    /// Load time and resource count of every loaded module.
    #[must_use]
    pub fn load_statistics(&self) -> BTreeMap<ModuleId, LoadStats> {
        self.loaded
            .iter()
            .map(|(id, m)| {
                (
                    id.clone(),
                    LoadStats {
                        load_time_ms: m.load_duration_ms,
                        resource_count: m.resources.len(),
                    },
                )
            })
            .collect()
    }

    /// Load a single module.
    ///
    /// Already loaded modules are skipped. A module whose dependencies are
    /// not loaded is refused. If the module's registration fails, or it
    /// claims a resource owned by another module, every resource it had
    /// claimed is released and the module stays unloaded. Failures are
    /// reported, never returned as `Err`.
    pub async fn load_module(&mut self, id: &ModuleId) -> ModuleLoadReport {
        let report = self.load_inner(id).await;
        self.publish_load(&report);
        report
    }

    async fn load_inner(&mut self, id: &ModuleId) -> ModuleLoadReport {
        if let Some(existing) = self.loaded.get(id) {
            debug!(module_id = %id, "Module already loaded, skipping");
            return ModuleLoadReport::skipped(id.clone(), existing.resources.len());
        }

        let registry = Arc::clone(&self.registry);
        let Some(descriptor) = registry.get(id) else {
            return ModuleLoadReport::failed(id.clone(), ModuleError::NotFound(id.clone()), 0);
        };

        if let Some(dependency) = descriptor
            .dependencies
            .iter()
            .find(|dep| !self.loaded.contains_key(*dep))
        {
            warn!(module_id = %id, dependency = %dependency, "Dependency not loaded");
            return ModuleLoadReport::failed(
                id.clone(),
                ModuleError::MissingDependency {
                    module_id: id.clone(),
                    dependency: dependency.clone(),
                },
                0,
            );
        }

        let start = Instant::now();
        let mut instance = match registry.instantiate(id) {
            Ok(instance) => instance,
            Err(e) => return ModuleLoadReport::failed(id.clone(), e, 0),
        };

        let span = info_span!("module", module_id = %id);
        let mut ctx = RegistrationContext::new(
            &descriptor.id,
            &descriptor.deferred_resources,
            &self.host,
            span.clone(),
            &mut self.resources,
        );
        let result = AssertUnwindSafe(instance.register(&mut ctx).instrument(span))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ModuleError::registration(
                    id,
                    format!("panicked: {}", panic_message(&*panic)),
                ))
            });
        let (registered, collision) = ctx.into_outcome();
        let duration_ms = elapsed_ms(start);

        let failure = match (result, collision) {
            (_, Some(collision)) => Some(collision),
            (Err(e), None) => Some(e),
            (Ok(count), None) => {
                if count != registered.len() {
                    debug!(
                        module_id = %id,
                        reported = count,
                        registered = registered.len(),
                        "Module reported a different resource count than it registered"
                    );
                }
                None
            },
        };

        if let Some(error) = failure {
            for resource in &registered {
                self.resources.release(resource, id);
            }
            warn!(
                module_id = %id,
                error = %error,
                rolled_back = registered.len(),
                "Module failed to load"
            );
            return ModuleLoadReport::failed(id.clone(), error, duration_ms);
        }

        info!(
            module_id = %id,
            resources = registered.len(),
            duration_ms,
            "Module loaded"
        );
        let resource_count = registered.len();
        self.loaded.insert(
            id.clone(),
            LoadedModule {
                instance,
                resources: registered,
                loaded_at: Utc::now(),
                load_duration_ms: duration_ms,
            },
        );

        ModuleLoadReport {
            module_id: id.clone(),
            status: ModuleLoadStatus::Success,
            resource_count,
            duration_ms,
            error: None,
        }
    }

    /// Load modules already in dependency order.
    ///
    /// A module whose dependency failed earlier in the same batch is not
    /// attempted and is reported as failed with
    /// [`ModuleError::DependencyFailed`].
    pub async fn load_ordered(&mut self, order: &[ModuleId]) -> Vec<ModuleLoadReport> {
        let registry = Arc::clone(&self.registry);
        let mut failed: BTreeSet<ModuleId> = BTreeSet::new();
        let mut reports = Vec::with_capacity(order.len());

        for id in order {
            let failed_dependency = registry
                .get(id)
                .and_then(|d| d.dependencies.iter().find(|dep| failed.contains(*dep)));

            let report = if let Some(dependency) = failed_dependency {
                warn!(module_id = %id, dependency = %dependency, "Skipping module, dependency failed");
                let report = ModuleLoadReport::failed(
                    id.clone(),
                    ModuleError::DependencyFailed {
                        module_id: id.clone(),
                        dependency: dependency.clone(),
                    },
                    0,
                );
                self.publish_load(&report);
                report
            } else {
                self.load_module(id).await
            };

            if report.is_failure() {
                failed.insert(id.clone());
            }
            reports.push(report);
        }

        reports
    }

    /// Resolve a load order for `ids` and load them.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::CircularDependency`] or
    /// [`ModuleError::NotFound`] before anything is loaded. Per-module
    /// failures are in the returned reports.
    pub async fn load_batch(
        &mut self,
        ids: &BTreeSet<ModuleId>,
    ) -> ModuleResult<Vec<ModuleLoadReport>> {
        let order = resolver::topological_order(&self.registry, ids)?;
        Ok(self.load_ordered(&order).await)
    }

    /// Unload a single module.
    ///
    /// Returns `Ok(false)` if the module was not loaded. The module's
    /// cleanup is bounded by the unload timeout; whether it succeeds, fails
    /// or times out, the module leaves the loaded set and its resources are
    /// released.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::CleanupFailed`] or
    /// [`ModuleError::UnloadTimeout`] after bookkeeping is done.
    pub async fn unload_module(&mut self, id: &ModuleId) -> ModuleResult<bool> {
        let Some(mut module) = self.loaded.remove(id) else {
            debug!(module_id = %id, "Module not loaded, nothing to unload");
            return Ok(false);
        };

        let still_needed: Vec<&ModuleId> = self
            .loaded
            .keys()
            .filter(|other| {
                self.registry
                    .get(other)
                    .is_some_and(|d| d.dependencies.contains(id))
            })
            .collect();
        if !still_needed.is_empty() {
            warn!(module_id = %id, dependents = ?still_needed, "Unloading a module that loaded modules depend on");
        }

        let span = info_span!("module", module_id = %id);
        let cleanup = AssertUnwindSafe(module.instance.cleanup().instrument(span)).catch_unwind();
        let outcome = match tokio::time::timeout(self.unload_timeout, cleanup).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ModuleError::CleanupFailed {
                module_id: id.clone(),
                message: e.to_string(),
            }),
            Ok(Err(panic)) => Err(ModuleError::CleanupFailed {
                module_id: id.clone(),
                message: format!("panicked: {}", panic_message(&*panic)),
            }),
            Err(_) => Err(ModuleError::UnloadTimeout {
                module_id: id.clone(),
                timeout_ms: u64::try_from(self.unload_timeout.as_millis())
                    .unwrap_or(u64::MAX),
            }),
        };

        let released = self.resources.release_owner(id);
        let clean = outcome.is_ok();
        match &outcome {
            Ok(()) => info!(module_id = %id, released = released.len(), "Module unloaded"),
            Err(e) => warn!(
                module_id = %id,
                released = released.len(),
                error = %e,
                "Module unloaded without clean shutdown"
            ),
        }

        self.publish(LoadoutEvent::ModuleUnloaded {
            metadata: self.metadata(),
            module_id: id.to_string(),
            clean,
        });

        outcome.map(|()| true)
    }

    /// Unload modules already in reverse dependency order, collecting
    /// cleanup errors instead of stopping at the first.
    pub async fn unload_ordered(&mut self, order: &[ModuleId]) -> Vec<ModuleError> {
        let mut errors = Vec::new();
        for id in order {
            if let Err(e) = self.unload_module(id).await {
                errors.push(e);
            }
        }
        errors
    }

    /// Unload the loaded members of `ids`, dependents first.
    pub async fn unload_batch(&mut self, ids: &BTreeSet<ModuleId>) -> Vec<ModuleError> {
        let present: BTreeSet<ModuleId> = ids
            .iter()
            .filter(|id| self.loaded.contains_key(*id))
            .cloned()
            .collect();
        let order = resolver::unload_order(&self.registry, &present).unwrap_or_else(|e| {
            warn!(error = %e, "Could not order unload, falling back to reverse ID order");
            present.iter().rev().cloned().collect()
        });
        self.unload_ordered(&order).await
    }

    /// Unload every loaded module, dependents first.
    pub async fn unload_all(&mut self) -> Vec<ModuleError> {
        let ids = self.loaded_ids();
        self.unload_batch(&ids).await
    }

    fn metadata(&self) -> EventMetadata {
        let metadata = EventMetadata::new(EVENT_SOURCE);
        match self.correlation_id {
            Some(id) => metadata.with_correlation_id(id),
            None => metadata,
        }
    }

    fn publish(&self, event: LoadoutEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    fn publish_load(&self, report: &ModuleLoadReport) {
        self.publish(LoadoutEvent::ModuleLoaded {
            metadata: self.metadata(),
            module_id: report.module_id.to_string(),
            status: report.status,
            resource_count: report.resource_count,
            duration_ms: report.duration_ms,
            error: report.error.as_ref().map(ToString::to_string),
        });
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .field("resources", &self.resources.len())
            .field("unload_timeout", &self.unload_timeout)
            .finish_non_exhaustive()
    }
}
