//! Profile manager.
//!
//! Drives profile switches: diff the loaded module set against the target
//! profile, unload what is no longer needed, load what is missing, then
//! commit or roll back.
//!
//! # Concurrency
//!
//! The [`ModuleLoader`] lives inside a `tokio::sync::Mutex`, which is the
//! switch lock: concurrent switches queue on it in arrival order and run one
//! after another. A switch that holds the lock runs as a spawned task that
//! owns the guard, so a caller giving up mid switch cannot leave the loader
//! and the published state apart. Readers never take the lock. After every switch the manager
//! publishes an immutable [`ActiveProfileState`] snapshot by swapping an
//! `Arc` under a short `std::sync::RwLock`, so a reader sees either the
//! state before a switch or the state after it.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use loadout_config::{ProfilesConfig, SwitchingSection, UnloadTimeoutPolicy};
use loadout_events::{EventBus, EventMetadata, LoadoutEvent};
use loadout_modules::{
    DEFAULT_UNLOAD_TIMEOUT, HostHandle, LoadStats, LoadedModuleInfo, ModuleError, ModuleId,
    ModuleLoadReport, ModuleLoadStatus, ModuleLoader, ModuleRegistry, panic_message, resolver,
};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::catalog::ProfileCatalog;
use crate::error::ProfileResult;
use crate::plan::SwitchPlan;
use crate::usage::{UpgradeSuggestion, UsageTracker};

const EVENT_SOURCE: &str = "loadout-profiles";

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Whether a switch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    /// No switch in progress.
    Idle,
    /// A switch holds the switch lock.
    Switching,
}

/// Consistent view of what is active, published after every switch.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveProfileState {
    /// Active profile; `None` before the first switch and after shutdown.
    pub profile: Option<String>,
    /// Loaded modules, in ID order.
    pub modules: Vec<LoadedModuleInfo>,
    /// Resource name to owning module.
    pub resources: BTreeMap<String, ModuleId>,
    /// Whether the last commit forced past load failures.
    pub forced: bool,
    /// When this snapshot was published.
    pub updated_at: DateTime<Utc>,
}

impl ActiveProfileState {
    fn empty() -> Self {
        Self {
            profile: None,
            modules: Vec::new(),
            resources: BTreeMap::new(),
            forced: false,
            updated_at: Utc::now(),
        }
    }

    fn capture(profile: Option<String>, loader: &ModuleLoader, forced: bool) -> Self {
        Self {
            profile,
            modules: loader.loaded_info(),
            resources: loader.resources().snapshot(),
            forced,
            updated_at: Utc::now(),
        }
    }

    /// IDs of the loaded modules.
    #[must_use]
    pub fn module_ids(&self) -> BTreeSet<ModuleId> {
        self.modules.iter().map(|m| m.module_id.clone()).collect()
    }

    /// Whether a module is loaded.
    #[must_use]
    pub fn is_loaded(&self, id: &ModuleId) -> bool {
        self.modules.iter().any(|m| &m.module_id == id)
    }

    /// Owner of a resource.
    #[must_use]
    pub fn resource_owner(&self, resource: &str) -> Option<&ModuleId> {
        self.resources.get(resource)
    }

    /// Load time and resource count per loaded module.
    #[must_use]
    pub fn load_statistics(&self) -> BTreeMap<ModuleId, LoadStats> {
        self.modules
            .iter()
            .map(|m| {
                (
                    m.module_id.clone(),
                    LoadStats {
                        load_time_ms: m.load_duration_ms,
                        resource_count: m.resources.len(),
                    },
                )
            })
            .collect()
    }
}

/// Why a switch did not commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwitchFailure {
    /// The target is not in the catalog.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    /// The target's modules cannot be ordered.
    #[error("circular dependency among modules: {}", join_ids(.0))]
    CircularDependency(Vec<ModuleId>),

    /// The target could not be expanded into modules.
    #[error("profile resolution failed: {0}")]
    Resolution(String),

    /// Modules failed to load and the switch was not forced.
    #[error("modules failed to load: {}", join_ids(.modules))]
    LoadFailed {
        /// Every module that failed, in load order.
        modules: Vec<ModuleId>,
    },

    /// Module cleanups failed under [`UnloadTimeoutPolicy::Fail`].
    #[error("modules failed to unload: {}", join_ids(.modules))]
    UnloadFailed {
        /// Every module whose cleanup failed or timed out.
        modules: Vec<ModuleId>,
    },

    /// The switch panicked or its task was cancelled. The published state
    /// shows what the loader held afterwards.
    #[error("switch aborted: {0}")]
    Aborted(String),
}

fn join_ids(ids: &[ModuleId]) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything that happened during one switch.
#[derive(Debug, Clone)]
pub struct SwitchReport {
    /// Correlation ID shared by the switch's log span and events.
    pub switch_id: Uuid,
    /// Profile active before the switch.
    pub from: Option<String>,
    /// Requested profile.
    pub to: String,
    /// Whether the target is now active.
    pub success: bool,
    /// Whether load failures were forced past.
    pub forced: bool,
    /// Modules that stayed loaded.
    pub kept: Vec<ModuleId>,
    /// Modules unloaded, in unload order.
    pub unloaded: Vec<ModuleId>,
    /// Modules loaded, in load order.
    pub loaded: Vec<ModuleId>,
    /// One entry per load attempt, in load order.
    pub module_results: Vec<ModuleLoadReport>,
    /// Cleanup failures and timeouts.
    pub unload_warnings: Vec<ModuleError>,
    /// Why the switch did not commit.
    pub failure: Option<SwitchFailure>,
    /// Failures while restoring the previous module set.
    pub rollback_errors: Vec<ModuleError>,
    /// Total wall time in milliseconds.
    pub duration_ms: u64,
}

impl SwitchReport {
    fn new(switch_id: Uuid, from: Option<String>, to: &str) -> Self {
        Self {
            switch_id,
            from,
            to: to.to_string(),
            success: false,
            forced: false,
            kept: Vec::new(),
            unloaded: Vec::new(),
            loaded: Vec::new(),
            module_results: Vec::new(),
            unload_warnings: Vec::new(),
            failure: None,
            rollback_errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Modules whose load attempt failed.
    #[must_use]
    pub fn failed_modules(&self) -> Vec<&ModuleId> {
        self.module_results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| &r.module_id)
            .collect()
    }

    /// Whether nothing was loaded or unloaded.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.unloaded.is_empty() && self.module_results.is_empty()
    }
}

/// Marks the manager as switching until dropped.
struct SwitchingGuard(Arc<AtomicBool>);

impl SwitchingGuard {
    fn new(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for SwitchingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handles shared by the manager and its switch tasks.
#[derive(Clone)]
struct Shared {
    catalog: Arc<ProfileCatalog>,
    state: Arc<RwLock<Arc<ActiveProfileState>>>,
    switching: Arc<AtomicBool>,
    event_bus: Option<EventBus>,
    unload_policy: UnloadTimeoutPolicy,
    usage: Arc<Mutex<UsageTracker>>,
}

impl Shared {
    fn active(&self) -> Arc<ActiveProfileState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn publish_state(&self, state: ActiveProfileState) {
        let mut guard = self.state.write().unwrap_or_else(|poisoned| {
            warn!("Active profile state lock poisoned, recovering");
            poisoned.into_inner()
        });
        *guard = Arc::new(state);
    }

    fn publish_event(&self, event: LoadoutEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

/// Owns the active module set and switches it between profiles.
pub struct ProfileManager {
    loader: Arc<AsyncMutex<ModuleLoader>>,
    shared: Shared,
    unload_timeout: Duration,
}

impl ProfileManager {
    /// Create a manager with nothing loaded.
    ///
    /// Call [`ProfileManager::initialize`] to activate the default profile.
    #[must_use]
    pub fn new(catalog: ProfileCatalog, host: HostHandle) -> Self {
        let loader = ModuleLoader::new(Arc::clone(catalog.registry()), host);
        Self {
            loader: Arc::new(AsyncMutex::new(loader)),
            shared: Shared {
                catalog: Arc::new(catalog),
                state: Arc::new(RwLock::new(Arc::new(ActiveProfileState::empty()))),
                switching: Arc::new(AtomicBool::new(false)),
                event_bus: None,
                unload_policy: UnloadTimeoutPolicy::default(),
                usage: Arc::new(Mutex::new(UsageTracker::default())),
            },
            unload_timeout: DEFAULT_UNLOAD_TIMEOUT,
        }
    }

    /// Build the catalog, switch settings and usage tracker from
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`](crate::ProfileError) if the catalog or
    /// usage tracker cannot be built.
    pub fn from_config(
        config: &ProfilesConfig,
        registry: Arc<ModuleRegistry>,
        host: HostHandle,
    ) -> ProfileResult<Self> {
        let catalog = ProfileCatalog::from_config(config, registry)?;
        let usage = UsageTracker::from_config(config)?;
        Ok(Self::new(catalog, host)
            .with_switching(&config.switching)
            .with_usage_tracker(usage))
    }

    /// Publish switch and module events on `bus`.
    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.shared.event_bus = Some(bus);
        self
    }

    /// Apply unload timeout and policy.
    #[must_use]
    pub fn with_switching(mut self, switching: &SwitchingSection) -> Self {
        self.unload_timeout = Duration::from_millis(switching.unload_timeout_ms);
        self.shared.unload_policy = switching.unload_timeout_policy;
        self
    }

    /// Replace the unload timeout.
    #[must_use]
    pub fn with_unload_timeout(mut self, timeout: Duration) -> Self {
        self.unload_timeout = timeout;
        self
    }

    /// Replace the unload policy.
    #[must_use]
    pub fn with_unload_policy(mut self, policy: UnloadTimeoutPolicy) -> Self {
        self.shared.unload_policy = policy;
        self
    }

    /// Replace the usage tracker.
    #[must_use]
    pub fn with_usage_tracker(mut self, tracker: UsageTracker) -> Self {
        self.shared.usage = Arc::new(Mutex::new(tracker));
        self
    }

    /// The profile catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ProfileCatalog> {
        &self.shared.catalog
    }

    /// The latest published state. Never waits on a running switch.
    #[must_use]
    pub fn active(&self) -> Arc<ActiveProfileState> {
        self.shared.active()
    }

    /// The active profile name.
    #[must_use]
    pub fn current_profile(&self) -> Option<String> {
        self.active().profile.clone()
    }

    /// Owner of a resource in the latest published state.
    #[must_use]
    pub fn resource_owner(&self, resource: &str) -> Option<ModuleId> {
        self.active().resource_owner(resource).cloned()
    }

    /// Load statistics from the latest published state.
    #[must_use]
    pub fn load_statistics(&self) -> BTreeMap<ModuleId, LoadStats> {
        self.active().load_statistics()
    }

    /// Modules the loader holds once running and queued switches finish.
    pub async fn loaded_modules(&self) -> BTreeSet<ModuleId> {
        self.loader.lock().await.loaded_ids()
    }

    /// Whether a switch is running.
    #[must_use]
    pub fn state(&self) -> SwitchState {
        if self.shared.switching.load(Ordering::SeqCst) {
            SwitchState::Switching
        } else {
            SwitchState::Idle
        }
    }

    /// Take the switch lock and hand the current settings to the loader.
    async fn lock_loader(&self) -> OwnedMutexGuard<ModuleLoader> {
        let mut loader = Arc::clone(&self.loader).lock_owned().await;
        loader.set_event_bus(self.shared.event_bus.clone());
        loader.set_unload_timeout(self.unload_timeout);
        loader
    }

    /// Activate the catalog's default profile.
    pub async fn initialize(&self) -> SwitchReport {
        let default = self.shared.catalog.default_profile().to_string();
        info!(profile = %default, "Initializing module manager");
        self.switch_profile(&default, false).await
    }

    /// Unload every module, dependents first, and clear the active profile.
    ///
    /// Returns cleanup failures; every module is unloaded regardless. Runs
    /// to completion even if the caller stops waiting.
    pub async fn shutdown(&self) -> Vec<ModuleError> {
        let mut loader = self.lock_loader().await;
        let shared = self.shared.clone();
        let task = async move {
            let _switching = SwitchingGuard::new(&shared.switching);
            loader.set_correlation_id(None);
            let errors = AssertUnwindSafe(loader.unload_all())
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    error!(reason = %panic_message(&*panic), "Shutdown panicked");
                    Vec::new()
                });
            for e in &errors {
                warn!(error = %e, "Module cleanup failed during shutdown");
            }
            shared.publish_state(ActiveProfileState::capture(None, &loader, false));
            info!(
                errors = errors.len(),
                remaining = loader.loaded_count(),
                "Module manager shut down"
            );
            errors
        };

        match tokio::spawn(task.in_current_span()).await {
            Ok(errors) => errors,
            Err(e) => {
                error!(error = %e, "Shutdown task did not finish");
                Vec::new()
            },
        }
    }

    /// Switch to `target`.
    ///
    /// Switches are serialized in arrival order. Structural problems (unknown
    /// target, unresolvable or cyclic module set) fail before anything is
    /// unloaded. If a module fails to load and `force` is false, modules
    /// loaded by this switch are unloaded again, the modules it unloaded are
    /// reloaded, and the previous profile stays active. With `force` the
    /// target is committed despite the failures.
    ///
    /// Once the switch lock is held the switch runs as its own task, so
    /// dropping the returned future does not stop it half way. A panic during
    /// the switch publishes whatever the loader holds and reports
    /// [`SwitchFailure::Aborted`].
    ///
    /// Operational failures are reported in the returned [`SwitchReport`].
    pub async fn switch_profile(&self, target: &str, force: bool) -> SwitchReport {
        let switch_id = Uuid::new_v4();
        let span = info_span!("switch", %switch_id, to = target, force);
        let start = Instant::now();

        if !self.shared.catalog.contains(target) {
            span.in_scope(|| warn!(profile = target, "Rejecting switch to unknown profile"));
            let mut report = SwitchReport::new(switch_id, self.current_profile(), target);
            report.failure = Some(SwitchFailure::UnknownProfile(target.to_string()));
            report.duration_ms = elapsed_ms(start);
            return report;
        }

        let loader = self.lock_loader().instrument(span.clone()).await;
        let switch = Switch {
            shared: self.shared.clone(),
            switch_id,
            target: target.to_string(),
            force,
            start,
        };

        match tokio::spawn(switch.run(loader).instrument(span.clone())).await {
            Ok(report) => report,
            Err(e) => {
                span.in_scope(|| error!(error = %e, "Switch task did not finish"));
                let mut report = SwitchReport::new(switch_id, self.current_profile(), target);
                report.failure = Some(SwitchFailure::Aborted(e.to_string()));
                report.duration_ms = elapsed_ms(start);
                report
            },
        }
    }

    /// Record a tool invocation and, if recent usage points at a module the
    /// active profile lacks, return (and publish) an upgrade suggestion.
    ///
    /// Never switches profiles.
    pub fn record_tool_use(&self, tool: &str) -> Option<UpgradeSuggestion> {
        let active = self.active().module_ids();
        let suggestion = {
            let mut usage = self
                .shared
                .usage
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            usage.record(tool);
            usage.suggest(&active, &self.shared.catalog)?
        };

        info!(
            category = %suggestion.category,
            module_id = %suggestion.module,
            profile = %suggestion.profile,
            hits = suggestion.hits,
            "Recent usage suggests a broader profile"
        );
        self.shared.publish_event(LoadoutEvent::UpgradeSuggested {
            metadata: EventMetadata::new(EVENT_SOURCE),
            category: suggestion.category.clone(),
            module_id: suggestion.module.to_string(),
            profile: suggestion.profile.clone(),
            hits: suggestion.hits,
        });
        Some(suggestion)
    }
}

impl std::fmt::Debug for ProfileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileManager")
            .field("profile", &self.current_profile())
            .field("state", &self.state())
            .field("unload_policy", &self.shared.unload_policy)
            .field("unload_timeout", &self.unload_timeout)
            .finish_non_exhaustive()
    }
}

/// One switch, owning the switch lock for its whole run.
struct Switch {
    shared: Shared,
    switch_id: Uuid,
    target: String,
    force: bool,
    start: Instant,
}

impl Switch {
    async fn run(self, mut loader: OwnedMutexGuard<ModuleLoader>) -> SwitchReport {
        let _switching = SwitchingGuard::new(&self.shared.switching);
        loader.set_correlation_id(Some(self.switch_id));
        let previous = self.shared.active();

        let outcome = AssertUnwindSafe(self.execute(&mut loader, &previous))
            .catch_unwind()
            .await;
        match outcome {
            Ok(report) => report,
            Err(panic) => self.recover(&loader, &previous, &panic_message(&*panic)),
        }
    }

    fn metadata(&self) -> EventMetadata {
        EventMetadata::new(EVENT_SOURCE).with_correlation_id(self.switch_id)
    }

    fn finish(&self, mut report: SwitchReport) -> SwitchReport {
        report.duration_ms = elapsed_ms(self.start);
        report
    }

    async fn execute(
        &self,
        loader: &mut ModuleLoader,
        previous: &ActiveProfileState,
    ) -> SwitchReport {
        let target = self.target.as_str();
        let from = previous.profile.clone();
        let mut report = SwitchReport::new(self.switch_id, from.clone(), target);

        // Structural checks before anything is touched.
        let required = match self.shared.catalog.resolve(target) {
            Ok(required) => required,
            Err(e) => {
                error!(profile = target, error = %e, "Cannot resolve profile");
                report.failure = Some(SwitchFailure::Resolution(e.to_string()));
                return self.finish(report);
            },
        };

        let current = loader.loaded_ids();
        if from.as_deref() == Some(target) && current == required {
            debug!(profile = target, "Already active, nothing to do");
            report.success = true;
            report.forced = previous.forced;
            report.kept = required.into_iter().collect();
            return self.finish(report);
        }

        let registry = Arc::clone(loader.registry());
        let full_order = match resolver::topological_order(&registry, &required) {
            Ok(order) => order,
            Err(ModuleError::CircularDependency { modules }) => {
                error!(profile = target, modules = ?modules, "Circular dependency in profile");
                report.failure = Some(SwitchFailure::CircularDependency(modules));
                return self.finish(report);
            },
            Err(e) => {
                error!(profile = target, error = %e, "Cannot order profile modules");
                report.failure = Some(SwitchFailure::Resolution(e.to_string()));
                return self.finish(report);
            },
        };

        let plan = SwitchPlan::compute(&current, &required);
        let load_order: Vec<ModuleId> = full_order
            .into_iter()
            .filter(|id| plan.to_load.contains(id))
            .collect();
        let unload_order = resolver::unload_order(&registry, &plan.to_unload).unwrap_or_else(|e| {
            warn!(error = %e, "Could not order unload, falling back to reverse ID order");
            plan.to_unload.iter().rev().cloned().collect()
        });

        info!(
            from = from.as_deref().unwrap_or("<none>"),
            keep = plan.to_keep.len(),
            unload = unload_order.len(),
            load = load_order.len(),
            "Switching profile"
        );
        report.kept = plan.to_keep.iter().cloned().collect();

        // Unload phase: best effort.
        let mut unload_failed = Vec::new();
        for id in &unload_order {
            if let Err(e) = loader.unload_module(id).await {
                warn!(module_id = %id, error = %e, "Unload did not complete cleanly");
                unload_failed.push(id.clone());
                report.unload_warnings.push(e);
            }
            report.unloaded.push(id.clone());
        }

        // Load phase.
        report.module_results = loader.load_ordered(&load_order).await;
        let load_failed: Vec<ModuleId> = report
            .failed_modules()
            .into_iter()
            .cloned()
            .collect();
        let newly_loaded: Vec<ModuleId> = report
            .module_results
            .iter()
            .filter(|r| r.status == ModuleLoadStatus::Success)
            .map(|r| r.module_id.clone())
            .collect();

        let failure = if !load_failed.is_empty() {
            Some(SwitchFailure::LoadFailed {
                modules: load_failed,
            })
        } else if self.shared.unload_policy == UnloadTimeoutPolicy::Fail
            && !unload_failed.is_empty()
        {
            Some(SwitchFailure::UnloadFailed {
                modules: unload_failed,
            })
        } else {
            None
        };

        match failure {
            Some(failure) if !self.force => {
                roll_back(loader, &newly_loaded, &plan, &mut report).await;
                self.shared.publish_state(ActiveProfileState::capture(
                    from.clone(),
                    loader,
                    previous.forced,
                ));
                error!(
                    profile = target,
                    failure = %failure,
                    rollback_errors = report.rollback_errors.len(),
                    "Switch rolled back"
                );
                self.shared.publish_event(LoadoutEvent::SwitchRolledBack {
                    metadata: self.metadata(),
                    profile: from,
                    attempted: target.to_string(),
                    errors: report
                        .module_results
                        .iter()
                        .filter_map(|r| r.error.as_ref().map(ToString::to_string))
                        .chain(report.unload_warnings.iter().map(ToString::to_string))
                        .collect(),
                });
                report.failure = Some(failure);
                self.finish(report)
            },
            failure => {
                let forced = failure.is_some();
                if let Some(failure) = &failure {
                    warn!(profile = target, failure = %failure, "Forcing switch despite failures");
                }
                report.success = true;
                report.forced = forced;
                report.loaded = newly_loaded;
                let report = self.finish(report);

                self.shared.publish_state(ActiveProfileState::capture(
                    Some(target.to_string()),
                    loader,
                    forced,
                ));
                self.shared
                    .usage
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .reset_suggestions();

                info!(
                    profile = target,
                    kept = report.kept.len(),
                    unloaded = report.unloaded.len(),
                    loaded = report.loaded.len(),
                    duration_ms = report.duration_ms,
                    "Profile switched"
                );
                self.shared.publish_event(LoadoutEvent::ProfileChanged {
                    metadata: self.metadata(),
                    from,
                    to: target.to_string(),
                    kept: report.kept.len(),
                    unloaded: report.unloaded.len(),
                    loaded: report.loaded.len(),
                    forced,
                    duration_ms: report.duration_ms,
                });
                report
            },
        }
    }

    /// Publish what the loader actually holds after a panic cut the switch
    /// short. The previous profile stays active, marked forced unless its
    /// module set survived intact.
    fn recover(
        &self,
        loader: &ModuleLoader,
        previous: &ActiveProfileState,
        reason: &str,
    ) -> SwitchReport {
        let from = previous.profile.clone();
        let loaded = loader.loaded_ids();
        let intact = match &from {
            Some(profile) => self
                .shared
                .catalog
                .resolve(profile)
                .is_ok_and(|required| required == loaded),
            None => loaded.is_empty(),
        };
        error!(profile = %self.target, reason, intact, "Switch panicked");

        self.shared.publish_state(ActiveProfileState::capture(
            from.clone(),
            loader,
            previous.forced || !intact,
        ));
        self.shared.publish_event(LoadoutEvent::SwitchRolledBack {
            metadata: self.metadata(),
            profile: from.clone(),
            attempted: self.target.clone(),
            errors: vec![reason.to_string()],
        });

        let mut report = SwitchReport::new(self.switch_id, from, &self.target);
        report.failure = Some(SwitchFailure::Aborted(reason.to_string()));
        self.finish(report)
    }
}

/// Restore the module set that was loaded before the switch.
async fn roll_back(
    loader: &mut ModuleLoader,
    newly_loaded: &[ModuleId],
    plan: &SwitchPlan,
    report: &mut SwitchReport,
) {
    for id in newly_loaded.iter().rev() {
        if let Err(e) = loader.unload_module(id).await {
            warn!(module_id = %id, error = %e, "Cleanup failed while rolling back");
            report.rollback_errors.push(e);
        }
    }

    match loader.load_batch(&plan.to_unload).await {
        Ok(reports) => {
            report
                .rollback_errors
                .extend(reports.into_iter().filter_map(|r| r.error));
        },
        Err(e) => report.rollback_errors.push(e),
    }

    if !report.rollback_errors.is_empty() {
        error!(
            errors = report.rollback_errors.len(),
            "Previous module set could not be fully restored"
        );
    }
}
