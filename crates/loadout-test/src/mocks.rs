//! Scripted module implementations for testing.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use loadout_modules::{Module, ModuleError, ModuleId, ModuleResult, RegistrationContext};

/// One lifecycle call observed by a [`Journal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// `register` was entered.
    Load(String),
    /// `cleanup` ran to completion.
    Unload(String),
}

impl fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(id) => write!(f, "load:{id}"),
            Self::Unload(id) => write!(f, "unload:{id}"),
        }
    }
}

/// Shared, ordered record of lifecycle calls across modules.
///
/// Uses `std::sync::Mutex` for simplicity and sync/async compatibility.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: JournalEntry) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(entry);
        }
    }

    /// Every entry so far.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Every entry rendered as `load:<id>` / `unload:<id>`.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }

    /// IDs of modules whose `register` was entered, in order.
    #[must_use]
    pub fn loads(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                JournalEntry::Load(id) => Some(id),
                JournalEntry::Unload(_) => None,
            })
            .collect()
    }

    /// IDs of modules whose `cleanup` completed, in order.
    #[must_use]
    pub fn unloads(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                JournalEntry::Unload(id) => Some(id),
                JournalEntry::Load(_) => None,
            })
            .collect()
    }

    /// Forget every entry.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clear();
        }
    }
}

/// Counts how many scripted lifecycle calls run at the same time.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGauge {
    active: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    /// Create a gauge with nothing observed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a call as running until the guard drops.
    #[must_use]
    pub fn enter(&self) -> GaugeGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.max.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        GaugeGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Highest number of calls observed running at once.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    /// Total calls observed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Ends a tracked call on drop.
#[derive(Debug)]
pub struct GaugeGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Host object for tests that check what modules receive through
/// [`RegistrationContext::host`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestHost {
    /// Name modules read back.
    pub name: String,
}

impl TestHost {
    /// A host called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What a module saw in its [`RegistrationContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRecord {
    /// The registering module.
    pub module_id: String,
    /// Resources the descriptor marked as deferred.
    pub deferred_resources: Vec<String>,
    /// Name of the host, when it is a [`TestHost`].
    pub host_name: Option<String>,
}

/// Shared record of registration contexts, one entry per `register` call.
#[derive(Debug, Clone, Default)]
pub struct ContextLog {
    records: Arc<Mutex<Vec<ContextRecord>>>,
}

impl ContextLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, ctx: &RegistrationContext<'_>) {
        let record = ContextRecord {
            module_id: ctx.module_id().to_string(),
            deferred_resources: ctx.deferred_resources().to_vec(),
            host_name: ctx.host().downcast_ref::<TestHost>().map(|h| h.name.clone()),
        };
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record);
        }
    }

    /// Every record so far.
    #[must_use]
    pub fn records(&self) -> Vec<ContextRecord> {
        self.records
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// The latest record for `module_id`.
    #[must_use]
    pub fn latest(&self, module_id: &str) -> Option<ContextRecord> {
        self.records()
            .into_iter()
            .rev()
            .find(|r| r.module_id == module_id)
    }
}

/// Behaviour of a [`ScriptedModule`].
#[derive(Debug, Clone, Default)]
pub struct ModuleScript {
    resources: Vec<String>,
    fail_with: Option<String>,
    failure_toggle: Option<Arc<AtomicBool>>,
    register_delay: Option<Duration>,
    cleanup_delay: Option<Duration>,
    cleanup_error: Option<String>,
    ignore_collisions: bool,
    journal: Option<Journal>,
    gauge: Option<ConcurrencyGauge>,
    context_log: Option<ContextLog>,
    register_panic: Option<String>,
    cleanup_panic: Option<String>,
}

impl ModuleScript {
    /// A module that registers nothing and always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register these resources, in order.
    #[must_use]
    pub fn with_resources(mut self, resources: &[&str]) -> Self {
        self.resources = resources.iter().map(ToString::to_string).collect();
        self
    }

    /// Fail registration with this message, after claiming resources.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Fail registration whenever `toggle` is set.
    #[must_use]
    pub fn failing_when(mut self, toggle: Arc<AtomicBool>) -> Self {
        self.failure_toggle = Some(toggle);
        self
    }

    /// Sleep this long inside `register`.
    #[must_use]
    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = Some(delay);
        self
    }

    /// Sleep this long inside `cleanup`.
    #[must_use]
    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = Some(delay);
        self
    }

    /// Fail `cleanup` with this message.
    #[must_use]
    pub fn with_cleanup_error(mut self, message: impl Into<String>) -> Self {
        self.cleanup_error = Some(message.into());
        self
    }

    /// Swallow resource collisions instead of propagating them.
    #[must_use]
    pub fn ignoring_collisions(mut self) -> Self {
        self.ignore_collisions = true;
        self
    }

    /// Record lifecycle calls into `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    /// Report lifecycle calls to `gauge`.
    #[must_use]
    pub fn with_gauge(mut self, gauge: &ConcurrencyGauge) -> Self {
        self.gauge = Some(gauge.clone());
        self
    }

    /// Record each registration context into `log`.
    #[must_use]
    pub fn with_context_log(mut self, log: &ContextLog) -> Self {
        self.context_log = Some(log.clone());
        self
    }

    /// Panic inside `register` with this message, after claiming resources.
    #[must_use]
    pub fn panicking_on_register(mut self, message: impl Into<String>) -> Self {
        self.register_panic = Some(message.into());
        self
    }

    /// Panic inside `cleanup` with this message.
    #[must_use]
    pub fn panicking_on_cleanup(mut self, message: impl Into<String>) -> Self {
        self.cleanup_panic = Some(message.into());
        self
    }

    /// A factory producing a fresh [`ScriptedModule`] per call.
    pub fn into_factory(self) -> impl Fn() -> Box<dyn Module> + Send + Sync + 'static {
        move || Box::new(ScriptedModule::new(self.clone())) as Box<dyn Module>
    }

    fn should_fail(&self) -> Option<String> {
        if let Some(message) = &self.fail_with {
            return Some(message.clone());
        }
        self.failure_toggle
            .as_ref()
            .filter(|t| t.load(Ordering::SeqCst))
            .map(|_| "failure toggled on".to_string())
    }
}

/// A [`Module`] driven by a [`ModuleScript`].
#[derive(Debug)]
pub struct ScriptedModule {
    script: ModuleScript,
    module_id: Option<String>,
}

impl ScriptedModule {
    /// Create a module following `script`.
    #[must_use]
    pub fn new(script: ModuleScript) -> Self {
        Self {
            script,
            module_id: None,
        }
    }
}

#[async_trait]
impl Module for ScriptedModule {
    async fn register(&mut self, ctx: &mut RegistrationContext<'_>) -> ModuleResult<usize> {
        let _guard = self.script.gauge.as_ref().map(ConcurrencyGauge::enter);
        let id = ctx.module_id().to_string();
        self.module_id = Some(id.clone());
        if let Some(journal) = &self.script.journal {
            journal.record(JournalEntry::Load(id));
        }
        if let Some(log) = &self.script.context_log {
            log.record(ctx);
        }

        if let Some(delay) = self.script.register_delay {
            tokio::time::sleep(delay).await;
        }

        for resource in &self.script.resources {
            match ctx.register_resource(resource.as_str()) {
                Ok(()) => {},
                Err(_) if self.script.ignore_collisions => {},
                Err(e) => return Err(e),
            }
        }

        if let Some(message) = &self.script.register_panic {
            panic!("{message}");
        }

        if let Some(message) = self.script.should_fail() {
            return Err(ModuleError::registration(ctx.module_id(), message));
        }

        Ok(ctx.registered().len())
    }

    async fn cleanup(&mut self) -> ModuleResult<()> {
        let _guard = self.script.gauge.as_ref().map(ConcurrencyGauge::enter);
        if let Some(delay) = self.script.cleanup_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.script.cleanup_panic {
            panic!("{message}");
        }

        let id = self.module_id.clone().unwrap_or_default();
        if let Some(journal) = &self.script.journal {
            journal.record(JournalEntry::Unload(id.clone()));
        }

        match &self.script.cleanup_error {
            Some(message) => Err(ModuleError::CleanupFailed {
                module_id: ModuleId::from_static(&id),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}
