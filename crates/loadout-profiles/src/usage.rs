//! Usage-based upgrade suggestions.
//!
//! Keeps a rolling window of recent tool invocations. When enough of them
//! fall into a capability category whose module is not active, suggests the
//! profile that would bring it in. Never switches on its own.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use globset::{Glob, GlobSet, GlobSetBuilder};
use loadout_config::ProfilesConfig;
use loadout_modules::ModuleId;
use serde::Serialize;
use tracing::debug;

use crate::catalog::ProfileCatalog;
use crate::error::{ProfileError, ProfileResult};

/// Default number of invocations kept.
pub const DEFAULT_USAGE_WINDOW: usize = 20;

/// Default hits needed before suggesting.
pub const DEFAULT_UPGRADE_THRESHOLD: usize = 3;

/// A non-binding hint that a broader profile would serve recent usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeSuggestion {
    /// Capability category seen in recent usage.
    pub category: String,
    /// Module that provides the category.
    pub module: ModuleId,
    /// Profile that would include the module.
    pub profile: String,
    /// Matching invocations in the window.
    pub hits: usize,
}

#[derive(Debug)]
struct CategoryRule {
    category: String,
    tools: GlobSet,
    module: ModuleId,
}

/// Rolling window of tool invocations mapped to capability categories.
#[derive(Debug)]
pub struct UsageTracker {
    window: VecDeque<String>,
    capacity: usize,
    threshold: usize,
    categories: Vec<CategoryRule>,
    suggested: BTreeSet<String>,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_USAGE_WINDOW, DEFAULT_UPGRADE_THRESHOLD)
    }
}

impl UsageTracker {
    /// Tracker with no categories. Both limits are raised to at least 1.
    #[must_use]
    pub fn new(capacity: usize, threshold: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            threshold: threshold.max(1),
            categories: Vec::new(),
            suggested: BTreeSet::new(),
        }
    }

    /// Tracker built from the `[recommender]` and `[[tool_categories]]`
    /// sections.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidPattern`] for a bad tool glob and a
    /// module error for a malformed module ID.
    pub fn from_config(config: &ProfilesConfig) -> ProfileResult<Self> {
        let mut tracker = Self::new(
            config.recommender.usage_window,
            config.recommender.upgrade_threshold,
        );
        for rule in &config.tool_categories {
            tracker = tracker.with_category(
                rule.category.clone(),
                &rule.tools,
                ModuleId::new(rule.module.as_str())?,
            )?;
        }
        Ok(tracker)
    }

    /// Add a category: tool name globs provided by `module`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidPattern`] if a glob does not compile.
    pub fn with_category(
        mut self,
        category: impl Into<String>,
        tools: &[impl AsRef<str>],
        module: ModuleId,
    ) -> ProfileResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for tool in tools {
            let tool = tool.as_ref();
            builder.add(Glob::new(tool).map_err(|e| ProfileError::InvalidPattern {
                pattern: tool.to_string(),
                message: e.to_string(),
            })?);
        }
        let tools = builder.build().map_err(|e| ProfileError::InvalidPattern {
            pattern: String::new(),
            message: e.to_string(),
        })?;
        self.categories.push(CategoryRule {
            category: category.into(),
            tools,
            module,
        });
        Ok(self)
    }

    /// Record one tool invocation, evicting the oldest beyond the window.
    pub fn record(&mut self, tool: impl Into<String>) {
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(tool.into());
    }

    /// First category whose globs match `tool`.
    #[must_use]
    pub fn category_of(&self, tool: &str) -> Option<&str> {
        self.rule_for(tool).map(|r| r.category.as_str())
    }

    fn rule_for(&self, tool: &str) -> Option<&CategoryRule> {
        self.categories.iter().find(|r| r.tools.is_match(tool))
    }

    /// Invocations per category currently in the window.
    #[must_use]
    pub fn hits(&self) -> BTreeMap<String, usize> {
        let mut hits = BTreeMap::new();
        for tool in &self.window {
            if let Some(rule) = self.rule_for(tool) {
                let count: &mut usize = hits.entry(rule.category.clone()).or_default();
                *count = count.saturating_add(1);
            }
        }
        hits
    }

    /// The first category (in configuration order) that crosses the
    /// threshold while its module is inactive, with the profile to suggest.
    #[must_use]
    pub fn evaluate(
        &self,
        active: &BTreeSet<ModuleId>,
        catalog: &ProfileCatalog,
    ) -> Option<UpgradeSuggestion> {
        self.first_match(active, catalog, |_| true)
    }

    /// Like [`UsageTracker::evaluate`], but a category is suggested at most
    /// once until [`UsageTracker::reset_suggestions`]. Categories already
    /// suggested are passed over, so a later one can still be suggested.
    pub fn suggest(
        &mut self,
        active: &BTreeSet<ModuleId>,
        catalog: &ProfileCatalog,
    ) -> Option<UpgradeSuggestion> {
        let suggestion =
            self.first_match(active, catalog, |category| !self.suggested.contains(category))?;
        self.suggested.insert(suggestion.category.clone());
        debug!(
            category = %suggestion.category,
            profile = %suggestion.profile,
            hits = suggestion.hits,
            "Upgrade suggested"
        );
        Some(suggestion)
    }

    fn first_match(
        &self,
        active: &BTreeSet<ModuleId>,
        catalog: &ProfileCatalog,
        eligible: impl Fn(&str) -> bool,
    ) -> Option<UpgradeSuggestion> {
        let hits = self.hits();
        self.categories.iter().find_map(|rule| {
            let count = hits.get(&rule.category).copied().unwrap_or_default();
            if count < self.threshold
                || active.contains(&rule.module)
                || !eligible(&rule.category)
            {
                return None;
            }
            let profile = profile_for(&rule.module, active, catalog)?;
            Some(UpgradeSuggestion {
                category: rule.category.clone(),
                module: rule.module.clone(),
                profile,
                hits: count,
            })
        })
    }

    /// Allow every category to be suggested again.
    pub fn reset_suggestions(&mut self) {
        self.suggested.clear();
    }

    /// Invocations in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Forget every recorded invocation.
    pub fn clear(&mut self) {
        self.window.clear();
    }
}

/// Smallest profile containing the active set and `module`; failing that,
/// the smallest profile containing `module`. Ties go to the lower name.
fn profile_for(
    module: &ModuleId,
    active: &BTreeSet<ModuleId>,
    catalog: &ProfileCatalog,
) -> Option<String> {
    let resolved = catalog.resolve_all();
    let containing: Vec<(&String, &BTreeSet<ModuleId>)> = resolved
        .iter()
        .filter(|(_, set)| set.contains(module))
        .collect();

    containing
        .iter()
        .filter(|(_, set)| active.is_subset(set))
        .min_by_key(|(name, set)| (set.len(), *name))
        .or_else(|| containing.iter().min_by_key(|(name, set)| (set.len(), *name)))
        .map(|(name, _)| (*name).clone())
}
