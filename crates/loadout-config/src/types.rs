//! Configuration types for the profile catalog.
//!
//! All types in this module are self-contained with no dependencies on other
//! internal loadout crates. Module ids stay plain strings here and are checked
//! against the module registry when the catalog is built. Every section
//! implements [`Default`] so that a bare `[section]` header in TOML produces a
//! working configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current configuration schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Wildcard module selector meaning "every module in the registry".
pub const ALL_MODULES: &str = "all";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root of a `profiles.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Schema version. Only [`CONFIG_VERSION`] is accepted.
    pub version: u32,
    /// Profile activated at startup.
    pub default_profile: String,
    /// Named profile definitions.
    pub profiles: BTreeMap<String, ProfileSection>,
    /// Caller/context identifier to profile overrides.
    pub context_profiles: BTreeMap<String, String>,
    /// Ordered file-path glob rules.
    pub file_patterns: Vec<FilePatternRule>,
    /// Ordered task keyword rules.
    pub keywords: Vec<KeywordRule>,
    /// Tool name to capability category mapping used for upgrade hints.
    pub tool_categories: Vec<ToolCategoryRule>,
    /// Switch execution knobs.
    pub switching: SwitchingSection,
    /// Recommender knobs.
    pub recommender: RecommenderSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            default_profile: "core".to_owned(),
            profiles: BTreeMap::new(),
            context_profiles: BTreeMap::new(),
            file_patterns: Vec::new(),
            keywords: Vec::new(),
            tool_categories: Vec::new(),
            switching: SwitchingSection::default(),
            recommender: RecommenderSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl ProfilesConfig {
    /// The profile the recommender falls back to when nothing else matches.
    #[must_use]
    pub fn fallback_profile(&self) -> &str {
        self.recommender
            .fallback_profile
            .as_deref()
            .unwrap_or(&self.default_profile)
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A single profile definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSection {
    /// Human-readable description.
    pub description: String,
    /// Explicit module list, or `["all"]`.
    pub modules: ModuleSelection,
    /// Optional parent profile whose modules are inherited.
    pub extends: Option<String>,
}

/// Which modules a profile selects on its own.
///
/// Serialized as a list of module ids. A list containing `"all"` selects the
/// whole registry regardless of inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum ModuleSelection {
    /// Every module in the registry.
    All,
    /// An explicit list of module ids.
    Explicit(Vec<String>),
}

impl Default for ModuleSelection {
    fn default() -> Self {
        Self::Explicit(Vec::new())
    }
}

impl From<Vec<String>> for ModuleSelection {
    fn from(ids: Vec<String>) -> Self {
        if ids.iter().any(|id| id == ALL_MODULES) {
            Self::All
        } else {
            Self::Explicit(ids)
        }
    }
}

impl From<ModuleSelection> for Vec<String> {
    fn from(selection: ModuleSelection) -> Self {
        match selection {
            ModuleSelection::All => vec![ALL_MODULES.to_owned()],
            ModuleSelection::Explicit(ids) => ids,
        }
    }
}

// ---------------------------------------------------------------------------
// Recommender tables
// ---------------------------------------------------------------------------

/// Maps a glob over recently touched file paths to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePatternRule {
    /// Glob pattern, e.g. `"**/*.rs"`.
    pub pattern: String,
    /// Profile recommended on match.
    pub profile: String,
}

/// Maps a task-description keyword to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Keyword matched case-insensitively on word boundaries.
    pub keyword: String,
    /// Profile recommended on match.
    pub profile: String,
}

/// Groups tool names into a capability category provided by one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCategoryRule {
    /// Category name reported in upgrade suggestions.
    pub category: String,
    /// Tool name globs belonging to the category.
    pub tools: Vec<String>,
    /// Module that provides the category.
    pub module: String,
}

// ---------------------------------------------------------------------------
// SwitchingSection
// ---------------------------------------------------------------------------

/// What a profile switch does when a module's cleanup times out or fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnloadTimeoutPolicy {
    /// Log a warning, drop the module's bookkeeping, and keep switching.
    #[default]
    Warn,
    /// Treat the timeout as a switch failure (rolls back unless forced).
    Fail,
}

/// Switch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchingSection {
    /// Per-module cleanup timeout in milliseconds.
    pub unload_timeout_ms: u64,
    /// Behaviour when a cleanup times out or fails.
    pub unload_timeout_policy: UnloadTimeoutPolicy,
}

impl Default for SwitchingSection {
    fn default() -> Self {
        Self {
            unload_timeout_ms: 5_000,
            unload_timeout_policy: UnloadTimeoutPolicy::Warn,
        }
    }
}

// ---------------------------------------------------------------------------
// RecommenderSection
// ---------------------------------------------------------------------------

/// Recommender settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderSection {
    /// Fallback profile; defaults to `default_profile` when unset.
    pub fallback_profile: Option<String>,
    /// Number of recent tool invocations kept for upgrade hints.
    pub usage_window: usize,
    /// Hits within the window needed before an upgrade is suggested.
    pub upgrade_threshold: usize,
}

impl Default for RecommenderSection {
    fn default() -> Self {
        Self {
            fallback_profile: None,
            usage_window: 20,
            upgrade_threshold: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["loadout_profiles=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}
