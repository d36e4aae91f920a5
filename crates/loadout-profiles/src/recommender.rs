//! Profile recommender.
//!
//! A fixed, ordered decision chain. The first rule that matches wins:
//!
//! 1. Explicit caller preference (1.0)
//! 2. Caller/context identifier table (0.95)
//! 3. Recent file paths against glob rules (0.85)
//! 4. Task keywords (0.80)
//! 5. Fallback profile (0.70)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use loadout_config::ProfilesConfig;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ProfileError, ProfileResult};

/// Which rule produced a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    /// The caller asked for the profile.
    Explicit,
    /// The caller's context identifier maps to the profile.
    Context,
    /// A recent file path matched a glob rule.
    FilePattern,
    /// The task description contained a keyword.
    Keyword,
    /// Nothing else matched.
    Fallback,
}

impl RecommendationSource {
    /// Confidence attached to recommendations from this rule.
    #[must_use]
    pub fn confidence(self) -> f32 {
        match self {
            Self::Explicit => 1.0,
            Self::Context => 0.95,
            Self::FilePattern => 0.85,
            Self::Keyword => 0.80,
            Self::Fallback => 0.70,
        }
    }
}

impl fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Context => "context",
            Self::FilePattern => "file_pattern",
            Self::Keyword => "keyword",
            Self::Fallback => "fallback",
        })
    }
}

/// A proposed profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// Profile name.
    pub profile: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Human-readable justification.
    pub reason: String,
    /// Rule that matched.
    pub source: RecommendationSource,
}

impl Recommendation {
    fn new(profile: impl Into<String>, source: RecommendationSource, reason: String) -> Self {
        Self {
            profile: profile.into(),
            confidence: source.confidence(),
            reason,
            source,
        }
    }
}

/// Signals available to the recommender.
#[derive(Debug, Clone, Default)]
pub struct RecommendationContext {
    /// Profile the caller asked for.
    pub explicit_profile: Option<String>,
    /// Caller or context identifier.
    pub context_id: Option<String>,
    /// Recently touched file paths, most relevant first.
    pub recent_files: Vec<PathBuf>,
    /// Free-text task description.
    pub task: Option<String>,
}

impl RecommendationContext {
    /// An empty context; recommends the fallback profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the explicit preference.
    #[must_use]
    pub fn with_explicit_profile(mut self, profile: impl Into<String>) -> Self {
        self.explicit_profile = Some(profile.into());
        self
    }

    /// Set the context identifier.
    #[must_use]
    pub fn with_context_id(mut self, id: impl Into<String>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    /// Add a recent file path.
    #[must_use]
    pub fn with_recent_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.recent_files.push(path.into());
        self
    }

    /// Set the task description.
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

#[derive(Debug)]
struct FileRule {
    pattern: String,
    matcher: GlobMatcher,
    profile: String,
}

#[derive(Debug)]
struct KeywordMatcher {
    keyword: String,
    regex: Regex,
    profile: String,
}

/// Proposes a profile from contextual signals.
#[derive(Debug)]
pub struct ProfileRecommender {
    profiles: BTreeSet<String>,
    context_profiles: BTreeMap<String, String>,
    file_rules: Vec<FileRule>,
    keyword_rules: Vec<KeywordMatcher>,
    fallback: String,
}

impl ProfileRecommender {
    /// Compile the recommender tables from configuration.
    ///
    /// File globs treat `/` as a separator, so `*` stays within one path
    /// component and `**` crosses components. Keywords match whole words,
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidPattern`] if a glob or keyword fails to
    /// compile.
    pub fn from_config(config: &ProfilesConfig) -> ProfileResult<Self> {
        let file_rules = config
            .file_patterns
            .iter()
            .map(|rule| {
                let matcher = GlobBuilder::new(&rule.pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| ProfileError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        message: e.to_string(),
                    })?
                    .compile_matcher();
                Ok(FileRule {
                    pattern: rule.pattern.clone(),
                    matcher,
                    profile: rule.profile.clone(),
                })
            })
            .collect::<ProfileResult<Vec<_>>>()?;

        let keyword_rules = config
            .keywords
            .iter()
            .map(|rule| {
                let keyword = rule.keyword.trim();
                let regex = Regex::new(&keyword_pattern(keyword))
                    .map_err(|e| ProfileError::InvalidPattern {
                        pattern: keyword.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(KeywordMatcher {
                    keyword: keyword.to_string(),
                    regex,
                    profile: rule.profile.clone(),
                })
            })
            .collect::<ProfileResult<Vec<_>>>()?;

        Ok(Self {
            profiles: config.profiles.keys().cloned().collect(),
            context_profiles: config.context_profiles.clone(),
            file_rules,
            keyword_rules,
            fallback: config.fallback_profile().to_string(),
        })
    }

    /// The profile recommended when no rule matches.
    #[must_use]
    pub fn fallback_profile(&self) -> &str {
        &self.fallback
    }

    /// Run the decision chain.
    #[must_use]
    pub fn recommend(&self, ctx: &RecommendationContext) -> Recommendation {
        let recommendation = self
            .explicit(ctx)
            .or_else(|| self.by_context(ctx))
            .or_else(|| self.by_files(ctx))
            .or_else(|| self.by_keyword(ctx))
            .unwrap_or_else(|| {
                Recommendation::new(
                    self.fallback.clone(),
                    RecommendationSource::Fallback,
                    "no rule matched; using fallback profile".to_string(),
                )
            });
        debug!(
            profile = %recommendation.profile,
            source = %recommendation.source,
            confidence = recommendation.confidence,
            "Profile recommended"
        );
        recommendation
    }

    fn explicit(&self, ctx: &RecommendationContext) -> Option<Recommendation> {
        let profile = ctx.explicit_profile.as_deref()?;
        if !self.profiles.contains(profile) {
            warn!(profile, "Ignoring explicit request for unknown profile");
            return None;
        }
        Some(Recommendation::new(
            profile,
            RecommendationSource::Explicit,
            format!("explicitly requested profile '{profile}'"),
        ))
    }

    fn by_context(&self, ctx: &RecommendationContext) -> Option<Recommendation> {
        let id = ctx.context_id.as_deref()?;
        let profile = self.context_profiles.get(id)?;
        self.profiles.contains(profile).then(|| {
            Recommendation::new(
                profile.clone(),
                RecommendationSource::Context,
                format!("context '{id}' maps to profile '{profile}'"),
            )
        })
    }

    fn by_files(&self, ctx: &RecommendationContext) -> Option<Recommendation> {
        self.file_rules.iter().find_map(|rule| {
            let path = ctx
                .recent_files
                .iter()
                .find(|path| rule.matcher.is_match(normalize(path)))?;
            Some(Recommendation::new(
                rule.profile.clone(),
                RecommendationSource::FilePattern,
                format!(
                    "file '{}' matches pattern '{}'",
                    path.display(),
                    rule.pattern
                ),
            ))
        })
    }

    fn by_keyword(&self, ctx: &RecommendationContext) -> Option<Recommendation> {
        let task = ctx.task.as_deref()?;
        self.keyword_rules
            .iter()
            .find(|rule| rule.regex.is_match(task))
            .map(|rule| {
                Recommendation::new(
                    rule.profile.clone(),
                    RecommendationSource::Keyword,
                    format!("task mentions '{}'", rule.keyword),
                )
            })
    }
}

/// Strip a leading `./` so relative paths match relative globs.
/// Case-insensitive pattern for `keyword`. A side gets a word boundary only
/// when the keyword starts or ends there with a word character, so `c++` and
/// `.net` still match.
fn keyword_pattern(keyword: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = if keyword.starts_with(is_word) { r"\b" } else { "" };
    let end = if keyword.ends_with(is_word) { r"\b" } else { "" };
    format!("(?i){start}{}{end}", regex::escape(keyword))
}

fn normalize(path: &Path) -> &Path {
    path.strip_prefix(".").unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use loadout_test::config_from_toml;

    use super::*;

    const CONFIG: &str = r#"
        default_profile = "core"

        [profiles.core]
        [profiles.dev]
        [profiles.docs]
        [profiles.full]
        [profiles.ops]

        [context_profiles]
        ci = "core"

        [[file_patterns]]
        pattern = "**/*.rs"
        profile = "dev"

        [[file_patterns]]
        pattern = "docs/**"
        profile = "docs"

        [[keywords]]
        keyword = "deploy"
        profile = "ops"

        [[keywords]]
        keyword = "everything"
        profile = "full"

        [recommender]
        fallback_profile = "core"
    "#;

    fn recommender() -> ProfileRecommender {
        ProfileRecommender::from_config(&config_from_toml(CONFIG)).unwrap()
    }

    #[test]
    fn test_explicit_wins() {
        let ctx = RecommendationContext::new()
            .with_explicit_profile("full")
            .with_context_id("ci")
            .with_task("deploy");
        let rec = recommender().recommend(&ctx);
        assert_eq!(rec.profile, "full");
        assert_eq!(rec.source, RecommendationSource::Explicit);
        assert!((rec.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unknown_explicit_falls_through() {
        let ctx = RecommendationContext::new()
            .with_explicit_profile("ghost")
            .with_context_id("ci");
        let rec = recommender().recommend(&ctx);
        assert_eq!(rec.source, RecommendationSource::Context);
        assert_eq!(rec.profile, "core");
    }

    #[test]
    fn test_file_patterns_in_rule_order() {
        let ctx = RecommendationContext::new()
            .with_recent_file("docs/guide.md")
            .with_recent_file("./src/main.rs");
        let rec = recommender().recommend(&ctx);
        assert_eq!(rec.profile, "dev");
        assert_eq!(rec.source, RecommendationSource::FilePattern);
        assert!((rec.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn test_glob_is_anchored() {
        let ctx = RecommendationContext::new().with_recent_file("notes/docs/readme.md");
        let rec = recommender().recommend(&ctx);
        assert_eq!(rec.source, RecommendationSource::Fallback);
    }

    #[test]
    fn test_keyword_word_boundary_case_insensitive() {
        let r = recommender();
        let rec = r.recommend(&RecommendationContext::new().with_task("Please DEPLOY the app"));
        assert_eq!(rec.profile, "ops");
        assert_eq!(rec.source, RecommendationSource::Keyword);

        let rec = r.recommend(&RecommendationContext::new().with_task("redeployment plan"));
        assert_eq!(rec.source, RecommendationSource::Fallback);
    }

    #[test]
    fn test_keywords_with_symbols() {
        let config = config_from_toml(
            r#"
            default_profile = "core"
            [profiles.core]
            [profiles.native]
            [profiles.dotnet]

            [[keywords]]
            keyword = "c++"
            profile = "native"

            [[keywords]]
            keyword = ".net"
            profile = "dotnet"
            "#,
        );
        let r = ProfileRecommender::from_config(&config).unwrap();
        let profile_for = |task: &str| {
            r.recommend(&RecommendationContext::new().with_task(task))
                .profile
        };

        assert_eq!(profile_for("port the C++ parser"), "native");
        assert_eq!(profile_for("written in c++"), "native");
        assert_eq!(profile_for("upgrade to .NET 8"), "dotnet");
        assert_eq!(profile_for("abc++ is not a language"), "core");
        assert_eq!(profile_for("fix the network"), "core");
    }

    #[test]
    fn test_fallback() {
        let rec = recommender().recommend(&RecommendationContext::new());
        assert_eq!(rec.profile, "core");
        assert!((rec.confidence - 0.70).abs() < f32::EPSILON);
    }

    #[test]
    fn test_confidence_ordering() {
        let ordered = [
            RecommendationSource::Explicit,
            RecommendationSource::Context,
            RecommendationSource::FilePattern,
            RecommendationSource::Keyword,
            RecommendationSource::Fallback,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].confidence() > pair[1].confidence());
        }
    }
}
