//! Post-load configuration validation.
//!
//! Validates that deserialized [`ProfilesConfig`] values are within
//! acceptable ranges and that cross-references between sections resolve.
//! Module ids are not checked here; the profile catalog does that against
//! the module registry.

use std::collections::BTreeSet;

use globset::Glob;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{CONFIG_VERSION, ProfilesConfig};

/// Accepted values for `logging.format`.
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a loaded configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &ProfilesConfig) -> ConfigResult<()> {
    validate_version(config)?;
    validate_profiles(config)?;
    validate_inheritance(config)?;
    validate_rules(config)?;
    validate_switching(config)?;
    validate_recommender(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_version(config: &ProfilesConfig) -> ConfigResult<()> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::validation(
            "version",
            format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                config.version
            ),
        ));
    }
    Ok(())
}

fn validate_profiles(config: &ProfilesConfig) -> ConfigResult<()> {
    if config.profiles.is_empty() {
        return Err(ConfigError::validation(
            "profiles",
            "at least one profile must be defined",
        ));
    }
    if config.profiles.keys().any(String::is_empty) {
        return Err(ConfigError::validation(
            "profiles",
            "profile names must not be empty",
        ));
    }
    require_profile(config, "default_profile", &config.default_profile)?;
    if let Some(fallback) = &config.recommender.fallback_profile {
        require_profile(config, "recommender.fallback_profile", fallback)?;
    }
    Ok(())
}

/// Every `extends` must name an existing profile and no chain may loop.
fn validate_inheritance(config: &ProfilesConfig) -> ConfigResult<()> {
    for (name, section) in &config.profiles {
        let Some(parent) = &section.extends else {
            continue;
        };
        require_profile(config, &format!("profiles.{name}.extends"), parent)?;

        let mut seen = BTreeSet::from([name.as_str()]);
        let mut cursor = Some(parent.as_str());
        while let Some(current) = cursor {
            if !seen.insert(current) {
                return Err(ConfigError::validation(
                    format!("profiles.{name}.extends"),
                    format!(
                        "inheritance cycle through: {}",
                        seen.into_iter().collect::<Vec<_>>().join(", ")
                    ),
                ));
            }
            cursor = config
                .profiles
                .get(current)
                .and_then(|s| s.extends.as_deref());
        }
    }
    Ok(())
}

fn validate_rules(config: &ProfilesConfig) -> ConfigResult<()> {
    for (context, profile) in &config.context_profiles {
        require_profile(config, &format!("context_profiles.{context}"), profile)?;
    }

    for (i, rule) in config.file_patterns.iter().enumerate() {
        let field = format!("file_patterns[{i}]");
        require_profile(config, &field, &rule.profile)?;
        Glob::new(&rule.pattern).map_err(|e| {
            ConfigError::validation(&field, format!("invalid glob '{}': {e}", rule.pattern))
        })?;
    }

    for (i, rule) in config.keywords.iter().enumerate() {
        let field = format!("keywords[{i}]");
        require_profile(config, &field, &rule.profile)?;
        if rule.keyword.trim().is_empty() {
            return Err(ConfigError::validation(field, "keyword must not be empty"));
        }
    }

    for (i, rule) in config.tool_categories.iter().enumerate() {
        let field = format!("tool_categories[{i}]");
        if rule.category.is_empty() || rule.module.is_empty() {
            return Err(ConfigError::validation(
                field,
                "category and module must not be empty",
            ));
        }
        for tool in &rule.tools {
            Glob::new(tool).map_err(|e| {
                ConfigError::validation(&field, format!("invalid glob '{tool}': {e}"))
            })?;
        }
    }
    Ok(())
}

fn validate_switching(config: &ProfilesConfig) -> ConfigResult<()> {
    if config.switching.unload_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "switching.unload_timeout_ms",
            "unload timeout must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_recommender(config: &ProfilesConfig) -> ConfigResult<()> {
    let r = &config.recommender;
    if r.upgrade_threshold == 0 {
        return Err(ConfigError::validation(
            "recommender.upgrade_threshold",
            "threshold must be at least 1",
        ));
    }
    if r.usage_window < r.upgrade_threshold {
        return Err(ConfigError::validation(
            "recommender.usage_window",
            format!(
                "window ({}) must not be smaller than the threshold ({})",
                r.usage_window, r.upgrade_threshold
            ),
        ));
    }
    Ok(())
}

fn validate_logging(config: &ProfilesConfig) -> ConfigResult<()> {
    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::validation(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::validation(
            "logging.level",
            "level must not be empty",
        ));
    }
    Ok(())
}

fn require_profile(config: &ProfilesConfig, field: &str, profile: &str) -> ConfigResult<()> {
    if config.profiles.contains_key(profile) {
        Ok(())
    } else {
        Err(ConfigError::validation(
            field,
            format!("unknown profile '{profile}'"),
        ))
    }
}
