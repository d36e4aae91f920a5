//! Module identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, ModuleResult};

/// Unique, stable, human-readable module identifier.
///
/// Module IDs are strings like `"workspace"` or `"git-tools"`. They must be
/// non-empty, contain only lowercase alphanumeric characters, hyphens and
/// underscores, and not start or end with a separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModuleId(String);

/// Deserialize with validation.
impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl ModuleId {
    /// Create a new `ModuleId`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty or contains invalid characters.
    pub fn new(id: impl Into<String>) -> ModuleResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a `ModuleId` without validation (for tests and internal use).
    #[must_use]
    pub fn from_static(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a string is a valid module ID without constructing one.
    #[must_use]
    pub fn is_valid_id(id: &str) -> bool {
        Self::validate(id).is_ok()
    }

    fn validate(id: &str) -> ModuleResult<()> {
        if id.is_empty() {
            return Err(ModuleError::InvalidId("module id must not be empty".into()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ModuleError::InvalidId(format!(
                "module id must contain only lowercase alphanumeric characters, hyphens and underscores, got: {id}"
            )));
        }
        let is_sep = |c: char| c == '-' || c == '_';
        if id.starts_with(is_sep) || id.ends_with(is_sep) {
            return Err(ModuleError::InvalidId(format!(
                "module id must not start or end with a separator, got: {id}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
