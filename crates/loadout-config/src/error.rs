use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a profile configuration could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A candidate file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    ReadError {
        /// File that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for [`ProfilesConfig`](crate::ProfilesConfig).
    #[error("cannot parse {path}: {source}")]
    ParseError {
        /// File, or `<inline>` for text.
        path: String,
        /// Parser diagnostic.
        #[source]
        source: toml::de::Error,
    },

    /// Failed to write the synthesized default configuration.
    #[error("cannot write default profiles to {path}: {source}")]
    WriteError {
        /// Path that could not be written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file parsed but describes an unusable configuration.
    #[error("invalid {field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// No configuration could be found or synthesized.
    #[error("no usable profile configuration; searched: {}", display_paths(.searched))]
    NotFound {
        /// Every location that was searched, in search order.
        searched: Vec<PathBuf>,
    },

    /// No candidate location could be built.
    #[error("no config location: home directory unknown and no other path given")]
    NoHomeDir,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConfigError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result alias for this crate.
pub type ConfigResult<T> = Result<T, ConfigError>;
