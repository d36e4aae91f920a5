//! Config file discovery and loading.
//!
//! Implements the `ProfilesConfig::load()` algorithm:
//! 1. Build the candidate list: explicit path, `$LOADOUT_CONFIG`,
//!    `{workspace}/.loadout/profiles.toml`, `{home}/.loadout/profiles.toml`
//! 2. Load the first candidate that exists
//! 3. If none exists, write the embedded `defaults.toml` to the first
//!    candidate that accepts it and retry the load
//! 4. If that also fails, report every searched location
//! 5. Validate

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::types::ProfilesConfig;
use crate::validate;

/// Embedded default configuration, written to disk when nothing is found.
pub const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "LOADOUT_CONFIG";

/// Directory name used under the workspace and home roots.
const CONFIG_DIR: &str = ".loadout";

/// File name of the profile configuration.
const CONFIG_FILE: &str = "profiles.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Where to look for the profile configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit file path, searched first.
    pub explicit_path: Option<PathBuf>,
    /// Path taken from [`CONFIG_ENV_VAR`].
    pub env_path: Option<PathBuf>,
    /// Project root; `{root}/.loadout/profiles.toml` is searched.
    pub workspace_root: Option<PathBuf>,
    /// Home directory override. When `None` the platform home is used.
    pub home_override: Option<PathBuf>,
    /// Skip the home-directory candidate entirely.
    pub skip_user: bool,
}

impl LoadOptions {
    /// Options seeded from the process environment (`LOADOUT_CONFIG`).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            env_path: std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
            ..Self::default()
        }
    }

    /// Search an explicit file first.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Search `{root}/.loadout/profiles.toml`.
    #[must_use]
    pub fn with_workspace(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Use an alternate home directory.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_override = Some(home.into());
        self
    }

    /// Do not consider the home directory.
    #[must_use]
    pub fn without_user(mut self) -> Self {
        self.skip_user = true;
        self
    }
}

/// A loaded configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The validated configuration.
    pub config: ProfilesConfig,
    /// The file it was read from.
    pub path: PathBuf,
    /// Whether the file was written from the embedded defaults.
    pub synthesized: bool,
}

/// Locate, load and validate the profile configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file found is malformed or invalid, or
/// [`ConfigError::NotFound`] if nothing exists and the defaults could not be
/// written and reloaded at any candidate location.
pub fn load(options: &LoadOptions) -> ConfigResult<LoadedConfig> {
    let searched = candidate_paths(options)?;

    for path in &searched {
        if let Some(config) = try_load_file(path)? {
            info!(path = %path.display(), "loaded profile config");
            return Ok(LoadedConfig {
                config,
                path: path.clone(),
                synthesized: false,
            });
        }
    }

    warn!(
        searched = searched.len(),
        "no profile config found, writing defaults"
    );
    for path in &searched {
        if let Err(e) = write_defaults(path) {
            warn!(path = %path.display(), error = %e, "could not write default config");
            continue;
        }
        match try_load_file(path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), "loaded synthesized default config");
                return Ok(LoadedConfig {
                    config,
                    path: path.clone(),
                    synthesized: true,
                });
            },
            Ok(None) => {
                warn!(path = %path.display(), "default config vanished after write");
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "default config failed to reload");
            },
        }
        break;
    }

    Err(ConfigError::NotFound { searched })
}

/// Load a config from a specific file path.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<ProfilesConfig> {
    let content = read_bounded(path)?;
    load_str(&content, &path.display().to_string())
}

/// Parse and validate config text. `origin` is used in error messages.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the text is not valid TOML or fails
/// validation.
pub fn load_str(content: &str, origin: &str) -> ConfigResult<ProfilesConfig> {
    let config: ProfilesConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

/// The ordered list of locations [`load`] searches.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if no candidate could be built at all.
pub fn candidate_paths(options: &LoadOptions) -> ConfigResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if let Some(p) = &options.explicit_path {
        paths.push(p.clone());
    }
    if let Some(p) = &options.env_path {
        paths.push(p.clone());
    }
    if let Some(root) = &options.workspace_root {
        paths.push(root.join(CONFIG_DIR).join(CONFIG_FILE));
    }
    if !options.skip_user {
        let home = match &options.home_override {
            Some(h) => Some(h.clone()),
            None => home_directory(),
        };
        match home {
            Some(h) => paths.push(h.join(CONFIG_DIR).join(CONFIG_FILE)),
            None => debug!("no home directory, skipping user config"),
        }
    }
    paths.dedup();

    if paths.is_empty() {
        return Err(ConfigError::NoHomeDir);
    }
    Ok(paths)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<ProfilesConfig>> {
    match read_bounded(path) {
        Ok(content) => load_str(&content, &path.display().to_string()).map(Some),
        Err(ConfigError::ReadError { source, .. })
            if matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
            ) =>
        {
            debug!(path = %path.display(), "config file not found, skipping");
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

/// Read a file, rejecting anything over [`MAX_CONFIG_FILE_SIZE`].
///
/// Uses a single read to avoid a stat/read race; the size is checked after.
fn read_bounded(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }
    Ok(content)
}

fn write_defaults(path: &Path) -> ConfigResult<()> {
    let write_err = |e| ConfigError::WriteError {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, DEFAULTS_TOML).map_err(write_err)?;
    info!(path = %path.display(), "wrote default profile config");
    Ok(())
}

fn home_directory() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
