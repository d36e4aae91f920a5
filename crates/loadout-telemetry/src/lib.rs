//! Loadout Telemetry - Logging setup for the loadout module manager.
//!
//! This crate provides configurable `tracing` subscriber installation with
//! multiple output formats and targets. With the `config` feature (on by
//! default) a [`LogConfig`] can be built from the `[logging]` section of
//! `profiles.toml`.
//!
//! # Example
//!
//! ```rust,no_run
//! use loadout_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), loadout_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("loadout_profiles=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
