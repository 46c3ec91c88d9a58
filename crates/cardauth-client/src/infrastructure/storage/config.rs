//! TOML-based configuration for the authorization client.
//!
//! Reads [`AppConfig`] from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Cardauth\config.toml`
//! - Linux:    `~/.config/cardauth/config.toml`
//! - macOS:    `~/Library/Application Support/Cardauth/config.toml`
//!
//! Example file:
//!
//! ```toml
//! [backend]
//! base_url = "http://127.0.0.1:8000"
//! request_timeout_ms = 10000
//!
//! [session]
//! deadline_secs = 30
//!
//! [settle]
//! before_action_ms = 500
//! after_action_ms = 2000
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "…")]` helper and every section is
//! `#[serde(default)]`, so an empty file (or a file from an older release that
//! lacks newer fields) still loads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::SettleDelays;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub settle: SettleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the authorization-session endpoints live.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Base URL; the `/api/authorization-session/...` paths are appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound for any single HTTP request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Handshake deadline.  Applied uniformly to every authorization.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

/// Cosmetic pauses around the business action.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SettleConfig {
    #[serde(default = "default_before_action_ms")]
    pub before_action_ms: u64,
    #[serde(default = "default_after_action_ms")]
    pub after_action_ms: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_deadline_secs() -> u64 {
    30
}
fn default_before_action_ms() -> u64 {
    500
}
fn default_after_action_ms() -> u64 {
    2_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            before_action_ms: default_before_action_ms(),
            after_action_ms: default_after_action_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Rejects values that would break the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty base URL, a zero
    /// deadline (every session must time out), or a zero request timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.base_url must not be empty".into()));
        }
        if self.session.deadline_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.deadline_secs must be greater than zero".into(),
            ));
        }
        if self.backend.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "backend.request_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.session.deadline_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.request_timeout_ms)
    }

    pub fn settle_delays(&self) -> SettleDelays {
        SettleDelays {
            before_action: Duration::from_millis(self.settle.before_action_ms),
            after_action: Duration::from_millis(self.settle.after_action_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Cardauth"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("cardauth"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Cardauth")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
