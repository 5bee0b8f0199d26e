//! Configuration types for logfetch.
//!
//! [`Settings::load`] layers the built-in defaults, an optional TOML file and
//! `LF_*` environment variables (`LF_LOG_DIR`, `LF_FILE_ENCODING`,
//! `LF_CHUNK_SIZE`, `LF_PORT`, `LF_LOG_LEVEL`, `LF_CONNECT_TIMEOUT_MS`).
//! [`Settings::defaults`] returns the defaults without touching the
//! filesystem or the environment (useful in tests).
//!
//! Raw settings are only strings and numbers; [`Settings::validate`] checks
//! them against the filesystem and the encoding table once, at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::RetrievalError;
use crate::transcode::LogEncoding;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
log_dir            = "/var/log"
file_encoding      = "utf8"
chunk_size         = 65536
port               = 3000
log_level          = "info"
connect_timeout_ms = 5000
"#;

const ENV_PREFIX: &str = "LF";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Process configuration as read, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_file_encoding")]
    pub file_encoding: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_log_dir() -> PathBuf { PathBuf::from("/var/log") }
fn default_file_encoding() -> String { "utf8".to_string() }
fn default_chunk_size() -> usize { 65536 }
fn default_port() -> u16 { 3000 }
fn default_log_level() -> String { "info".to_string() }
fn default_connect_timeout_ms() -> u64 { 5000 }

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Settings that passed [`Settings::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub log_dir: PathBuf,
    pub encoding: LogEncoding,
    pub chunk_size: usize,
    pub port: u16,
    pub log_level: String,
    pub connect_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The directory at {} does not exist.", .0.display())]
    MissingDirectory(PathBuf),

    #[error("The directory at {} is not readable.", .0.display())]
    UnreadableDirectory(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Error checking directory at {}: {source}", path.display())]
    DirectoryCheck {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl Settings {
    /// Load defaults, then `file` (required when given), then `LF_*`
    /// environment variables.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Layer a TOML document over the defaults, ignoring the environment.
    pub fn from_toml(toml: &str) -> anyhow::Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    /// Check the log directory, resolve the encoding and make sure the chunk
    /// size never splits one of its code units.
    pub fn validate(&self) -> Result<ValidatedSettings, ConfigError> {
        check_directory(&self.log_dir)?;
        let encoding = LogEncoding::parse(&self.file_encoding)?;
        encoding.validate_chunk_size(self.chunk_size)?;
        Ok(ValidatedSettings {
            log_dir: self.log_dir.clone(),
            encoding,
            chunk_size: self.chunk_size,
            port: self.port,
            log_level: self.log_level.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        })
    }
}

// ---------------------------------------------------------------------------
// Directory checks
// ---------------------------------------------------------------------------

/// Fail unless `path` is an existing directory whose entries can be listed.
pub fn check_directory(path: &Path) -> Result<(), ConfigError> {
    let classify = |err: std::io::Error| match err.kind() {
        std::io::ErrorKind::NotFound => ConfigError::MissingDirectory(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => {
            ConfigError::UnreadableDirectory(path.to_path_buf())
        }
        _ => ConfigError::DirectoryCheck {
            path: path.to_path_buf(),
            source: err,
        },
    };

    let metadata = std::fs::metadata(path).map_err(classify)?;
    if !metadata.is_dir() {
        return Err(ConfigError::NotADirectory(path.to_path_buf()));
    }
    std::fs::read_dir(path).map_err(classify)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
