//! Application configuration for the publisher.
//!
//! User config lives at `~/.publisher/publisher.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PublisherError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "publisher.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".publisher";

// ---------------------------------------------------------------------------
// Config structs (matching publisher.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Attachment download settings.
    #[serde(default)]
    pub attachments: AttachmentsConfig,

    /// Bulk import behaviour.
    #[serde(default)]
    pub import: ImportPolicyConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Slug of the organisation used when a row names none.
    #[serde(default = "default_organisation")]
    pub default_organisation: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_organisation: default_organisation(),
        }
    }
}

fn default_database_path() -> String {
    "var/publisher.db".into()
}
fn default_organisation() -> String {
    "government-digital-service".into()
}

/// `[attachments]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    /// Directory where fetched attachment files are cached.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Redirects followed before giving up.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_cache_dir() -> String {
    "var/attachment-cache".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[import]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportPolicyConfig {
    /// Abort the whole file on the first failing row.
    #[serde(default)]
    pub stop_on_row_error: bool,
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime attachment cache configuration.
#[derive(Debug, Clone)]
pub struct AttachmentCacheConfig {
    /// Root directory of the on-disk cache.
    pub cache_dir: PathBuf,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Redirects followed before giving up.
    pub max_redirects: usize,
}

impl From<&AppConfig> for AttachmentCacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            cache_dir: PathBuf::from(&config.attachments.cache_dir),
            timeout: Duration::from_secs(config.attachments.timeout_secs),
            max_redirects: config.attachments.max_redirects,
        }
    }
}

/// Runtime configuration for one import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// CSV file to import.
    pub csv_path: PathBuf,
    /// Slug of the fallback organisation.
    pub default_organisation: String,
    /// Abort the whole file on the first failing row.
    pub stop_on_row_error: bool,
}

impl ImportConfig {
    pub fn new(csv_path: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            csv_path: csv_path.into(),
            default_organisation: config.defaults.default_organisation.clone(),
            stop_on_row_error: config.import.stop_on_row_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.publisher/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PublisherError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.publisher/publisher.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PublisherError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PublisherError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PublisherError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PublisherError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PublisherError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
