//! Configuration management for finca.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. API credentials are never written to
//! disk; they are only accepted from the environment.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/finca/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Portal API settings
    pub api: ApiConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Raw-response archive settings
    pub archive: ArchiveConfig,
    /// Job execution settings
    pub job: JobConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `FINCA_API_KEY` / `FINCA_API_SECRET`: portal API credentials
    /// - `FINCA_LOCATION_ID`: override the searched location
    /// - `FINCA_DATABASE_PATH`: override the SQLite database path
    /// - `FINCA_ARCHIVE_ROOT`: override the raw-response archive directory
    /// - `FINCA_MAX_PAGES`: cap the number of pages fetched per scan
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("FINCA_API_KEY") {
            config.api.key = Some(val);
        }

        if let Ok(val) = std::env::var("FINCA_API_SECRET") {
            config.api.secret = Some(val);
        }

        if let Ok(val) = std::env::var("FINCA_LOCATION_ID") {
            tracing::debug!("Override api.location_id from env: {}", val);
            config.api.location_id = val;
        }

        if let Ok(val) = std::env::var("FINCA_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", val);
            config.database.path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("FINCA_ARCHIVE_ROOT") {
            tracing::debug!("Override archive.root from env: {}", val);
            config.archive.root = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("FINCA_MAX_PAGES") {
            if let Ok(pages) = val.parse() {
                tracing::debug!("Override job.max_pages from env: {}", pages);
                config.job.max_pages = Some(pages);
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist. Credentials are
    /// skipped during serialization and never land in the file.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/finca/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "finca", "finca").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/finca`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "finca", "finca").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Portal API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the portal API
    pub base_url: String,
    /// Target country code
    pub country: String,
    /// Target location identifier (default: Madrid)
    pub location_id: String,
    /// Items requested per page (portal maximum is 50)
    pub max_items: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// API key (env only, never persisted)
    #[serde(skip)]
    pub key: Option<String>,
    /// API secret (env only, never persisted)
    #[serde(skip)]
    pub secret: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.idealista.com".to_string(),
            country: "es".to_string(),
            location_id: "0-EU-ES-28".to_string(),
            max_items: 50,
            timeout_secs: 30,
            key: None,
            secret: None,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("finca.db"),
        }
    }
}

/// Raw-response archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Root directory for archived pages and job metadata
    pub root: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("raw_responses"),
        }
    }
}

/// Job execution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Maximum number of pages to fetch per scan (None = no cap)
    pub max_pages: Option<u32>,
}
