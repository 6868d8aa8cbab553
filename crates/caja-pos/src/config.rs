//! # Terminal Configuration
//!
//! Everything a terminal needs to know at startup: which company and
//! branch it sells for, where the database lives, and where the external
//! services are.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAJA_BRANCH_ID=sucursal-2                                          │
//! │     CAJA_EMISSION_URL=https://emisor.example/api/documentos            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/caja-pos/caja.toml (Linux)                               │
//! │     ~/Library/Application Support/cl.caja.pos/caja.toml (macOS)        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [terminal]
//! company_id = "demo-company"
//! branch_id = "demo-branch"
//! name = "Caja 1"
//!
//! [database]
//! path = "/var/lib/caja/caja.db"
//! max_connections = 5
//!
//! [emission]
//! endpoint = "https://emisor.example/api/documentos"
//! api_key = "..."
//! timeout_secs = 30
//!
//! [archive]
//! endpoint = "https://archivo.example/api/files"
//! root_folder = "Documentos"
//!
//! [upload]
//! endpoint = "https://media.example/upload"
//!
//! [folios]
//! low_stock_threshold = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

// =============================================================================
// Errors
// =============================================================================

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// Which company and branch this terminal sells for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub company_id: String,
    pub branch_id: String,
    #[serde(default = "default_terminal_name")]
    pub name: String,
}

fn default_terminal_name() -> String {
    "Caja 1".to_string()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            company_id: "demo-company".to_string(),
            branch_id: "demo-branch".to_string(),
            name: default_terminal_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

/// The document-emission service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl EmissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmissionConfig {
    fn default() -> Self {
        EmissionConfig {
            endpoint: "http://127.0.0.1:8787/documentos".to_string(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Folder/archival service. Disabled when no endpoint is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
}

fn default_root_folder() -> String {
    "Documentos".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            endpoint: None,
            root_folder: default_root_folder(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolioConfig {
    /// Log a warning at checkout when fewer folios than this remain.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
}

fn default_low_stock_threshold() -> i64 {
    50
}

impl Default for FolioConfig {
    fn default() -> Self {
        FolioConfig {
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

// =============================================================================
// PosConfig
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub emission: EmissionConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub folios: FolioConfig,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (caja.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.terminal.company_id.trim().is_empty() {
            return Err(ConfigError::Invalid("terminal.company_id is required".into()));
        }
        if self.terminal.branch_id.trim().is_empty() {
            return Err(ConfigError::Invalid("terminal.branch_id is required".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.emission.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "emission.timeout_secs must be greater than 0".into(),
            ));
        }

        validate_http_url("emission.endpoint", &self.emission.endpoint)?;
        if let Some(ref url) = self.archive.endpoint {
            validate_http_url("archive.endpoint", url)?;
        }
        if let Some(ref url) = self.upload.endpoint {
            validate_http_url("upload.endpoint", url)?;
        }

        Ok(())
    }

    /// Applies `CAJA_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("CAJA_COMPANY_ID") {
            debug!(company_id = %id, "Overriding company from environment");
            self.terminal.company_id = id;
        }
        if let Some(id) = lookup("CAJA_BRANCH_ID") {
            debug!(branch_id = %id, "Overriding branch from environment");
            self.terminal.branch_id = id;
        }
        if let Some(name) = lookup("CAJA_TERMINAL_NAME") {
            self.terminal.name = name;
        }
        if let Some(path) = lookup("CAJA_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("CAJA_EMISSION_URL") {
            debug!(url = %url, "Overriding emission endpoint from environment");
            self.emission.endpoint = url;
        }
        if let Some(key) = lookup("CAJA_EMISSION_API_KEY") {
            self.emission.api_key = Some(key);
        }
        if let Some(secs) = lookup("CAJA_EMISSION_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => self.emission.timeout_secs = secs,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric CAJA_EMISSION_TIMEOUT_SECS"),
            }
        }
        if let Some(url) = lookup("CAJA_ARCHIVE_URL") {
            self.archive.endpoint = Some(url);
        }
        if let Some(url) = lookup("CAJA_UPLOAD_URL") {
            self.upload.endpoint = Some(url);
        }
        if let Some(threshold) = lookup("CAJA_FOLIO_WARN_THRESHOLD") {
            match threshold.parse::<i64>() {
                Ok(threshold) => self.folios.low_stock_threshold = threshold,
                Err(_) => warn!(value = %threshold, "Ignoring non-numeric CAJA_FOLIO_WARN_THRESHOLD"),
            }
        }
    }

    /// Resolves the database file path.
    ///
    /// ## Platform-Specific Defaults
    /// - **macOS**: `~/Library/Application Support/cl.caja.pos/caja.db`
    /// - **Windows**: `%APPDATA%\caja\pos\data\caja.db`
    /// - **Linux**: `~/.local/share/caja-pos/caja.db`
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        if let Some(ref path) = self.database.path {
            return Ok(path.clone());
        }

        let dirs = directories::ProjectDirs::from("cl", "caja", "pos").ok_or(ConfigError::NoConfigDir)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Ok(data_dir.join("caja.db"))
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("cl", "caja", "pos")
            .map(|dirs| dirs.config_dir().join("caja.toml"))
    }
}

fn validate_http_url(field: &str, raw: &str) -> ConfigResult<()> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("expected http or https, got {}", other),
        }),
    }
}
