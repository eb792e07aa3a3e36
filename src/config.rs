//! Configuration module for APK Depot.

use serde::Deserialize;
use std::path::Path;

use crate::{DepotError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// How the declared media type of an upload is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypePolicy {
    /// Reject anything other than the APK media type.
    #[default]
    Strict,
    /// Accept any media type, logging unexpected ones.
    Permissive,
}

/// Blob and metadata storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the uploaded APK files.
    #[serde(default = "default_uploads_path")]
    pub uploads_path: String,
    /// Path to the JSON metadata document.
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Name of the multipart field carrying the file.
    #[serde(default = "default_upload_field")]
    pub upload_field: String,
    /// Media type policy for uploads.
    #[serde(default)]
    pub media_type_policy: MediaTypePolicy,
    /// Omit metadata entries whose file is missing from listings.
    #[serde(default = "default_hide_orphaned_entries")]
    pub hide_orphaned_entries: bool,
}

fn default_uploads_path() -> String {
    "uploads".to_string()
}

fn default_metadata_path() -> String {
    "data/apks.json".to_string()
}

fn default_max_upload_size() -> u64 {
    10 * 1024 // 10GB
}

fn default_upload_field() -> String {
    "apk".to_string()
}

fn default_hide_orphaned_entries() -> bool {
    true
}

impl StorageConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_path: default_uploads_path(),
            metadata_path: default_metadata_path(),
            max_upload_size_mb: default_max_upload_size(),
            upload_field: default_upload_field(),
            media_type_policy: MediaTypePolicy::default(),
            hide_orphaned_entries: default_hide_orphaned_entries(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/apkdepot.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Web front configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Directory with the landing page and other static assets.
    #[serde(default = "default_static_path")]
    pub static_path: String,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Whether to mount the Swagger UI.
    #[serde(default = "default_enable_swagger")]
    pub enable_swagger: bool,
}

fn default_static_path() -> String {
    "public".to_string()
}

fn default_enable_swagger() -> bool {
    true
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            static_path: default_static_path(),
            cors_origins: vec![],
            enable_swagger: default_enable_swagger(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Web configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DepotError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DepotError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PORT`: Override the listening port
    /// - `APKDEPOT_UPLOADS_DIR`: Override the uploads directory
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT value"),
            }
        }

        if let Some(dir) = lookup("APKDEPOT_UPLOADS_DIR") {
            if !dir.is_empty() {
                self.storage.uploads_path = dir;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.max_upload_size_mb == 0 {
            return Err(DepotError::Config(
                "storage.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        if self.storage.upload_field.trim().is_empty() {
            return Err(DepotError::Config(
                "storage.upload_field must not be empty".to_string(),
            ));
        }
        if Path::new(&self.storage.uploads_path) == Path::new(&self.web.static_path) {
            return Err(DepotError::Config(
                "storage.uploads_path and web.static_path must differ".to_string(),
            ));
        }
        Ok(())
    }
}
