//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub relationships: RelationshipConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "social.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://social.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Token verification settings
///
/// Tokens are issued by the credential service with the same secret.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
}

/// Relationship rules
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipConfig {
    /// Refuse reactions, comments, shares and story likes across a block
    #[serde(default = "default_true")]
    pub enforce_blocks_on_content: bool,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            enforce_blocks_on_content: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Page sizes for every paginated listing
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the client sends none (default: 20)
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Upper bound for client supplied page sizes (default: 100)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Notification retention
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Delete notifications older than this many days; 0 keeps them forever
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// How often the retention purge runs (default: 3600)
    #[serde(default = "default_purge_interval_seconds")]
    pub purge_interval_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            purge_interval_seconds: default_purge_interval_seconds(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

fn default_retention_days() -> u32 {
    90
}

fn default_purge_interval_seconds() -> u64 {
    3600
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (RUSTCIRCLE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/rustcircle.db")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("relationships.enforce_blocks_on_content", true)?
            .set_default("pagination.default_page_size", 20)?
            .set_default("pagination.max_page_size", 100)?
            .set_default("notifications.retention_days", 90)?
            .set_default("notifications.purge_interval_seconds", 3600)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (RUSTCIRCLE__*)
            .add_source(
                Environment::with_prefix("RUSTCIRCLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        let pagination = &self.pagination;
        if pagination.default_page_size == 0
            || pagination.default_page_size > pagination.max_page_size
        {
            return Err(crate::error::AppError::Config(
                "pagination.default_page_size must be between 1 and pagination.max_page_size"
                    .to_string(),
            ));
        }

        if self.notifications.retention_days == 0 {
            tracing::warn!("notifications.retention_days=0; notifications are kept forever");
        }

        Ok(())
    }
}
