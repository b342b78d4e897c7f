use crate::geometry::BoxSelection;
use config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the face cut service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Object storage configuration
    pub storage: StorageConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Message processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding the original photos
    pub photo_bucket: String,
    /// Bucket receiving the cropped faces
    pub face_bucket: String,
    /// Storage region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (Yandex Object Storage, MinIO, LocalStack, ...)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Schema holding the `photo` table, placed first on the search path
    pub schema: Option<String>,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

/// Message processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Messages of one batch processed at the same time (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// JPEG quality of the stored faces (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// How the face box is picked out of the face points
    #[serde(default)]
    pub box_selection: BoxSelection,
}

/// API configuration for the webhook endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

// Default value functions
fn default_service_name() -> String {
    "face-cut".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_region() -> String {
    "ru-central1".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_run_migrations() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            // Start with default values
            .set_default("service.name", "face-cut")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            // Add config file if present
            .add_source(config::File::with_name("config/face-cut").required(false))
            .add_source(config::File::with_name("/etc/face-cut/face-cut").required(false))
            // Override with environment variables
            // FACECUT__STORAGE__PHOTO_BUCKET -> storage.photo_bucket
            .add_source(
                config::Environment::with_prefix("FACECUT")
                    .separator("__")
                    .try_parsing(true),
            );

        // Serverless containers hand the listening port over in PORT
        let builder = with_port_override(builder, std::env::var("PORT").ok())?;

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, per message
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.photo_bucket.trim().is_empty() {
            anyhow::bail!("storage.photo_bucket must not be empty");
        }
        if self.storage.face_bucket.trim().is_empty() {
            anyhow::bail!("storage.face_bucket must not be empty");
        }
        if self.processing.concurrency == 0 {
            anyhow::bail!("processing.concurrency must be at least 1");
        }
        if !(1..=100).contains(&self.processing.jpeg_quality) {
            anyhow::bail!(
                "processing.jpeg_quality must be between 1 and 100, got {}",
                self.processing.jpeg_quality
            );
        }
        if let Some(ref schema) = self.database.schema {
            if !is_identifier(schema) {
                anyhow::bail!("database.schema is not a plain identifier: {schema:?}");
            }
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get idle connection timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// A `PORT` value wins over every other source of `api.port`
fn with_port_override(
    builder: ConfigBuilder<DefaultState>,
    port: Option<String>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    match port {
        Some(port) => builder.set_override("api.port", port),
        None => Ok(builder),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            jpeg_quality: default_jpeg_quality(),
            box_selection: BoxSelection::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}
