//! Application configuration management.

use serde::Deserialize;
use uuid::Uuid;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Exchange rate service configuration.
    #[serde(default)]
    pub currency: CurrencySettings,
    /// Document extraction service configuration.
    #[serde(default)]
    pub extraction: ExtractionSettings,
    /// Approval workflow configuration.
    #[serde(default)]
    pub workflow: WorkflowSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted upload size for receipt documents, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Exchange rate service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencySettings {
    /// Base URL of the rate API; `/latest/{CODE}` is appended per lookup.
    #[serde(default = "default_rate_api_url")]
    pub api_base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    /// How long a fetched rate table stays cached, in seconds.
    #[serde(default = "default_rate_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            api_base_url: default_rate_api_url(),
            timeout_secs: default_http_timeout(),
            cache_ttl_secs: default_rate_cache_ttl(),
        }
    }
}

fn default_rate_api_url() -> String {
    "https://api.exchangerate-api.com/v4".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_rate_cache_ttl() -> u64 {
    3600
}

/// Document extraction service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionSettings {
    /// API key for the extraction model. Uploads are refused when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name.
    #[serde(default = "default_extraction_model")]
    pub model: String,
    /// API endpoint root.
    #[serde(default = "default_extraction_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_extraction_model(),
            endpoint: default_extraction_endpoint(),
            timeout_secs: default_extraction_timeout(),
        }
    }
}

fn default_extraction_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_extraction_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_extraction_timeout() -> u64 {
    60
}

/// Approval workflow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSettings {
    /// What to do with an expense that has no approver:
    /// `hold`, `auto_approve` or `fallback_approver`.
    #[serde(default = "default_dead_end_policy")]
    pub dead_end_policy: String,
    /// Approver used by the `fallback_approver` policy.
    #[serde(default)]
    pub fallback_approver_id: Option<Uuid>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            dead_end_policy: default_dead_end_policy(),
            fallback_approver_id: None,
        }
    }
}

fn default_dead_end_policy() -> String {
    "hold".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("OUTLAY").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Parses configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or misses required keys.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
