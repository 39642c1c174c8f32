use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Server configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host address
    #[validate(length(min = 1, message = "HTTP host cannot be empty"))]
    pub http_host: String,

    /// HTTP server port (1-65535)
    #[validate(range(
        min = 1,
        max = 65535,
        message = "HTTP port must be between 1 and 65535"
    ))]
    pub http_port: u16,

    /// Directory holding studies.yml and per-study table definitions
    #[validate(length(min = 1, message = "Catalog directory cannot be empty"))]
    pub catalog_dir: String,

    /// Row limit applied when a request does not specify one
    #[validate(range(min = 1, message = "Default row limit must be positive"))]
    pub default_row_limit: u32,

    /// Administrative ceiling on the per-request row limit
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Max row limit must be between 1 and 1000000"
    ))]
    pub max_row_limit: u32,

    /// Whole-request timeout in seconds
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Request timeout must be between 1 and 3600 seconds"
    ))]
    pub request_timeout_secs: u64,

    /// Whether to run server in daemon mode
    pub daemon: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            catalog_dir: "catalog".to_string(),
            default_row_limit: 1000,
            max_row_limit: 10_000,
            request_timeout_secs: 30,
            daemon: false,
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            http_host: env::var("STUDYBRIDGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_env_var("STUDYBRIDGE_PORT", "8080")?,
            catalog_dir: env::var("STUDYBRIDGE_CATALOG_DIR")
                .unwrap_or_else(|_| "catalog".to_string()),
            default_row_limit: parse_env_var("STUDYBRIDGE_DEFAULT_ROW_LIMIT", "1000")?,
            max_row_limit: parse_env_var("STUDYBRIDGE_MAX_ROW_LIMIT", "10000")?,
            request_timeout_secs: parse_env_var("STUDYBRIDGE_REQUEST_TIMEOUT_SECS", "30")?,
            daemon: false, // Environment-based config always runs in foreground
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            http_host: cli.http_host,
            http_port: cli.http_port,
            catalog_dir: cli.catalog_dir,
            default_row_limit: cli.default_row_limit,
            max_row_limit: cli.max_row_limit,
            request_timeout_secs: cli.request_timeout_secs,
            daemon: cli.daemon,
        };

        config.validate()?;
        Ok(config)
    }

}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub http_host: String,
    pub http_port: u16,
    pub catalog_dir: String,
    pub default_row_limit: u32,
    pub max_row_limit: u32,
    pub request_timeout_secs: u64,
    pub daemon: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
