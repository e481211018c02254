//! Configuration management for Turnstile.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::{LimiterKind, LimiterSpec};

/// Prefix for environment variable overrides, e.g.
/// `TURNSTILE_RATE_LIMIT__REQUESTS_PER_WINDOW=120`.
pub const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,

    /// Deployment environment ("development", "production", ...)
    #[serde(default = "default_env")]
    pub env: String,

    /// Deadline attached to each request's context, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            env: default_env(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Whether the service runs in the development environment.
    pub fn is_development(&self) -> bool {
        self.env == "development"
    }

    /// Whether the service runs in the production environment.
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// The per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_env() -> String {
    "development".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable text
    Text,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Include the source file and line of each event
    #[serde(default)]
    pub add_source: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            add_source: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSettings {
    /// Whether the rate limiting middleware is installed at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Requests admitted per client per window
    #[serde(default = "default_requests")]
    pub requests_per_window: u32,

    /// Which strategy to use
    #[serde(default)]
    pub strategy: LimiterKind,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_window: default_requests(),
            strategy: LimiterKind::default(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitSettings {
    /// The accounting window.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// The limiter these settings describe.
    pub fn limiter_spec(&self) -> LimiterSpec {
        LimiterSpec {
            kind: self.strategy,
            limit: self.requests_per_window,
            window: self.window(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

impl TurnstileConfig {
    /// Load configuration from built-in defaults, an optional YAML file and
    /// `TURNSTILE_*` environment variables, in increasing precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: TurnstileConfig = builder
            .build()
            .and_then(Config::try_deserialize::<TurnstileConfig>)
            .map_err(|e| TurnstileError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout_ms == 0 {
            return Err(TurnstileError::Config(
                "server.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.requests_per_window == 0 {
            return Err(TurnstileError::Config(
                "rate_limit.requests_per_window must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(TurnstileError::Config(
                "rate_limit.window_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TurnstileConfig::default();

        assert_eq!(config.server.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(config.server.is_development());
        assert!(!config.server.is_production());
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_window, 60);
        assert_eq!(config.rate_limit.strategy, LimiterKind::SlidingWindow);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
server:
  addr: 0.0.0.0:9000
  env: production
rate_limit:
  requests_per_window: 10
  strategy: token-bucket
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.addr.port(), 9000);
        assert!(config.server.is_production());
        assert_eq!(config.rate_limit.requests_per_window, 10);
        assert_eq!(config.rate_limit.strategy, LimiterKind::TokenBucket);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_rejects_unknown_rate_limit_fields() {
        let yaml = r#"
rate_limit:
  requests_per_min: 100
"#;
        assert!(matches!(
            TurnstileConfig::from_yaml(yaml),
            Err(TurnstileError::Config(_))
        ));
    }

    #[test]
    fn test_text_log_format() {
        let yaml = r#"
logging:
  level: debug
  format: text
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.add_source);
    }

    #[test]
    fn test_add_source() {
        let yaml = r#"
logging:
  add_source: true
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        assert!(config.logging.add_source);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_zero_request_timeout() {
        let yaml = r#"
server:
  request_timeout_ms: 0
"#;
        assert!(matches!(
            TurnstileConfig::from_yaml(yaml),
            Err(TurnstileError::Config(_))
        ));

        let mut config = TurnstileConfig::default();
        config.server.request_timeout_ms = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_quota() {
        let yaml = r#"
rate_limit:
  requests_per_window: 0
"#;
        assert!(matches!(
            TurnstileConfig::from_yaml(yaml),
            Err(TurnstileError::Config(_))
        ));

        let yaml = r#"
rate_limit:
  window_secs: 0
"#;
        assert!(TurnstileConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let yaml = r#"
rate_limit:
  strategy: leaky-bucket
"#;
        assert!(TurnstileConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_limiter_spec() {
        let settings = RateLimitSettings {
            enabled: true,
            requests_per_window: 5,
            strategy: LimiterKind::TokenBucket,
            window_secs: 10,
        };

        let spec = settings.limiter_spec();
        assert_eq!(spec.kind, LimiterKind::TokenBucket);
        assert_eq!(spec.limit, 5);
        assert_eq!(spec.window, Duration::from_secs(10));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = TurnstileConfig::load(None).unwrap();
        assert_eq!(config.rate_limit.requests_per_window, 60);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            TurnstileConfig::from_file("/nonexistent/turnstile.yaml"),
            Err(TurnstileError::Io(_))
        ));
        assert!(TurnstileConfig::load(Some(Path::new("/nonexistent/turnstile.yaml"))).is_err());
    }
}
