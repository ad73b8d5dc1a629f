//! Configuration management for the portfolio gate.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables prefixed `PORTFOLIO_GATE` with `__` between
//! sections (e.g. `PORTFOLIO_GATE__RATE_LIMITING__PER_SECOND=10`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{GateError, Result};
use crate::ratelimit::{
    IdentitySource, RateLimitConfig, DEFAULT_PER_DAY, DEFAULT_PER_MINUTE, DEFAULT_PER_SECOND,
};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "PORTFOLIO_GATE";

/// Main configuration for the gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests allowed per trailing second
    #[serde(default = "default_per_second")]
    pub per_second: u64,

    /// Requests allowed per trailing minute
    #[serde(default = "default_per_minute")]
    pub per_minute: u64,

    /// Requests allowed per trailing day
    #[serde(default = "default_per_day")]
    pub per_day: u64,

    /// How often idle clients are evicted, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Where client identities come from
    #[serde(default)]
    pub identity: IdentitySource,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            per_minute: default_per_minute(),
            per_day: default_per_day(),
            sweep_interval_secs: default_sweep_interval(),
            identity: IdentitySource::default(),
        }
    }
}

fn default_per_second() -> u64 {
    DEFAULT_PER_SECOND
}

fn default_per_minute() -> u64 {
    DEFAULT_PER_MINUTE
}

fn default_per_day() -> u64 {
    DEFAULT_PER_DAY
}

fn default_sweep_interval() -> u64 {
    3600
}

impl RateLimitingConfig {
    /// The thresholds handed to the limiter.
    pub fn limits(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.per_second, self.per_minute, self.per_day)
    }

    /// Interval between sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API; empty disables CORS headers
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Whether browsers may send credentials
    #[serde(default = "default_true")]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl GateConfig {
    /// Load configuration from defaults, an optional YAML file and the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&GateConfig::default())?);

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins"),
        );

        let config: GateConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file path, without environment
    /// overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limiting.sweep_interval_secs == 0 {
            return Err(GateError::Config(
                "rate_limiting.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        let limits = self.rate_limiting.limits();
        if !limits.is_ordered() {
            warn!(
                per_second = limits.per_second,
                per_minute = limits.per_minute,
                per_day = limits.per_day,
                "Rate limit thresholds are not increasing; the tightest window will dominate"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `load` reads the process environment; tests that call it hold this.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.server.http_addr.port(), 8080);
        assert_eq!(config.rate_limiting.limits(), RateLimitConfig::default());
        assert_eq!(config.rate_limiting.sweep_interval(), Duration::from_secs(3600));
        assert_eq!(config.rate_limiting.identity, IdentitySource::Shared);
        assert!(config.cors.allowed_origins.is_empty());
        assert!(config.cors.allow_credentials);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
rate_limiting:
  per_second: 2
  identity: forwarded
cors:
  allowed_origins:
    - https://admin.example.com
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.rate_limiting.per_second, 2);
        assert_eq!(config.rate_limiting.per_minute, DEFAULT_PER_MINUTE);
        assert_eq!(config.rate_limiting.identity, IdentitySource::Forwarded);
        assert_eq!(config.cors.allowed_origins, vec!["https://admin.example.com"]);
        assert_eq!(config.server.http_addr, default_http_addr());
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let yaml = r#"
rate_limiting:
  sweep_interval_secs: 0
"#;
        let err = GateConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_unknown_identity_source_is_rejected() {
        let yaml = r#"
rate_limiting:
  identity: cookie
"#;
        assert!(GateConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_layers_file_over_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = std::env::temp_dir().join(format!(
            "portfolio-gate-config-{}.yaml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "server:\n  http_addr: 127.0.0.1:9000\nrate_limiting:\n  per_day: 10\n  identity: peer\n",
        )
        .unwrap();

        let config = GateConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.http_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.rate_limiting.per_day, 10);
        assert_eq!(config.rate_limiting.per_second, DEFAULT_PER_SECOND);
        assert_eq!(config.rate_limiting.identity, IdentitySource::Peer);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = Path::new("/nonexistent/portfolio-gate.yaml");
        let err = GateConfig::load(Some(path)).unwrap_err();
        assert!(matches!(err, GateError::ConfigSource(_)));
    }

    #[test]
    fn test_load_layers_env_over_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = std::env::temp_dir().join(format!(
            "portfolio-gate-env-{}.yaml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "rate_limiting:\n  per_second: 2\n  per_day: 10\ncors:\n  allowed_origins:\n    - https://file.example\n",
        )
        .unwrap();

        std::env::set_var("PORTFOLIO_GATE__RATE_LIMITING__PER_SECOND", "10");
        std::env::set_var(
            "PORTFOLIO_GATE__CORS__ALLOWED_ORIGINS",
            "https://a.example,https://b.example",
        );
        let loaded = GateConfig::load(Some(&path));
        std::env::remove_var("PORTFOLIO_GATE__RATE_LIMITING__PER_SECOND");
        std::env::remove_var("PORTFOLIO_GATE__CORS__ALLOWED_ORIGINS");
        std::fs::remove_file(&path).ok();

        let config = loaded.unwrap();
        assert_eq!(config.rate_limiting.per_second, 10);
        assert_eq!(config.rate_limiting.per_day, 10);
        assert_eq!(config.rate_limiting.per_minute, DEFAULT_PER_MINUTE);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}
