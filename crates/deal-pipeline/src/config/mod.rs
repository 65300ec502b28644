use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let pipeline_log_level = env::var("PIPELINE_LOG_LEVEL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let auto_advance_secs = match env::var("PIPELINE_AUTO_ADVANCE_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidAutoAdvanceDelay { value: raw })?,
            Err(_) => PipelineConfig::DEFAULT_AUTO_ADVANCE_SECS,
        };

        let catalog_path = env::var("PIPELINE_CATALOG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                pipeline_log_level,
            },
            pipeline: PipelineConfig {
                auto_advance_delay: Duration::from_secs(auto_advance_secs),
                catalog_path,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Overrides the level for the pipeline's own log target only.
    pub pipeline_log_level: Option<String>,
}

/// Timing and catalog settings for the deal flow engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Wait between a stage settling and the auto-advancement check.
    pub auto_advance_delay: Duration,
    /// Optional JSON catalog replacing the standard stages.
    pub catalog_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub const DEFAULT_AUTO_ADVANCE_SECS: u64 = 5;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_advance_delay: Duration::from_secs(Self::DEFAULT_AUTO_ADVANCE_SECS),
            catalog_path: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAutoAdvanceDelay { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAutoAdvanceDelay { value } => write!(
                f,
                "PIPELINE_AUTO_ADVANCE_SECS must be a whole number of seconds, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidAutoAdvanceDelay { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("PIPELINE_AUTO_ADVANCE_SECS");
        env::remove_var("PIPELINE_CATALOG_PATH");
        env::remove_var("PIPELINE_LOG_LEVEL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.pipeline_log_level, None);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_pipeline_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "ci");
        env::set_var("PIPELINE_AUTO_ADVANCE_SECS", " 1 ");
        env::set_var("PIPELINE_CATALOG_PATH", "/etc/deal-pipeline/catalog.json");
        env::set_var("PIPELINE_LOG_LEVEL", "debug");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.telemetry.pipeline_log_level.as_deref(), Some("debug"));
        assert_eq!(config.environment, AppEnvironment::Test);
        assert_eq!(config.pipeline.auto_advance_delay, Duration::from_secs(1));
        assert_eq!(
            config.pipeline.catalog_path,
            Some(PathBuf::from("/etc/deal-pipeline/catalog.json"))
        );
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_auto_advance_delay() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_AUTO_ADVANCE_SECS", "soon");
        match AppConfig::load() {
            Err(ConfigError::InvalidAutoAdvanceDelay { value }) => assert_eq!(value, "soon"),
            other => panic!("expected invalid delay, got {other:?}"),
        }
        reset_env();
    }
}
