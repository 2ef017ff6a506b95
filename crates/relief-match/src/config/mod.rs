use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DISTANCE_URL: &str = "https://app.zipcodebase.com/api/v1/distance";

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

/// Top-level configuration for the relief matching service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub distance: DistanceConfig,
    pub matching: MatchingConfig,
    pub seed_dir: Option<PathBuf>,
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

        let timeout_ms = env::var("DISTANCE_TIMEOUT_MS")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidDistanceTimeout)?;

        let distance = DistanceConfig {
            base_url: env::var("DISTANCE_API_URL")
                .unwrap_or_else(|_| DEFAULT_DISTANCE_URL.to_string()),
            api_key: env::var("DISTANCE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            country: env::var("DISTANCE_COUNTRY").unwrap_or_else(|_| "us".to_string()),
            unit: env::var("DISTANCE_UNIT").unwrap_or_else(|_| "miles".to_string()),
            timeout: Duration::from_millis(timeout_ms),
        };

        let partial_status = match env::var("MATCH_PARTIAL_STATUS") {
            Ok(raw) => PartialMatchStatus::parse(&raw)
                .ok_or(ConfigError::InvalidPartialStatus(raw))?,
            Err(_) => PartialMatchStatus::LeavePending,
        };

        let seed_dir = env::var("RELIEF_SEED_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            distance,
            matching: MatchingConfig { partial_status },
            seed_dir,
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
}

/// Outbound zip-code distance lookups. Without an API key the lookup is disabled and
/// nearest-donor ranking degrades to fulfillment ranking.
#[derive(Debug, Clone)]
pub struct DistanceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub country: String,
    pub unit: String,
    pub timeout: Duration,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DISTANCE_URL.to_string(),
            api_key: None,
            country: "us".to_string(),
            unit: "miles".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

/// What happens to a request's status when a call leaves it only partially filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialMatchStatus {
    #[default]
    LeavePending,
    MarkMatched,
}

impl PartialMatchStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leave_pending" | "pending" => Some(Self::LeavePending),
            "mark_matched" | "matched" => Some(Self::MarkMatched),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingConfig {
    pub partial_status: PartialMatchStatus,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDistanceTimeout,
    InvalidPartialStatus(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDistanceTimeout => {
                write!(f, "DISTANCE_TIMEOUT_MS must be a positive number of milliseconds")
            }
            ConfigError::InvalidPartialStatus(value) => write!(
                f,
                "MATCH_PARTIAL_STATUS '{}' must be leave_pending or mark_matched",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDistanceTimeout
            | ConfigError::InvalidPartialStatus(_) => None,
        }
    }
}
