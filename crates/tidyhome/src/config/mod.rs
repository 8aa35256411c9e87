use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
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

/// Top-level configuration for the back-office service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
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

        let backend = BackendConfig {
            rest_url: env::var("BACKEND_REST_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:54321/rest/v1".to_string()),
            auth_url: env::var("BACKEND_AUTH_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:54321/auth/v1".to_string()),
            api_key: env::var("BACKEND_API_KEY").unwrap_or_default(),
        };

        let ttl_secs = env::var("QUOTE_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidCacheTtl)?;

        let session = SessionConfig {
            access_cookie: env::var("SESSION_ACCESS_COOKIE")
                .unwrap_or_else(|_| "sb-access-token".to_string()),
            refresh_cookie: env::var("SESSION_REFRESH_COOKIE")
                .unwrap_or_else(|_| "sb-refresh-token".to_string()),
            revalidate_secret: env::var("REVALIDATE_SECRET")
                .ok()
                .filter(|secret| !secret.trim().is_empty()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            backend,
            cache: CacheConfig {
                ttl: Duration::from_secs(ttl_secs),
            },
            session,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location and credentials of the managed database and identity endpoints.
#[derive(Clone)]
pub struct BackendConfig {
    pub rest_url: String,
    pub auth_url: String,
    pub api_key: String,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("rest_url", &self.rest_url)
            .field("auth_url", &self.auth_url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

/// Freshness window applied to quote reads.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

/// Session cookie names and the writer-facing invalidation secret.
#[derive(Clone)]
pub struct SessionConfig {
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub revalidate_secret: Option<String>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("access_cookie", &self.access_cookie)
            .field("refresh_cookie", &self.refresh_cookie)
            .field(
                "revalidate_secret",
                &self.revalidate_secret.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCacheTtl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCacheTtl => {
                write!(f, "QUOTE_CACHE_TTL_SECS must be a whole number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidCacheTtl => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
