//! Application configuration structs
//!
//! Loaded from environment variables (a `.env` file is honoured in development).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ServerConfig,
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    /// Absent means single-instance mode: in-memory presence and local fan-out
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub chat: ChatConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub snowflake: SnowflakeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            _ => Err(ConfigError::InvalidValue("APP_ENV", s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout applied by the HTTP middleware
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How chat events reach WebSocket connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FanoutMode {
    /// Gateway mounted in the same process as the REST API
    #[default]
    Local,
    /// Events are published on Redis and every gateway instance delivers its own connections
    Redis,
}

impl FromStr for FanoutMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "redis" => Ok(Self::Redis),
            _ => Err(ConfigError::InvalidValue("GATEWAY_FANOUT", s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address of the standalone gateway binary
    pub server: ServerConfig,
    pub heartbeat_interval_ms: u64,
    /// Connections silent for longer than this are closed
    pub heartbeat_timeout_ms: u64,
    /// Outbound queue depth per connection
    pub send_buffer: usize,
    pub fanout: FanoutMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
    /// Overrides the migrations directory bundled with the db crate
    pub migrations_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry: i64,
}

/// Business rules of the messaging layer
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub edit_window_minutes: i64,
    pub history_default_limit: i64,
    pub history_max_limit: i64,
    pub search_limit: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            edit_window_minutes: 15,
            history_default_limit: 50,
            history_max_limit: 100,
            search_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeConfig {
    pub worker_id: u16,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// Returns an error if required keys are missing or malformed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let chat_defaults = ChatConfig::default();

        let worker_id: u16 = vars.parse_or("WORKER_ID", 0)?;
        if worker_id >= 1024 {
            return Err(ConfigError::InvalidValue("WORKER_ID", worker_id.to_string()));
        }

        Ok(Self {
            app: AppSettings {
                name: vars.get_or("APP_NAME", "carechat"),
                env: vars.parse_or("APP_ENV", Environment::Development)?,
            },
            api: ServerConfig {
                host: vars.get_or("API_HOST", "127.0.0.1"),
                port: vars.parse_or("API_PORT", 8080)?,
                request_timeout_secs: vars.parse_or("API_REQUEST_TIMEOUT_SECS", 30)?,
            },
            gateway: GatewayConfig {
                server: ServerConfig {
                    host: vars.get_or("GATEWAY_HOST", "127.0.0.1"),
                    port: vars.parse_or("GATEWAY_PORT", 8081)?,
                    request_timeout_secs: 0,
                },
                heartbeat_interval_ms: vars.parse_or("GATEWAY_HEARTBEAT_INTERVAL_MS", 41_250)?,
                heartbeat_timeout_ms: vars.parse_or("GATEWAY_HEARTBEAT_TIMEOUT_MS", 90_000)?,
                send_buffer: vars.parse_or("GATEWAY_SEND_BUFFER", 256)?,
                fanout: vars.parse_or("GATEWAY_FANOUT", FanoutMode::Local)?,
            },
            database: DatabaseConfig {
                url: vars.require("DATABASE_URL")?,
                max_connections: vars.parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
                min_connections: vars.parse_or("DATABASE_MIN_CONNECTIONS", 5)?,
                run_migrations: vars.parse_or("DATABASE_RUN_MIGRATIONS", true)?,
                migrations_dir: vars.get("DATABASE_MIGRATIONS_DIR"),
            },
            redis: match vars.get("REDIS_URL") {
                Some(url) => Some(RedisConfig {
                    url,
                    max_connections: vars.parse_or("REDIS_MAX_CONNECTIONS", 10)?,
                }),
                None => None,
            },
            jwt: JwtConfig {
                secret: vars.require("JWT_SECRET")?,
                access_token_expiry: vars.parse_or("JWT_ACCESS_TOKEN_EXPIRY", 900)?,
            },
            chat: ChatConfig {
                edit_window_minutes: vars
                    .parse_or("CHAT_EDIT_WINDOW_MINUTES", chat_defaults.edit_window_minutes)?,
                history_default_limit: vars
                    .parse_or("CHAT_HISTORY_DEFAULT_LIMIT", chat_defaults.history_default_limit)?,
                history_max_limit: vars
                    .parse_or("CHAT_HISTORY_MAX_LIMIT", chat_defaults.history_max_limit)?,
                search_limit: vars.parse_or("CHAT_SEARCH_LIMIT", chat_defaults.search_limit)?,
            },
            rate_limit: RateLimitConfig {
                requests_per_second: vars.parse_or("RATE_LIMIT_REQUESTS_PER_SECOND", 10)?,
                burst: vars.parse_or("RATE_LIMIT_BURST", 50)?,
            },
            cors: CorsConfig {
                allowed_origins: vars
                    .get("CORS_ALLOWED_ORIGINS")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            snowflake: SnowflakeConfig { worker_id },
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::MissingVar(key))
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
            None => Ok(default),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
