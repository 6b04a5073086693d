//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
#[cfg(test)]
mod tests;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    str::FromStr,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CacheArgs, CacheCommand, CliArgs, Command, RedisOverrides, ServeArgs, ServeOverrides};

use crate::cache::keys::RESERVED_NAMESPACES;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bistro";
const ENV_PREFIX: &str = "BISTRO";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_REDIS_HOST: &str = "redis";
const DEFAULT_REDIS_PORT: u16 = 6379;
const DEFAULT_REDIS_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DISHES_TTL_SECS: u64 = 300;
const DEFAULT_TABLES_TTL_SECS: u64 = 60;
const DEFAULT_AVAILABLE_TABLES_TTL_SECS: u64 = 30;
const DEFAULT_ORDER_TTL_SECS: u64 = 180;
const DEFAULT_PROBE_TTL_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 10;
const DEFAULT_RATE_LIMIT_PREFIX: &str = "rate_limit";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub enabled: bool,
    /// Connection URL; built from host and port when not configured explicitly.
    pub url: String,
    pub connect_timeout_seconds: NonZeroU64,
    pub operation_timeout_seconds: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub dishes_ttl_seconds: NonZeroU64,
    pub tables_ttl_seconds: NonZeroU64,
    pub available_tables_ttl_seconds: NonZeroU64,
    pub order_ttl_seconds: NonZeroU64,
    pub probe_ttl_seconds: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
    pub key_prefix: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Cache(args)) => raw.apply_redis_overrides(&args.redis),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    redis: RawRedisSettings,
    cache: RawCacheSettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }

        self.apply_redis_overrides(&overrides.redis);
    }

    fn apply_redis_overrides(&mut self, overrides: &RedisOverrides) {
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(host) = overrides.redis_host.as_ref() {
            self.redis.host = Some(host.clone());
        }
        if let Some(port) = overrides.redis_port.as_ref() {
            self.redis.port = Some(RawPort::Text(port.clone()));
        }
        if let Some(enabled) = overrides.redis_enabled {
            self.redis.enabled = Some(enabled);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            redis,
            cache,
            rate_limit,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            redis: build_redis_settings(redis)?,
            cache: build_cache_settings(cache)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let url = match redis.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            let host = redis
                .host
                .as_deref()
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .unwrap_or(DEFAULT_REDIS_HOST);
            let port = match redis.port.as_ref() {
                Some(raw) => parse_redis_port(raw)
                    .map_err(|reason| LoadError::invalid("redis.port", reason))?,
                None => DEFAULT_REDIS_PORT,
            };
            format!("redis://{host}:{port}/0")
        }
    };

    Ok(RedisSettings {
        enabled: redis.enabled.unwrap_or(true),
        url,
        connect_timeout_seconds: non_zero_u64(
            redis
                .connect_timeout_seconds
                .unwrap_or(DEFAULT_REDIS_TIMEOUT_SECS),
            "redis.connect_timeout_seconds",
        )?,
        operation_timeout_seconds: non_zero_u64(
            redis
                .operation_timeout_seconds
                .unwrap_or(DEFAULT_REDIS_TIMEOUT_SECS),
            "redis.operation_timeout_seconds",
        )?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    Ok(CacheSettings {
        dishes_ttl_seconds: non_zero_u64(
            cache.dishes_ttl_seconds.unwrap_or(DEFAULT_DISHES_TTL_SECS),
            "cache.dishes_ttl_seconds",
        )?,
        tables_ttl_seconds: non_zero_u64(
            cache.tables_ttl_seconds.unwrap_or(DEFAULT_TABLES_TTL_SECS),
            "cache.tables_ttl_seconds",
        )?,
        available_tables_ttl_seconds: non_zero_u64(
            cache
                .available_tables_ttl_seconds
                .unwrap_or(DEFAULT_AVAILABLE_TABLES_TTL_SECS),
            "cache.available_tables_ttl_seconds",
        )?,
        order_ttl_seconds: non_zero_u64(
            cache.order_ttl_seconds.unwrap_or(DEFAULT_ORDER_TTL_SECS),
            "cache.order_ttl_seconds",
        )?,
        probe_ttl_seconds: non_zero_u64(
            cache.probe_ttl_seconds.unwrap_or(DEFAULT_PROBE_TTL_SECS),
            "cache.probe_ttl_seconds",
        )?,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds = non_zero_u32(
        rate_limit
            .window_seconds
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        "rate_limit.window_seconds",
    )?;
    let max_requests = non_zero_u32(
        rate_limit
            .max_requests
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS),
        "rate_limit.max_requests",
    )?;

    let key_prefix = rate_limit
        .key_prefix
        .map(|prefix| prefix.trim().to_string())
        .unwrap_or_else(|| DEFAULT_RATE_LIMIT_PREFIX.to_string());
    if key_prefix.is_empty() || key_prefix.contains(':') {
        return Err(LoadError::invalid(
            "rate_limit.key_prefix",
            "must be a non-empty name without `:`",
        ));
    }
    if RESERVED_NAMESPACES.contains(&key_prefix.as_str()) {
        return Err(LoadError::invalid(
            "rate_limit.key_prefix",
            format!("`{key_prefix}` is reserved for cached data"),
        ));
    }

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
        key_prefix,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

/// Ports arrive as numbers from files and as text from the environment, where container links
/// inject values like `tcp://10.0.0.3:6379`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    enabled: Option<bool>,
    url: Option<String>,
    host: Option<String>,
    port: Option<RawPort>,
    connect_timeout_seconds: Option<u64>,
    operation_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    dishes_ttl_seconds: Option<u64>,
    tables_ttl_seconds: Option<u64>,
    available_tables_ttl_seconds: Option<u64>,
    order_ttl_seconds: Option<u64>,
    probe_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
    key_prefix: Option<String>,
}

fn parse_redis_port(raw: &RawPort) -> Result<u16, String> {
    let text = match raw {
        RawPort::Number(value) => value.to_string(),
        RawPort::Text(value) => value.trim().to_string(),
    };
    let candidate = text.rsplit(':').next().unwrap_or(text.as_str());
    match candidate.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port `{text}`")),
        Ok(port) => Ok(port),
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
