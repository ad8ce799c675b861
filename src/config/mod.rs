//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{level_filters::LevelFilter, warn};

pub use cli::{CliArgs, Command, DemoArgs, RuntimeOverrides, ServeArgs, ServeOverrides};

use crate::{
    cache::EvictionPolicy,
    plugin::{Properties, SLOW_SQL_THRESHOLD_PROPERTY},
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "mapperlab";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_NAMESPACE_CACHE_CAPACITY: usize = 512;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub namespace_cache: NamespaceCacheSettings,
    pub plugins: PluginSettings,
    /// Malformed values that were replaced by their defaults.
    pub fallbacks: Vec<ConfigFallback>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFallback {
    pub key: &'static str,
    pub value: String,
    pub fallback: String,
}

impl ConfigFallback {
    fn new(key: &'static str, value: String, fallback: impl ToString) -> Self {
        Self {
            key,
            value,
            fallback: fallback.to_string(),
        }
    }
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
    /// `None` selects the seeded in-memory table.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct NamespaceCacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub eviction_policy: EvictionPolicy,
}

/// Interceptor switches plus the raw string properties handed to them.
#[derive(Debug, Clone)]
pub struct PluginSettings {
    pub block_full_table_modify: bool,
    pub sql_cost: bool,
    pub trace: bool,
    /// Kept as text; the cost observer falls back to its default when it does
    /// not parse.
    pub slow_sql_threshold_ms: Option<String>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            block_full_table_modify: true,
            sql_cost: true,
            trace: true,
            slow_sql_threshold_ms: None,
        }
    }
}

impl PluginSettings {
    pub fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        if let Some(threshold) = self.slow_sql_threshold_ms.as_ref() {
            properties.insert(SLOW_SQL_THRESHOLD_PROPERTY.to_string(), threshold.clone());
        }
        properties
    }
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

    builder = builder.add_source(Environment::with_prefix("MAPPERLAB").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Demo(args)) => raw.apply_runtime_overrides(&args.overrides),
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
    namespace_cache: RawNamespaceCacheSettings,
    plugins: RawPluginSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }

        self.apply_runtime_overrides(&overrides.runtime);
    }

    fn apply_runtime_overrides(&mut self, overrides: &RuntimeOverrides) {
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
        if let Some(enabled) = overrides.namespace_cache_enabled {
            self.namespace_cache.enabled = Some(enabled.to_string());
        }
        if let Some(capacity) = overrides.namespace_cache_capacity.as_ref() {
            self.namespace_cache.capacity = Some(capacity.clone());
        }
        if let Some(policy) = overrides.namespace_cache_eviction_policy.as_ref() {
            self.namespace_cache.eviction_policy = Some(policy.clone());
        }
        if let Some(threshold) = overrides.slow_sql_threshold_ms.as_ref() {
            self.plugins.slow_sql_threshold_ms = Some(threshold.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            namespace_cache,
            plugins,
        } = raw;

        let mut fallbacks = Vec::new();
        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            namespace_cache: build_namespace_cache_settings(namespace_cache, &mut fallbacks),
            plugins: build_plugin_settings(plugins, &mut fallbacks),
            fallbacks,
        })
    }

    /// Log every value that was replaced by its default. Call once logging is
    /// installed.
    pub fn report_fallbacks(&self) {
        for fallback in &self.fallbacks {
            warn!(
                target: "mapperlab::config",
                key = fallback.key,
                value = %fallback.value,
                fallback = %fallback.fallback,
                "unrecognised configuration value; using default"
            );
        }
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

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_namespace_cache_settings(
    cache: RawNamespaceCacheSettings,
    fallbacks: &mut Vec<ConfigFallback>,
) -> NamespaceCacheSettings {
    let default_capacity =
        NonZeroUsize::new(DEFAULT_NAMESPACE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
    let capacity = match cache.capacity {
        Some(value) => value.trim().parse::<NonZeroUsize>().unwrap_or_else(|_| {
            fallbacks.push(ConfigFallback::new(
                "namespace_cache.capacity",
                value,
                default_capacity.get(),
            ));
            default_capacity
        }),
        None => default_capacity,
    };

    let eviction_policy = match cache.eviction_policy {
        Some(value) => EvictionPolicy::from_str(value.trim()).unwrap_or_else(|_| {
            let fallback = EvictionPolicy::default();
            fallbacks.push(ConfigFallback::new(
                "namespace_cache.eviction_policy",
                value,
                fallback.as_str(),
            ));
            fallback
        }),
        None => EvictionPolicy::default(),
    };

    NamespaceCacheSettings {
        enabled: lenient_flag("namespace_cache.enabled", cache.enabled, true, fallbacks),
        capacity,
        eviction_policy,
    }
}

fn build_plugin_settings(
    plugins: RawPluginSettings,
    fallbacks: &mut Vec<ConfigFallback>,
) -> PluginSettings {
    let defaults = PluginSettings::default();
    PluginSettings {
        block_full_table_modify: lenient_flag(
            "plugins.block_full_table_modify",
            plugins.block_full_table_modify,
            defaults.block_full_table_modify,
            fallbacks,
        ),
        sql_cost: lenient_flag(
            "plugins.sql_cost",
            plugins.sql_cost,
            defaults.sql_cost,
            fallbacks,
        ),
        trace: lenient_flag("plugins.trace", plugins.trace, defaults.trace, fallbacks),
        slow_sql_threshold_ms: plugins.slow_sql_threshold_ms,
    }
}

fn lenient_flag(
    key: &'static str,
    value: Option<String>,
    default: bool,
    fallbacks: &mut Vec<ConfigFallback>,
) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            fallbacks.push(ConfigFallback::new(key, value, default));
            default
        }
    }
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

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNamespaceCacheSettings {
    enabled: Option<String>,
    capacity: Option<String>,
    eviction_policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPluginSettings {
    block_full_table_modify: Option<String>,
    sql_cost: Option<String>,
    trace: Option<String>,
    slow_sql_threshold_ms: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
