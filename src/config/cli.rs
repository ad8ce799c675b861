use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the mapperlab binary.
#[derive(Debug, Parser)]
#[command(
    name = "mapperlab",
    version,
    about = "Mapper-layer lab: interceptor chain and statement caches over a user table"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MAPPERLAB_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the user and cache endpoints over HTTP.
    Serve(ServeArgs),
    /// Run the session/namespace cache scenario once and log what happened.
    Demo(DemoArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DemoArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    #[command(flatten)]
    pub runtime: RuntimeOverrides,
}

/// Overrides shared by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL. Without one the in-memory table is used.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle the namespace cache.
    #[arg(
        long = "namespace-cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub namespace_cache_enabled: Option<bool>,

    /// Override the per-namespace cache capacity.
    #[arg(long = "namespace-cache-capacity", value_name = "ENTRIES")]
    pub namespace_cache_capacity: Option<String>,

    /// Override the namespace cache eviction policy (lru|fifo).
    #[arg(long = "namespace-cache-eviction-policy", value_name = "POLICY")]
    pub namespace_cache_eviction_policy: Option<String>,

    /// Override the slow statement threshold in milliseconds.
    #[arg(long = "slow-sql-threshold-ms", value_name = "MILLIS")]
    pub slow_sql_threshold_ms: Option<String>,
}
