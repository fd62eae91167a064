use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the dvhc binary.
#[derive(Debug, Parser)]
#[command(
    name = "dvhc",
    version,
    about = "Vietnamese administrative units API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DVHC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
    /// Hard-delete units that have been soft-deleted for a while.
    Purge(PurgeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Include the internal error chain in error responses.
    #[arg(
        long = "expose-error-details",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub expose_error_details: Option<bool>,

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

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the v1 fallback file.
    #[arg(long = "fallback-v1-path", value_name = "PATH")]
    pub fallback_v1_path: Option<PathBuf>,

    /// Override the v2 fallback file.
    #[arg(long = "fallback-v2-path", value_name = "PATH")]
    pub fallback_v2_path: Option<PathBuf>,

    /// Keep the v2 fallback document in memory between requests.
    #[arg(
        long = "fallback-cache-v2",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub fallback_cache_v2: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Only purge units soft-deleted more than this many days ago.
    #[arg(long = "older-than-days", value_name = "DAYS", default_value_t = 30)]
    pub older_than_days: u32,
}
