use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::cache::RefreshFrequency;

/// Command-line arguments for the finwage-site binary.
#[derive(Debug, Parser)]
#[command(
    name = "finwage-site",
    version,
    about = "FinWage marketing site data service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FINWAGE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply or revert collection rule migrations.
    #[command(name = "migrations")]
    Migrations(MigrationsArgs),
    /// Create records from a TOML seed file.
    #[command(name = "seed")]
    Seed(SeedArgs),
    /// Ask a running server to revalidate cached content.
    #[command(name = "revalidate")]
    Revalidate(RevalidateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct BackendOverride {
    /// Override the PocketBase base URL.
    #[arg(long = "backend-url", value_name = "URL")]
    pub backend_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub backend: BackendOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Toggle the tagged cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrationsArgs {
    #[command(flatten)]
    pub backend: BackendOverride,

    #[command(subcommand)]
    pub command: MigrationsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum MigrationsCommand {
    /// List every migration and whether it is applied.
    #[command(name = "status")]
    Status,
    /// Apply pending migrations in ascending timestamp order.
    #[command(name = "up")]
    Up(MigrationsUpArgs),
    /// Revert the most recently applied migrations.
    #[command(name = "down")]
    Down(MigrationsDownArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrationsUpArgs {
    /// Stop after applying this version.
    #[arg(long = "to", value_name = "VERSION")]
    pub to: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrationsDownArgs {
    /// Number of applied migrations to revert.
    #[arg(long = "steps", default_value_t = 1, value_name = "COUNT")]
    pub steps: usize,
}

#[derive(Debug, Args, Clone)]
pub struct SeedArgs {
    #[command(flatten)]
    pub backend: BackendOverride,

    /// Seed file with `[[collections]]` tables.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct RevalidateArgs {
    /// Base URL of the running server; defaults to the configured listener.
    #[arg(long = "server-url", value_name = "URL")]
    pub server_url: Option<String>,

    #[command(subcommand)]
    pub command: RevalidateCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum RevalidateCommand {
    /// Invalidate cache tags.
    #[command(name = "tag")]
    Tag {
        #[arg(value_name = "TAG", required = true)]
        tags: Vec<String>,
    },
    /// Invalidate rendered paths.
    #[command(name = "path")]
    Path {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,
    },
    /// Invalidate every domain tag and site route.
    #[command(name = "all")]
    All,
    /// Run a scheduled refresh (hourly, daily or weekly).
    #[command(name = "frequency")]
    Frequency {
        #[arg(value_name = "FREQUENCY")]
        frequency: RefreshFrequency,
    },
}
