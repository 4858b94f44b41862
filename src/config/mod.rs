//! Site settings: `config/default`, `finwage`, `--config-file`, `FINWAGE__*` env, then CLI flags.

use std::{
    net::{Ipv4Addr, SocketAddr},
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{
    BackendOverride, CliArgs, Command, MigrationsArgs, MigrationsCommand, MigrationsDownArgs,
    MigrationsUpArgs, RevalidateArgs, RevalidateCommand, SeedArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "finwage";
const ENV_PREFIX: &str = "FINWAGE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8090";
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BACKEND_PER_PAGE: u64 = 50;
const MAX_BACKEND_PER_PAGE: u64 = 500;
const DEFAULT_CACHE_CAPACITY: u64 = 1024;
const DEFAULT_STATIC_SECS: u64 = 604_800;
const DEFAULT_LONG_SECS: u64 = 86_400;
const DEFAULT_MEDIUM_SECS: u64 = 3_600;
const DEFAULT_SHORT_SECS: u64 = 300;
const DEFAULT_LEDGER_COLLECTION: &str = "site_migrations";

/// Validated settings for the server, the backend client and the revalidation endpoints.
///
/// Built once at startup and shared read-only by every service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub revalidation: RevalidationSettings,
    pub cache: CacheSettings,
    pub migrations: MigrationSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
pub struct BackendSettings {
    pub url: Url,
    pub timeout: Duration,
    pub per_page: NonZeroU32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RevalidationSettings {
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub cron_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub static_secs: u64,
    pub long_secs: u64,
    pub medium_secs: u64,
    pub short_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub ledger_collection: String,
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

/// Merges every source in order and validates the result.
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
        Some(Command::Migrations(args)) => raw.apply_backend_override(&args.backend),
        Some(Command::Seed(args)) => raw.apply_backend_override(&args.backend),
        Some(Command::Revalidate(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Parses the command line and loads settings for it.
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
    backend: RawBackendSettings,
    revalidation: RawRevalidationSettings,
    cache: RawCacheSettings,
    migrations: RawMigrationSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }

        self.apply_backend_override(&overrides.backend);
    }

    fn apply_backend_override(&mut self, overrides: &BackendOverride) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            backend,
            revalidation,
            cache,
            migrations,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            backend: build_backend_settings(backend)?,
            revalidation: build_revalidation_settings(revalidation),
            cache: build_cache_settings(cache)?,
            migrations: build_migration_settings(migrations)?,
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

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let raw_url = non_blank(backend.url).unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("backend.url", format!("invalid url `{raw_url}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "backend.url",
            "scheme must be http or https",
        ));
    }

    let timeout_secs = backend
        .timeout_seconds
        .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "backend.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let per_page_value = backend.per_page.unwrap_or(DEFAULT_BACKEND_PER_PAGE);
    if per_page_value > MAX_BACKEND_PER_PAGE {
        return Err(LoadError::invalid(
            "backend.per_page",
            format!("must not exceed {MAX_BACKEND_PER_PAGE}"),
        ));
    }
    let per_page = non_zero_u32(per_page_value, "backend.per_page")?;

    let admin_email = non_blank(backend.admin_email);
    let admin_password = non_blank(backend.admin_password);
    if admin_email.is_some() != admin_password.is_some() {
        return Err(LoadError::invalid(
            "backend.admin_email",
            "admin email and password must be configured together",
        ));
    }

    Ok(BackendSettings {
        url,
        timeout: Duration::from_secs(timeout_secs),
        per_page,
        admin_email,
        admin_password,
    })
}

fn build_revalidation_settings(revalidation: RawRevalidationSettings) -> RevalidationSettings {
    RevalidationSettings {
        api_key: non_blank(revalidation.api_key),
        webhook_secret: non_blank(revalidation.webhook_secret),
        cron_secret: non_blank(revalidation.cron_secret),
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity_value = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    let capacity = usize::try_from(capacity_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    let static_secs = cache.static_secs.unwrap_or(DEFAULT_STATIC_SECS);
    let long_secs = cache.long_secs.unwrap_or(DEFAULT_LONG_SECS);
    let medium_secs = cache.medium_secs.unwrap_or(DEFAULT_MEDIUM_SECS);
    let short_secs = cache.short_secs.unwrap_or(DEFAULT_SHORT_SECS);
    if !(short_secs <= medium_secs && medium_secs <= long_secs && long_secs <= static_secs) {
        return Err(LoadError::invalid(
            "cache.durations",
            "tiers must satisfy short <= medium <= long <= static",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        static_secs,
        long_secs,
        medium_secs,
        short_secs,
    })
}

fn build_migration_settings(
    migrations: RawMigrationSettings,
) -> Result<MigrationSettings, LoadError> {
    let ledger_collection = non_blank(migrations.ledger_collection)
        .unwrap_or_else(|| DEFAULT_LEDGER_COLLECTION.to_string());
    if !ledger_collection
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(LoadError::invalid(
            "migrations.ledger_collection",
            "must contain only ASCII letters, digits and underscores",
        ));
    }

    Ok(MigrationSettings { ledger_collection })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    url: Option<String>,
    timeout_seconds: Option<u64>,
    per_page: Option<u64>,
    admin_email: Option<String>,
    admin_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRevalidationSettings {
    api_key: Option<String>,
    webhook_secret: Option<String>,
    cron_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<u64>,
    static_secs: Option<u64>,
    long_secs: Option<u64>,
    medium_secs: Option<u64>,
    short_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMigrationSettings {
    ledger_collection: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl Settings {
    /// Base URL of this service's own listener, used by the `revalidate` client.
    pub fn self_url(&self) -> String {
        let mut addr = self.server.addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(Ipv4Addr::LOCALHOST.into());
        }
        format!("http://{addr}")
    }
}
