//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::{DataPolicy, NamespaceLimits};
use crate::gateway::Branding;
use crate::gateway::config::{
    DEFAULT_API_PREFIXES, DEFAULT_API_TIMEOUT, DEFAULT_DATA_MAX_AGE, DEFAULT_DATA_MAX_ENTRIES,
    DEFAULT_EXCLUDED_PREFIXES, DEFAULT_MAINTENANCE_INTERVAL, DEFAULT_NAVIGATION_TIMEOUT,
    DEFAULT_PAGES_MAX_AGE, DEFAULT_PAGES_MAX_ENTRIES, DEFAULT_PREFIX, DEFAULT_REFRESH_PARAMS,
    DEFAULT_REVALIDATE_AFTER, DEFAULT_REVALIDATE_EXTENSIONS, DEFAULT_STATIC_EXTENSIONS,
    DEFAULT_STATIC_HOSTS, DEFAULT_STATIC_MAX_AGE, DEFAULT_STATIC_MAX_ENTRIES,
    DEFAULT_STATIC_TIMEOUT, DEFAULT_VERSION, to_strings,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "newsgate";
const ENV_PREFIX: &str = "NEWSGATE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;
const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STORAGE_DIR: &str = "newsgate-cache";
const DEFAULT_MESSAGE_CAPACITY: usize = 32;

/// Command-line arguments for the newsgate binary.
#[derive(Debug, Parser)]
#[command(
    name = "newsgate",
    version,
    about = "Offline-tolerant caching gateway for the news terminal"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NEWSGATE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the caching gateway in front of the upstream origin.
    Serve(Box<ServeArgs>),
    /// Delete cached entries from the configured store.
    Clear(ClearArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    /// Override the storage backend.
    #[arg(long = "storage", value_name = "BACKEND")]
    pub storage: Option<StorageBackend>,

    /// Override the cache directory used by the filesystem backend.
    #[arg(long = "storage-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub storage_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub storage: StorageOverrides,

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

    /// Override the upstream origin.
    #[arg(long = "upstream-url", value_name = "URL", value_hint = ValueHint::Url)]
    pub upstream_url: Option<String>,

    /// Override the cache version tag.
    #[arg(long = "cache-version", value_name = "VERSION")]
    pub cache_version: Option<String>,

    /// Activate right after install instead of waiting for SKIP_WAITING.
    #[arg(
        long = "skip-waiting",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub skip_waiting: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct ClearArgs {
    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Partition to clear (static, news-data, pages); all of them when omitted.
    #[arg(value_name = "PARTITION")]
    pub partition: Option<String>,

    /// Also delete namespaces left behind by other versions.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub all_versions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Fs,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub upstream: UpstreamSettings,
    pub gateway: GatewaySettings,
    pub storage: StorageSettings,
    pub namespaces: NamespaceSettings,
    pub branding: Branding,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub max_body_bytes: NonZeroU64,
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
pub struct UpstreamSettings {
    pub base_url: Url,
    pub static_hosts: Vec<String>,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub cache_prefix: String,
    pub version: String,
    pub static_timeout: Duration,
    pub api_timeout: Duration,
    pub navigation_timeout: Duration,
    pub passthrough_timeout: Option<Duration>,
    pub maintenance_interval: Duration,
    pub revalidate_after: Duration,
    pub api_prefixes: Vec<String>,
    pub excluded_prefixes: Vec<String>,
    pub static_extensions: Vec<String>,
    pub revalidate_extensions: Vec<String>,
    pub refresh_params: Vec<String>,
    pub precache_core: Vec<String>,
    pub precache_optional: Vec<String>,
    pub skip_waiting: bool,
    pub message_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub directory: PathBuf,
    pub quota_bytes: Option<NonZeroU64>,
}

#[derive(Debug, Clone, Copy)]
pub struct NamespaceSettings {
    pub static_assets: NamespaceLimits,
    pub data: NamespaceLimits,
    pub pages: NamespaceLimits,
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
        Some(Command::Clear(args)) => raw.apply_storage_overrides(&args.storage),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    upstream: RawUpstreamSettings,
    gateway: RawGatewaySettings,
    namespaces: RawNamespaceSettings,
    branding: RawBrandingSettings,
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
        if let Some(url) = overrides.upstream_url.as_ref() {
            self.upstream.base_url = Some(url.clone());
        }
        if let Some(version) = overrides.cache_version.as_ref() {
            self.gateway.version = Some(version.clone());
        }
        if let Some(skip) = overrides.skip_waiting {
            self.gateway.skip_waiting = Some(skip);
        }

        self.apply_storage_overrides(&overrides.storage);
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        if let Some(backend) = overrides.storage {
            self.gateway.storage = Some(backend);
        }
        if let Some(dir) = overrides.storage_dir.as_ref() {
            self.gateway.storage_dir = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            upstream,
            gateway,
            namespaces,
            branding,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let upstream = build_upstream_settings(upstream)?;
        let storage = build_storage_settings(&gateway)?;
        let gateway = build_gateway_settings(gateway)?;
        let namespaces = build_namespace_settings(namespaces)?;
        let branding = build_branding(branding);

        Ok(Self {
            server,
            logging,
            upstream,
            gateway,
            storage,
            namespaces,
            branding,
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
    let graceful_shutdown = non_zero_seconds(graceful_secs, "server.graceful_shutdown_seconds")?;

    let max_body_value = server.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
    let max_body_bytes = NonZeroU64::new(max_body_value)
        .ok_or_else(|| LoadError::invalid("server.max_body_bytes", "must be greater than zero"))?;
    usize::try_from(max_body_value).map_err(|_| {
        LoadError::invalid(
            "server.max_body_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
        max_body_bytes,
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

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let raw_url = upstream
        .base_url
        .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
    let base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("upstream.base_url", format!("{raw_url}: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
        return Err(LoadError::invalid(
            "upstream.base_url",
            "must be an absolute http(s) URL",
        ));
    }

    let static_hosts = non_empty_list(
        upstream.static_hosts,
        DEFAULT_STATIC_HOSTS,
        "upstream.static_hosts",
        true,
    )?;

    let connect_secs = upstream
        .connect_timeout_seconds
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    let connect_timeout = non_zero_seconds(connect_secs, "upstream.connect_timeout_seconds")?;

    Ok(UpstreamSettings {
        base_url,
        static_hosts,
        connect_timeout,
    })
}

fn build_gateway_settings(gateway: RawGatewaySettings) -> Result<GatewaySettings, LoadError> {
    let cache_prefix = non_empty_string(gateway.cache_prefix, DEFAULT_PREFIX, "gateway.cache_prefix")?;
    if cache_prefix.contains(['/', '\\']) {
        return Err(LoadError::invalid(
            "gateway.cache_prefix",
            "must not contain path separators",
        ));
    }
    let version = non_empty_string(gateway.version, DEFAULT_VERSION, "gateway.version")?;

    let static_timeout = seconds_or(
        gateway.static_timeout_seconds,
        DEFAULT_STATIC_TIMEOUT,
        "gateway.static_timeout_seconds",
    )?;
    let api_timeout = seconds_or(
        gateway.api_timeout_seconds,
        DEFAULT_API_TIMEOUT,
        "gateway.api_timeout_seconds",
    )?;
    let navigation_timeout = seconds_or(
        gateway.navigation_timeout_seconds,
        DEFAULT_NAVIGATION_TIMEOUT,
        "gateway.navigation_timeout_seconds",
    )?;
    let passthrough_timeout = gateway
        .passthrough_timeout_seconds
        .map(|seconds| non_zero_seconds(seconds, "gateway.passthrough_timeout_seconds"))
        .transpose()?;
    let maintenance_interval = seconds_or(
        gateway.maintenance_interval_seconds,
        DEFAULT_MAINTENANCE_INTERVAL,
        "gateway.maintenance_interval_seconds",
    )?;
    // Zero is allowed: every cache hit on an eligible asset revalidates.
    let revalidate_after = gateway
        .revalidate_after_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REVALIDATE_AFTER);

    let api_prefixes = non_empty_list(
        gateway.api_prefixes,
        DEFAULT_API_PREFIXES,
        "gateway.api_prefixes",
        false,
    )?;
    let excluded_prefixes = non_empty_list(
        gateway.excluded_prefixes,
        DEFAULT_EXCLUDED_PREFIXES,
        "gateway.excluded_prefixes",
        true,
    )?;
    let static_extensions = normalize_extensions(non_empty_list(
        gateway.static_extensions,
        DEFAULT_STATIC_EXTENSIONS,
        "gateway.static_extensions",
        false,
    )?);
    let revalidate_extensions = normalize_extensions(non_empty_list(
        gateway.revalidate_extensions,
        DEFAULT_REVALIDATE_EXTENSIONS,
        "gateway.revalidate_extensions",
        true,
    )?);
    let refresh_params = non_empty_list(
        gateway.refresh_params,
        DEFAULT_REFRESH_PARAMS,
        "gateway.refresh_params",
        true,
    )?;
    let precache_core = non_empty_list(gateway.precache_core, &["/"], "gateway.precache_core", true)?;
    let precache_optional =
        non_empty_list(gateway.precache_optional, &[], "gateway.precache_optional", true)?;

    let message_capacity = NonZeroUsize::new(
        gateway
            .message_capacity
            .unwrap_or(DEFAULT_MESSAGE_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("gateway.message_capacity", "must be greater than zero"))?;

    Ok(GatewaySettings {
        cache_prefix,
        version,
        static_timeout,
        api_timeout,
        navigation_timeout,
        passthrough_timeout,
        maintenance_interval,
        revalidate_after,
        api_prefixes,
        excluded_prefixes,
        static_extensions,
        revalidate_extensions,
        refresh_params,
        precache_core,
        precache_optional,
        skip_waiting: gateway.skip_waiting.unwrap_or(false),
        message_capacity,
    })
}

fn build_storage_settings(gateway: &RawGatewaySettings) -> Result<StorageSettings, LoadError> {
    let backend = gateway.storage.unwrap_or(StorageBackend::Fs);
    let directory = gateway
        .storage_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "gateway.storage_dir",
            "path must not be empty",
        ));
    }
    let quota_bytes = match gateway.storage_quota_bytes {
        None => None,
        Some(value) => Some(NonZeroU64::new(value).ok_or_else(|| {
            LoadError::invalid("gateway.storage_quota_bytes", "must be greater than zero")
        })?),
    };

    Ok(StorageSettings {
        backend,
        directory,
        quota_bytes,
    })
}

fn build_namespace_settings(
    namespaces: RawNamespaceSettings,
) -> Result<NamespaceSettings, LoadError> {
    Ok(NamespaceSettings {
        static_assets: build_limits(
            namespaces.static_assets,
            DEFAULT_STATIC_MAX_ENTRIES,
            DEFAULT_STATIC_MAX_AGE,
            [
                "namespaces.static.max_entries",
                "namespaces.static.max_age_seconds",
                "namespaces.static.policy",
            ],
        )?,
        data: build_limits(
            namespaces.data,
            DEFAULT_DATA_MAX_ENTRIES,
            DEFAULT_DATA_MAX_AGE,
            [
                "namespaces.data.max_entries",
                "namespaces.data.max_age_seconds",
                "namespaces.data.policy",
            ],
        )?,
        pages: build_limits(
            namespaces.pages,
            DEFAULT_PAGES_MAX_ENTRIES,
            DEFAULT_PAGES_MAX_AGE,
            [
                "namespaces.pages.max_entries",
                "namespaces.pages.max_age_seconds",
                "namespaces.pages.policy",
            ],
        )?,
    })
}

fn build_limits(
    raw: RawNamespaceLimits,
    default_entries: usize,
    default_age: Duration,
    [entries_key, age_key, policy_key]: [&'static str; 3],
) -> Result<NamespaceLimits, LoadError> {
    let max_entries = NonZeroUsize::new(raw.max_entries.unwrap_or(default_entries))
        .ok_or_else(|| LoadError::invalid(entries_key, "must be greater than zero"))?;
    let max_age = seconds_or(raw.max_age_seconds, default_age, age_key)?;
    let policy = match raw.policy {
        Some(value) => {
            DataPolicy::from_str(&value).map_err(|reason| LoadError::invalid(policy_key, reason))?
        }
        None => DataPolicy::default(),
    };

    Ok(NamespaceLimits {
        max_entries,
        max_age,
        policy,
    })
}

fn build_branding(raw: RawBrandingSettings) -> Branding {
    let defaults = Branding::default();
    let pick = |value: Option<String>, fallback: String| {
        value
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(fallback)
    };
    Branding {
        app_name: pick(raw.app_name, defaults.app_name),
        offline_title: pick(raw.offline_title, defaults.offline_title),
        offline_message: pick(raw.offline_message, defaults.offline_message),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    base_url: Option<String>,
    static_hosts: Option<Vec<String>>,
    connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGatewaySettings {
    cache_prefix: Option<String>,
    version: Option<String>,
    static_timeout_seconds: Option<u64>,
    api_timeout_seconds: Option<u64>,
    navigation_timeout_seconds: Option<u64>,
    passthrough_timeout_seconds: Option<u64>,
    maintenance_interval_seconds: Option<u64>,
    revalidate_after_seconds: Option<u64>,
    api_prefixes: Option<Vec<String>>,
    excluded_prefixes: Option<Vec<String>>,
    static_extensions: Option<Vec<String>>,
    revalidate_extensions: Option<Vec<String>>,
    refresh_params: Option<Vec<String>>,
    precache_core: Option<Vec<String>>,
    precache_optional: Option<Vec<String>>,
    skip_waiting: Option<bool>,
    message_capacity: Option<usize>,
    storage: Option<StorageBackend>,
    storage_dir: Option<PathBuf>,
    storage_quota_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNamespaceSettings {
    #[serde(rename = "static")]
    static_assets: RawNamespaceLimits,
    data: RawNamespaceLimits,
    pages: RawNamespaceLimits,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNamespaceLimits {
    max_entries: Option<usize>,
    max_age_seconds: Option<u64>,
    policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrandingSettings {
    app_name: Option<String>,
    offline_title: Option<String>,
    offline_message: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn seconds_or(
    value: Option<u64>,
    default: Duration,
    key: &'static str,
) -> Result<Duration, LoadError> {
    match value {
        Some(seconds) => non_zero_seconds(seconds, key),
        None => Ok(default),
    }
}

fn non_empty_string(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Trimmed list, or `default` when unset. Blank items are rejected; an empty list is
/// only accepted when `allow_empty` is set.
fn non_empty_list(
    value: Option<Vec<String>>,
    default: &[&str],
    key: &'static str,
    allow_empty: bool,
) -> Result<Vec<String>, LoadError> {
    let Some(items) = value else {
        return Ok(to_strings(default));
    };
    let mut cleaned = Vec::with_capacity(items.len());
    for item in items {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            return Err(LoadError::invalid(key, "entries must not be empty"));
        }
        cleaned.push(trimmed.to_string());
    }
    if cleaned.is_empty() && !allow_empty {
        return Err(LoadError::invalid(key, "must list at least one entry"));
    }
    Ok(cleaned)
}

fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    extensions
        .into_iter()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
