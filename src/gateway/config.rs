//! Gateway configuration.
//!
//! One gateway implementation, parameterized by this record: namespace prefix and
//! version, per-partition limits, timeouts, classification tables and branding for
//! synthesized offline pages.

use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::cache::{CacheNamespace, DataPolicy, NamespaceLimits, Partition};

pub(crate) const DEFAULT_PREFIX: &str = "newsgate";
pub(crate) const DEFAULT_VERSION: &str = "1";
pub(crate) const DEFAULT_STATIC_TIMEOUT: Duration = Duration::from_secs(8);
pub(crate) const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(15);
pub(crate) const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_REVALIDATE_AFTER: Duration = Duration::from_secs(5 * 60);
pub(crate) const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub(crate) const DEFAULT_STATIC_MAX_ENTRIES: usize = 100;
pub(crate) const DEFAULT_STATIC_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub(crate) const DEFAULT_DATA_MAX_ENTRIES: usize = 50;
pub(crate) const DEFAULT_DATA_MAX_AGE: Duration = Duration::from_secs(4 * 60 * 60);
pub(crate) const DEFAULT_PAGES_MAX_ENTRIES: usize = 10;
pub(crate) const DEFAULT_PAGES_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

pub(crate) const DEFAULT_API_PREFIXES: &[&str] = &["/api/"];
pub(crate) const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["/api/ai/", "/api/terminal/"];
pub(crate) const DEFAULT_STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "woff", "woff2", "ttf", "otf", "eot", "png", "jpg", "jpeg", "gif",
    "svg", "ico", "webp", "json",
];
pub(crate) const DEFAULT_REVALIDATE_EXTENSIONS: &[&str] = &["css", "js", "mjs"];
pub(crate) const DEFAULT_STATIC_HOSTS: &[&str] = &[
    "fonts.googleapis.com",
    "fonts.gstatic.com",
    "cdnjs.cloudflare.com",
];
pub(crate) const DEFAULT_REFRESH_PARAMS: &[&str] = &["_refresh", "_t"];

/// Strings used when the gateway has to invent a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub app_name: String,
    pub offline_title: String,
    pub offline_message: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            app_name: "E-con News Terminal".to_string(),
            offline_title: "SYSTEM OFFLINE".to_string(),
            offline_message: "Connection to the news network was lost. Cached data will be used where available; retry once the link is back.".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Leading segment of every namespace name this gateway owns.
    pub cache_prefix: String,
    /// Current version tag; namespaces carrying any other tag are garbage.
    pub version: String,
    /// Origin the page talks to. Its host counts as same-origin for classification.
    pub origin: Url,
    pub static_limits: NamespaceLimits,
    pub data_limits: NamespaceLimits,
    pub pages_limits: NamespaceLimits,
    pub static_timeout: Duration,
    pub api_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Deadline for requests forwarded without interception. `None` leaves them to the
    /// upstream client's own limits.
    pub passthrough_timeout: Option<Duration>,
    pub maintenance_interval: Duration,
    pub api_prefixes: Vec<String>,
    /// Paths the gateway never intercepts, even for GET.
    pub excluded_prefixes: Vec<String>,
    pub static_extensions: Vec<String>,
    /// Static assets that are refetched in the background after a cache hit.
    pub revalidate_extensions: Vec<String>,
    /// Minimum age of a cached asset before a hit triggers a background refetch.
    pub revalidate_after: Duration,
    pub static_hosts: Vec<String>,
    /// Query parameters that mark a pull-to-refresh request.
    pub refresh_params: Vec<String>,
    /// Paths fetched during install; any failure fails the install.
    pub precache_core: Vec<String>,
    /// Paths fetched during install on a best-effort basis.
    pub precache_optional: Vec<String>,
    pub branding: Branding,
}

impl GatewayConfig {
    /// Defaults for a gateway fronting `origin`.
    pub fn for_origin(origin: Url) -> Self {
        Self {
            cache_prefix: DEFAULT_PREFIX.to_string(),
            version: DEFAULT_VERSION.to_string(),
            origin,
            static_limits: NamespaceLimits {
                max_entries: non_zero(DEFAULT_STATIC_MAX_ENTRIES),
                max_age: DEFAULT_STATIC_MAX_AGE,
                policy: DataPolicy::NetworkFirst,
            },
            data_limits: NamespaceLimits {
                max_entries: non_zero(DEFAULT_DATA_MAX_ENTRIES),
                max_age: DEFAULT_DATA_MAX_AGE,
                policy: DataPolicy::NetworkFirst,
            },
            pages_limits: NamespaceLimits {
                max_entries: non_zero(DEFAULT_PAGES_MAX_ENTRIES),
                max_age: DEFAULT_PAGES_MAX_AGE,
                policy: DataPolicy::NetworkFirst,
            },
            static_timeout: DEFAULT_STATIC_TIMEOUT,
            api_timeout: DEFAULT_API_TIMEOUT,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            passthrough_timeout: None,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            api_prefixes: to_strings(DEFAULT_API_PREFIXES),
            excluded_prefixes: to_strings(DEFAULT_EXCLUDED_PREFIXES),
            static_extensions: to_strings(DEFAULT_STATIC_EXTENSIONS),
            revalidate_extensions: to_strings(DEFAULT_REVALIDATE_EXTENSIONS),
            revalidate_after: DEFAULT_REVALIDATE_AFTER,
            static_hosts: to_strings(DEFAULT_STATIC_HOSTS),
            refresh_params: to_strings(DEFAULT_REFRESH_PARAMS),
            precache_core: vec!["/".to_string()],
            precache_optional: Vec::new(),
            branding: Branding::default(),
        }
    }

    pub fn limits(&self, partition: Partition) -> NamespaceLimits {
        match partition {
            Partition::Static => self.static_limits,
            Partition::NewsData => self.data_limits,
            Partition::Pages => self.pages_limits,
        }
    }

    pub fn namespace(&self, partition: Partition) -> CacheNamespace {
        CacheNamespace::new(
            &self.cache_prefix,
            &self.version,
            partition,
            self.limits(partition),
        )
    }

    /// Resolve a configured path or absolute URL against the origin.
    pub fn resolve(&self, path_or_url: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path_or_url)
    }
}

impl From<&crate::config::Settings> for GatewayConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        let gateway = &settings.gateway;
        Self {
            cache_prefix: gateway.cache_prefix.clone(),
            version: gateway.version.clone(),
            origin: settings.upstream.base_url.clone(),
            static_limits: settings.namespaces.static_assets,
            data_limits: settings.namespaces.data,
            pages_limits: settings.namespaces.pages,
            static_timeout: gateway.static_timeout,
            api_timeout: gateway.api_timeout,
            navigation_timeout: gateway.navigation_timeout,
            passthrough_timeout: gateway.passthrough_timeout,
            maintenance_interval: gateway.maintenance_interval,
            api_prefixes: gateway.api_prefixes.clone(),
            excluded_prefixes: gateway.excluded_prefixes.clone(),
            static_extensions: gateway.static_extensions.clone(),
            revalidate_extensions: gateway.revalidate_extensions.clone(),
            revalidate_after: gateway.revalidate_after,
            static_hosts: settings.upstream.static_hosts.clone(),
            refresh_params: gateway.refresh_params.clone(),
            precache_core: gateway.precache_core.clone(),
            precache_optional: gateway.precache_optional.clone(),
            branding: settings.branding.clone(),
        }
    }
}

pub(crate) fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}
