//! Versioned cache namespaces.
//!
//! A namespace name has the layout `<prefix>-<partition>-v<version>`. Bumping the
//! version makes every namespace of the previous version garbage that activation
//! removes by enumerating names and filtering on the prefix.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which slice of traffic a namespace holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    Static,
    NewsData,
    Pages,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Static, Partition::NewsData, Partition::Pages];

    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Static => "static",
            Partition::NewsData => "news-data",
            Partition::Pages => "pages",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "static" => Ok(Partition::Static),
            "news-data" | "data" => Ok(Partition::NewsData),
            "pages" => Ok(Partition::Pages),
            other => Err(format!("unknown cache partition `{other}`")),
        }
    }
}

/// How the `data-api` handler treats a cached entry that is still within `max_age`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataPolicy {
    /// Always try the network; the cache is a degraded fallback only.
    #[default]
    NetworkFirst,
    /// Serve a fresh-enough entry at once and refresh it in the background.
    StaleWhileRevalidate,
}

impl DataPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DataPolicy::NetworkFirst => "network-first",
            DataPolicy::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

impl FromStr for DataPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "network-first" | "network_first" => Ok(DataPolicy::NetworkFirst),
            "stale-while-revalidate" | "stale_while_revalidate" | "swr" => {
                Ok(DataPolicy::StaleWhileRevalidate)
            }
            other => Err(format!("unknown data policy `{other}`")),
        }
    }
}

/// Limits applied to one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceLimits {
    pub max_entries: NonZeroUsize,
    pub max_age: Duration,
    pub policy: DataPolicy,
}

/// Lifecycle of a namespace instance. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceState {
    Active,
    Superseded,
    Deleted,
}

impl NamespaceState {
    pub fn as_str(self) -> &'static str {
        match self {
            NamespaceState::Active => "active",
            NamespaceState::Superseded => "superseded",
            NamespaceState::Deleted => "deleted",
        }
    }
}

/// A named, versioned partition of the persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNamespace {
    pub partition: Partition,
    pub name: String,
    pub version: String,
    pub max_entries: NonZeroUsize,
    pub max_age: Duration,
    pub policy: DataPolicy,
}

impl CacheNamespace {
    pub fn new(prefix: &str, version: &str, partition: Partition, limits: NamespaceLimits) -> Self {
        Self {
            partition,
            name: namespace_name(prefix, partition.as_str(), version),
            version: version.to_string(),
            max_entries: limits.max_entries,
            max_age: limits.max_age,
            policy: limits.policy,
        }
    }
}

pub fn namespace_name(prefix: &str, partition: &str, version: &str) -> String {
    format!("{prefix}-{partition}-v{version}")
}

/// Split a namespace name into `(partition, version)` if it carries `prefix`.
pub fn parse_namespace_name<'a>(name: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
    let (partition, version) = rest.rsplit_once("-v")?;
    if partition.is_empty() || version.is_empty() {
        return None;
    }
    Some((partition, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> NamespaceLimits {
        NamespaceLimits {
            max_entries: NonZeroUsize::new(3).unwrap(),
            max_age: Duration::from_secs(60),
            policy: DataPolicy::NetworkFirst,
        }
    }

    #[test]
    fn name_layout() {
        let ns = CacheNamespace::new("newsgate", "7", Partition::NewsData, limits());
        assert_eq!(ns.name, "newsgate-news-data-v7");
        assert_eq!(ns.version, "7");
    }

    #[test]
    fn parse_round_trips_hyphenated_partition() {
        assert_eq!(
            parse_namespace_name("newsgate-news-data-v2.1", "newsgate"),
            Some(("news-data", "2.1"))
        );
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        assert_eq!(parse_namespace_name("other-static-v1", "newsgate"), None);
        assert_eq!(parse_namespace_name("newsgatex-static-v1", "newsgate"), None);
        assert_eq!(parse_namespace_name("newsgate-static", "newsgate"), None);
    }

    #[test]
    fn policy_parses_aliases() {
        assert_eq!(
            "swr".parse::<DataPolicy>(),
            Ok(DataPolicy::StaleWhileRevalidate)
        );
        assert_eq!(
            "Network-First".parse::<DataPolicy>(),
            Ok(DataPolicy::NetworkFirst)
        );
        assert!("cache-only".parse::<DataPolicy>().is_err());
    }
}
