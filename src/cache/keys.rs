//! Cache key derivation.
//!
//! A key is the normalized request URL; the method is implied because only GET
//! requests are ever cached. Cache-busting parameters are removed so a forced
//! refresh overwrites the canonical entry instead of creating a new one.

use url::Url;

/// Normalized cache key for a GET request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Build the key for `url`, dropping the fragment and any `refresh_params`.
    pub fn from_url(url: &Url, refresh_params: &[String]) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);

        if normalized.query().is_some() {
            let kept: Vec<(String, String)> = normalized
                .query_pairs()
                .filter(|(name, _)| !refresh_params.iter().any(|param| param == name))
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect();

            if kept.is_empty() {
                normalized.set_query(None);
            } else {
                normalized.query_pairs_mut().clear().extend_pairs(kept);
            }
        }

        Self(normalized.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when the URL carries one of the cache-busting query parameters.
pub fn has_refresh_param(url: &Url, refresh_params: &[String]) -> bool {
    url.query_pairs()
        .any(|(name, _)| refresh_params.iter().any(|param| param == &name))
}
