use std::time::Duration;

use thiserror::Error;

use crate::cache::StorageError;

/// Failures the handlers recover from. None of these leave the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network request timed out after {0:?}")]
    NetworkTimeout(Duration),
    #[error("network request failed: {0}")]
    NetworkError(String),
    #[error("upstream answered with status {0}")]
    NonSuccessStatus(u16),
    #[error("no cached entry for `{0}`")]
    CacheMiss(String),
    #[error("storage quota exceeded while caching `{0}`")]
    StorageQuotaExceeded(String),
    #[error("cache storage failed: {0}")]
    Storage(#[source] StorageError),
}

impl GatewayError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NetworkTimeout(_) => "network_timeout",
            GatewayError::NetworkError(_) => "network_error",
            GatewayError::NonSuccessStatus(_) => "non_success_status",
            GatewayError::CacheMiss(_) => "cache_miss",
            GatewayError::StorageQuotaExceeded(_) => "storage_quota_exceeded",
            GatewayError::Storage(_) => "storage",
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            GatewayError::NetworkTimeout(_)
                | GatewayError::NetworkError(_)
                | GatewayError::NonSuccessStatus(_)
        )
    }

    pub(crate) fn from_storage(key: &str, error: StorageError) -> Self {
        match error {
            StorageError::QuotaExceeded { .. } => GatewayError::StorageQuotaExceeded(key.to_string()),
            other => GatewayError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_map_to_taxonomy() {
        let err = GatewayError::from_storage(
            "http://news.local/app.css",
            StorageError::QuotaExceeded {
                needed: 10,
                available: 1,
            },
        );
        assert_eq!(err.kind(), "storage_quota_exceeded");
        assert!(!err.is_network());
    }

    #[test]
    fn network_kinds() {
        assert!(GatewayError::NetworkTimeout(Duration::from_secs(1)).is_network());
        assert!(GatewayError::NonSuccessStatus(500).is_network());
        assert!(!GatewayError::CacheMiss("k".into()).is_network());
        assert_eq!(
            GatewayError::NonSuccessStatus(502).to_string(),
            "upstream answered with status 502"
        );
    }
}
