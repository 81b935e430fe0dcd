//! Network side of the gateway.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::error::GatewayError;
use super::request::GatewayRequest;
use crate::cache::StoredResponse;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// The remote API as an opaque collaborator. Any status is a successful fetch;
/// interpreting non-2xx answers is the caller's business.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &GatewayRequest) -> Result<StoredResponse, FetchError>;
}

/// Fetch with a cancellation timer. On expiry the in-flight future is dropped and the
/// caller sees [`GatewayError::NetworkTimeout`]; nothing is retried.
pub async fn fetch_with_timeout(
    fetcher: &dyn Fetcher,
    request: &GatewayRequest,
    timeout: Duration,
) -> Result<StoredResponse, GatewayError> {
    match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(FetchError::Timeout)) => Err(GatewayError::NetworkTimeout(timeout)),
        Ok(Err(err)) => Err(GatewayError::NetworkError(err.to_string())),
        Err(_) => {
            debug!(url = %request.url, ?timeout, "network request cancelled by timer");
            Err(GatewayError::NetworkTimeout(timeout))
        }
    }
}

/// Forward a request the gateway does not intercept. Without a deadline the fetch runs
/// for as long as the upstream client allows.
pub async fn forward(
    fetcher: &dyn Fetcher,
    request: &GatewayRequest,
    deadline: Option<Duration>,
) -> Result<StoredResponse, GatewayError> {
    match deadline {
        Some(timeout) => fetch_with_timeout(fetcher, request, timeout).await,
        None => fetcher
            .fetch(request)
            .await
            .map_err(|err| GatewayError::NetworkError(err.to_string())),
    }
}

/// Like [`fetch_with_timeout`], but a non-2xx answer is a failure.
pub async fn fetch_success(
    fetcher: &dyn Fetcher,
    request: &GatewayRequest,
    timeout: Duration,
) -> Result<StoredResponse, GatewayError> {
    let response = fetch_with_timeout(fetcher, request, timeout).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::NonSuccessStatus(response.status))
    }
}
