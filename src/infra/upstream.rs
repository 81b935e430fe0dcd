//! `reqwest` implementation of [`Fetcher`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use metrics::histogram;
use reqwest::{Client, redirect};
use tracing::debug;

use super::error::InfraError;
use crate::cache::StoredResponse;
use crate::gateway::{FetchError, Fetcher, GatewayRequest};

/// Headers that describe one connection and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// `connect_timeout` bounds connection setup only; per-request deadlines are
    /// enforced by the gateway.
    pub fn new(connect_timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .connect_timeout(connect_timeout)
            .redirect(redirect::Policy::limited(10))
            .build()
            .map_err(|err| InfraError::upstream(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn user_agent() -> &'static str {
        concat!("newsgate/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &GatewayRequest) -> Result<StoredResponse, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(forwardable(&request.headers, true))
            .body(request.body.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = forwardable(response.headers(), false)
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify_error)?;

        let elapsed = start.elapsed();
        histogram!("newsgate_upstream_fetch_ms").record(elapsed.as_secs_f64() * 1000.0);
        debug!(
            url = %request.url,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "upstream responded"
        );

        Ok(StoredResponse::new(status, headers, body))
    }
}

/// Copy `headers` minus hop-by-hop fields. Outgoing requests also drop `Host` and
/// `Content-Length`, which the client recomputes.
fn forwardable(headers: &HeaderMap, outgoing: bool) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let lowered = name.as_str();
        if HOP_BY_HOP.contains(&lowered) {
            continue;
        }
        if outgoing && (name == header::HOST || name == header::CONTENT_LENGTH) {
            continue;
        }
        if !outgoing && name == header::CONTENT_LENGTH {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

fn classify_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Connect(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn strips_hop_by_hop_and_host_on_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let forwarded = forwardable(&headers, true);
        assert!(forwarded.get(header::HOST).is_none());
        assert!(forwarded.get(header::CONNECTION).is_none());
        assert_eq!(
            forwarded.get(header::ACCEPT),
            Some(&HeaderValue::from_static("application/json"))
        );
    }

    #[test]
    fn keeps_content_type_on_responses() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));

        let forwarded = forwardable(&headers, false);
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded.get(header::CONTENT_TYPE).is_some());
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert!(HttpFetcher::user_agent().starts_with("newsgate/"));
    }
}
