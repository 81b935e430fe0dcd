use axum::http::{HeaderMap, HeaderValue, Method, header};
use bytes::Bytes;
use url::Url;

/// An outgoing request as seen by the interception point.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A document load, as issued by a full page navigation.
    pub fn navigation(url: Url) -> Self {
        Self::get(url)
            .with_header("sec-fetch-mode", "navigate")
            .with_header("accept", "text/html,application/xhtml+xml")
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn header_str(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Document-mode request, independent of URL shape.
    pub fn is_navigation(&self) -> bool {
        if let Some(mode) = self.header_str("sec-fetch-mode") {
            return mode.eq_ignore_ascii_case("navigate");
        }
        self.method == Method::GET
            && self
                .header_str(header::ACCEPT)
                .is_some_and(|accept| accept.starts_with("text/html"))
    }

    /// The caller asked to skip caches (`Cache-Control: no-cache` or `Pragma: no-cache`).
    pub fn wants_fresh(&self) -> bool {
        let no_cache = |value: &str| value.to_ascii_lowercase().contains("no-cache");
        self.header_str(header::CACHE_CONTROL).is_some_and(no_cache)
            || self.header_str(header::PRAGMA).is_some_and(no_cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://news.local/").unwrap()
    }

    #[test]
    fn navigation_constructor_is_detected() {
        assert!(GatewayRequest::navigation(url()).is_navigation());
        assert!(!GatewayRequest::get(url()).is_navigation());
    }

    #[test]
    fn sec_fetch_mode_overrides_accept() {
        let request = GatewayRequest::get(url())
            .with_header("sec-fetch-mode", "cors")
            .with_header("accept", "text/html");
        assert!(!request.is_navigation());
    }

    #[test]
    fn accept_html_without_fetch_metadata_is_navigation() {
        let request = GatewayRequest::get(url()).with_header("accept", "text/html");
        assert!(request.is_navigation());
    }

    #[test]
    fn no_cache_header_requests_fresh_data() {
        let request = GatewayRequest::get(url()).with_header("cache-control", "No-Cache");
        assert!(request.wants_fresh());
        assert!(!GatewayRequest::get(url()).wants_fresh());
    }
}
