//! Request classification.
//!
//! Pure functions of the request: no I/O, no state. API path prefixes win over static
//! extensions; navigation is detected from request mode, not URL shape.

use std::fmt;

use axum::http::Method;
use serde::Serialize;
use url::Url;

use super::config::GatewayConfig;
use super::request::GatewayRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestClass {
    Static,
    DataApi,
    Navigation,
    Other,
}

impl RequestClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestClass::Static => "static",
            RequestClass::DataApi => "data-api",
            RequestClass::Navigation => "navigation",
            RequestClass::Other => "other",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the gateway takes over this request. Decided from method and URL only.
pub fn should_intercept(config: &GatewayConfig, request: &GatewayRequest) -> bool {
    if request.method != Method::GET {
        return false;
    }
    if !matches!(request.url.scheme(), "http" | "https") {
        return false;
    }
    let path = request.url.path();
    !(is_same_origin(config, &request.url)
        && config
            .excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str())))
}

pub fn classify(config: &GatewayConfig, request: &GatewayRequest) -> RequestClass {
    let url = &request.url;

    if is_same_origin(config, url)
        && config
            .api_prefixes
            .iter()
            .any(|prefix| url.path().starts_with(prefix.as_str()))
    {
        return RequestClass::DataApi;
    }

    if request.is_navigation() {
        return RequestClass::Navigation;
    }

    if is_static_host(config, url) || has_extension(url, &config.static_extensions) {
        return RequestClass::Static;
    }

    RequestClass::Other
}

/// Static assets whose cached copy is refreshed in the background after being served.
pub fn is_revalidate_eligible(config: &GatewayConfig, url: &Url) -> bool {
    has_extension(url, &config.revalidate_extensions)
}

fn is_same_origin(config: &GatewayConfig, url: &Url) -> bool {
    url.host_str() == config.origin.host_str()
        && url.port_or_known_default() == config.origin.port_or_known_default()
}

fn is_static_host(config: &GatewayConfig, url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        config
            .static_hosts
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(host))
    })
}

fn has_extension(url: &Url, extensions: &[String]) -> bool {
    extension(url).is_some_and(|ext| {
        extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    })
}

fn extension(url: &Url) -> Option<&str> {
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::for_origin(Url::parse("http://news.local").unwrap())
    }

    fn get(url: &str) -> GatewayRequest {
        GatewayRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn api_prefix_beats_static_extension() {
        let request = get("http://news.local/api/export/feed.json");
        assert_eq!(classify(&config(), &request), RequestClass::DataApi);
    }

    #[test]
    fn news_listing_is_data_api() {
        let request = get("http://news.local/api/news/all?page=1");
        assert_eq!(classify(&config(), &request), RequestClass::DataApi);
    }

    #[test]
    fn stylesheet_is_static() {
        let request = get("http://news.local/static/css/terminal.css");
        assert_eq!(classify(&config(), &request), RequestClass::Static);
    }

    #[test]
    fn font_cdn_is_static_without_extension() {
        let request = get("https://fonts.googleapis.com/css2?family=VT323");
        assert_eq!(classify(&config(), &request), RequestClass::Static);
    }

    #[test]
    fn navigation_is_independent_of_url_shape() {
        let request =
            GatewayRequest::navigation(Url::parse("http://news.local/terminal/boot.png").unwrap());
        assert_eq!(classify(&config(), &request), RequestClass::Navigation);
    }

    #[test]
    fn foreign_api_path_is_not_data_api() {
        let request = get("http://elsewhere.example/api/news");
        assert_eq!(classify(&config(), &request), RequestClass::Other);
    }

    #[test]
    fn extensionless_path_is_other() {
        let request = get("http://news.local/health");
        assert_eq!(classify(&config(), &request), RequestClass::Other);
        let dotfile = get("http://news.local/.well-known");
        assert_eq!(classify(&config(), &dotfile), RequestClass::Other);
    }

    #[test]
    fn non_get_is_never_intercepted() {
        let mut request = get("http://news.local/api/news/all");
        request.method = Method::POST;
        assert!(!should_intercept(&config(), &request));
    }

    #[test]
    fn excluded_prefix_is_not_intercepted() {
        assert!(!should_intercept(
            &config(),
            &get("http://news.local/api/ai/ask")
        ));
        assert!(should_intercept(
            &config(),
            &get("http://news.local/api/news/all")
        ));
    }

    #[test]
    fn revalidation_applies_to_scripts_and_styles() {
        let config = config();
        let css = Url::parse("http://news.local/app.css").unwrap();
        let font = Url::parse("http://news.local/vt323.woff2").unwrap();
        assert!(is_revalidate_eligible(&config, &css));
        assert!(!is_revalidate_eligible(&config, &font));
    }
}
