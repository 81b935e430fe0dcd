//! Synthesized responses for when neither the network nor the cache can answer.
//!
//! Everything here is built in memory and cannot fail.

use askama::Template;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;
use url::Url;

use super::config::Branding;
use super::error::GatewayError;
use crate::cache::StoredResponse;

/// Marks a response the gateway invented.
pub const FALLBACK_HEADER: &str = "x-newsgate-fallback";

const SERVICE_UNAVAILABLE: u16 = 503;

fn headers(content_type: &str) -> Vec<(String, String)> {
    vec![
        ("content-type".to_string(), content_type.to_string()),
        ("cache-control".to_string(), "no-store".to_string()),
        (FALLBACK_HEADER.to_string(), "offline".to_string()),
    ]
}

/// Placeholder for a static asset, chosen by the content type its path implies:
/// an empty stylesheet, a no-op script, or a bare 503.
pub fn static_asset(url: &Url) -> StoredResponse {
    let mime = mime_guess::from_path(url.path()).first_or_octet_stream();

    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("text", "css") => StoredResponse::new(
            200,
            headers("text/css; charset=utf-8"),
            "/* offline: stylesheet unavailable */\n",
        ),
        ("application" | "text", "javascript") => StoredResponse::new(
            200,
            headers("application/javascript; charset=utf-8"),
            "/* offline: script unavailable */\n",
        ),
        _ => unavailable(),
    }
}

/// Structured offline payload for the news/data API. The UI renders it as an empty state.
pub fn offline_data(error: &GatewayError, now: OffsetDateTime) -> StoredResponse {
    let timestamp = now
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    let body = json!({
        "offline": true,
        "status": "offline",
        "error": error.to_string(),
        "message": "News service is unreachable; no cached copy is available.",
        "news": [],
        "articles": [],
        "total": 0,
        "timestamp": timestamp,
    });

    StoredResponse::new(
        SERVICE_UNAVAILABLE,
        headers("application/json"),
        body.to_string(),
    )
}

#[derive(Template)]
#[template(path = "offline.html")]
struct OfflineTemplate<'a> {
    branding: &'a Branding,
}

const OFFLINE_PAGE_FALLBACK: &str = "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Offline</title></head><body><h1>Offline</h1><p><a href=\"/\">Retry</a></p></body></html>\n";

/// Self-contained offline document. A template that fails to render degrades to a bare
/// static page.
pub fn offline_page(branding: &Branding) -> StoredResponse {
    let body = match (OfflineTemplate { branding }).render() {
        Ok(html) => html,
        Err(err) => {
            warn!(error = %err, "offline page failed to render");
            OFFLINE_PAGE_FALLBACK.to_string()
        }
    };

    StoredResponse::new(
        SERVICE_UNAVAILABLE,
        headers("text/html; charset=utf-8"),
        body,
    )
}

fn unavailable() -> StoredResponse {
    StoredResponse::new(
        SERVICE_UNAVAILABLE,
        headers("text/plain; charset=utf-8"),
        "Service Unavailable",
    )
}

/// Upstream unreachable for a forwarded request. Not an offline answer, so it carries
/// no fallback marker.
pub fn bad_gateway() -> StoredResponse {
    StoredResponse::new(
        502,
        vec![(
            "content-type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        )],
        "Bad Gateway",
    )
}
