//! HTTP surface: every request not addressed to the control routes goes through the
//! gateway.

mod middleware;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, Uri},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::warn;
use url::Url;

use crate::gateway::{
    ClientMessage, Gateway, GatewayReply, GatewayRequest, LifecycleState, MessageSender,
    SOURCE_HEADER, Served,
};

pub use middleware::RequestContext;

pub const HEALTH_PATH: &str = "/__newsgate/health";
pub const MESSAGE_PATH: &str = "/__newsgate/message";

#[derive(Clone)]
pub struct HttpState {
    pub gateway: Arc<Gateway>,
    pub messages: MessageSender,
    /// Largest request body buffered for forwarding.
    pub max_body_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(MESSAGE_PATH, post(post_message))
        .fallback(proxy)
        .with_state(state)
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    state: LifecycleState,
    version: String,
}

async fn health(State(state): State<HttpState>) -> Response {
    let lifecycle = state.gateway.lifecycle().state();
    let body = HealthBody {
        status: if lifecycle == LifecycleState::Active {
            "ok"
        } else {
            "starting"
        },
        state: lifecycle,
        version: state.gateway.context().config.version.clone(),
    };
    let status = if lifecycle == LifecycleState::Active {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn post_message(
    State(state): State<HttpState>,
    Json(message): Json<ClientMessage>,
) -> Response {
    match state.messages.request(message).await {
        Ok(reply @ GatewayReply::Error { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(reply)).into_response()
        }
        Ok(reply) => Json(reply).into_response(),
        Err(err) => {
            warn!(error = %err, "message not delivered");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
        }
    }
}

async fn proxy(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let url = match target_url(&state.gateway.context().config.origin, &parts.uri) {
        Ok(url) => url,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("invalid request target: {err}"))
                .into_response();
        }
    };
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()).into_response();
        }
    };

    let mut request = GatewayRequest::new(parts.method, url);
    request.headers = parts.headers;
    request.body = body;

    build_response(state.gateway.handle(request).await)
}

/// Absolute-form targets are used as is; origin-form paths resolve against `origin`.
fn target_url(origin: &Url, uri: &Uri) -> Result<Url, url::ParseError> {
    if uri.scheme().is_some() {
        return Url::parse(&uri.to_string());
    }
    let path = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    origin.join(path)
}

fn build_response(served: Served) -> Response {
    let mut builder = Response::builder().status(served.response.status);

    for (name, value) in &served.response.headers {
        if let Ok(header_value) = HeaderValue::from_str(value) {
            builder = builder.header(name.as_str(), header_value);
        }
    }
    builder = builder.header(SOURCE_HEADER, served.source.as_str());

    builder
        .body(Body::from(served.response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
