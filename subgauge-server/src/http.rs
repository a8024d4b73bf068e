//! HTTP boundary: router, subscription handler, middleware stack.
//!
//! Every GET path is looked up in the assembler's route table, so the
//! router itself is a single wildcard route. The middleware stack
//! mirrors the rest of the stack's conventions: trace logging, CORS,
//! and a whole-request timeout.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderName, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use subgauge_core::{ComposedResponse, Route, UsageInfo};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::error;

use crate::assemble::ResponseAssembler;
use crate::error::ServeError;

/// RFC 5987 attr-char: everything else is percent-encoded.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The per-route assembly pipeline.
    pub assembler: Arc<ResponseAssembler>,
}

/// Builds the application router.
///
/// Every route key is an absolute request path, so a single wildcard
/// route feeds the whole table.
pub fn router(assembler: Arc<ResponseAssembler>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/{*path}", get(subscribe))
        .with_state(AppState { assembler })
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(TimeoutLayer::new(request_timeout))
}

async fn subscribe(State(state): State<AppState>, uri: Uri) -> Response {
    let key = uri.path();
    let Some(route) = state.assembler.route(key) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.assembler.handle(key).await {
        Ok(response) => render(route, response),
        Err(err) => status_for(&err).into_response(),
    }
}

fn status_for(err: &ServeError) -> StatusCode {
    match err {
        ServeError::NotFound => StatusCode::NOT_FOUND,
        ServeError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn render(route: &Route, response: ComposedResponse) -> Response {
    let ComposedResponse { body, usage } = response;

    let built = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-store")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .header(
            "subscription-updated-at",
            chrono::Utc::now().timestamp().to_string(),
        )
        .header("subscription-userinfo", userinfo_header(&usage))
        .header(
            "profile-update-interval",
            update_interval_hours(route.update_interval),
        )
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&route.filename),
        )
        .body(Body::from(body));

    match built {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to build response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn userinfo_header(usage: &UsageInfo) -> String {
    format!(
        "upload={}; download={}; total={}; expire={}",
        usage.upload, usage.download, usage.total, usage.expire
    )
}

fn update_interval_hours(interval: Duration) -> String {
    format!("{:.2}", interval.as_secs_f64() / 3600.0)
}

fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=utf-8''{}",
        utf8_percent_encode(filename, FILENAME_ENCODE_SET)
    )
}

fn cors_layer() -> CorsLayer {
    let headers = [
        header::CONTENT_TYPE,
        HeaderName::from_static("x-requested-with"),
        HeaderName::from_static("access-control-allow-credentials"),
        header::USER_AGENT,
        header::CONTENT_LENGTH,
        header::AUTHORIZATION,
    ];

    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(headers.clone())
        .expose_headers(headers)
        .max_age(Duration::from_secs(24 * 60 * 60))
}
