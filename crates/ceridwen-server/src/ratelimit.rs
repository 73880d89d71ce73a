//! Admission-control and request-logging middleware.
//!
//! The admission middleware classifies run endpoints into (endpoint,
//! bucket) pairs and consults the persistent limiter before the handler
//! runs. A denial never reaches the handler.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use ceridwen_limiter::{BucketClass, Decision, IdentitySource};

use crate::error::ServerError;
use crate::state::AppState;

/// Admission middleware for run endpoints.
///
/// Unclassified paths (health, unknown routes) pass through ungated.
pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.rate_limiting {
        return next.run(request).await;
    }

    let Some((endpoint, bucket)) = classify(request.method(), request.uri().path()) else {
        return next.run(request).await;
    };

    let source = identity_source(&request);

    match state.limiter.check(&source, endpoint, bucket, None) {
        Decision::Allowed => next.run(request).await,
        Decision::Denied { retry_after_secs } => {
            tracing::warn!(
                endpoint,
                path = %request.uri().path(),
                retry_after_secs,
                "Admission denied"
            );
            ServerError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

/// Map a request onto a logical endpoint and its traffic class.
fn classify(method: &Method, path: &str) -> Option<(&'static str, BucketClass)> {
    match *method {
        Method::POST if path == "/runs" => Some(("runs.create", BucketClass::Ai)),
        Method::POST if path.starts_with("/runs/") && path.ends_with("/retry") => {
            Some(("runs.retry", BucketClass::Ai))
        }
        Method::GET if path.starts_with("/runs/") => Some(("runs.poll", BucketClass::Public)),
        _ => None,
    }
}

/// Collect identity material from headers and the connection.
fn identity_source(request: &Request<Body>) -> IdentitySource {
    let headers = request.headers();
    IdentitySource {
        api_key: header(headers, "x-api-key"),
        forwarded_for: header(headers, "x-forwarded-for"),
        real_ip: header(headers, "x-real-ip"),
        cf_connecting_ip: header(headers, "cf-connecting-ip"),
        remote_addr: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string()),
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Structured request logging middleware.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}
