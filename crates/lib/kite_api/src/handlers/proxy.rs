//! Trusting proxy: forwards gateway requests to the internal services.
//!
//! Runs behind [`crate::middleware::edge::edge_authenticate`]. The only
//! identity it forwards is the one the edge verified; any `x-user-id` still
//! present on the inbound request is dropped before forwarding.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::Response;
use kite_core::auth::{IDENTITY_HEADER, VerifiedIdentity};
use tracing::{debug, warn};

use crate::GatewayState;
use crate::error::{AppError, AppResult};

/// Largest request body forwarded upstream.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Connection-scoped headers (RFC 9110 §7.6.1) plus the ones the proxy
/// rewrites itself.
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

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Request headers to send upstream.
fn forward_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name)
            || *name == HOST
            || *name == CONTENT_LENGTH
            || name.as_str() == IDENTITY_HEADER
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Response headers to relay back to the client.
fn forward_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name) || *name == CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn body_too_large() -> AppError {
    AppError::PayloadTooLarge(format!(
        "Request body exceeds {} MiB",
        MAX_BODY_BYTES / (1024 * 1024)
    ))
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Fallback handler of the gateway router.
pub async fn proxy_handler(State(state): State<GatewayState>, request: Request) -> AppResult<Response> {
    let (parts, body) = request.into_parts();

    let (upstream, rest) = state
        .config
        .route(parts.uri.path())
        .ok_or_else(|| AppError::NotFound(format!("No route for {}", parts.uri.path())))?;
    let url = upstream.forward_url(rest, parts.uri.query());

    if declared_length(&parts.headers).is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(body_too_large());
    }
    // Past the length check, reading fails only on the limit or a dropped client.
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        debug!(error = %e, "request body rejected");
        body_too_large()
    })?;

    let mut headers = forward_request_headers(&parts.headers);
    if let Some(identity) = parts.extensions.get::<VerifiedIdentity>() {
        let value = HeaderValue::from_str(&identity.header_value())
            .map_err(|e| AppError::Internal(format!("identity header: {e}")))?;
        headers.insert(IDENTITY_HEADER, value);
    }
    if carries_body(&parts.method) && !body.is_empty() && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    debug!(
        service = %upstream.name,
        method = %parts.method,
        target = %url,
        "proxying request"
    );

    let upstream_response = state
        .client
        .request(parts.method.clone(), url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            warn!(
                service = %upstream.name,
                target = %upstream.target,
                timeout = e.is_timeout(),
                error = %e,
                "upstream request failed"
            );
            AppError::UpstreamUnavailable(format!(
                "Cannot connect to downstream service: {}. Target: {}",
                upstream.name, upstream.target
            ))
        })?;

    let status = upstream_response.status();
    let response_headers = forward_response_headers(upstream_response.headers());

    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
