use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;

use crate::app::AppState;
use crate::errors::AppError;
use crate::proxy::headers::{forwardable_request_headers, relayable_response_headers};

/// Catch-all for `/api/:service` and `/api/:service/*path`.
///
/// Resolves the service, forwards method, headers and body to
/// `base_url + remaining path (+ query)`, and relays the backend's status,
/// headers and body bytes unchanged apart from hop-by-hop headers.
#[tracing::instrument(skip_all, fields(service = tracing::field::Empty, method = %method, path = %uri.path()))]
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let Path(params) = params?;
    let service = params.get("service").cloned().unwrap_or_default();
    tracing::Span::current().record("service", service.as_str());

    let endpoint = state.registry.resolve(&service)?;
    let body = body?;
    let url = target_url(&endpoint.base_url, remaining_path(uri.path()), uri.query());

    let upstream = state
        .upstream
        .forward(
            &service,
            method,
            &url,
            forwardable_request_headers(&headers),
            body,
        )
        .await?;

    tracing::debug!(
        status = upstream.status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "forwarded to {}",
        url
    );

    let mut response = Response::builder().status(upstream.status);
    if let Some(h) = response.headers_mut() {
        *h = relayable_response_headers(&upstream.headers);
    }

    response
        .body(Body::from(upstream.body))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("response build failed: {}", e)))
}

/// Raw (still percent-encoded) path after the `/api/<service>` segment.
///
/// Split on the raw segment boundary, so an encoded service name such as
/// `%61uth` still leaves `/login` behind.
pub fn remaining_path(uri_path: &str) -> &str {
    let rest = uri_path.strip_prefix("/api/").unwrap_or(uri_path);
    match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => "",
    }
}

pub fn target_url(base_url: &str, remaining: &str, query: Option<&str>) -> String {
    let mut url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        remaining.trim_start_matches('/')
    );
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(q);
    }
    url
}
