//! Cross-cutting HTTP layers applied to every gateway route.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Middleware: makes sure every request carries an `x-request-id`, forwards
/// it to the backend and echoes it on the response, so client errors can be
/// matched with gateway and backend logs.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = match req.headers().get(&REQUEST_ID) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
                .unwrap_or(HeaderValue::from_static("unknown"));
            req.headers_mut().insert(REQUEST_ID, generated.clone());
            generated
        }
    };

    let mut resp = next.run(req).await;
    resp.headers_mut().entry(REQUEST_ID).or_insert(id);
    resp
}

/// Middleware: adds baseline security headers. Headers a backend already
/// set are left alone so relayed responses stay as the backend sent them.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers
        .entry("x-content-type-options")
        .or_insert(HeaderValue::from_static("nosniff"));
    headers
        .entry("x-frame-options")
        .or_insert(HeaderValue::from_static("DENY"));
    headers
        .entry("referrer-policy")
        .or_insert(HeaderValue::from_static("no-referrer"));

    resp
}
