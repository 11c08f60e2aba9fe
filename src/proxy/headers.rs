//! Which headers cross the gateway.
//!
//! Framing and connection headers belong to one transport leg and are
//! recomputed by hyper/reqwest on the next one. Everything else, including
//! every `Set-Cookie`, passes through untouched.

use axum::http::header::{self, HeaderName};
use axum::http::HeaderMap;

/// Hop-by-hop headers (RFC 9110 §7.6.1) plus `Content-Length`.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "transfer-encoding"
            | "content-length"
            | "te"
            | "trailer"
            | "upgrade"
            | "proxy-authorization"
            | "proxy-authenticate"
    )
}

/// Names listed in the `Connection` header are hop-by-hop for this message.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn filter(headers: &HeaderMap, drop: impl Fn(&HeaderName) -> bool) -> HeaderMap {
    let listed = connection_tokens(headers);
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if drop(name) || is_hop_by_hop(name) || listed.iter().any(|t| t == name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Headers sent to the backend. `Host` is rewritten by the client for the
/// target URL; `Accept-Encoding` is left to the transport, which decodes
/// the response before it is relayed.
pub fn forwardable_request_headers(headers: &HeaderMap) -> HeaderMap {
    filter(headers, |name| {
        name == header::HOST || name == header::ACCEPT_ENCODING
    })
}

/// Headers relayed to the client. The body has already been decoded, so
/// `Content-Encoding` no longer describes it.
pub fn relayable_response_headers(headers: &HeaderMap) -> HeaderMap {
    filter(headers, |name| name == header::CONTENT_ENCODING)
}
