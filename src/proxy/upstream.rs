//! HTTP client for forwarding requests to backend services.
//!
//! One pooled client is shared by all request tasks. Connections are
//! checked out per call and returned when the response is consumed.
//! No retries: a failed forward is reported to the caller as-is.
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};

use crate::errors::AppError;

pub struct UpstreamClient {
    client: reqwest::Client,
    timeout: Duration,
}

/// A fully buffered backend response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            // Redirects are relayed to the browser, not followed here.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Raw client, for callers that build their own requests (docs fetching).
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send one request and buffer the response. `service` only labels errors.
    pub async fn forward(
        &self,
        service: &str,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, AppError> {
        let resp = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(service, e))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::UpstreamTimeout(service.to_string())
            } else {
                AppError::Upstream(format!("reading '{}' response failed: {}", service, e))
            }
        })?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(service: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        tracing::warn!(service = %service, "upstream request timed out");
        AppError::UpstreamTimeout(service.to_string())
    } else if err.is_connect() {
        tracing::warn!(service = %service, "upstream unreachable: {}", err);
        AppError::UpstreamUnavailable(service.to_string())
    } else if err.is_builder() {
        AppError::Internal(anyhow::anyhow!("invalid upstream request: {}", err))
    } else {
        AppError::Upstream(format!("request to '{}' failed: {}", service, err))
    }
}
