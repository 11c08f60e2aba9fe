use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::app::AppState;
use crate::errors::AppError;
use crate::proxy::headers::relayable_response_headers;

/// GET /openapi.json: merged description of every reachable backend.
pub async fn merged_spec(State(state): State<Arc<AppState>>) -> Response {
    let merged = state.aggregator.aggregate(state.registry.iter()).await;
    tracing::debug!(
        included = ?merged.included,
        skipped = ?merged.skipped,
        "aggregated API descriptions"
    );

    let mut resp = Json(merged.document).into_response();
    if !merged.skipped.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&merged.skipped.join(",")) {
            resp.headers_mut().insert("x-skipped-services", v);
        }
    }
    resp
}

/// GET /docs-specs/:service.json: one backend's description, relayed with
/// the backend's own status.
pub async fn service_spec(
    State(state): State<Arc<AppState>>,
    file: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(file) = file?;
    let name = file.strip_suffix(".json").unwrap_or(&file);
    let endpoint = state.registry.resolve(name)?;

    let upstream = state
        .upstream
        .forward(
            name,
            Method::GET,
            &state.aggregator.spec_url(endpoint),
            HeaderMap::new(),
            Bytes::new(),
        )
        .await?;

    let mut resp = Response::builder().status(upstream.status);
    if let Some(h) = resp.headers_mut() {
        *h = relayable_response_headers(&upstream.headers);
        h.entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
    }
    resp.body(Body::from(upstream.body))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("response build failed: {}", e)))
}

/// GET /docs: Swagger UI with a selector over the merged and per-service descriptions.
pub async fn docs_ui(State(state): State<Arc<AppState>>) -> Html<String> {
    let mut urls = vec![json!({ "name": "All services", "url": "/openapi.json" })];
    urls.extend(state.registry.iter().map(|s| {
        json!({
            "name": s.display_name(),
            "url": format!("/docs-specs/{}.json", s.name),
        })
    }));

    Html(render_swagger_ui(
        &state.config.docs_title,
        &serde_json::Value::Array(urls).to_string(),
    ))
}

fn render_swagger_ui(title: &str, urls_json: &str) -> String {
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{
      urls: {urls_json},
      dom_id: "#swagger-ui",
      withCredentials: true,
      presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
      layout: "StandaloneLayout"
    }});
  </script>
</body>
</html>
"##
    )
}
