use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::{HeaderName, Method};
use axum::response::IntoResponse;
use axum::routing::{get, on, MethodFilter};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, CurrentUser, Guard, Role, TokenCodec};
use crate::config::Config;
use crate::docs::{self, SpecAggregator};
use crate::errors::AppError;
use crate::middleware;
use crate::proxy::{self, upstream::UpstreamClient};
use crate::registry::ServiceRegistry;

const BODY_LIMIT_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state. Built once at startup and read-only afterwards.
pub struct AppState {
    pub config: Config,
    pub registry: ServiceRegistry,
    pub codec: Arc<TokenCodec>,
    pub guard: Guard,
    pub upstream: UpstreamClient,
    pub aggregator: SpecAggregator,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let registry = ServiceRegistry::new(config.services.clone())?;
        let codec = Arc::new(TokenCodec::new(&config.jwt_secret, config.token_ttl()?));
        let guard = Guard::new(codec.clone(), &config.cookie.name);
        let upstream = UpstreamClient::new(config.upstream_timeout())?;
        let aggregator = SpecAggregator::new(
            upstream.http().clone(),
            &config.spec_path,
            &config.docs_title,
            config.upstream_timeout(),
        );

        Ok(Self {
            config,
            registry,
            codec,
            guard,
            upstream,
            aggregator,
        })
    }
}

impl FromRef<Arc<AppState>> for Guard {
    fn from_ref(state: &Arc<AppState>) -> Guard {
        state.guard.clone()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let proxied = MethodFilter::GET
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT)
        .or(MethodFilter::DELETE);

    let admin = Router::new()
        .route(
            "/gateway/services",
            get(list_services).fallback(method_not_allowed),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.guard.require_role(Role::Admin),
            auth::enforce,
        ));

    Router::new()
        .route("/", get(root).fallback(method_not_allowed))
        .route(
            "/healthz",
            get(|| async { "ok" }).fallback(method_not_allowed),
        )
        .route(
            "/api/:service",
            on(proxied, proxy::handler::proxy_handler).fallback(method_not_allowed),
        )
        .route(
            "/api/:service/*path",
            on(proxied, proxy::handler::proxy_handler).fallback(method_not_allowed),
        )
        .route(
            "/docs",
            get(docs::handlers::docs_ui).fallback(method_not_allowed),
        )
        .route(
            "/openapi.json",
            get(docs::handlers::merged_spec).fallback(method_not_allowed),
        )
        .route(
            "/docs-specs/:file",
            get(docs::handlers::service_spec).fallback(method_not_allowed),
        )
        .route("/gateway/session", get(session).fallback(method_not_allowed))
        .merge(admin)
        .fallback(fallback_404)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(axum::middleware::from_fn(middleware::security_headers))
}

/// Credentialed CORS: the session cookie must cross origins, so origins are
/// matched explicitly (localhost plus the configured list) instead of `*`.
fn cors_layer(config: &Config) -> CorsLayer {
    let allowed = config.cors_origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin = origin.to_str().unwrap_or("");
            allowed.iter().any(|o| o == origin)
                || origin.starts_with("http://localhost:")
                || origin.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("accept"),
            middleware::REQUEST_ID,
        ])
        .allow_credentials(true)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "API gateway is running" }))
}

async fn fallback_404() -> impl IntoResponse {
    AppError::NotFound
}

/// Path matched but the method did not.
async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// GET /gateway/session: the verified claims behind the caller's cookie.
async fn session(CurrentUser(token): CurrentUser) -> Json<Value> {
    Json(json!({
        "user_id": token.sub,
        "role": token.role,
        "is_verified": token.is_verified,
        "is_ban": token.is_ban,
        "expires_at": token.expires_at(),
    }))
}

/// GET /gateway/services, admin only.
async fn list_services(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
) -> Json<Value> {
    tracing::info!(admin = %admin.sub, "listing registered services");
    let services: Vec<Value> = state
        .registry
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "display_name": s.display_name(),
                "base_url": s.base_url,
                "prefix": format!("/api/{}", s.name),
            })
        })
        .collect();
    Json(json!({ "services": services }))
}
