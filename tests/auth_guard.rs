//! Cookie authentication and role gating through the gateway router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use gateway::app::{self, AppState};
use gateway::auth::cookie::SessionCookie;
use gateway::auth::{enforce, AccessToken, Role};
use gateway::config::Config;
use gateway::registry::ServiceEndpoint;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "integration-test-secret";

fn state_with(services: Vec<ServiceEndpoint>) -> Arc<AppState> {
    Arc::new(
        AppState::new(Config {
            jwt_secret: SECRET.into(),
            services,
            ..Config::default()
        })
        .unwrap(),
    )
}

fn state() -> Arc<AppState> {
    state_with(vec![ServiceEndpoint::new("auth", "http://127.0.0.1:8001")])
}

fn cookie_for(state: &AppState, role: Role) -> String {
    let token = state.codec.issue("user_42", role, true, false).unwrap();
    format!("{}={}", state.config.cookie.name, token)
}

fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(c) = cookie {
        builder = builder.header("cookie", c);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_session_requires_cookie() {
    let app = app::router(state());
    let resp = app
        .oneshot(get_with_cookie("/gateway/session", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "authentication required");
}

#[tokio::test]
async fn test_session_returns_claims() {
    let state = state();
    let cookie = cookie_for(&state, Role::Dentist);
    let app = app::router(state);

    let resp = app
        .oneshot(get_with_cookie("/gateway/session", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["user_id"], "user_42");
    assert_eq!(body["role"], "DENTIST");
    assert_eq!(body["is_verified"], true);
    assert_eq!(body["is_ban"], false);
}

#[tokio::test]
async fn test_cookie_among_others_is_found() {
    let state = state();
    let cookie = format!("theme=dark; {}; lang=vi", cookie_for(&state, Role::Customer));
    let app = app::router(state);

    let resp = app
        .oneshot(get_with_cookie("/gateway/session", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let state = state();
    let now = Utc::now().timestamp();
    let token = state
        .codec
        .sign(&AccessToken {
            sub: "user_42".into(),
            role: Role::Admin,
            is_verified: true,
            is_ban: false,
            exp: now - 60,
            iat: now - 3600,
        })
        .unwrap();
    let cookie = format!("findmydentist_token={}", token);
    let app = app::router(state);

    let resp = app
        .oneshot(get_with_cookie("/gateway/services", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "invalid or expired token");
}

#[tokio::test]
async fn test_token_from_other_secret_rejected() {
    let other = state_with(vec![]);
    let foreign = AppState::new(Config {
        jwt_secret: "some-other-secret".into(),
        services: vec![],
        ..Config::default()
    })
    .unwrap();
    let cookie = cookie_for(&foreign, Role::Admin);
    let app = app::router(other);

    let resp = app
        .oneshot(get_with_cookie("/gateway/session", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "invalid or expired token");
}

#[tokio::test]
async fn test_admin_route_gating() {
    let state = state();
    let customer = cookie_for(&state, Role::Customer);
    let dentist = cookie_for(&state, Role::Dentist);
    let admin = cookie_for(&state, Role::Admin);
    let app = app::router(state);

    let resp = app
        .clone()
        .oneshot(get_with_cookie("/gateway/services", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    for cookie in [&customer, &dentist] {
        let resp = app
            .clone()
            .oneshot(get_with_cookie("/gateway/services", Some(cookie)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await["error"], "ADMIN role required");
    }

    let resp = app
        .oneshot(get_with_cookie("/gateway/services", Some(&admin)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["services"][0]["name"], "auth");
    assert_eq!(body["services"][0]["display_name"], "Auth Service");
    assert_eq!(body["services"][0]["prefix"], "/api/auth");
}

#[tokio::test]
async fn test_role_gate_wraps_backend_routes() {
    // A backend protecting its own route with the shared guard.
    let state = state();
    let gate = state.guard.require_role(Role::Admin);
    let backend: Router = Router::new()
        .route(
            "/users",
            get(|Extension(token): Extension<AccessToken>| async move {
                Json(json!({ "users": [], "requested_by": token.sub }))
            }),
        )
        .route_layer(axum::middleware::from_fn_with_state(gate, enforce));

    let resp = backend
        .clone()
        .oneshot(get_with_cookie("/users", Some(&cookie_for(&state, Role::Customer))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = backend
        .oneshot(get_with_cookie("/users", Some(&cookie_for(&state, Role::Admin))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({ "users": [], "requested_by": "user_42" })
    );
}

#[tokio::test]
async fn test_login_cookie_relayed_then_accepted() {
    let backend = MockServer::start().await;
    let state = state_with(vec![]);
    let token = state
        .codec
        .issue("user_7", Role::Customer, false, false)
        .unwrap();
    let set_cookie = SessionCookie::new(&state.config.cookie, state.codec.ttl())
        .issue(&token)
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"message":"Login successful"}"#, "application/json")
                .insert_header("set-cookie", set_cookie.to_str().unwrap()),
        )
        .mount(&backend)
        .await;

    let state = state_with(vec![ServiceEndpoint::new("auth", backend.uri())]);
    let app = app::router(state);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"email":"a@b.c","password":"secret1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let header = resp.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(header.contains("HttpOnly"));
    let pair = header.split(';').next().unwrap().to_string();

    let resp = app
        .oneshot(get_with_cookie("/gateway/session", Some(&pair)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["user_id"], "user_7");
    assert_eq!(body["role"], "CUSTOMER");
}
