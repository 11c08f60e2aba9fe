//! Request-time authentication: cookie to verified [`AccessToken`].
//!
//! The guard is stateless. It fails closed: a missing, unreadable or
//! insufficient credential stops the request before the handler runs.
//!
//! ```ignore
//! Router::new()
//!     .route("/users", get(list_users))
//!     .route_layer(from_fn_with_state(guard.require_role(Role::Admin), guard::enforce))
//! ```

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::cookie::extract_cookie;
use super::token::{AccessToken, Role, TokenCodec, TokenError};
use crate::errors::AppError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("role {actual} is not allowed, {required} required")]
    Forbidden { required: Role, actual: Role },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

#[derive(Clone)]
pub struct Guard {
    codec: Arc<TokenCodec>,
    cookie_name: Arc<str>,
}

impl Guard {
    pub fn new(codec: Arc<TokenCodec>, cookie_name: &str) -> Self {
        Self {
            codec,
            cookie_name: Arc::from(cookie_name),
        }
    }

    pub fn authenticate(&self, cookie_value: Option<&str>) -> Result<AccessToken, AuthError> {
        let token = cookie_value
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::Unauthenticated)?;
        Ok(self.codec.decode(token)?)
    }

    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<AccessToken, AuthError> {
        let cookie = extract_cookie(headers, &self.cookie_name);
        self.authenticate(cookie.as_deref())
    }

    /// Gate that admits any valid token.
    pub fn require_login(&self) -> RoleGate {
        RoleGate {
            guard: self.clone(),
            required: None,
        }
    }

    /// Gate that admits only tokens carrying `role`.
    pub fn require_role(&self, role: Role) -> RoleGate {
        RoleGate {
            guard: self.clone(),
            required: Some(role),
        }
    }
}

pub fn authorize(token: &AccessToken, required: Role) -> Result<(), AuthError> {
    if token.role == required {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            required,
            actual: token.role,
        })
    }
}

/// State for [`enforce`]: a guard plus the role a route requires.
#[derive(Clone)]
pub struct RoleGate {
    guard: Guard,
    required: Option<Role>,
}

impl RoleGate {
    pub fn check(&self, headers: &HeaderMap) -> Result<AccessToken, AuthError> {
        let token = self.guard.authenticate_headers(headers)?;
        if let Some(role) = self.required {
            authorize(&token, role)?;
        }
        Ok(token)
    }
}

/// Middleware for `axum::middleware::from_fn_with_state`. On success the
/// verified token is stored in the request extensions for the handler.
pub async fn enforce(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match gate.check(req.headers()) {
        Ok(token) => {
            req.extensions_mut().insert(token);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::warn!(
                path = %req.uri().path(),
                required = ?gate.required,
                "access denied: {}",
                e
            );
            Err(e)
        }
    }
}

/// Extractor for handlers that need the caller's identity.
///
/// Reuses the token placed by [`enforce`] when present, otherwise reads the
/// session cookie itself.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AccessToken);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Guard: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts.extensions.get::<AccessToken>() {
            return Ok(CurrentUser(token.clone()));
        }
        let guard = Guard::from_ref(state);
        guard.authenticate_headers(&parts.headers).map(CurrentUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;

    fn guard() -> Guard {
        Guard::new(
            Arc::new(TokenCodec::new("guard-test-secret", chrono::Duration::hours(1))),
            "findmydentist_token",
        )
    }

    fn cookie_headers(guard: &Guard, role: Role) -> HeaderMap {
        let token = guard.codec.issue("user_1", role, true, false).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("findmydentist_token={}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_missing_cookie_is_unauthenticated() {
        let g = guard();
        assert_eq!(g.authenticate(None), Err(AuthError::Unauthenticated));
        assert_eq!(g.authenticate(Some("")), Err(AuthError::Unauthenticated));
        assert_eq!(
            g.authenticate_headers(&HeaderMap::new()),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn test_codec_errors_surface() {
        assert!(matches!(
            guard().authenticate(Some("garbage")),
            Err(AuthError::InvalidToken(TokenError::MalformedPayload(_)))
        ));
    }

    #[test]
    fn test_valid_cookie_authenticates() {
        let g = guard();
        let token = g.authenticate_headers(&cookie_headers(&g, Role::Dentist)).unwrap();
        assert_eq!(token.sub, "user_1");
        assert_eq!(token.role, Role::Dentist);
    }

    #[test]
    fn test_role_gate() {
        let g = guard();
        let admin_gate = g.require_role(Role::Admin);

        assert_eq!(
            admin_gate.check(&cookie_headers(&g, Role::Customer)),
            Err(AuthError::Forbidden {
                required: Role::Admin,
                actual: Role::Customer
            })
        );
        assert_eq!(
            admin_gate.check(&cookie_headers(&g, Role::Admin)).unwrap().role,
            Role::Admin
        );
        assert!(g.require_login().check(&cookie_headers(&g, Role::Customer)).is_ok());
    }

    #[test]
    fn test_banned_token_still_authenticates() {
        let g = guard();
        let token = g.codec.issue("user_2", Role::Customer, true, true).unwrap();
        let decoded = g.authenticate(Some(&token)).unwrap();
        assert!(decoded.is_ban);
    }
}
