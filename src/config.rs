use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::auth::cookie::SameSite;
use crate::registry::{self, ServiceEndpoint};

/// Placeholder signing key. Refused in production, warned about elsewhere.
pub const INSECURE_JWT_SECRET: &str = "CHANGE_ME_SHARED_JWT_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Shared HS256 key. Every backend verifying the session cookie needs the same value.
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub cookie: CookieConfig,
    /// Applied to every forwarded request. There is no retry.
    pub upstream_timeout_secs: u64,
    pub services: Vec<ServiceEndpoint>,
    /// Path each backend publishes its OpenAPI description under.
    pub spec_path: String,
    pub docs_title: String,
    /// Extra CORS origins on top of localhost.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "findmydentist_token".into(),
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            jwt_secret: INSECURE_JWT_SECRET.into(),
            token_ttl_minutes: 60 * 24,
            cookie: CookieConfig::default(),
            upstream_timeout_secs: 10,
            services: registry::default_services(),
            spec_path: "/openapi.json".into(),
            docs_title: "Dental Clinic API Gateway".into(),
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Access token lifetime. Rejects non-positive values and lifetimes that
    /// would put `exp` past the representable date range.
    pub fn token_ttl(&self) -> anyhow::Result<chrono::Duration> {
        if self.token_ttl_minutes <= 0 {
            anyhow::bail!(
                "token TTL must be positive, got {} minutes",
                self.token_ttl_minutes
            );
        }
        chrono::Duration::try_minutes(self.token_ttl_minutes)
            .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "token TTL of {} minutes is out of range",
                    self.token_ttl_minutes
                )
            })
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    let defaults = Config::default();

    let jwt_secret =
        std::env::var("GATEWAY_JWT_SECRET").unwrap_or_else(|_| INSECURE_JWT_SECRET.into());

    if jwt_secret == INSECURE_JWT_SECRET {
        let env_mode = std::env::var("GATEWAY_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "GATEWAY_JWT_SECRET is still the insecure placeholder. \
                 Set the shared signing key before running in production."
            );
        }
        tracing::warn!("GATEWAY_JWT_SECRET is not set, using the insecure placeholder key");
    }

    let services = match std::env::var("GATEWAY_SERVICES") {
        Ok(table) if !table.trim().is_empty() => registry::parse_service_table(&table)?,
        _ => defaults.services,
    };

    let same_site = match std::env::var("GATEWAY_COOKIE_SAMESITE") {
        Ok(v) => v.parse()?,
        Err(_) => defaults.cookie.same_site,
    };

    let config = Config {
        port: env_parse("GATEWAY_PORT").unwrap_or(defaults.port),
        jwt_secret,
        token_ttl_minutes: env_parse("GATEWAY_TOKEN_TTL_MINUTES")
            .unwrap_or(defaults.token_ttl_minutes),
        cookie: CookieConfig {
            name: std::env::var("GATEWAY_COOKIE_NAME").unwrap_or(defaults.cookie.name),
            secure: env_parse("GATEWAY_COOKIE_SECURE").unwrap_or(defaults.cookie.secure),
            same_site,
        },
        upstream_timeout_secs: env_parse("GATEWAY_UPSTREAM_TIMEOUT_SECS")
            .unwrap_or(defaults.upstream_timeout_secs),
        services,
        spec_path: std::env::var("GATEWAY_SPEC_PATH").unwrap_or(defaults.spec_path),
        docs_title: std::env::var("GATEWAY_DOCS_TITLE").unwrap_or(defaults.docs_title),
        cors_origins: std::env::var("GATEWAY_CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    };

    config.token_ttl().context("invalid GATEWAY_TOKEN_TTL_MINUTES")?;
    Ok(config)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
