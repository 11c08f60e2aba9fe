//! Session cookie contract shared by the gateway and every backend service.

use std::fmt;
use std::str::FromStr;

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::CookieConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        })
    }
}

impl FromStr for SameSite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => anyhow::bail!("invalid SameSite value '{}'", other),
        }
    }
}

/// Builds `Set-Cookie` values for login and logout.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
    same_site: SameSite,
    max_age_secs: i64,
}

impl SessionCookie {
    pub fn new(config: &CookieConfig, max_age: chrono::Duration) -> Self {
        Self {
            name: config.name.clone(),
            // Browsers drop SameSite=None cookies that are not Secure.
            secure: config.secure || config.same_site == SameSite::None,
            same_site: config.same_site,
            max_age_secs: max_age.num_seconds(),
        }
    }

    /// Cookie set on successful login.
    pub fn issue(&self, token: &str) -> anyhow::Result<HeaderValue> {
        self.render(token, self.max_age_secs)
    }

    /// Cookie that makes the browser drop the session (logout).
    pub fn clear(&self) -> anyhow::Result<HeaderValue> {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: i64) -> anyhow::Result<HeaderValue> {
        let mut cookie = format!(
            "{}={}; HttpOnly; Path=/; SameSite={}; Max-Age={}",
            self.name, value, self.same_site, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        Ok(HeaderValue::from_str(&cookie)?)
    }
}

/// Find a cookie value by name across all `Cookie` headers.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
