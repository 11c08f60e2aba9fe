//! Access token codec.
//!
//! Tokens are compact HS256 JWTs carrying `sub`, `role`, `is_verified`,
//! `is_ban`, `iat` and `exp`. The same secret signs at login and verifies at
//! every service. There is no revocation list: a token stays valid until `exp`
//! even if the account is banned or its role changes after issuance.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Dentist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Dentist => "DENTIST",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Role::Customer),
            "DENTIST" => Ok(Role::Dentist),
            "ADMIN" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role '{}'", other),
        }
    }
}

/// Verified claim set carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Subject: the user id.
    pub sub: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_ban: bool,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Issued at, Unix seconds.
    #[serde(default)]
    pub iat: i64,
}

impl AccessToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token payload is malformed: {0}")]
    MalformedPayload(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::MalformedPayload(err.to_string()),
        }
    }
}

/// Signs and verifies access tokens with one shared symmetric key.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token expiring `ttl` from now.
    pub fn issue(
        &self,
        subject_id: &str,
        role: Role,
        is_verified: bool,
        is_ban: bool,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessToken {
            sub: subject_id.to_string(),
            role,
            is_verified,
            is_ban,
            exp: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| TokenError::Signing("token expiry is out of range".into()))?
                .timestamp(),
            iat: now.timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign an explicit claim set, `exp` included.
    pub fn sign(&self, claims: &AccessToken) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature first, then expiry, then claim shape.
    pub fn decode(&self, token: &str) -> Result<AccessToken, TokenError> {
        let data = decode::<AccessToken>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
