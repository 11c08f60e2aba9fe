//! Password hashing for the user store. Persistence belongs to the auth
//! service; this module only hashes and verifies.

use rand::RngCore;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;
/// bcrypt silently ignores input past 72 bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password must be at least 6 characters")]
    TooShort,

    #[error("password must be at most 72 bytes")]
    TooLong,

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Salted bcrypt hash of `password`.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        validate(password)?;
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// A malformed stored hash is an error, a wrong password is `Ok(false)`.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, CredentialError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        Ok(bcrypt::verify(password, stored_hash)?)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

fn validate(password: &str) -> Result<(), CredentialError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CredentialError::TooShort);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(CredentialError::TooLong);
    }
    Ok(())
}

/// Opaque single-use token for the password reset flow (64 hex chars).
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn test_hash_then_verify() {
        let h = hasher();
        let hash = h.hash("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(h.verify("correct horse", &hash).unwrap());
        assert!(!h.verify("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let h = hasher();
        assert_ne!(h.hash("secret1").unwrap(), h.hash("secret1").unwrap());
    }

    #[test]
    fn test_length_limits() {
        let h = hasher();
        assert!(matches!(h.hash("abc"), Err(CredentialError::TooShort)));
        assert!(matches!(h.hash(&"x".repeat(73)), Err(CredentialError::TooLong)));
        assert!(h.hash("abcdef").is_ok());
    }

    #[test]
    fn test_malformed_stored_hash_is_error() {
        assert!(hasher().verify("secret1", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn test_reset_token_shape() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
