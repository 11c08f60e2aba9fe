//! Shared authentication layer: token codec, password hashing, session
//! cookie contract and the request guard. Every service links the same code
//! and the same secret, so a token issued by the auth service verifies
//! anywhere in the deployment.

pub mod cookie;
pub mod guard;
pub mod password;
pub mod token;

pub use guard::{authorize, enforce, AuthError, CurrentUser, Guard, RoleGate};
pub use token::{AccessToken, Role, TokenCodec, TokenError};
