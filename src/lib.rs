//! Clinic marketplace gateway: library crate for the binary and integration tests.
//!
//! Routes `/api/<service>/...` to the backend services, aggregates their API
//! descriptions, and provides the cookie/JWT authentication layer every
//! service shares.

pub mod app;
pub mod auth;
pub mod config;
pub mod docs;
pub mod errors;
pub mod middleware;
pub mod proxy;
pub mod registry;
