//! User account management and session issuance over HTTP.
//!
//! The crate is a thin stack of small modules:
//! - [`store`]: SQLite-backed records (accounts, refresh tokens, roles, devices)
//! - [`auth`]: password digests, token signing, and the session issuer
//! - [`validation`]: declarative field checks run before any business logic
//! - [`gateway`]: the axum HTTP surface
//! - [`config`]: TOML configuration with environment overrides

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;
pub mod util;
pub mod validation;
