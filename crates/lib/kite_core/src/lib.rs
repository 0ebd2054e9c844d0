//! # kite_core
//!
//! Core domain logic for Kite: access and refresh token primitives, password
//! hashing, domain models and the storage backends shared by every service.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
