//! Business flows behind the HTTP handlers.
//!
//! Services take storage traits and return [`crate::error::AppResult`]; they
//! know nothing about axum extractors or response shapes.

pub mod identity;
pub mod media;
pub mod posts;
pub mod search;
