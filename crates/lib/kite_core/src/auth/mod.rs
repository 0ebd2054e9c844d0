//! Authentication and authorization logic.
//!
//! Provides password hashing, access token signing and verification, refresh
//! token material, and the [`VerifiedIdentity`] value that every service
//! receives once a request has been authenticated.

pub mod identity;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod validation;

use thiserror::Error;

pub use identity::{IDENTITY_HEADER, VerifiedIdentity};
pub use jwt::{AccessTokenSigner, TokenVerifier};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
