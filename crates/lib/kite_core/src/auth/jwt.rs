//! JWT access token generation and verification.
//!
//! Access tokens are HS256 JWTs signed with a shared secret. The identity
//! service signs; the gateway and every service verify through the same
//! [`TokenVerifier`].

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::AuthError;
use super::identity::VerifiedIdentity;
use crate::models::auth::{TokenClaims, User};

/// Access token lifetime: 60 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 60 * 60;

/// Environment variables consulted for the signing secret, in order.
const SECRET_ENV_VARS: [&str; 2] = ["JWT_SECRET", "AUTH_SECRET"];

/// Signs access tokens for authenticated users.
#[derive(Clone)]
pub struct AccessTokenSigner {
    key: EncodingKey,
}

impl AccessTokenSigner {
    /// Build a signer from the shared secret. An empty secret is rejected.
    pub fn from_secret(secret: &str) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Config("JWT secret must not be empty".into()));
        }
        Ok(Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Generate a signed access token (HS256, 60 min expiry) for `user`.
    pub fn sign(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            user_id: user.id.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS)).timestamp(),
        };
        self.sign_claims(&claims)
    }

    /// Sign arbitrary claims. Exposed for tooling and tests that need
    /// tokens with a specific expiry.
    pub fn sign_claims(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }
}

/// Verifies access tokens: signature, expiry and subject shape.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier from the shared secret. An empty secret is rejected.
    pub fn from_secret(secret: &str) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Config("JWT secret must not be empty".into()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Verify a JWT access token, returning the identity it asserts.
    ///
    /// The error carries the failure reason for server-side logs only.
    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let data = decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::TokenError(format!("{:?}", e.kind())))?;
        let user_id = Uuid::parse_str(&data.claims.user_id)
            .map_err(|_| AuthError::TokenError("malformed userId claim".into()))?;
        Ok(VerifiedIdentity::new(user_id, Some(data.claims.username)))
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET`.
///
/// There is no fallback: services refuse to start without a secret.
pub fn resolve_jwt_secret() -> Result<String, AuthError> {
    resolve_jwt_secret_with(|key| std::env::var(key).ok())
}

/// Resolve the JWT secret through a custom variable lookup.
pub fn resolve_jwt_secret_with<F>(lookup: F) -> Result<String, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    SECRET_ENV_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .find(|secret| !secret.is_empty())
        .ok_or_else(|| AuthError::Config("JWT_SECRET is not set".into()))
}
