//! The authenticated identity handed from the auth boundary to handlers.

use uuid::Uuid;

use super::AuthError;

/// Header carrying the verified user id from the gateway to the services.
pub const IDENTITY_HEADER: &str = "x-user-id";

/// Identity of the acting user, established by the auth boundary.
///
/// Only two paths construct one: [`TokenVerifier::verify`] after checking a
/// signature and expiry, and [`VerifiedIdentity::from_edge_header`] for
/// services configured to trust the gateway.
///
/// [`TokenVerifier::verify`]: super::TokenVerifier::verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    user_id: Uuid,
    username: Option<String>,
}

impl VerifiedIdentity {
    pub(crate) fn new(user_id: Uuid, username: Option<String>) -> Self {
        Self { user_id, username }
    }

    /// Accept the `x-user-id` value written by the gateway's edge
    /// authenticator. The username is not propagated, so it is `None`.
    pub fn from_edge_header(value: &str) -> Result<Self, AuthError> {
        let user_id = Uuid::parse_str(value.trim())
            .map_err(|_| AuthError::TokenError("malformed identity header".into()))?;
        Ok(Self::new(user_id, None))
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Value to place in [`IDENTITY_HEADER`] when forwarding.
    pub fn header_value(&self) -> String {
        self.user_id.to_string()
    }
}
