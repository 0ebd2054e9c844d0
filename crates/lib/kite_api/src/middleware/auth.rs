//! Service-local authentication middleware.
//!
//! Runs in each downstream service. Depending on the configured
//! [`TrustBoundary`], it either re-verifies the bearer token or accepts the
//! identity header written by the gateway, and injects the resulting
//! [`VerifiedIdentity`] into request extensions.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use kite_core::auth::{IDENTITY_HEADER, TokenVerifier, VerifiedIdentity};
use tracing::debug;

use super::bearer_token;
use crate::config::TrustBoundary;
use crate::error::AppError;

/// State for [`require_identity`].
#[derive(Clone)]
pub struct ServiceAuth {
    verifier: Arc<TokenVerifier>,
    trust: TrustBoundary,
}

impl ServiceAuth {
    pub fn new(verifier: Arc<TokenVerifier>, trust: TrustBoundary) -> Self {
        Self { verifier, trust }
    }

    pub fn trust(&self) -> TrustBoundary {
        self.trust
    }

    /// Establish the caller's identity from request headers.
    pub fn authenticate(
        &self,
        headers: &axum::http::HeaderMap,
    ) -> Result<VerifiedIdentity, AppError> {
        match self.trust {
            TrustBoundary::Reverify => {
                let token = bearer_token(headers)?;
                self.verifier.verify(token).map_err(|e| {
                    debug!(reason = %e, "service auth: token rejected");
                    AppError::Unauthenticated("Invalid or expired token".into())
                })
            }
            TrustBoundary::EdgeHeader => {
                let value = headers
                    .get(IDENTITY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        AppError::Unauthenticated("Missing identity header".into())
                    })?;
                VerifiedIdentity::from_edge_header(value).map_err(|e| {
                    debug!(reason = %e, "service auth: identity header rejected");
                    AppError::Unauthenticated("Invalid identity header".into())
                })
            }
        }
    }
}

/// Axum middleware: authenticates the request and injects
/// [`VerifiedIdentity`] into request extensions.
pub async fn require_identity(
    State(auth): State<ServiceAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = auth.authenticate(request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
