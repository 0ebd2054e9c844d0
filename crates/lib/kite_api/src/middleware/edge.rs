//! Gateway edge authenticator.
//!
//! The single place where a client's bearer token is turned into a trusted
//! `x-user-id` header. Any `x-user-id` sent by the client is discarded before
//! classification, so downstream services only ever see a value written here.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use kite_core::auth::IDENTITY_HEADER;
use tracing::debug;

use super::bearer_token;
use crate::GatewayState;
use crate::error::AppError;

/// How the edge treats a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Forwarded without verification.
    Public,
    /// Anonymous without an `Authorization` header; verified with one.
    OptionalAuth,
    /// Requires a valid bearer token.
    Protected,
}

struct AccessRule {
    method: &'static str,
    path: &'static str,
    /// Also matches every path below `path`.
    subtree: bool,
    access: Access,
}

impl AccessRule {
    const fn exact(method: &'static str, path: &'static str, access: Access) -> Self {
        Self {
            method,
            path,
            subtree: false,
            access,
        }
    }

    const fn subtree(method: &'static str, path: &'static str, access: Access) -> Self {
        Self {
            method,
            path,
            subtree: true,
            access,
        }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        if method.as_str() != self.method {
            return false;
        }
        match path.strip_prefix(self.path) {
            Some("") => true,
            Some(rest) => self.subtree && rest.starts_with('/'),
            None => false,
        }
    }
}

/// The gateway allow-list. Anything not listed is [`Access::Protected`];
/// editing this table moves the trust boundary.
const ACCESS_RULES: &[AccessRule] = &[
    AccessRule::exact("GET", "/health", Access::Public),
    AccessRule::exact("POST", "/api/auth/register", Access::Public),
    AccessRule::exact("POST", "/api/auth/login", Access::Public),
    AccessRule::exact("POST", "/api/auth/refresh", Access::Public),
    AccessRule::exact("POST", "/api/auth/logout", Access::Public),
    AccessRule::subtree("GET", "/api/posts", Access::OptionalAuth),
    AccessRule::subtree("GET", "/api/media/files", Access::Public),
];

/// Classify a request against the allow-list.
pub fn classify(method: &Method, path: &str) -> Access {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    ACCESS_RULES
        .iter()
        .find(|rule| rule.matches(method, path))
        .map_or(Access::Protected, |rule| rule.access)
}

/// Axum middleware: verifies the bearer token at the edge, writes the
/// verified user id into `x-user-id`, and injects the identity into request
/// extensions for the proxy.
pub async fn edge_authenticate(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    request.headers_mut().remove(IDENTITY_HEADER);

    let access = classify(request.method(), request.uri().path());
    let has_credentials = request.headers().contains_key(AUTHORIZATION);
    match access {
        Access::Public => return Ok(next.run(request).await),
        Access::OptionalAuth if !has_credentials => return Ok(next.run(request).await),
        Access::OptionalAuth | Access::Protected => {}
    }

    let token = bearer_token(request.headers())?;
    let identity = state.verifier.verify(token).map_err(|e| {
        debug!(reason = %e, path = %request.uri().path(), "edge auth: token rejected");
        AppError::Unauthenticated("Invalid or expired token".into())
    })?;

    let value = HeaderValue::from_str(&identity.header_value())
        .map_err(|e| AppError::Internal(format!("identity header: {e}")))?;
    request.headers_mut().insert(IDENTITY_HEADER, value);
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_entry_points_are_public() {
        for path in [
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/refresh",
            "/api/auth/logout",
        ] {
            assert_eq!(classify(&Method::POST, path), Access::Public, "{path}");
        }
        assert_eq!(classify(&Method::GET, "/health"), Access::Public);
    }

    #[test]
    fn method_is_part_of_the_rule() {
        assert_eq!(classify(&Method::GET, "/api/auth/login"), Access::Protected);
        assert_eq!(classify(&Method::POST, "/api/posts"), Access::Protected);
        assert_eq!(classify(&Method::DELETE, "/api/posts/1"), Access::Protected);
    }

    #[test]
    fn post_reads_are_optionally_authenticated() {
        assert_eq!(classify(&Method::GET, "/api/posts"), Access::OptionalAuth);
        assert_eq!(classify(&Method::GET, "/api/posts/"), Access::OptionalAuth);
        assert_eq!(classify(&Method::GET, "/api/posts/abc"), Access::OptionalAuth);
        assert_eq!(classify(&Method::GET, "/api/postsecret"), Access::Protected);
    }

    #[test]
    fn stored_media_is_public_but_uploads_are_not() {
        assert_eq!(
            classify(&Method::GET, "/api/media/files/abc.png"),
            Access::Public
        );
        assert_eq!(classify(&Method::POST, "/api/media/upload"), Access::Protected);
        assert_eq!(
            classify(&Method::POST, "/api/media/files/abc.png"),
            Access::Protected
        );
        assert_eq!(classify(&Method::GET, "/api/media/filesystem"), Access::Protected);
    }

    #[test]
    fn everything_else_is_protected() {
        assert_eq!(classify(&Method::GET, "/api/search"), Access::Protected);
        assert_eq!(classify(&Method::POST, "/api/media/upload"), Access::Protected);
        assert_eq!(
            classify(&Method::POST, "/api/auth/register/extra"),
            Access::Protected
        );
    }
}
