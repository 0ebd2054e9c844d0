//! Shared helpers for the router integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use chrono::Utc;
use kite_core::auth::{AccessTokenSigner, TokenVerifier};
use kite_core::models::auth::{TokenClaims, User};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret";

pub fn signer() -> AccessTokenSigner {
    AccessTokenSigner::from_secret(SECRET).unwrap()
}

pub fn verifier() -> Arc<TokenVerifier> {
    Arc::new(TokenVerifier::from_secret(SECRET).unwrap())
}

fn user(id: Uuid) -> User {
    User {
        id,
        username: "tester".into(),
        email: "tester@example.com".into(),
        created_at: Utc::now(),
    }
}

/// A valid access token for `id`.
pub fn token_for(id: Uuid) -> String {
    signer().sign(&user(id)).unwrap()
}

/// A well-formed token for `id` signed with a different secret.
pub fn foreign_token_for(id: Uuid) -> String {
    AccessTokenSigner::from_secret("some-other-secret")
        .unwrap()
        .sign(&user(id))
        .unwrap()
}

/// A token for `id` that expired an hour ago.
pub fn expired_token_for(id: Uuid) -> String {
    let now = Utc::now().timestamp();
    signer()
        .sign_claims(&TokenClaims {
            user_id: id.to_string(),
            username: "tester".into(),
            iat: now - 7200,
            exp: now - 3600,
        })
        .unwrap()
}

pub fn request(method: Method, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}").parse().unwrap()
}

/// A loopback URL nothing is listening on.
pub async fn dead_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}").parse().unwrap()
}
