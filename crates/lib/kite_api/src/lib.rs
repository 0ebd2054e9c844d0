//! # kite_api
//!
//! HTTP layer for Kite: one axum router per deployable service (gateway,
//! identity, posts, search, media), the shared auth middleware, and the
//! business flows behind each route.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use kite_core::auth::{AccessTokenSigner, TokenVerifier};
use kite_core::store::{Backend, IdentityStore, ObjectStore, PostStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::GatewayConfig;
use crate::handlers::{health, identity, media, posts, proxy, search};
use crate::middleware::auth::ServiceAuth;

/// State of the identity service.
#[derive(Clone)]
pub struct IdentityState {
    pub store: Arc<dyn IdentityStore>,
    pub backend: Arc<dyn Backend>,
    pub signer: AccessTokenSigner,
}

impl IdentityState {
    pub fn new<S: IdentityStore + 'static>(store: Arc<S>, signer: AccessTokenSigner) -> Self {
        Self {
            store: store.clone(),
            backend: store,
            signer,
        }
    }
}

/// State of the post service.
#[derive(Clone)]
pub struct PostsState {
    pub store: Arc<dyn PostStore>,
    pub backend: Arc<dyn Backend>,
    pub auth: ServiceAuth,
}

impl PostsState {
    pub fn new<S: PostStore + 'static>(store: Arc<S>, auth: ServiceAuth) -> Self {
        Self {
            store: store.clone(),
            backend: store,
            auth,
        }
    }
}

/// State of the search service.
#[derive(Clone)]
pub struct SearchState {
    pub store: Arc<dyn PostStore>,
    pub backend: Arc<dyn Backend>,
    pub auth: ServiceAuth,
}

impl SearchState {
    pub fn new<S: PostStore + 'static>(store: Arc<S>, auth: ServiceAuth) -> Self {
        Self {
            store: store.clone(),
            backend: store,
            auth,
        }
    }
}

/// State of the media service.
#[derive(Clone)]
pub struct MediaState {
    pub objects: Arc<dyn ObjectStore>,
    pub backend: Arc<dyn Backend>,
    pub auth: ServiceAuth,
    /// Externally visible root of the media service; file URLs are built
    /// under it.
    pub public_url: Url,
}

impl MediaState {
    pub fn new<S: ObjectStore + 'static>(objects: Arc<S>, auth: ServiceAuth, public_url: Url) -> Self {
        Self {
            objects: objects.clone(),
            backend: objects,
            auth,
            public_url,
        }
    }
}

/// State of the API gateway.
#[derive(Clone)]
pub struct GatewayState {
    pub verifier: Arc<TokenVerifier>,
    pub config: Arc<GatewayConfig>,
    pub client: reqwest::Client,
}

impl GatewayState {
    /// Build the gateway state and its upstream HTTP client.
    ///
    /// The client never follows redirects (they are relayed to the caller)
    /// and bounds every proxied request by `config.proxy_timeout`.
    pub fn new(verifier: Arc<TokenVerifier>, config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.proxy_timeout)
            .connect_timeout(config.proxy_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            verifier,
            config: Arc::new(config),
            client,
        })
    }
}

/// Service name plus the backends to check, extracted by the health handler.
#[derive(Clone)]
pub struct HealthState {
    pub service: &'static str,
    pub database: Option<Arc<dyn Backend>>,
    pub storage: Option<Arc<dyn Backend>>,
}

impl FromRef<IdentityState> for HealthState {
    fn from_ref(state: &IdentityState) -> Self {
        Self {
            service: "identity-service",
            database: Some(state.backend.clone()),
            storage: None,
        }
    }
}

impl FromRef<PostsState> for HealthState {
    fn from_ref(state: &PostsState) -> Self {
        Self {
            service: "post-service",
            database: Some(state.backend.clone()),
            storage: None,
        }
    }
}

impl FromRef<SearchState> for HealthState {
    fn from_ref(state: &SearchState) -> Self {
        Self {
            service: "search-service",
            database: Some(state.backend.clone()),
            storage: None,
        }
    }
}

impl FromRef<GatewayState> for HealthState {
    fn from_ref(_: &GatewayState) -> Self {
        Self {
            service: "api-gateway",
            database: None,
            storage: None,
        }
    }
}

impl FromRef<MediaState> for HealthState {
    fn from_ref(state: &MediaState) -> Self {
        Self {
            service: "media-service",
            database: None,
            storage: Some(state.backend.clone()),
        }
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Identity service router: registration, login, refresh, logout.
pub fn identity_router(state: IdentityState) -> Router {
    Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .route(routes::IDENTITY_INFO, get(identity::service_info_handler))
        .route(routes::REGISTER, post(identity::register_handler))
        .route(routes::LOGIN, post(identity::login_handler))
        .route(routes::REFRESH, post(identity::refresh_handler))
        .route(routes::LOGOUT, post(identity::logout_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Post service router. Reads are public; writes require an identity.
pub fn posts_router(state: PostsState) -> Router {
    let public: Router<PostsState> = Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .route(routes::POSTS, get(posts::list_posts_handler))
        .route(routes::POST_BY_ID, get(posts::get_post_handler));

    let protected: Router<PostsState> = Router::new()
        .route(routes::POSTS, post(posts::create_post_handler))
        .route(
            routes::POST_BY_ID,
            axum::routing::patch(posts::update_post_handler).delete(posts::delete_post_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            middleware::auth::require_identity,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Search service router. Queries require an identity.
pub fn search_router(state: SearchState) -> Router {
    let protected: Router<SearchState> = Router::new()
        .route(routes::SEARCH, get(search::search_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            middleware::auth::require_identity,
        ));

    Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Media service router. Uploads require an identity; stored files are
/// public.
pub fn media_router(state: MediaState) -> Router {
    let protected: Router<MediaState> = Router::new()
        .route(routes::MEDIA_UPLOAD, post(media::upload_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            middleware::auth::require_identity,
        ));

    Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .route(routes::MEDIA_FILE, get(media::get_file_handler))
        .merge(protected)
        .layer(DefaultBodyLimit::max(services::media::MAX_UPLOAD_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Gateway router: edge authentication in front of the proxy.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .fallback(proxy::proxy_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::edge::edge_authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}
