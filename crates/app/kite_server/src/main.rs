//! Kite service binary.
//!
//! One executable, one subcommand per deployable service. Startup faults
//! (missing secret, unreachable database, bad bind address) end the process
//! with an error; everything after `listening` is handled per request.

mod cli;

use std::error::Error;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use kite_api::config::{GatewayConfig, TrustBoundary};
use kite_api::middleware::auth::ServiceAuth;
use kite_api::{GatewayState, IdentityState, MediaState, PostsState, SearchState};
use kite_core::auth::jwt::resolve_jwt_secret;
use kite_core::auth::{AccessTokenSigner, TokenVerifier};
use kite_core::store::{LocalObjectStore, MemoryStore, PgStore};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{info, warn};

use crate::cli::{Cli, Command, StorageArgs};

type BoxError = Box<dyn Error>;

/// Per-statement limit applied to every pooled connection.
const STATEMENT_TIMEOUT_MS: u64 = 5_000;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,kite_api=debug,kite_core=debug")
            }),
        )
        .init();

    let cli = Cli::parse();
    let service = cli.command.service();
    let bind_addr = cli
        .command
        .bind_addr()
        .unwrap_or(cli.command.default_bind_addr())
        .to_string();

    // Checked before touching the database: no secret, no service.
    let secret = resolve_jwt_secret()?;

    info!(service, version = kite_core::version(), "starting");

    let app = match cli.command {
        Command::Gateway(args) => {
            let verifier = Arc::new(TokenVerifier::from_secret(&secret)?);
            let config = GatewayConfig::new(
                args.identity_api_url,
                args.post_api_url,
                args.search_api_url,
                args.media_api_url,
                Duration::from_secs(args.proxy_timeout_secs),
            );
            for upstream in &config.upstreams {
                info!(
                    name = %upstream.name,
                    prefix = %upstream.prefix,
                    target = %upstream.target,
                    "upstream"
                );
            }
            kite_api::gateway_router(GatewayState::new(verifier, config)?)
        }
        Command::Identity(args) => {
            let signer = AccessTokenSigner::from_secret(&secret)?;
            if args.in_memory {
                warn!("using in-memory storage; data is lost on exit");
                kite_api::identity_router(IdentityState::new(Arc::new(MemoryStore::new()), signer))
            } else {
                let pool = connect(&args).await?;
                info!("running identity migrations");
                kite_core::migrate::migrate_identity(&pool).await?;
                kite_api::identity_router(IdentityState::new(Arc::new(PgStore::new(pool)), signer))
            }
        }
        Command::Posts(args) => {
            let auth = service_auth(&secret, args.trust_boundary)?;
            if args.storage.in_memory {
                warn!("using in-memory storage; data is lost on exit");
                kite_api::posts_router(PostsState::new(Arc::new(MemoryStore::new()), auth))
            } else {
                let pool = connect(&args.storage).await?;
                info!("running post migrations");
                kite_core::migrate::migrate_posts(&pool).await?;
                kite_api::posts_router(PostsState::new(Arc::new(PgStore::new(pool)), auth))
            }
        }
        Command::Search(args) => {
            let auth = service_auth(&secret, args.trust_boundary)?;
            if args.storage.in_memory {
                warn!("using in-memory storage; data is lost on exit");
                kite_api::search_router(SearchState::new(Arc::new(MemoryStore::new()), auth))
            } else {
                let pool = connect(&args.storage).await?;
                kite_core::migrate::migrate_posts(&pool).await?;
                kite_api::search_router(SearchState::new(Arc::new(PgStore::new(pool)), auth))
            }
        }
        Command::Media(args) => {
            let auth = service_auth(&secret, args.trust_boundary)?;
            info!(public_url = %args.public_url, "media file URLs");
            match args.storage_dir {
                Some(dir) if !args.in_memory => {
                    let objects = LocalObjectStore::open(dir).await?;
                    info!(dir = %objects.root().display(), "storing media on disk");
                    kite_api::media_router(MediaState::new(Arc::new(objects), auth, args.public_url))
                }
                _ => {
                    warn!("using in-memory storage; data is lost on exit");
                    kite_api::media_router(MediaState::new(
                        Arc::new(MemoryStore::new()),
                        auth,
                        args.public_url,
                    ))
                }
            }
        }
    };

    serve(service, &bind_addr, app).await
}

fn service_auth(secret: &str, trust: TrustBoundary) -> Result<ServiceAuth, BoxError> {
    let verifier = Arc::new(TokenVerifier::from_secret(secret)?);
    info!(trust_boundary = %trust, "service authentication configured");
    Ok(ServiceAuth::new(verifier, trust))
}

async fn connect(args: &StorageArgs) -> Result<PgPool, BoxError> {
    let url = args
        .database_url
        .as_deref()
        .ok_or("DATABASE_URL is required unless --in-memory is set")?;
    let options = PgConnectOptions::from_str(url)?
        .options([("statement_timeout", STATEMENT_TIMEOUT_MS.to_string())]);

    info!(max_connections = args.max_connections, "connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;
    Ok(pool)
}

async fn serve(service: &str, bind_addr: &str, app: Router) -> Result<(), BoxError> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(service, addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(service, "stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
