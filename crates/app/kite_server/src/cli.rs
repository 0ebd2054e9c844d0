//! Command-line arguments. Every flag has an environment fallback so the
//! services can be configured from a `.env` file or the container env.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kite_api::config::TrustBoundary;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "kite_server", version, about = "Kite backend services")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Public entry point: edge authentication and proxying to the services.
    Gateway(GatewayArgs),
    /// Registration, login and token lifecycle.
    Identity(StorageArgs),
    /// Post CRUD.
    Posts(TrustedServiceArgs),
    /// Search over posts.
    Search(TrustedServiceArgs),
    /// Media uploads and the files they produce.
    Media(MediaArgs),
}

impl Command {
    /// Service name used in logs.
    pub fn service(&self) -> &'static str {
        match self {
            Self::Gateway(_) => "api-gateway",
            Self::Identity(_) => "identity-service",
            Self::Posts(_) => "post-service",
            Self::Search(_) => "search-service",
            Self::Media(_) => "media-service",
        }
    }

    /// Address to bind when `--bind-addr` is not given.
    pub fn default_bind_addr(&self) -> &'static str {
        match self {
            Self::Gateway(_) => "0.0.0.0:3000",
            Self::Identity(_) => "0.0.0.0:3001",
            Self::Posts(_) => "0.0.0.0:3002",
            Self::Media(_) => "0.0.0.0:3003",
            Self::Search(_) => "0.0.0.0:3004",
        }
    }

    pub fn bind_addr(&self) -> Option<&str> {
        match self {
            Self::Gateway(args) => args.bind_addr.as_deref(),
            Self::Identity(args) => args.bind_addr.as_deref(),
            Self::Posts(args) | Self::Search(args) => args.storage.bind_addr.as_deref(),
            Self::Media(args) => args.bind_addr.as_deref(),
        }
    }
}

#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Identity service base URL (serves `/api/auth`).
    #[arg(long, env = "IDENTITY_API_URL", default_value = "http://localhost:3001")]
    pub identity_api_url: Url,

    /// Post service base URL (serves `/api/posts`).
    #[arg(long, env = "POST_API_URL", default_value = "http://localhost:3002")]
    pub post_api_url: Url,

    /// Search service base URL (serves `/api/search`).
    #[arg(long, env = "SEARCH_API_URL", default_value = "http://localhost:3004")]
    pub search_api_url: Url,

    /// Media service base URL (serves `/api/media`). Not routed when unset.
    #[arg(long, env = "MEDIA_API_URL")]
    pub media_api_url: Option<Url>,

    /// Upper bound for one proxied request, in seconds.
    #[arg(long, env = "PROXY_TIMEOUT_SECS", default_value_t = 10)]
    pub proxy_timeout_secs: u64,
}

#[derive(Args, Debug)]
pub struct StorageArgs {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", required_unless_present = "in_memory")]
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Keep all data in process memory instead of PostgreSQL (development only).
    #[arg(long, default_value_t = false)]
    pub in_memory: bool,
}

#[derive(Args, Debug)]
pub struct TrustedServiceArgs {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Where the caller's identity is established: `reverify` checks the
    /// bearer token again, `edge-header` trusts the gateway's `x-user-id`.
    #[arg(long, env = "TRUST_BOUNDARY", default_value_t = TrustBoundary::Reverify)]
    pub trust_boundary: TrustBoundary,
}

#[derive(Args, Debug)]
pub struct MediaArgs {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Directory uploaded files are written to.
    #[arg(long, env = "MEDIA_STORAGE_DIR", required_unless_present = "in_memory")]
    pub storage_dir: Option<PathBuf>,

    /// Keep uploads in process memory instead of on disk (development only).
    #[arg(long, default_value_t = false)]
    pub in_memory: bool,

    /// Externally visible root of the media service; returned file URLs
    /// point below it.
    #[arg(long, env = "MEDIA_PUBLIC_URL", default_value = "http://localhost:3000/api/media")]
    pub public_url: Url,

    /// Where the caller's identity is established (see `posts --help`).
    #[arg(long, env = "TRUST_BOUNDARY", default_value_t = TrustBoundary::Reverify)]
    pub trust_boundary: TrustBoundary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trust_boundary_defaults_to_reverify() {
        let cli = Cli::try_parse_from(["kite_server", "posts", "--in-memory"]).unwrap();
        let Command::Posts(args) = cli.command else {
            panic!("expected posts subcommand");
        };
        assert_eq!(args.trust_boundary, TrustBoundary::Reverify);
        assert!(args.storage.in_memory);
    }

    #[test]
    fn trust_boundary_parses_edge_header() {
        let cli = Cli::try_parse_from([
            "kite_server",
            "search",
            "--in-memory",
            "--trust-boundary",
            "edge-header",
        ])
        .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search subcommand");
        };
        assert_eq!(args.trust_boundary, TrustBoundary::EdgeHeader);
    }

    #[test]
    fn media_takes_a_storage_dir_and_public_url() {
        let cli = Cli::try_parse_from([
            "kite_server",
            "media",
            "--storage-dir",
            "/var/lib/kite/media",
            "--public-url",
            "https://kite.example.com/api/media",
        ])
        .unwrap();
        assert_eq!(cli.command.default_bind_addr(), "0.0.0.0:3003");
        let Command::Media(args) = cli.command else {
            panic!("expected media subcommand");
        };
        assert_eq!(
            args.storage_dir.as_deref(),
            Some(std::path::Path::new("/var/lib/kite/media"))
        );
        assert_eq!(args.public_url.as_str(), "https://kite.example.com/api/media");
        assert!(!args.in_memory);
    }

    #[test]
    fn bind_addr_falls_back_per_service() {
        let cli = Cli::try_parse_from(["kite_server", "gateway", "--bind-addr", "127.0.0.1:0"])
            .unwrap();
        assert_eq!(cli.command.bind_addr(), Some("127.0.0.1:0"));
        assert_eq!(cli.command.default_bind_addr(), "0.0.0.0:3000");
    }
}
