//! Service and gateway configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::routes;

/// Default time allowed for one proxied request, connect through body.
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a downstream service establishes the caller's identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrustBoundary {
    /// Verify the bearer token again in the service; ignore `x-user-id`.
    #[default]
    Reverify,
    /// Trust the `x-user-id` header written by the gateway. Only valid when
    /// the service is reachable solely through the gateway.
    EdgeHeader,
}

impl FromStr for TrustBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reverify" => Ok(Self::Reverify),
            "edge-header" => Ok(Self::EdgeHeader),
            other => Err(format!(
                "unknown trust boundary '{other}' (expected 'reverify' or 'edge-header')"
            )),
        }
    }
}

impl fmt::Display for TrustBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reverify => f.write_str("reverify"),
            Self::EdgeHeader => f.write_str("edge-header"),
        }
    }
}

/// An internal service reachable through the gateway.
#[derive(Clone, Debug)]
pub struct Upstream {
    /// Short name used in logs and error messages (e.g. `AUTH`).
    pub name: String,
    /// Gateway path prefix, without trailing slash (e.g. `/api/auth`).
    pub prefix: String,
    /// Base URL of the service. Its path, if any, becomes the namespace the
    /// remainder of the request path is appended to.
    pub target: Url,
}

impl Upstream {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, target: Url) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            target,
        }
    }

    /// The part of `path` after this upstream's prefix, or `None` if the
    /// prefix does not match on a segment boundary. An exact match yields `/`.
    pub fn strip_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// URL to forward to: target path + `rest`, with `query` preserved.
    pub fn forward_url(&self, rest: &str, query: Option<&str>) -> Url {
        let mut url = self.target.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{rest}"));
        url.set_query(query);
        url
    }
}

/// Gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub upstreams: Vec<Upstream>,
    pub proxy_timeout: Duration,
}

impl GatewayConfig {
    /// Standard upstream set: identity, posts, search and optionally media.
    pub fn new(
        identity: Url,
        posts: Url,
        search: Url,
        media: Option<Url>,
        proxy_timeout: Duration,
    ) -> Self {
        let mut upstreams = vec![
            Upstream::new("AUTH", routes::GATEWAY_AUTH_PREFIX, identity),
            Upstream::new("POSTS", routes::GATEWAY_POSTS_PREFIX, posts),
            Upstream::new("SEARCH", routes::GATEWAY_SEARCH_PREFIX, search),
        ];
        if let Some(media) = media {
            upstreams.push(Upstream::new("MEDIA", routes::GATEWAY_MEDIA_PREFIX, media));
        }
        Self {
            upstreams,
            proxy_timeout,
        }
    }

    /// Find the upstream serving `path` and the path remainder to forward.
    pub fn route<'a>(&self, path: &'a str) -> Option<(&Upstream, &'a str)> {
        self.upstreams
            .iter()
            .find_map(|u| u.strip_prefix(path).map(|rest| (u, rest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    fn gateway() -> GatewayConfig {
        GatewayConfig::new(
            url("http://identity:3001"),
            url("http://posts:3002"),
            url("http://search:3004/internal/"),
            None,
            DEFAULT_PROXY_TIMEOUT,
        )
    }

    #[test]
    fn trust_boundary_parses_and_displays() {
        assert_eq!("reverify".parse::<TrustBoundary>(), Ok(TrustBoundary::Reverify));
        assert_eq!(
            "Edge-Header".parse::<TrustBoundary>(),
            Ok(TrustBoundary::EdgeHeader)
        );
        assert!("none".parse::<TrustBoundary>().is_err());
        assert_eq!(TrustBoundary::EdgeHeader.to_string(), "edge-header");
        assert_eq!(TrustBoundary::default(), TrustBoundary::Reverify);
    }

    #[test]
    fn prefix_is_stripped_on_segment_boundaries() {
        let cfg = gateway();
        let (up, rest) = cfg.route("/api/auth/login").unwrap();
        assert_eq!(up.name, "AUTH");
        assert_eq!(rest, "/login");

        let (up, rest) = cfg.route("/api/posts").unwrap();
        assert_eq!(up.name, "POSTS");
        assert_eq!(rest, "/");

        assert!(cfg.route("/api/postsx").is_none());
        assert!(cfg.route("/api/media/upload").is_none());
        assert!(cfg.route("/other").is_none());
    }

    #[test]
    fn forward_url_joins_target_path_and_keeps_query() {
        let cfg = gateway();
        let (up, rest) = cfg.route("/api/posts/abc").unwrap();
        assert_eq!(
            up.forward_url(rest, Some("limit=5")).as_str(),
            "http://posts:3002/abc?limit=5"
        );

        let (up, rest) = cfg.route("/api/search").unwrap();
        assert_eq!(
            up.forward_url(rest, Some("q=rust")).as_str(),
            "http://search:3004/internal/?q=rust"
        );
    }

    #[test]
    fn media_upstream_is_optional() {
        let cfg = GatewayConfig::new(
            url("http://identity:3001"),
            url("http://posts:3002"),
            url("http://search:3004"),
            Some(url("http://media:3003")),
            DEFAULT_PROXY_TIMEOUT,
        );
        let (up, rest) = cfg.route("/api/media/upload").unwrap();
        assert_eq!(up.name, "MEDIA");
        assert_eq!(rest, "/upload");
    }
}
