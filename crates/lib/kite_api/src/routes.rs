//! Route paths.
//!
//! Services mount their routes at the root of their own namespace; the
//! gateway exposes them under an `/api/<service>` prefix which the proxy
//! strips before forwarding.

pub const HEALTH: &str = "/health";

// Identity service
pub const IDENTITY_INFO: &str = "/";
pub const REGISTER: &str = "/register";
pub const LOGIN: &str = "/login";
pub const REFRESH: &str = "/refresh";
pub const LOGOUT: &str = "/logout";

// Post service
pub const POSTS: &str = "/";
pub const POST_BY_ID: &str = "/{id}";

// Search service
pub const SEARCH: &str = "/";

// Media service
pub const MEDIA_UPLOAD: &str = "/upload";
pub const MEDIA_FILES: &str = "/files";
pub const MEDIA_FILE: &str = "/files/{key}";

// Gateway prefixes
pub const GATEWAY_AUTH_PREFIX: &str = "/api/auth";
pub const GATEWAY_POSTS_PREFIX: &str = "/api/posts";
pub const GATEWAY_MEDIA_PREFIX: &str = "/api/media";
pub const GATEWAY_SEARCH_PREFIX: &str = "/api/search";
