//! HTTP middleware
//!
//! Request tracing, rate limiting, security headers, and the bearer-token
//! extractor.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::AuthenticatedUser;
pub use rate_limiter::{forwarded_client_ip, peer_ip, rate_limit, RateLimiter};
pub use security::security_headers;
pub use self::tracing::request_tracing;
