//! HTTP middleware (spec §4.2, §6): bearer-token auth, rate limiting and
//! abuse detection, security response headers.

pub mod auth;
pub mod rate_limit;
pub mod security_headers;

pub use auth::AuthUser;
