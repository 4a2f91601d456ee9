//! Authentication module.
//!
//! Password accounts with opaque bearer sessions stored as SHA-256 digests.

mod password;
mod service;

pub use service::*;

use axum::http::{header, HeaderMap};

/// Header accepted as an alternative to `Authorization: Bearer`.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Extract the session token from the request headers.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    bearer
        .or_else(|| {
            headers
                .get(SESSION_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}
