//! # auth-adapters
//!
//! Implementations of `IdentityVerifier`. Upstream authentication is out of
//! scope here: a verifier only turns the bearer credential into a user id.

pub mod dev;

#[cfg(feature = "auth-jwt")]
pub mod jwt;

pub use dev::DevTokenVerifier;

#[cfg(feature = "auth-jwt")]
pub use jwt::{JwtVerifier, StoryClaims};

/// Strips an optional `Bearer ` prefix (case-insensitive) and surrounding
/// whitespace from an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let value = header_value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None => value,
    };
    (!token.is_empty()).then_some(token)
}
