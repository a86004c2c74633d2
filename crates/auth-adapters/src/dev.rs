//! Development verifier: the bearer token *is* the user's UUID.
//!
//! Only meant for local runs and tests. `auth.mode = "dev"` selects it.

use domains::{DomainError, IdentityVerifier, Result};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct DevTokenVerifier;

impl DevTokenVerifier {
    pub fn new() -> Self {
        Self
    }
}

impl IdentityVerifier for DevTokenVerifier {
    fn verify(&self, token: &str) -> Result<Uuid> {
        Uuid::parse_str(token.trim()).map_err(|err| {
            debug!(error = %err, "dev token is not a UUID");
            DomainError::Unauthorized("invalid token".into())
        })
    }
}
