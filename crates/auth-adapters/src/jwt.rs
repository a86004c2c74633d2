//! HS256 JWT verifier. `sub` carries the user id; `exp` is mandatory.

use chrono::{Duration, Utc};
use domains::{DomainError, IdentityVerifier, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Clone)]
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Signs a token for `user_id`. Used by tests and local tooling; real
    /// tokens come from the upstream identity service.
    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = StoryClaims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| DomainError::Storage(format!("failed to sign token: {err}")))
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Uuid> {
        let data = decode::<StoryClaims>(token, &self.decoding, &self.validation).map_err(|err| {
            debug!(error = %err, "jwt rejected");
            DomainError::Unauthorized("invalid token".into())
        })?;
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| DomainError::Unauthorized("token subject is not a user id".into()))
    }
}
