//! JWT token generation and validation
//!
//! Bearer tokens are HS256 JWTs whose subject is the verified wallet
//! address. They are stateless: nothing server-side can revoke one before
//! its `exp`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};

/// JWT-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (wallet address)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID
    pub jti: String,
}

/// Mints and checks bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self::with_clock(secret, ttl_seconds, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &str, ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
            clock,
        }
    }

    /// Issue a token for a verified address
    pub fn issue(&self, address: &str) -> Result<String, JwtError> {
        self.issue_at(address, self.clock.now())
    }

    fn issue_at(&self, address: &str, now: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = Claims {
            sub: address.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify and decode a token
    ///
    /// # Returns
    /// * `Ok(Claims)` if the token is well-formed, correctly signed and unexpired
    /// * `Err(JwtError)` otherwise
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        // expiry is checked against the injected clock below
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| JwtError::DecodingFailed(e.to_string()))?;

        if token_data.claims.exp <= self.clock.now().timestamp() {
            return Err(JwtError::TokenExpired);
        }

        Ok(token_data.claims)
    }
}
