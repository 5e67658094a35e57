//! Authentication service
//!
//! Core business logic for wallet-based authentication: challenge issuance,
//! signed-challenge verification, token minting and nonce housekeeping.

use chrono::Duration;
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::models::{ChallengeResponse, NonceRecord, User, VerifyRequest};
use crate::store::{NonceStore, StoreError, UserStore};

use super::address::{KaspaAddress, VERSION_PUBKEY};
use super::crypto::{verify_kaspa_signature, CryptoError, SignedChallenge, VerificationPolicy};
use super::jwt::{Claims, JwtError, TokenIssuer};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Nonce not found")]
    NonceNotFound,

    #[error("Nonce expired")]
    NonceExpired,

    #[error("Nonce already used")]
    NonceAlreadyUsed,

    #[error("Nonce was issued for a different address")]
    NonceAddressMismatch,

    #[error("Public key does not match address")]
    PublicKeyMismatch,

    #[error("Signature verification failed")]
    SignatureMismatch,

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Coarse error classes, each with its own handling contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Malformed request; detected before the store is touched
    Validation,
    /// Bad nonce, key or signature; no state was mutated
    Authentication,
    /// Backend failure; retryable by the caller
    Storage,
    Internal,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::MissingField(_)
            | AuthError::InvalidAddress(_)
            | AuthError::InvalidPublicKey(_)
            | AuthError::InvalidSignatureFormat(_) => AuthErrorKind::Validation,
            AuthError::NonceNotFound
            | AuthError::NonceExpired
            | AuthError::NonceAlreadyUsed
            | AuthError::NonceAddressMismatch
            | AuthError::PublicKeyMismatch
            | AuthError::SignatureMismatch => AuthErrorKind::Authentication,
            AuthError::Token(JwtError::EncodingFailed(_)) => AuthErrorKind::Internal,
            AuthError::Token(_) => AuthErrorKind::Authentication,
            AuthError::Storage(_) => AuthErrorKind::Storage,
        }
    }
}

impl From<CryptoError> for AuthError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidSignatureFormat(msg) => AuthError::InvalidSignatureFormat(msg),
            CryptoError::InvalidPublicKey(msg) => AuthError::InvalidPublicKey(msg),
            CryptoError::PublicKeyMismatch => AuthError::PublicKeyMismatch,
            CryptoError::VerificationFailed => AuthError::SignatureMismatch,
        }
    }
}

/// Tunables for [`AuthService`]
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_seconds: i64,
    pub nonce_ttl_seconds: i64,
    pub verification_policy: VerificationPolicy,
}

/// Result of a successful verification
#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub token: String,
    pub address: String,
    pub user: User,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    nonces: Arc<dyn NonceStore>,
    users: Arc<dyn UserStore>,
    tokens: TokenIssuer,
    clock: Arc<dyn Clock>,
    nonce_ttl: Duration,
    policy: VerificationPolicy,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        nonces: Arc<dyn NonceStore>,
        users: Arc<dyn UserStore>,
        settings: AuthSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if !settings.verification_policy.is_strict() {
            tracing::warn!(
                policy = %settings.verification_policy,
                "Signature verification is DISABLED; never use this outside testing"
            );
        }

        Self {
            tokens: TokenIssuer::with_clock(
                &settings.jwt_secret,
                settings.token_ttl_seconds,
                clock.clone(),
            ),
            nonces,
            users,
            clock,
            nonce_ttl: Duration::seconds(settings.nonce_ttl_seconds),
            policy: settings.verification_policy,
        }
    }

    pub fn verification_policy(&self) -> VerificationPolicy {
        self.policy
    }

    /// Issue a fresh challenge, optionally bound to an address
    pub async fn issue_challenge(
        &self,
        address: Option<&str>,
    ) -> Result<ChallengeResponse, AuthError> {
        let address = match address.map(str::trim).filter(|a| !a.is_empty()) {
            Some(raw) => Some(parse_login_address(raw)?.to_string()),
            None => None,
        };

        let now = self.clock.now();
        let expires_at = now + self.nonce_ttl;
        let record = NonceRecord::new(generate_secure_nonce(), address, now, expires_at);

        self.nonces.create_nonce(&record).await?;

        tracing::debug!(
            bound_address = ?record.address,
            expires_at = %expires_at,
            "Issued auth challenge"
        );

        Ok(ChallengeResponse {
            nonce: record.value,
            expires_at,
        })
    }

    /// Verify a signed challenge and issue a token
    ///
    /// The nonce is consumed only if every check passes; on any rejection
    /// the store is left untouched.
    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerifiedLogin, AuthError> {
        let nonce = required(&request.nonce, "nonce")?;
        let signature = required(&request.signature, "signature")?;
        let public_key = required(&request.public_key, "publicKey")?;
        let address = parse_login_address(required(&request.address, "address")?)?;
        let signed = SignedChallenge::parse(signature, public_key)?;
        let canonical_address = address.to_string();

        let now = self.clock.now();
        let record = self
            .nonces
            .get_nonce(nonce)
            .await?
            .ok_or(AuthError::NonceNotFound)?;

        if record.used {
            return Err(AuthError::NonceAlreadyUsed);
        }
        if record.is_expired(now) {
            return Err(AuthError::NonceExpired);
        }
        if let Some(bound) = &record.address {
            if bound != &canonical_address {
                return Err(AuthError::NonceAddressMismatch);
            }
        }

        match self.policy {
            VerificationPolicy::Strict => {
                verify_kaspa_signature(&address, nonce.as_bytes(), &signed)?;
            }
            VerificationPolicy::PermissiveForTesting => {
                tracing::warn!(
                    address = %canonical_address,
                    "Accepting signature without cryptographic verification"
                );
            }
        }

        // Compare-and-set; a concurrent request may have consumed it first
        if !self.nonces.mark_used(nonce, now).await? {
            tracing::warn!(address = %canonical_address, "Nonce consumed by a concurrent request");
            return Err(AuthError::NonceAlreadyUsed);
        }

        // The nonce is spent from here on; a failure below leaves the
        // client needing a fresh challenge
        let login = async {
            let user = self.users.upsert_user(&canonical_address, now).await?;
            let token = self.tokens.issue(&canonical_address)?;
            Ok::<_, AuthError>((user, token))
        };
        let (user, token) = login.await.map_err(|e| {
            tracing::error!(
                nonce = %nonce,
                address = %canonical_address,
                error = %e,
                "Nonce consumed but login could not be completed"
            );
            e
        })?;

        tracing::info!(address = %canonical_address, user_id = %user.id, "Wallet authenticated");

        Ok(VerifiedLogin {
            token,
            address: canonical_address,
            user,
        })
    }

    /// Validate a bearer token
    pub fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.tokens.verify(token)?)
    }

    /// Look up the player behind an authenticated address
    pub async fn get_user(&self, address: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.find_user(address).await?)
    }

    /// Remove expired or used nonces
    ///
    /// # Returns
    /// Number of records removed
    pub async fn sweep(&self) -> Result<u64, AuthError> {
        let removed = self.nonces.delete_stale(self.clock.now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Swept stale auth nonces");
        }
        Ok(removed)
    }

    /// Check the nonce store is reachable (for health checks)
    pub async fn storage_healthy(&self) -> Result<(), AuthError> {
        Ok(self.nonces.ping().await?)
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, AuthError> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingField(name))
}

/// Only pay-to-pubkey addresses carry a key a signature can be checked against
fn parse_login_address(raw: &str) -> Result<KaspaAddress, AuthError> {
    let address =
        KaspaAddress::parse(raw).map_err(|e| AuthError::InvalidAddress(e.to_string()))?;

    if address.version() != VERSION_PUBKEY {
        return Err(AuthError::InvalidAddress(
            "only Schnorr pay-to-pubkey addresses can sign in".to_string(),
        ));
    }

    Ok(address)
}

/// Generate a cryptographically secure nonce (256 bits, hex)
fn generate_secure_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
