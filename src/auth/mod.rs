//! Authentication module
//!
//! Provides wallet-based authentication using Kaspa addresses.
//! - Challenge-response authentication with single-use nonces
//! - Schnorr signature verification against the claimed address
//! - Stateless JWT bearer tokens

pub mod address;
mod crypto;
mod jwt;
mod service;

pub use address::{AddressError, KaspaAddress, Prefix};
pub use crypto::{
    personal_message_hash, sign_personal_message, verify_kaspa_signature, CryptoError,
    SignedChallenge, VerificationPolicy,
};
pub use jwt::{Claims, JwtError, TokenIssuer};
pub use service::{AuthError, AuthErrorKind, AuthService, AuthSettings, VerifiedLogin};
