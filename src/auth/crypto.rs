//! Kaspa wallet signature verification
//!
//! Wallets sign messages with BIP-340 Schnorr over secp256k1. The signed
//! digest is the "personal message" hash: blake2b-256 keyed with
//! `PersonalMessageSigningHash`, so a message signature can never be
//! replayed as a transaction signature.

use k256::schnorr::{Signature, VerifyingKey};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::address::KaspaAddress;

const PERSONAL_MESSAGE_KEY: &[u8] = b"PersonalMessageSigningHash";

/// Errors that can occur during signature verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Public key does not match address")]
    PublicKeyMismatch,

    #[error("Signature verification failed")]
    VerificationFailed,
}

/// How strictly signatures are checked
///
/// `PermissiveForTesting` skips the cryptographic check and must only ever
/// be selected by explicit configuration outside production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationPolicy {
    #[default]
    Strict,
    PermissiveForTesting,
}

impl VerificationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPolicy::Strict => "strict",
            VerificationPolicy::PermissiveForTesting => "permissive",
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, VerificationPolicy::Strict)
    }
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(VerificationPolicy::Strict),
            "permissive" | "permissive-for-testing" => {
                Ok(VerificationPolicy::PermissiveForTesting)
            }
            other => Err(format!(
                "Invalid verification policy: '{}'. Expected: strict or permissive",
                other
            )),
        }
    }
}

/// Structurally valid signature material, parsed before any store access
#[derive(Debug, Clone)]
pub struct SignedChallenge {
    pub signature: [u8; 64],
    pub public_key: [u8; 32],
}

impl SignedChallenge {
    /// Decode hex signature and public key
    ///
    /// The public key may be x-only (32 bytes) or SEC1 compressed (33 bytes).
    pub fn parse(signature_hex: &str, public_key_hex: &str) -> Result<Self, CryptoError> {
        let signature = parse_signature(signature_hex)?;
        let public_key = parse_public_key(public_key_hex)?;
        Ok(Self {
            signature,
            public_key,
        })
    }
}

fn parse_signature(signature_hex: &str) -> Result<[u8; 64], CryptoError> {
    let bytes = hex::decode(signature_hex.trim())
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidSignatureFormat(format!("expected 64 bytes, got {}", bytes.len()))
    })
}

fn parse_public_key(public_key_hex: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = hex::decode(public_key_hex.trim())
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    let x_only = match bytes.len() {
        32 => &bytes[..],
        33 if bytes[0] == 0x02 || bytes[0] == 0x03 => &bytes[1..],
        33 => {
            return Err(CryptoError::InvalidPublicKey(
                "compressed key must start with 02 or 03".to_string(),
            ))
        }
        n => {
            return Err(CryptoError::InvalidPublicKey(format!(
                "expected 32 or 33 bytes, got {}",
                n
            )))
        }
    };

    let mut key = [0u8; 32];
    key.copy_from_slice(x_only);
    Ok(key)
}

/// Digest a wallet signs for an off-chain message
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new()
        .hash_length(32)
        .key(PERSONAL_MESSAGE_KEY)
        .hash(message);

    let mut digest = [0u8; 32];
    digest.copy_from_slice(hash.as_bytes());
    digest
}

/// Verify a Kaspa wallet signature over `message`
///
/// # Arguments
/// * `address` - The claimed address; its embedded key must equal the supplied one
/// * `message` - Exact bytes that were signed
/// * `signed` - Parsed signature and public key
pub fn verify_kaspa_signature(
    address: &KaspaAddress,
    message: &[u8],
    signed: &SignedChallenge,
) -> Result<(), CryptoError> {
    let address_key = address
        .schnorr_key()
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    if address_key != signed.public_key {
        return Err(CryptoError::PublicKeyMismatch);
    }

    let verifying_key = VerifyingKey::from_bytes(&signed.public_key)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    let signature = Signature::try_from(&signed.signature[..])
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    let digest = personal_message_hash(message);

    verifying_key
        .verify_raw(&digest, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Sign like a Kaspa wallet does; used by tests and local tooling
pub fn sign_personal_message(
    signing_key: &k256::schnorr::SigningKey,
    message: &[u8],
) -> Result<[u8; 64], CryptoError> {
    let digest = personal_message_hash(message);
    let aux_rand: [u8; 32] = rand::random();
    let signature = signing_key
        .sign_raw(&digest, &aux_rand)
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;
    Ok(signature.to_bytes())
}
