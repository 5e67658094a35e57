//! Kaspa address codec
//!
//! Kaspa addresses are `<prefix>:<data>` where `data` is a base32 string
//! over the cashaddr alphabet carrying a version byte, the key or script
//! hash payload, and a 40-bit polymod checksum bound to the prefix.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LEN: usize = 8;

/// Address version for a 32-byte x-only Schnorr public key
pub const VERSION_PUBKEY: u8 = 0;
/// Address version for a 33-byte compressed ECDSA public key
pub const VERSION_PUBKEY_ECDSA: u8 = 1;
/// Address version for a 32-byte script hash
pub const VERSION_SCRIPT_HASH: u8 = 8;

/// Errors from parsing a Kaspa address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Missing network prefix")]
    MissingPrefix,

    #[error("Unknown network prefix: {0}")]
    UnknownPrefix(String),

    #[error("Mixed-case address")]
    MixedCase,

    #[error("Invalid character: {0:?}")]
    InvalidCharacter(char),

    #[error("Address too short")]
    TooShort,

    #[error("Invalid checksum")]
    BadChecksum,

    #[error("Invalid padding")]
    BadPadding,

    #[error("Unsupported address version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid payload length {len} for version {version}")]
    BadPayloadLength { version: u8, len: usize },
}

/// Network a Kaspa address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    Mainnet,
    Testnet,
    Simnet,
    Devnet,
}

impl Prefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::Mainnet => "kaspa",
            Prefix::Testnet => "kaspatest",
            Prefix::Simnet => "kaspasim",
            Prefix::Devnet => "kaspadev",
        }
    }
}

impl FromStr for Prefix {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kaspa" => Ok(Prefix::Mainnet),
            "kaspatest" => Ok(Prefix::Testnet),
            "kaspasim" => Ok(Prefix::Simnet),
            "kaspadev" => Ok(Prefix::Devnet),
            other => Err(AddressError::UnknownPrefix(other.to_string())),
        }
    }
}

/// A decoded Kaspa address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KaspaAddress {
    prefix: Prefix,
    version: u8,
    payload: Vec<u8>,
}

impl KaspaAddress {
    /// Address for an x-only Schnorr public key
    pub fn from_schnorr_key(prefix: Prefix, key: [u8; 32]) -> Self {
        Self {
            prefix,
            version: VERSION_PUBKEY,
            payload: key.to_vec(),
        }
    }

    /// Parse and checksum-verify an address string
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let has_lower = address.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = address.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::MixedCase);
        }
        let address = address.to_ascii_lowercase();

        let (prefix_str, data) = address
            .split_once(':')
            .ok_or(AddressError::MissingPrefix)?;
        let prefix: Prefix = prefix_str.parse()?;

        let data_u5 = data
            .chars()
            .map(|c| {
                CHARSET
                    .iter()
                    .position(|&x| x as char == c)
                    .map(|p| p as u8)
                    .ok_or(AddressError::InvalidCharacter(c))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        // version byte needs two groups, plus the checksum
        if data_u5.len() < CHECKSUM_LEN + 2 {
            return Err(AddressError::TooShort);
        }

        let (payload_u5, checksum_u5) = data_u5.split_at(data_u5.len() - CHECKSUM_LEN);
        let checksum_bytes =
            convert_bits(checksum_u5, 5, 8, false).ok_or(AddressError::BadChecksum)?;
        let mut expected = [0u8; 8];
        expected[3..].copy_from_slice(&checksum_bytes);
        if checksum(payload_u5, prefix.as_str()) != u64::from_be_bytes(expected) {
            return Err(AddressError::BadChecksum);
        }

        let raw = convert_bits(payload_u5, 5, 8, false).ok_or(AddressError::BadPadding)?;
        let (version, payload) = raw.split_first().ok_or(AddressError::TooShort)?;
        let expected_len = match *version {
            VERSION_PUBKEY | VERSION_SCRIPT_HASH => 32,
            VERSION_PUBKEY_ECDSA => 33,
            other => return Err(AddressError::UnsupportedVersion(other)),
        };
        if payload.len() != expected_len {
            return Err(AddressError::BadPayloadLength {
                version: *version,
                len: payload.len(),
            });
        }

        Ok(Self {
            prefix,
            version: *version,
            payload: payload.to_vec(),
        })
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// The x-only Schnorr key of a version-0 address
    pub fn schnorr_key(&self) -> Result<[u8; 32], AddressError> {
        if self.version != VERSION_PUBKEY {
            return Err(AddressError::UnsupportedVersion(self.version));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.payload);
        Ok(key)
    }

    fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(self.payload.len() + 1);
        raw.push(self.version);
        raw.extend_from_slice(&self.payload);

        // padded conversion never fails
        let payload_u5 = convert_bits(&raw, 8, 5, true).unwrap_or_default();
        let checksum = checksum(&payload_u5, self.prefix.as_str());
        let checksum_u5 = convert_bits(&checksum.to_be_bytes()[3..], 8, 5, true).unwrap_or_default();

        let data: String = payload_u5
            .iter()
            .chain(checksum_u5.iter())
            .map(|&d| CHARSET[d as usize] as char)
            .collect();
        format!("{}:{}", self.prefix.as_str(), data)
    }
}

impl fmt::Display for KaspaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for KaspaAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn polymod(values: impl Iterator<Item = u8>) -> u64 {
    let mut c = 1u64;
    for d in values {
        let c0 = c >> 35;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

fn checksum(payload_u5: &[u8], prefix: &str) -> u64 {
    polymod(
        prefix
            .bytes()
            .map(|b| b & 0x1f)
            .chain([0u8])
            .chain(payload_u5.iter().copied())
            .chain([0u8; CHECKSUM_LEN]),
    )
}

/// Regroup bits between word sizes; `None` on out-of-range input or bad padding
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_value: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let value = value as u32;
        if value >> from != 0 {
            return None;
        }
        acc = ((acc << from) | value) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return None;
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        key
    }

    #[test]
    fn test_schnorr_address_shape() {
        let address = KaspaAddress::from_schnorr_key(Prefix::Mainnet, sample_key()).to_string();
        let (prefix, data) = address.split_once(':').unwrap();
        assert_eq!(prefix, "kaspa");
        // 33 bytes -> 53 groups, plus 8 checksum groups
        assert_eq!(data.len(), 61);
        // version 0 encodes to a leading 'q'
        assert!(data.starts_with('q'));
    }

    #[test]
    fn test_parse_recovers_key_and_prefix() {
        for prefix in [Prefix::Mainnet, Prefix::Testnet, Prefix::Simnet, Prefix::Devnet] {
            let encoded = KaspaAddress::from_schnorr_key(prefix, sample_key()).to_string();
            let parsed = KaspaAddress::parse(&encoded).unwrap();
            assert_eq!(parsed.prefix(), prefix);
            assert_eq!(parsed.schnorr_key().unwrap(), sample_key());
        }
    }

    #[test]
    fn test_published_mainnet_address() {
        let address = "kaspa:qqkqkzjvr7zwxxmjxjkmxxdwju9kjs6e9u82uh59z07vgaks6gg62v8707g73";
        let parsed = KaspaAddress::parse(address).unwrap();

        assert_eq!(parsed.prefix(), Prefix::Mainnet);
        assert_eq!(parsed.version(), VERSION_PUBKEY);
        assert_eq!(
            hex::encode(parsed.schnorr_key().unwrap()),
            "2c0b0a4c1f84e31b7234adb319ae970b6943592f0eae5e8513fcc476d0d211a5"
        );
        assert_eq!(parsed.to_string(), address);
    }

    #[test]
    fn test_known_key_encodes_to_known_address() {
        // x-only key of the first BIP-340 test vector
        let key: [u8; 32] =
            hex::decode("dff1d77f2a671c5f36183726db2341be58feae1da2deced843240f7b502ba659")
                .unwrap()
                .try_into()
                .unwrap();

        assert_eq!(
            KaspaAddress::from_schnorr_key(Prefix::Mainnet, key).to_string(),
            "kaspa:qr0lr4ml9fn3chekrqmjdkergxl93l4wrk3dankcgvjq776s9wn9jkdskewva"
        );
        assert_eq!(
            KaspaAddress::from_schnorr_key(Prefix::Testnet, key).to_string(),
            "kaspatest:qr0lr4ml9fn3chekrqmjdkergxl93l4wrk3dankcgvjq776s9wn9jhtkdksae"
        );
    }

    #[test]
    fn test_uppercase_address_accepted() {
        let encoded = KaspaAddress::from_schnorr_key(Prefix::Mainnet, sample_key()).to_string();
        let parsed = KaspaAddress::parse(&encoded.to_ascii_uppercase()).unwrap();
        assert_eq!(parsed.schnorr_key().unwrap(), sample_key());
    }

    #[test]
    fn test_single_character_corruption_detected() {
        let encoded = KaspaAddress::from_schnorr_key(Prefix::Mainnet, sample_key()).to_string();
        let mut chars: Vec<char> = encoded.chars().collect();
        let idx = chars.len() - 20;
        chars[idx] = if chars[idx] == 'q' { 'p' } else { 'q' };
        let corrupted: String = chars.into_iter().collect();

        assert_eq!(
            KaspaAddress::parse(&corrupted),
            Err(AddressError::BadChecksum)
        );
    }

    #[test]
    fn test_checksum_bound_to_prefix() {
        let encoded = KaspaAddress::from_schnorr_key(Prefix::Mainnet, sample_key()).to_string();
        let retargeted = encoded.replacen("kaspa:", "kaspatest:", 1);
        assert_eq!(
            KaspaAddress::parse(&retargeted),
            Err(AddressError::BadChecksum)
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert_eq!(
            KaspaAddress::parse("qqkqkzjvr7zwxxmjxjkmxxdwju9kjs6e9u82uh59z07vgaks6gg62v8707g73"),
            Err(AddressError::MissingPrefix)
        );
        assert!(matches!(
            KaspaAddress::parse("bitcoin:qqqqqqqqqqqqqq"),
            Err(AddressError::UnknownPrefix(_))
        ));
        assert_eq!(
            KaspaAddress::parse("kaspa:qqb1"),
            Err(AddressError::InvalidCharacter('b'))
        );
        assert_eq!(KaspaAddress::parse("kaspa:xyz"), Err(AddressError::TooShort));
        assert_eq!(
            KaspaAddress::parse("Kaspa:qqqq"),
            Err(AddressError::MixedCase)
        );
    }

    #[test]
    fn test_script_hash_address_has_no_schnorr_key() {
        let address = KaspaAddress {
            prefix: Prefix::Mainnet,
            version: VERSION_SCRIPT_HASH,
            payload: vec![9u8; 32],
        };
        let parsed = KaspaAddress::parse(&address.to_string()).unwrap();
        assert_eq!(parsed.version(), VERSION_SCRIPT_HASH);
        assert_eq!(
            parsed.schnorr_key(),
            Err(AddressError::UnsupportedVersion(VERSION_SCRIPT_HASH))
        );
    }

    #[test]
    fn test_convert_bits_rejects_nonzero_padding() {
        // 2 groups = 10 bits: one byte plus 2 padding bits that must be zero
        assert_eq!(convert_bits(&[0b11111, 0b11100], 5, 8, false), Some(vec![0xff]));
        assert_eq!(convert_bits(&[0b11111, 0b11101], 5, 8, false), None);
    }
}
