//! Account identities
//!
//! An [`Address`] is an opaque 20-byte identifier. The ledger only ever uses
//! it as a map key; it is rendered as `0x` followed by 40 hex digits.

use crate::crypto::hash160;
use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address length: expected 40 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("Invalid address: {0}")]
    InvalidHex(String),
}

/// A fixed-width account identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address: source of minted tokens and sink of burned ones in events
    pub const ZERO: Address = Address([0u8; 20]);

    /// Derive the address owned by a secp256k1 public key (HASH160 of the compressed key)
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(hash160(&public_key.serialize()))
    }

    /// Derive a deterministic address from arbitrary bytes
    pub fn derive(seed: &[u8]) -> Self {
        Self(hash160(seed))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Hex string with `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse an address, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != 40 {
            return Err(AddressError::InvalidLength(digits.len()));
        }

        let bytes = hex::decode(digits).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Serialized as a hex string so addresses work as JSON object keys.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use std::collections::HashMap;

    #[test]
    fn test_hex_round_trip() {
        let addr = Address::derive(b"alice");
        let hex = addr.to_string();

        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 42);
        assert_eq!(hex.parse::<Address>().unwrap(), addr);
        assert_eq!(Address::from_hex(&hex[2..]).unwrap(), addr);
    }

    #[test]
    fn test_invalid_addresses() {
        assert_eq!(
            Address::from_hex("0x1234"),
            Err(AddressError::InvalidLength(4))
        );
        assert!(matches!(
            Address::from_hex(&"zz".repeat(20)),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert_eq!(
            Address::ZERO.to_string(),
            "0x0000000000000000000000000000000000000000"
        );
        assert!(!Address::derive(b"bob").is_zero());
    }

    #[test]
    fn test_address_from_key_pair() {
        let kp = KeyPair::generate();
        assert_eq!(Address::from_public_key(&kp.public_key), kp.address());
    }

    #[test]
    fn test_address_as_json_map_key() {
        let mut map = HashMap::new();
        map.insert(Address::derive(b"carol"), 42u128);

        let json = serde_json::to_string(&map).unwrap();
        let back: HashMap<Address, u128> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
