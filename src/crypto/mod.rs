//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 and HASH160 hashing
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{hash160, sha256, sha256_hex};
pub use keys::{public_key_from_hex, sign_message, verify_signature, KeyError, KeyPair};
