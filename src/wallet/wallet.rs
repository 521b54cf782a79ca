//! Local key wallets
//!
//! Holds secp256k1 keys on disk and signs ledger calls with them.

use crate::crypto::KeyPair;
use crate::token::{Address, CallError, LedgerCall, SignedCall};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Wallet not found: {0}")]
    NotFound(Address),
    #[error("Signing failed: {0}")]
    SigningError(#[from] CallError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: Address,
    label: Option<String>,
}

/// A key holder that signs ledger calls
pub struct Wallet {
    key_pair: KeyPair,
    pub label: Option<String>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: None,
        }
    }

    /// Create a wallet with a label
    pub fn with_label(label: &str) -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: Some(label.to_string()),
        }
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self {
            key_pair,
            label: None,
        })
    }

    pub fn address(&self) -> Address {
        self.key_pair.address()
    }

    /// Compressed public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Private key (hex). Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    /// Sign `call` for submission to `ledger` with the given nonce
    pub fn sign_call(
        &self,
        ledger: Address,
        nonce: u64,
        call: LedgerCall,
    ) -> Result<SignedCall, WalletError> {
        Ok(SignedCall::sign(&self.key_pair, ledger, nonce, call)?)
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_key_hex: self.private_key(),
            address: self.address(),
            label: self.label.clone(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::from_private_key(&data.private_key_hex)?;
        if wallet.address() != data.address {
            log::warn!(
                "Wallet file {:?} lists {} but its key controls {}",
                path,
                data.address,
                wallet.address()
            );
        }
        wallet.label = data.label;
        Ok(wallet)
    }

    /// Export wallet info (without private key)
    pub fn export_public_info(&self) -> WalletInfo {
        WalletInfo {
            address: self.address(),
            public_key: self.public_key(),
            label: self.label.clone(),
        }
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: Address,
    pub public_key: String,
    pub label: Option<String>,
}

/// Directory of wallet files, one `<address>.json` per key
pub struct WalletManager {
    wallets_dir: PathBuf,
}

impl WalletManager {
    pub fn new(wallets_dir: &Path) -> Result<Self, WalletError> {
        fs::create_dir_all(wallets_dir)?;
        Ok(Self {
            wallets_dir: wallets_dir.to_path_buf(),
        })
    }

    fn wallet_path(&self, address: &Address) -> PathBuf {
        self.wallets_dir.join(format!("{}.json", address))
    }

    /// Create and save a new wallet
    pub fn create_wallet(&self, label: Option<&str>) -> Result<Wallet, WalletError> {
        let wallet = match label {
            Some(l) => Wallet::with_label(l),
            None => Wallet::new(),
        };

        wallet.save(&self.wallet_path(&wallet.address()))?;
        log::info!("Created wallet {}", wallet.address());

        Ok(wallet)
    }

    /// Public info of every readable wallet, sorted by address
    pub fn list_wallets(&self) -> Result<Vec<WalletInfo>, WalletError> {
        let mut wallets = Vec::new();

        for entry in fs::read_dir(&self.wallets_dir)? {
            let path = entry?.path();

            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match Wallet::load(&path) {
                    Ok(wallet) => wallets.push(wallet.export_public_info()),
                    Err(e) => log::warn!("Skipping unreadable wallet {:?}: {}", path, e),
                }
            }
        }

        wallets.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(wallets)
    }

    /// Load a specific wallet by address
    pub fn load_wallet(&self, address: &Address) -> Result<Wallet, WalletError> {
        let path = self.wallet_path(address);
        if !path.exists() {
            return Err(WalletError::NotFound(*address));
        }
        Wallet::load(&path)
    }

    pub fn delete_wallet(&self, address: &Address) -> Result<(), WalletError> {
        let path = self.wallet_path(address);
        if !path.exists() {
            return Err(WalletError::NotFound(*address));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new();
        assert!(!wallet.address().is_zero());
        assert_eq!(wallet.public_key().len(), 66);
        assert_eq!(wallet.private_key().len(), 64);
    }

    #[test]
    fn test_wallet_import() {
        let wallet1 = Wallet::new();
        let private_key = wallet1.private_key();

        let wallet2 = Wallet::from_private_key(&private_key).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
    }

    #[test]
    fn test_wallet_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_wallet.json");

        let wallet1 = Wallet::with_label("Test Wallet");
        wallet1.save(&path).unwrap();

        let wallet2 = Wallet::load(&path).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
        assert_eq!(wallet1.label, wallet2.label);
    }

    #[test]
    fn test_signed_call_verifies_to_wallet() {
        let wallet = Wallet::new();
        let ledger = Address::derive(b"ledger");

        let signed = wallet
            .sign_call(ledger, 3, LedgerCall::Burn { amount: 5 })
            .unwrap();

        assert_eq!(signed.nonce, 3);
        assert_eq!(signed.verify(ledger).unwrap(), wallet.address());
    }

    #[test]
    fn test_manager_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = WalletManager::new(temp_dir.path()).unwrap();

        let alice = manager.create_wallet(Some("alice")).unwrap();
        let bob = manager.create_wallet(None).unwrap();

        let listed = manager.list_wallets().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|w| w.address == alice.address()
            && w.label.as_deref() == Some("alice")));

        let loaded = manager.load_wallet(&bob.address()).unwrap();
        assert_eq!(loaded.private_key(), bob.private_key());

        manager.delete_wallet(&bob.address()).unwrap();
        assert!(matches!(
            manager.load_wallet(&bob.address()),
            Err(WalletError::NotFound(_))
        ));
        assert_eq!(manager.list_wallets().unwrap().len(), 1);
    }
}
