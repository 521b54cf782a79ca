//! Wallet module for key management and call signing

pub mod wallet;

pub use wallet::{Wallet, WalletError, WalletInfo, WalletManager};
