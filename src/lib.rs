//! Token Ledger: a fungible-token ledger in Rust
//!
//! This crate provides:
//! - A token ledger with balances, allowances, mint and burn
//! - Transfer/Approval events for every state change
//! - Checked arithmetic and all-or-nothing state transitions
//! - secp256k1 wallets that sign ledger calls
//! - A sequencer enforcing per-account nonces and a global call order
//! - JSON persistence with backups
//! - A REST + WebSocket API and a CLI
//!
//! # Example
//!
//! ```rust
//! use token_ledger::config::LedgerConfig;
//! use token_ledger::core::Sequencer;
//! use token_ledger::token::LedgerCall;
//! use token_ledger::wallet::Wallet;
//!
//! // Deploy a ledger with the default "Testing Token"
//! let owner = Wallet::new();
//! let mut sequencer = Sequencer::deploy(&LedgerConfig::default(), owner.address()).unwrap();
//!
//! // Sign and submit a transfer
//! let bob = Wallet::new();
//! let call = LedgerCall::Transfer { to: bob.address(), amount: 1_000_000 };
//! let signed = owner
//!     .sign_call(sequencer.ledger().address(), sequencer.nonce(&owner.address()), call)
//!     .unwrap();
//! let receipt = sequencer.submit(&signed).unwrap();
//!
//! assert!(receipt.is_committed());
//! assert_eq!(sequencer.ledger().balance_of(&bob.address()), 1_000_000);
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod storage;
pub mod token;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use config::LedgerConfig;
pub use core::{Outcome, Receipt, Sequencer};
pub use crypto::KeyPair;
pub use storage::Storage;
pub use token::{
    Address, LedgerCall, LedgerEvent, MintPolicy, SignedCall, TokenError, TokenLedger,
    TokenMetadata,
};
pub use wallet::{Wallet, WalletManager};
