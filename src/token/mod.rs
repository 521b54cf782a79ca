//! ERC-20 style fungible token ledger
//!
//! Provides the ledger state and its operations:
//! - Balances per address
//! - Allowances for delegated transfers
//! - Transfer, approve and transfer-from
//! - Owner-gated mint and self-burn
//!
//! # Example
//!
//! ```rust
//! use token_ledger::token::{Address, MintPolicy, TokenLedger, TokenMetadata};
//!
//! let owner = Address::derive(b"owner");
//! let recipient = Address::derive(b"recipient");
//!
//! let metadata = TokenMetadata::new("Testing Token".to_string(), "TT".to_string(), 6).unwrap();
//! let mut ledger = TokenLedger::new(metadata, owner, 1_000_000_000, MintPolicy::Owner);
//!
//! ledger.transfer(owner, recipient, 100_000_000).unwrap();
//! assert_eq!(ledger.balance_of(&recipient), 100_000_000);
//! ```

pub mod account;
pub mod call;
pub mod ledger;
pub mod units;

pub use account::{Address, AddressError};
pub use call::{signing_hash, CallError, LedgerCall, SignedCall};
pub use ledger::{Debit, LedgerEvent, MintPolicy, TokenError, TokenLedger, TokenMetadata};
pub use units::{format_units, parse_units, UnitsError};
