//! ERC-20 style token ledger
//!
//! Holds the metadata, total supply, balances and allowances of a single
//! fungible token. Every mutating operation takes the caller explicitly,
//! validates all preconditions before touching state and returns the
//! event it produced.

use crate::token::account::Address;
use crate::token::units::amount_string;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Which debit ran out of funds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Debit {
    Transfer,
    Burn,
}

impl fmt::Display for Debit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Debit::Transfer => f.write_str("transfer"),
            Debit::Burn => f.write_str("burn"),
        }
    }
}

/// Token-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenError {
    #[error("ERC20: {debit} amount exceeds balance (have {have}, need {need})")]
    InsufficientBalance {
        debit: Debit,
        #[serde(with = "amount_string")]
        have: u128,
        #[serde(with = "amount_string")]
        need: u128,
    },
    #[error("ERC20: transfer amount exceeds allowance (have {have}, need {need})")]
    InsufficientAllowance {
        #[serde(with = "amount_string")]
        have: u128,
        #[serde(with = "amount_string")]
        need: u128,
    },
    #[error("ERC20: decreased allowance below zero (have {have}, decrease {need})")]
    AllowanceUnderflow {
        #[serde(with = "amount_string")]
        have: u128,
        #[serde(with = "amount_string")]
        need: u128,
    },
    #[error("ERC20: transfer to the zero address")]
    TransferToZeroAddress,
    #[error("ERC20: mint to the zero address")]
    MintToZeroAddress,
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Unauthorized: {caller} may not mint")]
    Unauthorized { caller: Address },
    #[error("Invalid symbol: must be 1-10 characters")]
    InvalidSymbol,
    #[error("Invalid name: must be 1-50 characters")]
    InvalidName,
    #[error("Invalid decimals: must be 0-18")]
    InvalidDecimals,
    #[error("Zero balance stored for {account}")]
    ZeroBalanceStored { account: Address },
    #[error("Supply mismatch: total supply {total_supply}, sum of balances {sum}")]
    SupplyMismatch {
        #[serde(with = "amount_string")]
        total_supply: u128,
        #[serde(with = "amount_string")]
        sum: u128,
    },
}

impl TokenError {
    /// Short machine-readable name of the error
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::InsufficientBalance { .. } => "insufficient_balance",
            TokenError::InsufficientAllowance { .. } => "insufficient_allowance",
            TokenError::AllowanceUnderflow { .. } => "allowance_underflow",
            TokenError::TransferToZeroAddress => "transfer_to_zero_address",
            TokenError::MintToZeroAddress => "mint_to_zero_address",
            TokenError::Overflow => "overflow",
            TokenError::Unauthorized { .. } => "unauthorized",
            TokenError::InvalidSymbol => "invalid_symbol",
            TokenError::InvalidName => "invalid_name",
            TokenError::InvalidDecimals => "invalid_decimals",
            TokenError::ZeroBalanceStored { .. } => "zero_balance_stored",
            TokenError::SupplyMismatch { .. } => "supply_mismatch",
        }
    }
}

/// Token metadata (immutable after creation)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Token name (e.g., "Testing Token")
    pub name: String,
    /// Token symbol (e.g., "TT")
    pub symbol: String,
    /// Decimal places of the smallest unit
    pub decimals: u8,
}

impl TokenMetadata {
    /// Create new token metadata with validation
    pub fn new(name: String, symbol: String, decimals: u8) -> Result<Self, TokenError> {
        if name.is_empty() || name.chars().count() > 50 {
            return Err(TokenError::InvalidName);
        }

        if symbol.is_empty() || symbol.chars().count() > 10 {
            return Err(TokenError::InvalidSymbol);
        }

        if decimals > 18 {
            return Err(TokenError::InvalidDecimals);
        }

        Ok(Self {
            name,
            symbol,
            decimals,
        })
    }
}

/// Who may call `mint`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintPolicy {
    /// Only the deployer
    #[default]
    Owner,
    /// Any account
    Open,
}

/// Notification produced by a successful mutating operation
///
/// Mints are transfers from [`Address::ZERO`], burns are transfers to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
}

/// A fungible token ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Deterministic ledger identifier
    address: Address,
    metadata: TokenMetadata,
    /// Deployer; receives the initial supply
    owner: Address,
    mint_policy: MintPolicy,
    deployed_at: DateTime<Utc>,
    total_supply: u128,
    /// Balances: address -> amount (no zero entries)
    balances: HashMap<Address, u128>,
    /// Allowances: owner -> (spender -> amount) (no zero entries)
    allowances: HashMap<Address, HashMap<Address, u128>>,
}

impl TokenLedger {
    /// Deploy a ledger with the whole initial supply credited to `owner`
    pub fn new(
        metadata: TokenMetadata,
        owner: Address,
        initial_supply: u128,
        mint_policy: MintPolicy,
    ) -> Self {
        let seed = format!("{}:{}:{}", owner, metadata.name, metadata.symbol);
        let address = Address::derive(seed.as_bytes());

        let mut balances = HashMap::new();
        if initial_supply > 0 {
            balances.insert(owner, initial_supply);
        }

        log::info!(
            "Ledger {} deployed: {} ({}), supply {}, owner {}",
            address,
            metadata.name,
            metadata.symbol,
            initial_supply,
            owner
        );

        Self {
            address,
            metadata,
            owner,
            mint_policy,
            deployed_at: Utc::now(),
            total_supply: initial_supply,
            balances,
            allowances: HashMap::new(),
        }
    }

    // =========================================================================
    // View Functions
    // =========================================================================

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn mint_policy(&self) -> MintPolicy {
        self.mint_policy
    }

    pub fn deployed_at(&self) -> DateTime<Utc> {
        self.deployed_at
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balance of an address (0 if never credited)
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining amount `spender` may move out of `owner`'s balance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// All holders with non-zero balances, largest first
    pub fn holders(&self) -> Vec<(Address, u128)> {
        let mut holders: Vec<(Address, u128)> =
            self.balances.iter().map(|(a, b)| (*a, *b)).collect();
        holders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        holders
    }

    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Check that the balances add up to the total supply and no zero entries are stored
    pub fn verify_supply(&self) -> Result<(), TokenError> {
        let mut sum: u128 = 0;
        for (account, balance) in &self.balances {
            if *balance == 0 {
                return Err(TokenError::ZeroBalanceStored { account: *account });
            }
            sum = sum.checked_add(*balance).ok_or(TokenError::Overflow)?;
        }

        if sum != self.total_supply {
            return Err(TokenError::SupplyMismatch {
                total_supply: self.total_supply,
                sum,
            });
        }

        let zero_allowance = self
            .allowances
            .values()
            .any(|spenders| spenders.is_empty() || spenders.values().any(|a| *a == 0));
        if zero_allowance {
            log::warn!("Ledger {} stores empty allowance entries", self.address);
        }

        Ok(())
    }

    // =========================================================================
    // Mutating Functions
    // =========================================================================

    /// Move `amount` from the caller to `to`
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: u128,
    ) -> Result<LedgerEvent, TokenError> {
        self.move_balance(caller, to, amount)?;
        log::debug!("transfer {} -> {}: {}", caller, to, amount);

        Ok(LedgerEvent::Transfer {
            from: caller,
            to,
            amount,
        })
    }

    /// Set the caller's allowance for `spender`, replacing any previous value
    pub fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        amount: u128,
    ) -> Result<LedgerEvent, TokenError> {
        self.set_allowance(caller, spender, amount);
        log::debug!("approve {} -> {}: {}", caller, spender, amount);

        Ok(LedgerEvent::Approval {
            owner: caller,
            spender,
            amount,
        })
    }

    /// Raise the caller's allowance for `spender` by `added`
    pub fn increase_allowance(
        &mut self,
        caller: Address,
        spender: Address,
        added: u128,
    ) -> Result<LedgerEvent, TokenError> {
        let amount = self
            .allowance(&caller, &spender)
            .checked_add(added)
            .ok_or(TokenError::Overflow)?;

        self.approve(caller, spender, amount)
    }

    /// Lower the caller's allowance for `spender` by `subtracted`
    pub fn decrease_allowance(
        &mut self,
        caller: Address,
        spender: Address,
        subtracted: u128,
    ) -> Result<LedgerEvent, TokenError> {
        let current = self.allowance(&caller, &spender);
        let amount = current
            .checked_sub(subtracted)
            .ok_or(TokenError::AllowanceUnderflow {
                have: current,
                need: subtracted,
            })?;

        self.approve(caller, spender, amount)
    }

    /// Move `amount` from `owner` to `to` on the strength of the caller's allowance
    pub fn transfer_from(
        &mut self,
        caller: Address,
        owner: Address,
        to: Address,
        amount: u128,
    ) -> Result<LedgerEvent, TokenError> {
        let current_allowance = self.allowance(&owner, &caller);
        if current_allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                have: current_allowance,
                need: amount,
            });
        }

        // allowance is consumed only after the balances moved
        self.move_balance(owner, to, amount)?;
        self.set_allowance(owner, caller, current_allowance - amount);
        log::debug!(
            "transfer_from {} -> {} by {}: {}",
            owner,
            to,
            caller,
            amount
        );

        Ok(LedgerEvent::Transfer {
            from: owner,
            to,
            amount,
        })
    }

    /// Create `amount` new tokens credited to `to`
    pub fn mint(
        &mut self,
        caller: Address,
        to: Address,
        amount: u128,
    ) -> Result<LedgerEvent, TokenError> {
        if self.mint_policy == MintPolicy::Owner && caller != self.owner {
            return Err(TokenError::Unauthorized { caller });
        }
        if to.is_zero() {
            return Err(TokenError::MintToZeroAddress);
        }

        let new_total = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        let new_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        self.total_supply = new_total;
        self.set_balance(to, new_balance);
        log::info!("mint {} to {} by {}", amount, to, caller);

        Ok(LedgerEvent::Transfer {
            from: Address::ZERO,
            to,
            amount,
        })
    }

    /// Destroy `amount` of the caller's own tokens
    pub fn burn(&mut self, caller: Address, amount: u128) -> Result<LedgerEvent, TokenError> {
        let balance = self.balance_of(&caller);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                debit: Debit::Burn,
                have: balance,
                need: amount,
            });
        }

        self.set_balance(caller, balance - amount);
        self.total_supply -= amount;
        log::info!("burn {} by {}", amount, caller);

        Ok(LedgerEvent::Transfer {
            from: caller,
            to: Address::ZERO,
            amount,
        })
    }

    // ---- internals ----

    fn move_balance(&mut self, from: Address, to: Address, amount: u128) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::TransferToZeroAddress);
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                debit: Debit::Transfer,
                have: from_balance,
                need: amount,
            });
        }

        if from == to {
            return Ok(());
        }

        let new_to = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        self.set_balance(from, from_balance - amount);
        self.set_balance(to, new_to);
        Ok(())
    }

    fn set_balance(&mut self, account: Address, amount: u128) {
        if amount == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: u128) {
        if amount == 0 {
            if let Some(spenders) = self.allowances.get_mut(&owner) {
                spenders.remove(&spender);
                if spenders.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
        } else {
            self.allowances
                .entry(owner)
                .or_default()
                .insert(spender, amount);
        }
    }
}
