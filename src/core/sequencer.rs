//! Call sequencer
//!
//! Stands in for the network layer in front of the ledger: it authenticates
//! signed calls, enforces per-account nonces and applies calls one at a
//! time in a single global order, recording a receipt for each.

use crate::config::LedgerConfig;
use crate::core::receipt::{Outcome, Receipt};
use crate::token::{
    Address, CallError, LedgerCall, LedgerEvent, SignedCall, TokenError, TokenLedger,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Number of receipts kept in the journal
pub const JOURNAL_LIMIT: usize = 100;

/// Sequencer errors (the call never reached the ledger)
#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("Invalid signed call: {0}")]
    Call(#[from] CallError),
    #[error("Nonce mismatch for {account}: expected {expected}, got {got}")]
    NonceMismatch {
        account: Address,
        expected: u64,
        got: u64,
    },
    #[error("Deployment failed: {0}")]
    Deploy(#[from] TokenError),
}

/// Ordered front end of a [`TokenLedger`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sequencer {
    ledger: TokenLedger,
    /// Next expected nonce per account (absent = 0)
    nonces: HashMap<Address, u64>,
    /// Sequence number of the next receipt
    next_seq: u64,
    /// Most recent receipts, oldest first
    journal: VecDeque<Receipt>,
}

impl Sequencer {
    /// Deploy a new ledger owned by `deployer`
    pub fn deploy(config: &LedgerConfig, deployer: Address) -> Result<Self, SequencerError> {
        let metadata = config.metadata()?;
        let ledger = TokenLedger::new(
            metadata,
            deployer,
            config.initial_supply,
            config.mint_policy,
        );

        let mut sequencer = Self {
            ledger,
            nonces: HashMap::new(),
            next_seq: 0,
            journal: VecDeque::new(),
        };

        if config.initial_supply > 0 {
            let call = LedgerCall::Mint {
                to: deployer,
                amount: config.initial_supply,
            };
            let event = LedgerEvent::Transfer {
                from: Address::ZERO,
                to: deployer,
                amount: config.initial_supply,
            };
            sequencer.record(deployer, None, call, Outcome::Committed { event });
        }

        Ok(sequencer)
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Next nonce `account` must sign with
    pub fn nonce(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    /// Number of receipts ever recorded
    pub fn height(&self) -> u64 {
        self.next_seq
    }

    /// Authenticate and apply a signed call
    ///
    /// Errors mean the call was not sequenced at all. A call the ledger
    /// rejects is still sequenced: it consumes the nonce and comes back as a
    /// receipt with [`Outcome::Reverted`].
    pub fn submit(&mut self, signed: &SignedCall) -> Result<Receipt, SequencerError> {
        let caller = signed.verify(self.ledger.address())?;

        let expected = self.nonce(&caller);
        if signed.nonce != expected {
            log::warn!(
                "Rejected {} from {}: nonce {} (expected {})",
                signed.call.name(),
                caller,
                signed.nonce,
                expected
            );
            return Err(SequencerError::NonceMismatch {
                account: caller,
                expected,
                got: signed.nonce,
            });
        }
        self.nonces.insert(caller, expected + 1);

        let outcome = match self.ledger.execute(caller, &signed.call) {
            Ok(event) => Outcome::Committed { event },
            Err(error) => {
                log::info!(
                    "{} from {} reverted: {}",
                    signed.call.name(),
                    caller,
                    error
                );
                Outcome::Reverted { error }
            }
        };

        Ok(self.record(caller, Some(signed.nonce), signed.call.clone(), outcome))
    }

    /// Most recent receipts, oldest first
    pub fn receipts(&self, limit: usize) -> Vec<&Receipt> {
        let skip = self.journal.len().saturating_sub(limit);
        self.journal.iter().skip(skip).collect()
    }

    /// Consistency check used after loading persisted state
    pub fn verify(&self) -> Result<(), TokenError> {
        self.ledger.verify_supply()
    }

    fn record(
        &mut self,
        caller: Address,
        nonce: Option<u64>,
        call: LedgerCall,
        outcome: Outcome,
    ) -> Receipt {
        let receipt = Receipt {
            seq: self.next_seq,
            caller,
            nonce,
            call,
            outcome,
            timestamp: Utc::now(),
        };
        self.next_seq += 1;

        self.journal.push_back(receipt.clone());
        if self.journal.len() > JOURNAL_LIMIT {
            self.journal.pop_front();
        }

        log::debug!(
            "Sequenced #{} {} from {} (committed: {})",
            receipt.seq,
            receipt.call.name(),
            caller,
            receipt.is_committed()
        );

        receipt
    }
}
