//! Receipts recorded for every sequenced call

use crate::token::{Address, LedgerCall, LedgerEvent, TokenError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the ledger did with a call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// State transition applied; carries the emitted event
    Committed { event: LedgerEvent },
    /// Rejected by the ledger; state untouched
    Reverted { error: TokenError },
}

/// A sequenced call and its outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Position in the global order
    pub seq: u64,
    pub caller: Address,
    /// Nonce consumed by the call (`None` for the deployment mint)
    pub nonce: Option<u64>,
    pub call: LedgerCall,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl Receipt {
    pub fn is_committed(&self) -> bool {
        matches!(self.outcome, Outcome::Committed { .. })
    }

    pub fn event(&self) -> Option<&LedgerEvent> {
        match &self.outcome {
            Outcome::Committed { event } => Some(event),
            Outcome::Reverted { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&TokenError> {
        match &self.outcome {
            Outcome::Committed { .. } => None,
            Outcome::Reverted { error } => Some(error),
        }
    }
}
