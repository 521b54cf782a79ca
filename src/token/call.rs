//! Ledger calls and their signed envelopes
//!
//! A [`LedgerCall`] names one mutating operation and its arguments. The
//! caller is never part of the call itself: it is recovered from the
//! public key of a [`SignedCall`] once the signature checks out.

use crate::crypto::{public_key_from_hex, sha256, verify_signature, KeyError, KeyPair};
use crate::token::account::Address;
use crate::token::ledger::{LedgerEvent, TokenError, TokenLedger};
use crate::token::units::amount_string;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signed call errors
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Signature verification failed")]
    VerificationFailed,
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A mutating ledger operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerCall {
    Transfer {
        to: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    Approve {
        spender: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    IncreaseAllowance {
        spender: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    DecreaseAllowance {
        spender: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    TransferFrom {
        owner: Address,
        to: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    Mint {
        to: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    Burn {
        #[serde(with = "amount_string")]
        amount: u128,
    },
}

impl LedgerCall {
    /// Operation name as used in logs and receipts
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::Transfer { .. } => "transfer",
            LedgerCall::Approve { .. } => "approve",
            LedgerCall::IncreaseAllowance { .. } => "increase_allowance",
            LedgerCall::DecreaseAllowance { .. } => "decrease_allowance",
            LedgerCall::TransferFrom { .. } => "transfer_from",
            LedgerCall::Mint { .. } => "mint",
            LedgerCall::Burn { .. } => "burn",
        }
    }

    pub fn amount(&self) -> u128 {
        match self {
            LedgerCall::Transfer { amount, .. }
            | LedgerCall::Approve { amount, .. }
            | LedgerCall::IncreaseAllowance { amount, .. }
            | LedgerCall::DecreaseAllowance { amount, .. }
            | LedgerCall::TransferFrom { amount, .. }
            | LedgerCall::Mint { amount, .. }
            | LedgerCall::Burn { amount } => *amount,
        }
    }
}

impl TokenLedger {
    /// Apply a call on behalf of `caller`
    pub fn execute(&mut self, caller: Address, call: &LedgerCall) -> Result<LedgerEvent, TokenError> {
        match *call {
            LedgerCall::Transfer { to, amount } => self.transfer(caller, to, amount),
            LedgerCall::Approve { spender, amount } => self.approve(caller, spender, amount),
            LedgerCall::IncreaseAllowance { spender, amount } => {
                self.increase_allowance(caller, spender, amount)
            }
            LedgerCall::DecreaseAllowance { spender, amount } => {
                self.decrease_allowance(caller, spender, amount)
            }
            LedgerCall::TransferFrom { owner, to, amount } => {
                self.transfer_from(caller, owner, to, amount)
            }
            LedgerCall::Mint { to, amount } => self.mint(caller, to, amount),
            LedgerCall::Burn { amount } => self.burn(caller, amount),
        }
    }
}

/// Bytes covered by a signature
#[derive(Serialize)]
struct SigningPayload<'a> {
    ledger: Address,
    nonce: u64,
    call: &'a LedgerCall,
}

/// Digest a key signs to authorize `call` at `nonce` on `ledger`
pub fn signing_hash(ledger: Address, nonce: u64, call: &LedgerCall) -> Result<Vec<u8>, CallError> {
    let payload = serde_json::to_vec(&SigningPayload {
        ledger,
        nonce,
        call,
    })?;
    Ok(sha256(&payload))
}

/// A call together with the caller's authorization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    pub call: LedgerCall,
    pub nonce: u64,
    /// Compressed secp256k1 public key (hex)
    pub public_key: String,
    /// Compact ECDSA signature (hex)
    pub signature: String,
}

impl SignedCall {
    /// Sign `call` for `ledger` with `key_pair`
    pub fn sign(
        key_pair: &KeyPair,
        ledger: Address,
        nonce: u64,
        call: LedgerCall,
    ) -> Result<Self, CallError> {
        let hash = signing_hash(ledger, nonce, &call)?;
        let signature = key_pair.sign(&hash)?;

        Ok(Self {
            call,
            nonce,
            public_key: key_pair.public_key_hex(),
            signature: hex::encode(signature),
        })
    }

    /// Check the signature and return the authenticated caller
    pub fn verify(&self, ledger: Address) -> Result<Address, CallError> {
        let public_key =
            public_key_from_hex(&self.public_key).map_err(|_| CallError::InvalidPublicKey)?;
        let signature = hex::decode(&self.signature).map_err(|_| CallError::InvalidSignature)?;
        let hash = signing_hash(ledger, self.nonce, &self.call)?;

        let valid = verify_signature(&public_key, &hash, &signature).map_err(|e| match e {
            KeyError::InvalidSignature => CallError::InvalidSignature,
            other => CallError::Key(other),
        })?;

        if !valid {
            return Err(CallError::VerificationFailed);
        }

        Ok(Address::from_public_key(&public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::ledger::{MintPolicy, TokenMetadata};

    fn ledger_for(owner: Address) -> TokenLedger {
        let metadata =
            TokenMetadata::new("Testing Token".to_string(), "TT".to_string(), 6).unwrap();
        TokenLedger::new(metadata, owner, 1_000_000, MintPolicy::Owner)
    }

    #[test]
    fn test_call_json_shape() {
        let to = Address::derive(b"to");
        let call = LedgerCall::TransferFrom {
            owner: Address::derive(b"owner"),
            to,
            amount: 42,
        };

        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["op"], "transfer_from");
        assert_eq!(json["amount"], "42");
        assert_eq!(json["to"], to.to_string());

        let parsed: LedgerCall = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, call);
    }

    #[test]
    fn test_execute_dispatches() {
        let owner = Address::derive(b"owner");
        let spender = Address::derive(b"spender");
        let mut ledger = ledger_for(owner);

        ledger
            .execute(owner, &LedgerCall::Approve { spender, amount: 10 })
            .unwrap();
        ledger
            .execute(owner, &LedgerCall::IncreaseAllowance { spender, amount: 5 })
            .unwrap();
        ledger
            .execute(
                spender,
                &LedgerCall::TransferFrom {
                    owner,
                    to: spender,
                    amount: 15,
                },
            )
            .unwrap();
        ledger
            .execute(spender, &LedgerCall::Burn { amount: 5 })
            .unwrap();
        ledger
            .execute(owner, &LedgerCall::Mint { to: owner, amount: 5 })
            .unwrap();

        assert_eq!(ledger.balance_of(&spender), 10);
        assert_eq!(ledger.allowance(&owner, &spender), 0);
        assert_eq!(ledger.total_supply(), 1_000_000);
        assert_eq!(LedgerCall::Burn { amount: 5 }.name(), "burn");
        assert_eq!(LedgerCall::Burn { amount: 5 }.amount(), 5);
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let ledger = ledger_for(kp.address());
        let call = LedgerCall::Transfer {
            to: Address::derive(b"bob"),
            amount: 100,
        };

        let signed = SignedCall::sign(&kp, ledger.address(), 0, call).unwrap();
        assert_eq!(signed.verify(ledger.address()).unwrap(), kp.address());
    }

    #[test]
    fn test_tampered_call_rejected() {
        let kp = KeyPair::generate();
        let ledger = Address::derive(b"ledger");
        let mut signed = SignedCall::sign(
            &kp,
            ledger,
            3,
            LedgerCall::Burn { amount: 1 },
        )
        .unwrap();

        signed.call = LedgerCall::Burn { amount: 1_000 };
        assert!(matches!(
            signed.verify(ledger),
            Err(CallError::VerificationFailed)
        ));
    }

    #[test]
    fn test_signature_bound_to_ledger_and_nonce() {
        let kp = KeyPair::generate();
        let ledger = Address::derive(b"ledger");
        let signed = SignedCall::sign(&kp, ledger, 7, LedgerCall::Burn { amount: 1 }).unwrap();

        assert!(signed.verify(Address::derive(b"other ledger")).is_err());

        let mut bumped = signed.clone();
        bumped.nonce = 8;
        assert!(bumped.verify(ledger).is_err());
    }

    #[test]
    fn test_malformed_envelope() {
        let kp = KeyPair::generate();
        let ledger = Address::derive(b"ledger");
        let signed = SignedCall::sign(&kp, ledger, 0, LedgerCall::Burn { amount: 1 }).unwrap();

        let mut bad_key = signed.clone();
        bad_key.public_key = "zz".to_string();
        assert!(matches!(
            bad_key.verify(ledger),
            Err(CallError::InvalidPublicKey)
        ));

        let mut bad_sig = signed;
        bad_sig.signature = "00ff".to_string();
        assert!(matches!(
            bad_sig.verify(ledger),
            Err(CallError::InvalidSignature)
        ));
    }
}
