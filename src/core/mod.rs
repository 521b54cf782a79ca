//! Core sequencing logic
//!
//! This module contains:
//! - The sequencer that orders and authenticates ledger calls
//! - Receipts recording the outcome of every sequenced call

pub mod receipt;
pub mod sequencer;

pub use receipt::{Outcome, Receipt};
pub use sequencer::{Sequencer, SequencerError, JOURNAL_LIMIT};
