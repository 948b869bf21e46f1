use thiserror::Error;

use crate::types::{AccountId, PositionId, TxIndex};

/// Returned by an asset-transfer collaborator when a pull or push cannot be made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TransferFailed {
    pub reason: String,
}

impl TransferFailed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum StakeError {
    // ── Batch item errors ────────────────────────────────────────────────────
    #[error("stake amount must be greater than zero")]
    InvalidAmount,

    #[error("asset transfer failed: {0}")]
    TransferFailed(#[from] TransferFailed),

    #[error("{caller} is neither owner nor approved for position {position}")]
    NoPermission { position: PositionId, caller: AccountId },

    #[error("position not found: {0}")]
    PositionNotFound(PositionId),

    #[error("the custodian {0} cannot stake into or be paid out of its own custody")]
    CustodianNotAllowed(AccountId),

    #[error("batch too large: max {max} items, got {got}")]
    BatchTooLarge { max: usize, got: usize },

    // ── Ledger / registry ────────────────────────────────────────────────────
    #[error("position already exists: {0}")]
    PositionExists(PositionId),

    #[error("reentrant call into the staking ledger")]
    Reentrant,

    #[error("no pending payout for {0}")]
    NoPendingPayout(AccountId),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    // ── Checkpoints ──────────────────────────────────────────────────────────
    #[error("index {requested} is in the future (current index {current})")]
    FutureLookup { requested: TxIndex, current: TxIndex },

    #[error("checkpoint out of order: last index {last}, got {got}")]
    CheckpointOutOfOrder { last: TxIndex, got: TxIndex },

    // ── Serialization / storage / config ─────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}
