use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Balance, PositionId, TxIndex};

// ── Batch requests ────────────────────────────────────────────────────────────

/// One item of a mint batch: lock `stake_amount` and issue a position to `beneficiary`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub beneficiary: AccountId,
    pub stake_amount: Balance,
}

impl MintRequest {
    pub fn new(beneficiary: AccountId, stake_amount: Balance) -> Self {
        Self { beneficiary, stake_amount }
    }
}

/// One item of a burn batch: destroy `position_id` and pay its stake to `beneficiary`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnRequest {
    pub position_id: PositionId,
    pub beneficiary: AccountId,
}

impl BurnRequest {
    pub fn new(position_id: PositionId, beneficiary: AccountId) -> Self {
        Self { position_id, beneficiary }
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Ledger events, stored in emission order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Minted {
        position: PositionId,
        initiator: AccountId,
        beneficiary: AccountId,
        amount: Balance,
    },
    Burned {
        position: PositionId,
    },
    Transferred {
        position: PositionId,
        from: AccountId,
        to: AccountId,
    },
    DelegateChanged {
        delegator: AccountId,
        from: AccountId,
        to: AccountId,
    },
    /// Paying `beneficiary` for a burned `position` failed; the amount is
    /// held in custody as a pending payout.
    PayoutDeferred {
        position: PositionId,
        beneficiary: AccountId,
        amount: Balance,
    },
    PayoutSettled {
        beneficiary: AccountId,
        amount: Balance,
    },
}

/// An event together with its log sequence number and the index of the
/// call that emitted it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub index: TxIndex,
    pub event: LedgerEvent,
}
