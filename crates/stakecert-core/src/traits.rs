//! Narrow interfaces to the systems the staking ledger consumes but does not own.

use crate::error::{StakeError, TransferFailed};
use crate::types::{AccountId, Balance, CheckpointKey, PositionId, TxIndex};

/// The fungible staked asset, as seen by the ledger's custodian account.
pub trait AssetTransfer: Send + Sync {
    /// Move `amount` from `from` to `to` using `from`'s allowance to the custodian.
    fn pull(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), TransferFailed>;

    /// Move `amount` out of custody to `to`.
    fn push(&self, to: &AccountId, amount: Balance) -> Result<(), TransferFailed>;

    fn balance_of(&self, account: &AccountId) -> Result<Balance, StakeError>;
}

/// Ownership and approval registry for position certificates.
pub trait PositionRegistry: Send + Sync {
    /// Fails with `PositionExists` if `id` is already live.
    fn create(&self, owner: &AccountId, id: PositionId) -> Result<(), StakeError>;

    /// Removes ownership and any approval. Fails with `PositionNotFound`.
    fn destroy(&self, id: PositionId) -> Result<(), StakeError>;

    fn owner_of(&self, id: PositionId) -> Result<Option<AccountId>, StakeError>;

    /// False for positions that do not exist.
    fn is_owner_or_approved(&self, caller: &AccountId, id: PositionId) -> Result<bool, StakeError>;

    /// Change ownership from `from` to `to`. `caller` must be owner or approved,
    /// and `from` must be the current owner. Clears the single-position approval.
    fn transfer_from(
        &self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        id: PositionId,
    ) -> Result<(), StakeError>;

    /// Approve `spender` for one position. `caller` must be the owner or an operator.
    fn approve(&self, caller: &AccountId, spender: &AccountId, id: PositionId) -> Result<(), StakeError>;

    fn approved_of(&self, id: PositionId) -> Result<Option<AccountId>, StakeError>;

    fn set_approval_for_all(
        &self,
        owner: &AccountId,
        operator: &AccountId,
        approved: bool,
    ) -> Result<(), StakeError>;

    /// Live positions held by `owner`, in id order.
    fn positions_of(&self, owner: &AccountId) -> Result<Vec<PositionId>, StakeError>;
}

/// Append-only time series of values keyed by `TxIndex`.
pub trait CheckpointStore: Send + Sync {
    /// Record `value` for `key` at `index`. An index lower than the last one
    /// written for `key` fails with `CheckpointOutOfOrder`; the same index
    /// replaces the open entry.
    fn push(&self, key: &CheckpointKey, value: Balance, index: TxIndex) -> Result<(), StakeError>;

    /// Most recent value, zero if the series is empty.
    fn latest(&self, key: &CheckpointKey) -> Result<Balance, StakeError>;

    /// Value at or before `index`, zero if nothing was written by then.
    fn at(&self, key: &CheckpointKey, index: TxIndex) -> Result<Balance, StakeError>;
}
