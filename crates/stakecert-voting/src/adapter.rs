use std::sync::Arc;

use stakecert_core::error::StakeError;
use stakecert_core::traits::CheckpointStore;
use stakecert_core::types::{AccountId, Balance, CheckpointKey, TxIndex};
use stakecert_state::BalanceLedger;
use tracing::debug;

/// Translates position lifecycle events into voting-weight checkpoints.
///
/// Weight is credited to the owner's delegatee (the owner itself until it
/// delegates). The adapter is called explicitly by the lifecycle manager
/// after each ownership or locked-amount change has been committed, always
/// with the exact locked amount of the position involved.
pub struct VotingPowerAdapter {
    ledger: BalanceLedger,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl VotingPowerAdapter {
    pub fn new(ledger: BalanceLedger, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self { ledger, checkpoints }
    }

    /// Current delegatee of `account`; accounts start self-delegated.
    pub fn delegate_of(&self, account: &AccountId) -> Result<AccountId, StakeError> {
        Ok(self
            .ledger
            .db()
            .get_delegate(account)?
            .unwrap_or_else(|| account.clone()))
    }

    // ── Lifecycle hooks ──────────────────────────────────────────────────────

    pub fn on_position_created(&self, owner: &AccountId, amount: Balance, index: TxIndex) -> Result<(), StakeError> {
        let delegatee = self.delegate_of(owner)?;
        self.move_weight(None, Some(&delegatee), amount, index)?;
        self.adjust(&CheckpointKey::Total, amount, true, index)
    }

    pub fn on_position_destroyed(&self, owner: &AccountId, amount: Balance, index: TxIndex) -> Result<(), StakeError> {
        let delegatee = self.delegate_of(owner)?;
        self.move_weight(Some(&delegatee), None, amount, index)?;
        self.adjust(&CheckpointKey::Total, amount, false, index)
    }

    /// `amount` is the locked amount of the transferred position, not the
    /// total held by `from`.
    pub fn on_position_transferred(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
        index: TxIndex,
    ) -> Result<(), StakeError> {
        let src = self.delegate_of(from)?;
        let dst = self.delegate_of(to)?;
        self.move_weight(Some(&src), Some(&dst), amount, index)
    }

    /// Point `account`'s weight at `delegatee`, carrying its current voting
    /// `units` along. Returns the previous delegatee.
    pub fn delegate(
        &self,
        account: &AccountId,
        delegatee: &AccountId,
        units: Balance,
        index: TxIndex,
    ) -> Result<AccountId, StakeError> {
        let previous = self.delegate_of(account)?;
        self.ledger.db().put_delegate(account, delegatee)?;
        self.move_weight(Some(&previous), Some(delegatee), units, index)?;
        Ok(previous)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn current_weight(&self, account: &AccountId) -> Result<Balance, StakeError> {
        self.checkpoints.latest(&CheckpointKey::Account(account.clone()))
    }

    pub fn weight_at(&self, account: &AccountId, index: TxIndex) -> Result<Balance, StakeError> {
        self.check_past(index)?;
        self.checkpoints.at(&CheckpointKey::Account(account.clone()), index)
    }

    pub fn total_weight(&self) -> Result<Balance, StakeError> {
        self.checkpoints.latest(&CheckpointKey::Total)
    }

    pub fn total_weight_at(&self, index: TxIndex) -> Result<Balance, StakeError> {
        self.check_past(index)?;
        self.checkpoints.at(&CheckpointKey::Total, index)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn check_past(&self, index: TxIndex) -> Result<(), StakeError> {
        let current = self.ledger.current_index()?;
        if index > current {
            return Err(StakeError::FutureLookup { requested: index, current });
        }
        Ok(())
    }

    fn move_weight(
        &self,
        src: Option<&AccountId>,
        dst: Option<&AccountId>,
        amount: Balance,
        index: TxIndex,
    ) -> Result<(), StakeError> {
        if amount == 0 || src == dst {
            return Ok(());
        }
        if let Some(s) = src {
            self.adjust(&CheckpointKey::Account(s.clone()), amount, false, index)?;
        }
        if let Some(d) = dst {
            self.adjust(&CheckpointKey::Account(d.clone()), amount, true, index)?;
        }
        Ok(())
    }

    fn adjust(&self, key: &CheckpointKey, amount: Balance, increase: bool, index: TxIndex) -> Result<(), StakeError> {
        let old = self.checkpoints.latest(key)?;
        let new = if increase {
            old.checked_add(amount).ok_or(StakeError::ArithmeticOverflow)?
        } else {
            old.checked_sub(amount).ok_or_else(|| {
                StakeError::InvariantViolation(format!(
                    "weight of {key} would drop below zero ({old} - {amount})"
                ))
            })?
        };
        self.checkpoints.push(key, new, index)?;
        debug!(series = %key, old, new, index, "weight checkpoint");
        Ok(())
    }
}
