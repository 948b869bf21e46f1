use std::sync::Arc;

use stakecert_core::error::StakeError;
use stakecert_core::request::{EventRecord, LedgerEvent};
use stakecert_core::types::{AccountId, Balance, PositionId, TxIndex};
use tracing::debug;

use crate::db::StateDb;

/// Locked-amount records, keyed by position.
///
/// The ledger never keys stake by owner: an account's total is always the
/// sum of the records of the positions it holds. It also owns the position
/// id counter, the transaction index clock, pending payouts and the event log.
#[derive(Clone)]
pub struct BalanceLedger {
    db: Arc<StateDb>,
}

impl BalanceLedger {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<StateDb> {
        &self.db
    }

    // ── Records ──────────────────────────────────────────────────────────────

    /// Create the record for a freshly minted position.
    pub fn lock(&self, id: PositionId, amount: Balance) -> Result<(), StakeError> {
        if amount == 0 {
            return Err(StakeError::InvalidAmount);
        }
        if self.db.get_locked(id)?.is_some() {
            return Err(StakeError::PositionExists(id));
        }
        self.db.put_locked(id, amount)?;
        debug!(position = %id, amount, "locked");
        Ok(())
    }

    /// Delete the record and return the amount owed to the beneficiary.
    pub fn release(&self, id: PositionId) -> Result<Balance, StakeError> {
        let amount = self
            .db
            .remove_locked(id)?
            .ok_or(StakeError::PositionNotFound(id))?;
        debug!(position = %id, amount, "released");
        Ok(amount)
    }

    /// Locked amount of `id`, zero if the position does not exist.
    pub fn amount_of(&self, id: PositionId) -> Result<Balance, StakeError> {
        Ok(self.db.get_locked(id)?.unwrap_or(0))
    }

    /// Ownership moved; the record stays attached to the position. Returns the
    /// amount the voting layer must move from `from` to `to`.
    pub fn move_on_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        id: PositionId,
    ) -> Result<Balance, StakeError> {
        let amount = self.db.get_locked(id)?.ok_or(StakeError::PositionNotFound(id))?;
        debug!(position = %id, from = %from, to = %to, amount, "stake follows position");
        Ok(amount)
    }

    pub fn records(&self) -> Result<Vec<(PositionId, Balance)>, StakeError> {
        self.db.iter_locked()
    }

    pub fn total_locked(&self) -> Result<Balance, StakeError> {
        self.records()?
            .into_iter()
            .try_fold(0u128, |acc, (_, amount)| acc.checked_add(amount))
            .ok_or(StakeError::ArithmeticOverflow)
    }

    // ── Counters ─────────────────────────────────────────────────────────────

    /// Hand out the next position id. Ids are never reused.
    pub fn next_position_id(&self) -> Result<PositionId, StakeError> {
        Ok(PositionId(self.db.next_position_counter()?))
    }

    pub fn current_index(&self) -> Result<TxIndex, StakeError> {
        self.db.tx_index()
    }

    pub fn advance_index(&self) -> Result<TxIndex, StakeError> {
        self.db.advance_tx_index()
    }

    // ── Pending payouts ──────────────────────────────────────────────────────

    /// Hold `amount` in custody on behalf of `beneficiary` after a failed push.
    pub fn park_payout(&self, beneficiary: &AccountId, amount: Balance) -> Result<Balance, StakeError> {
        let owed = self
            .db
            .get_payout(beneficiary)?
            .checked_add(amount)
            .ok_or(StakeError::ArithmeticOverflow)?;
        self.db.put_payout(beneficiary, owed)?;
        Ok(owed)
    }

    pub fn pending_payout(&self, beneficiary: &AccountId) -> Result<Balance, StakeError> {
        self.db.get_payout(beneficiary)
    }

    /// Remove and return the whole pending payout for `beneficiary`.
    pub fn take_payout(&self, beneficiary: &AccountId) -> Result<Balance, StakeError> {
        let owed = self.db.get_payout(beneficiary)?;
        if owed == 0 {
            return Err(StakeError::NoPendingPayout(beneficiary.clone()));
        }
        self.db.put_payout(beneficiary, 0)?;
        Ok(owed)
    }

    pub fn total_pending_payouts(&self) -> Result<Balance, StakeError> {
        self.db
            .iter_payouts()?
            .into_iter()
            .try_fold(0u128, |acc, (_, amount)| acc.checked_add(amount))
            .ok_or(StakeError::ArithmeticOverflow)
    }

    // ── Event log ────────────────────────────────────────────────────────────

    pub fn append_event(&self, index: TxIndex, event: LedgerEvent) -> Result<u64, StakeError> {
        let seq = self.db.next_event_seq()?;
        self.db.put_event(&EventRecord { seq, index, event })?;
        Ok(seq)
    }

    pub fn events_since(&self, seq: u64) -> Result<Vec<EventRecord>, StakeError> {
        self.db.events_from(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> BalanceLedger {
        BalanceLedger::new(Arc::new(StateDb::temporary().expect("temp db")))
    }

    #[test]
    fn lock_rejects_zero() {
        let l = ledger();
        assert!(matches!(l.lock(PositionId(1), 0), Err(StakeError::InvalidAmount)));
        assert_eq!(l.amount_of(PositionId(1)).unwrap(), 0);
    }

    #[test]
    fn lock_release_roundtrip() {
        let l = ledger();
        l.lock(PositionId(1), 100).unwrap();
        l.lock(PositionId(2), 50).unwrap();
        assert_eq!(l.total_locked().unwrap(), 150);
        assert_eq!(l.release(PositionId(1)).unwrap(), 100);
        assert_eq!(l.amount_of(PositionId(1)).unwrap(), 0);
        assert!(matches!(l.release(PositionId(1)), Err(StakeError::PositionNotFound(_))));
        assert_eq!(l.total_locked().unwrap(), 50);
    }

    #[test]
    fn double_lock_rejected() {
        let l = ledger();
        l.lock(PositionId(7), 1).unwrap();
        assert!(matches!(l.lock(PositionId(7), 5), Err(StakeError::PositionExists(_))));
        assert_eq!(l.amount_of(PositionId(7)).unwrap(), 1);
    }

    #[test]
    fn transfer_keeps_amount_on_position() {
        let l = ledger();
        let a = AccountId::derive(b"a");
        let b = AccountId::derive(b"b");
        l.lock(PositionId(3), 40).unwrap();
        assert_eq!(l.move_on_transfer(&a, &b, PositionId(3)).unwrap(), 40);
        assert_eq!(l.amount_of(PositionId(3)).unwrap(), 40);
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let l = ledger();
        assert_eq!(l.next_position_id().unwrap(), PositionId(1));
        assert_eq!(l.next_position_id().unwrap(), PositionId(2));
        assert_eq!(l.next_position_id().unwrap(), PositionId(3));
    }

    #[test]
    fn payouts_accumulate_and_drain() {
        let l = ledger();
        let b = AccountId::derive(b"b");
        l.park_payout(&b, 10).unwrap();
        l.park_payout(&b, 5).unwrap();
        assert_eq!(l.total_pending_payouts().unwrap(), 15);
        assert_eq!(l.take_payout(&b).unwrap(), 15);
        assert!(matches!(l.take_payout(&b), Err(StakeError::NoPendingPayout(_))));
    }

    #[test]
    fn events_keep_emission_order() {
        let l = ledger();
        let a = AccountId::derive(b"a");
        l.append_event(1, LedgerEvent::Burned { position: PositionId(2) }).unwrap();
        l.append_event(1, LedgerEvent::Burned { position: PositionId(1) }).unwrap();
        l.append_event(2, LedgerEvent::PayoutSettled { beneficiary: a, amount: 3 }).unwrap();
        let all = l.events_since(0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event, LedgerEvent::Burned { position: PositionId(2) });
        assert_eq!(all[1].event, LedgerEvent::Burned { position: PositionId(1) });
        assert_eq!(l.events_since(2).unwrap().len(), 1);
    }
}
