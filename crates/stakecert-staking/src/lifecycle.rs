use std::sync::Arc;

use stakecert_core::config::LedgerConfig;
use stakecert_core::error::StakeError;
use stakecert_core::request::{BurnRequest, EventRecord, LedgerEvent, MintRequest};
use stakecert_core::traits::{AssetTransfer, CheckpointStore, PositionRegistry};
use stakecert_core::types::{AccountId, Balance, PositionId, PositionOrAccount, TxIndex};
use stakecert_state::{AssetBook, BalanceLedger, SledCheckpoints, SledRegistry, StateDb};
use stakecert_voting::VotingPowerAdapter;
use tracing::{info, warn};

use crate::batch;
use crate::guard::ReentrancyGuard;
use crate::query::PositionQuery;

// ── StakingEngine ─────────────────────────────────────────────────────────────

/// The position lifecycle manager.
///
/// Every state-changing entry point holds the reentrancy guard, advances the
/// transaction index once, and is all-or-nothing: a batch is checked in full
/// before its first external call, and state is written only once nothing
/// can reject it. The one exception is a failed payout during burn, where
/// the position stays destroyed and the amount is parked for the
/// beneficiary (see `settle_payout`).
pub struct StakingEngine {
    ledger: BalanceLedger,
    registry: Arc<dyn PositionRegistry>,
    asset: Arc<dyn AssetTransfer>,
    voting: VotingPowerAdapter,
    custodian: AccountId,
    max_batch_items: usize,
    guard: ReentrancyGuard,
}

impl StakingEngine {
    pub fn new(
        db: Arc<StateDb>,
        asset: Arc<dyn AssetTransfer>,
        registry: Arc<dyn PositionRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: &LedgerConfig,
    ) -> Result<Self, StakeError> {
        let ledger = BalanceLedger::new(db);
        Ok(Self {
            voting: VotingPowerAdapter::new(ledger.clone(), checkpoints),
            ledger,
            registry,
            asset,
            custodian: config.custodian_id()?,
            max_batch_items: config.max_batch_items,
            guard: ReentrancyGuard::new(),
        })
    }

    /// Wire the engine to the sled-backed registry and checkpoint store that
    /// share `db`, with an externally supplied asset.
    pub fn with_sled_collaborators(
        db: Arc<StateDb>,
        asset: Arc<dyn AssetTransfer>,
        config: &LedgerConfig,
    ) -> Result<Self, StakeError> {
        let registry = Arc::new(SledRegistry::new(Arc::clone(&db)));
        let checkpoints = Arc::new(SledCheckpoints::new(Arc::clone(&db)));
        Self::new(db, asset, registry, checkpoints, config)
    }

    /// Open the database named by `config` (temporary if it names none) and
    /// run every collaborator on it, including an `AssetBook` for the asset.
    pub fn open_standalone(config: &LedgerConfig) -> Result<(Self, Arc<AssetBook>), StakeError> {
        let db = Arc::new(match &config.data_dir {
            Some(dir) => StateDb::open(dir)?,
            None => StateDb::temporary()?,
        });
        let book = Arc::new(AssetBook::new(Arc::clone(&db), config.custodian_id()?));
        let engine = Self::with_sled_collaborators(db, book.clone(), config)?;
        info!(custodian = %engine.custodian, "staking ledger opened");
        Ok((engine, book))
    }

    // ── Mint ──────────────────────────────────────────────────────────────────

    /// Lock stake for every item and issue one position per item, in order.
    ///
    /// The whole batch is taken from the caller in a single pull of the batch
    /// total, so a refused transfer leaves balances and allowances untouched.
    pub fn mint(&self, caller: &AccountId, items: &[MintRequest]) -> Result<Vec<PositionId>, StakeError> {
        let _entered = self.guard.enter()?;
        if items.is_empty() {
            return Ok(Vec::new());
        }
        if *caller == self.custodian {
            warn!(caller = %caller, "mint batch rejected: custodian cannot stake into its own custody");
            return Err(StakeError::CustodianNotAllowed(caller.clone()));
        }
        batch::check_size(items.len(), self.max_batch_items)?;
        let total = batch::validate_mints(items)?;

        // ── Pull into custody ─────────────────────────────────────────────────
        if let Err(e) = self.asset.pull(caller, &self.custodian, total) {
            warn!(caller = %caller, total, error = %e, "mint batch rejected: pull failed");
            return Err(e.into());
        }

        // ── Commit ────────────────────────────────────────────────────────────
        let index = self.ledger.advance_index()?;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = self.ledger.next_position_id()?;
            self.ledger.lock(id, item.stake_amount)?;
            self.registry.create(&item.beneficiary, id)?;
            self.voting.on_position_created(&item.beneficiary, item.stake_amount, index)?;
            self.ledger.append_event(
                index,
                LedgerEvent::Minted {
                    position: id,
                    initiator: caller.clone(),
                    beneficiary: item.beneficiary.clone(),
                    amount: item.stake_amount,
                },
            )?;
            info!(
                position = %id,
                beneficiary = %item.beneficiary,
                amount = item.stake_amount,
                index,
                "position minted"
            );
            ids.push(id);
        }
        info!(caller = %caller, count = ids.len(), total, index, "mint batch applied");
        Ok(ids)
    }

    // ── Burn ──────────────────────────────────────────────────────────────────

    /// Destroy every listed position and pay its stake to the item's beneficiary.
    ///
    /// Per item, the position is destroyed, its record released and its weight
    /// removed before the single payout call. If that payout fails the item
    /// stays burned, its amount is parked as a pending payout, and the batch
    /// stops with `TransferFailed`: earlier items stay completed, later items
    /// are not touched.
    pub fn burn(&self, caller: &AccountId, items: &[BurnRequest]) -> Result<(), StakeError> {
        let _entered = self.guard.enter()?;
        if items.is_empty() {
            return Ok(());
        }
        batch::check_size(items.len(), self.max_batch_items)?;
        let steps = batch::plan_burns(caller, &self.custodian, items, self.registry.as_ref(), &self.ledger)?;

        let index = self.ledger.advance_index()?;
        for step in steps {
            self.registry.destroy(step.position)?;
            let released = self.ledger.release(step.position)?;
            if released != step.amount {
                return Err(StakeError::InvariantViolation(format!(
                    "position {} released {released}, planned {}",
                    step.position, step.amount
                )));
            }
            self.voting.on_position_destroyed(&step.owner, released, index)?;
            self.ledger.append_event(index, LedgerEvent::Burned { position: step.position })?;

            if let Err(e) = self.asset.push(&step.beneficiary, released) {
                self.ledger.park_payout(&step.beneficiary, released)?;
                self.ledger.append_event(
                    index,
                    LedgerEvent::PayoutDeferred {
                        position: step.position,
                        beneficiary: step.beneficiary.clone(),
                        amount: released,
                    },
                )?;
                warn!(
                    position = %step.position,
                    beneficiary = %step.beneficiary,
                    amount = released,
                    error = %e,
                    "payout failed; position stays burned, amount parked"
                );
                return Err(e.into());
            }
            info!(
                position = %step.position,
                beneficiary = %step.beneficiary,
                amount = released,
                index,
                "position burned"
            );
        }
        Ok(())
    }

    // ── Transfer / approvals ──────────────────────────────────────────────────

    /// Move `position` from `from` to `to`; its locked amount and weight follow it.
    pub fn transfer(
        &self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        position: PositionId,
    ) -> Result<(), StakeError> {
        let _entered = self.guard.enter()?;
        if !self.registry.is_owner_or_approved(caller, position)? {
            return Err(StakeError::NoPermission { position, caller: caller.clone() });
        }
        let amount = self.ledger.move_on_transfer(from, to, position)?;
        self.registry.transfer_from(caller, from, to, position)?;

        let index = self.ledger.advance_index()?;
        self.voting.on_position_transferred(from, to, amount, index)?;
        self.ledger.append_event(
            index,
            LedgerEvent::Transferred { position, from: from.clone(), to: to.clone() },
        )?;
        info!(position = %position, from = %from, to = %to, amount, index, "position transferred");
        Ok(())
    }

    pub fn approve(&self, caller: &AccountId, spender: &AccountId, position: PositionId) -> Result<(), StakeError> {
        let _entered = self.guard.enter()?;
        self.registry.approve(caller, spender, position)
    }

    pub fn set_approval_for_all(
        &self,
        owner: &AccountId,
        operator: &AccountId,
        approved: bool,
    ) -> Result<(), StakeError> {
        let _entered = self.guard.enter()?;
        self.registry.set_approval_for_all(owner, operator, approved)
    }

    // ── Delegation ────────────────────────────────────────────────────────────

    /// Send `account`'s voting weight to `delegatee`.
    pub fn delegate(&self, account: &AccountId, delegatee: &AccountId) -> Result<(), StakeError> {
        let _entered = self.guard.enter()?;
        let current = self.voting.delegate_of(account)?;
        if current == *delegatee {
            return Ok(());
        }
        let units = self.voting_units(account)?;
        let index = self.ledger.advance_index()?;
        let previous = self.voting.delegate(account, delegatee, units, index)?;
        self.ledger.append_event(
            index,
            LedgerEvent::DelegateChanged {
                delegator: account.clone(),
                from: previous,
                to: delegatee.clone(),
            },
        )?;
        info!(delegator = %account, delegatee = %delegatee, units, index, "delegate changed");
        Ok(())
    }

    // ── Pending payouts ───────────────────────────────────────────────────────

    /// Retry paying everything parked for `beneficiary`. Returns the amount paid.
    pub fn settle_payout(&self, beneficiary: &AccountId) -> Result<Balance, StakeError> {
        let _entered = self.guard.enter()?;
        let owed = self.ledger.take_payout(beneficiary)?;
        if let Err(e) = self.asset.push(beneficiary, owed) {
            self.ledger.park_payout(beneficiary, owed)?;
            warn!(beneficiary = %beneficiary, amount = owed, error = %e, "payout retry failed");
            return Err(e.into());
        }
        let index = self.ledger.advance_index()?;
        self.ledger.append_event(
            index,
            LedgerEvent::PayoutSettled { beneficiary: beneficiary.clone(), amount: owed },
        )?;
        info!(beneficiary = %beneficiary, amount = owed, index, "pending payout settled");
        Ok(owed)
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Locked amount of one live position, or the total over an account's positions.
    pub fn staked_amount_of(&self, target: impl Into<PositionOrAccount>) -> Result<Balance, StakeError> {
        match target.into() {
            PositionOrAccount::Position(id) => self
                .ledger
                .db()
                .get_locked(id)?
                .ok_or(StakeError::PositionNotFound(id)),
            PositionOrAccount::Account(account) => self.voting_units(&account),
        }
    }

    /// Sum of the locked amounts of the positions `account` currently owns.
    pub fn voting_units(&self, account: &AccountId) -> Result<Balance, StakeError> {
        self.registry
            .positions_of(account)?
            .into_iter()
            .try_fold(0u128, |acc, id| {
                acc.checked_add(self.ledger.amount_of(id)?)
                    .ok_or(StakeError::ArithmeticOverflow)
            })
    }

    pub fn current_weight(&self, account: &AccountId) -> Result<Balance, StakeError> {
        self.voting.current_weight(account)
    }

    pub fn weight_at(&self, account: &AccountId, index: TxIndex) -> Result<Balance, StakeError> {
        self.voting.weight_at(account, index)
    }

    pub fn total_weight(&self) -> Result<Balance, StakeError> {
        self.voting.total_weight()
    }

    pub fn total_weight_at(&self, index: TxIndex) -> Result<Balance, StakeError> {
        self.voting.total_weight_at(index)
    }

    pub fn delegate_of(&self, account: &AccountId) -> Result<AccountId, StakeError> {
        self.voting.delegate_of(account)
    }

    pub fn current_index(&self) -> Result<TxIndex, StakeError> {
        self.ledger.current_index()
    }

    pub fn owner_of(&self, position: PositionId) -> Result<Option<AccountId>, StakeError> {
        self.registry.owner_of(position)
    }

    pub fn custodian(&self) -> &AccountId {
        &self.custodian
    }

    /// The custodian's balance of the staked asset.
    pub fn custodial_balance(&self) -> Result<Balance, StakeError> {
        self.asset.balance_of(&self.custodian)
    }

    pub fn total_locked(&self) -> Result<Balance, StakeError> {
        self.ledger.total_locked()
    }

    pub fn pending_payout(&self, beneficiary: &AccountId) -> Result<Balance, StakeError> {
        self.ledger.pending_payout(beneficiary)
    }

    pub fn total_pending_payouts(&self) -> Result<Balance, StakeError> {
        self.ledger.total_pending_payouts()
    }

    pub fn events_since(&self, seq: u64) -> Result<Vec<EventRecord>, StakeError> {
        self.ledger.events_since(seq)
    }

    pub fn query(&self) -> PositionQuery<'_> {
        PositionQuery::new(&self.ledger, self.registry.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn acct(seed: &str) -> AccountId {
        AccountId::derive(seed.as_bytes())
    }

    fn setup() -> (StakingEngine, Arc<AssetBook>) {
        StakingEngine::open_standalone(&LedgerConfig::default()).expect("open engine")
    }

    fn fund(book: &AssetBook, account: &AccountId, amount: Balance) {
        book.mint_to(account, amount).unwrap();
        book.approve(account, book.custodian(), amount).unwrap();
    }

    // ── Mint ──────────────────────────────────────────────────────────────────

    #[test]
    fn mint_assigns_sequential_ids_in_request_order() {
        let (engine, book) = setup();
        let alice = acct("alice");
        let bob = acct("bob");
        fund(&book, &alice, 300);

        let ids = engine
            .mint(&alice, &[MintRequest::new(bob.clone(), 100), MintRequest::new(alice.clone(), 200)])
            .unwrap();
        assert_eq!(ids, vec![PositionId(1), PositionId(2)]);
        assert_eq!(engine.owner_of(PositionId(1)).unwrap(), Some(bob.clone()));
        assert_eq!(engine.staked_amount_of(PositionId(2)).unwrap(), 200);
        assert_eq!(engine.custodial_balance().unwrap(), 300);
        assert_eq!(book.balance_of(&alice).unwrap(), 0);

        let events = engine.events_since(0).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0].event,
            LedgerEvent::Minted { position: PositionId(1), initiator, .. } if *initiator == alice
        ));
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let (engine, _book) = setup();
        let alice = acct("alice");
        assert!(engine.mint(&alice, &[]).unwrap().is_empty());
        engine.burn(&alice, &[]).unwrap();
        assert_eq!(engine.current_index().unwrap(), 0);
    }

    #[test]
    fn oversized_batch_rejected() {
        let custodian = acct("custodian");
        let mut config = LedgerConfig::new(&custodian);
        config.max_batch_items = 2;
        let (engine, book) = StakingEngine::open_standalone(&config).unwrap();
        let alice = acct("alice");
        fund(&book, &alice, 3);
        let items = vec![MintRequest::new(alice.clone(), 1); 3];
        let err = engine.mint(&alice, &items).unwrap_err();
        assert!(matches!(err, StakeError::BatchTooLarge { max: 2, got: 3 }));
        assert_eq!(engine.custodial_balance().unwrap(), 0);
    }

    #[test]
    fn failed_pull_leaves_balance_and_allowance_untouched() {
        let (engine, book) = setup();
        let alice = acct("alice");
        book.mint_to(&alice, 1_000).unwrap();
        book.approve(&alice, book.custodian(), 150).unwrap();

        let items = [
            MintRequest::new(alice.clone(), 100),
            MintRequest::new(alice.clone(), 100),
        ];
        let err = engine.mint(&alice, &items).unwrap_err();
        assert!(matches!(err, StakeError::TransferFailed(_)));
        assert_eq!(book.balance_of(&alice).unwrap(), 1_000);
        assert_eq!(book.allowance(&alice, book.custodian()).unwrap(), 150);
        assert_eq!(engine.custodial_balance().unwrap(), 0);
        assert_eq!(engine.total_locked().unwrap(), 0);
        assert_eq!(engine.owner_of(PositionId(1)).unwrap(), None);
        assert!(engine.events_since(0).unwrap().is_empty());

        // The untouched allowance still covers a smaller batch.
        assert_eq!(engine.mint(&alice, &items[..1]).unwrap(), vec![PositionId(1)]);
        assert_eq!(book.allowance(&alice, book.custodian()).unwrap(), 50);
    }

    #[test]
    fn custodian_cannot_mint_unbacked_stake() {
        let (engine, book) = setup();
        let alice = acct("alice");
        fund(&book, &alice, 100);
        engine.mint(&alice, &[MintRequest::new(alice.clone(), 100)]).unwrap();

        let custodian = engine.custodian().clone();
        book.approve(&custodian, &custodian, 100).unwrap();
        let err = engine
            .mint(&custodian, &[MintRequest::new(acct("m"), 100)])
            .unwrap_err();
        assert!(matches!(err, StakeError::CustodianNotAllowed(_)));
        assert_eq!(engine.total_locked().unwrap(), 100);
        assert_eq!(engine.custodial_balance().unwrap(), 100);
        assert_eq!(engine.owner_of(PositionId(2)).unwrap(), None);
    }

    // ── Burn ──────────────────────────────────────────────────────────────────

    #[test]
    fn burn_pays_beneficiary_and_deletes_position() {
        let (engine, book) = setup();
        let alice = acct("alice");
        let payee = acct("payee");
        fund(&book, &alice, 100);
        let ids = engine.mint(&alice, &[MintRequest::new(alice.clone(), 100)]).unwrap();

        engine.burn(&alice, &[BurnRequest::new(ids[0], payee.clone())]).unwrap();
        assert_eq!(book.balance_of(&payee).unwrap(), 100);
        assert_eq!(engine.custodial_balance().unwrap(), 0);
        assert!(matches!(engine.staked_amount_of(ids[0]), Err(StakeError::PositionNotFound(_))));
        assert_eq!(engine.owner_of(ids[0]).unwrap(), None);
        assert_eq!(engine.current_weight(&alice).unwrap(), 0);
    }

    #[test]
    fn burn_to_custodian_rejected() {
        let (engine, book) = setup();
        let alice = acct("alice");
        fund(&book, &alice, 100);
        let ids = engine.mint(&alice, &[MintRequest::new(alice.clone(), 100)]).unwrap();

        let custodian = engine.custodian().clone();
        let err = engine.burn(&alice, &[BurnRequest::new(ids[0], custodian)]).unwrap_err();
        assert!(matches!(err, StakeError::CustodianNotAllowed(_)));
        assert_eq!(engine.staked_amount_of(ids[0]).unwrap(), 100);
        assert_eq!(engine.total_locked().unwrap(), engine.custodial_balance().unwrap());
        assert_eq!(engine.total_pending_payouts().unwrap(), 0);
    }

    #[test]
    fn approved_party_may_burn() {
        let (engine, book) = setup();
        let alice = acct("alice");
        let bob = acct("bob");
        fund(&book, &alice, 10);
        let ids = engine.mint(&alice, &[MintRequest::new(alice.clone(), 10)]).unwrap();

        assert!(matches!(
            engine.burn(&bob, &[BurnRequest::new(ids[0], bob.clone())]),
            Err(StakeError::NoPermission { .. })
        ));
        engine.approve(&alice, &bob, ids[0]).unwrap();
        engine.burn(&bob, &[BurnRequest::new(ids[0], bob.clone())]).unwrap();
        assert_eq!(book.balance_of(&bob).unwrap(), 10);
        // Weight came off the owner, not the approved caller.
        assert_eq!(engine.current_weight(&alice).unwrap(), 0);
    }

    // ── Transfer / delegation ─────────────────────────────────────────────────

    #[test]
    fn transfer_of_one_position_leaves_the_others() {
        let (engine, book) = setup();
        let a = acct("a");
        let b = acct("b");
        fund(&book, &a, 100);
        let ids = engine
            .mint(&a, &[MintRequest::new(a.clone(), 40), MintRequest::new(a.clone(), 60)])
            .unwrap();

        engine.transfer(&a, &a, &b, ids[0]).unwrap();
        assert_eq!(engine.staked_amount_of(a.clone()).unwrap(), 60);
        assert_eq!(engine.staked_amount_of(b.clone()).unwrap(), 40);
        assert_eq!(engine.current_weight(&a).unwrap(), 60);
        assert_eq!(engine.current_weight(&b).unwrap(), 40);

        // b now burns the 40 it received; a keeps exactly 60.
        engine.burn(&b, &[BurnRequest::new(ids[0], b.clone())]).unwrap();
        assert_eq!(book.balance_of(&b).unwrap(), 40);
        assert_eq!(engine.staked_amount_of(ids[1]).unwrap(), 60);
    }

    #[test]
    fn stranger_cannot_transfer() {
        let (engine, book) = setup();
        let a = acct("a");
        let m = acct("mallory");
        fund(&book, &a, 5);
        let ids = engine.mint(&a, &[MintRequest::new(a.clone(), 5)]).unwrap();
        let before = engine.current_index().unwrap();
        assert!(matches!(
            engine.transfer(&m, &a, &m, ids[0]),
            Err(StakeError::NoPermission { .. })
        ));
        assert_eq!(engine.owner_of(ids[0]).unwrap(), Some(a));
        assert_eq!(engine.current_index().unwrap(), before);
    }

    #[test]
    fn delegation_moves_weight_not_stake() {
        let (engine, book) = setup();
        let a = acct("a");
        let d = acct("d");
        fund(&book, &a, 80);
        engine.mint(&a, &[MintRequest::new(a.clone(), 80)]).unwrap();

        engine.delegate(&a, &d).unwrap();
        assert_eq!(engine.delegate_of(&a).unwrap(), d);
        assert_eq!(engine.current_weight(&a).unwrap(), 0);
        assert_eq!(engine.current_weight(&d).unwrap(), 80);
        assert_eq!(engine.staked_amount_of(a.clone()).unwrap(), 80);
        assert_eq!(engine.total_weight().unwrap(), 80);

        let index = engine.current_index().unwrap();
        engine.delegate(&a, &d).unwrap();
        assert_eq!(engine.current_index().unwrap(), index, "re-delegating to the same account is a no-op");
    }
}
