//! Batch coordination: everything that can reject a batch is checked here,
//! before the first external call or state write of the batch.

use std::collections::HashSet;

use stakecert_core::error::StakeError;
use stakecert_core::request::{BurnRequest, MintRequest};
use stakecert_core::traits::PositionRegistry;
use stakecert_core::types::{AccountId, Balance, PositionId};
use stakecert_state::BalanceLedger;
use tracing::{error, warn};

pub fn check_size(got: usize, max: usize) -> Result<(), StakeError> {
    if got > max {
        warn!(got, max, "batch rejected: too many items");
        return Err(StakeError::BatchTooLarge { max, got });
    }
    Ok(())
}

/// Reject the batch if any item stakes zero. Returns the batch total.
pub fn validate_mints(items: &[MintRequest]) -> Result<Balance, StakeError> {
    let mut total: Balance = 0;
    for (index, item) in items.iter().enumerate() {
        if item.stake_amount == 0 {
            warn!(index, beneficiary = %item.beneficiary, "mint batch rejected: zero stake");
            return Err(StakeError::InvalidAmount);
        }
        total = total
            .checked_add(item.stake_amount)
            .ok_or(StakeError::ArithmeticOverflow)?;
    }
    Ok(total)
}

/// One authorized burn, resolved against the registry and the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BurnStep {
    pub position: PositionId,
    pub owner: AccountId,
    pub beneficiary: AccountId,
    pub amount: Balance,
}

/// Authorize every item of a burn batch without touching state.
///
/// A position listed twice is rejected on its second occurrence, exactly as
/// it would be after the first burn destroyed it. The custodian is never a
/// valid beneficiary.
pub fn plan_burns(
    caller: &AccountId,
    custodian: &AccountId,
    items: &[BurnRequest],
    registry: &dyn PositionRegistry,
    ledger: &BalanceLedger,
) -> Result<Vec<BurnStep>, StakeError> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut steps = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let id = item.position_id;
        let denied = || StakeError::NoPermission { position: id, caller: caller.clone() };

        if item.beneficiary == *custodian {
            warn!(index, position = %id, "burn batch rejected: custodian named as beneficiary");
            return Err(StakeError::CustodianNotAllowed(custodian.clone()));
        }

        if !seen.insert(id) {
            warn!(index, position = %id, "burn batch rejected: position listed twice");
            return Err(denied());
        }
        if !registry.is_owner_or_approved(caller, id)? {
            warn!(index, position = %id, caller = %caller, "burn batch rejected: no permission");
            return Err(denied());
        }
        let owner = registry.owner_of(id)?.ok_or_else(denied)?;

        let amount = ledger.amount_of(id)?;
        if amount == 0 {
            error!(position = %id, "live position has no locked-amount record");
            return Err(StakeError::InvariantViolation(format!(
                "position {id} is registered but has no locked amount"
            )));
        }

        steps.push(BurnStep {
            position: id,
            owner,
            beneficiary: item.beneficiary.clone(),
            amount,
        });
    }
    Ok(steps)
}
