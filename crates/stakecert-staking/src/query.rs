use serde::Serialize;
use stakecert_core::error::StakeError;
use stakecert_core::traits::PositionRegistry;
use stakecert_core::types::{AccountId, Balance, PositionId};
use stakecert_state::BalanceLedger;

/// A live position as seen from outside the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PositionView {
    pub id: PositionId,
    pub owner: AccountId,
    pub amount: Balance,
    pub approved: Option<AccountId>,
}

/// Read-only helpers over positions.
pub struct PositionQuery<'a> {
    ledger: &'a BalanceLedger,
    registry: &'a dyn PositionRegistry,
}

impl<'a> PositionQuery<'a> {
    pub fn new(ledger: &'a BalanceLedger, registry: &'a dyn PositionRegistry) -> Self {
        Self { ledger, registry }
    }

    /// Fetch a single live position. `None` once burned or never minted.
    pub fn get(&self, id: PositionId) -> Result<Option<PositionView>, StakeError> {
        let Some(owner) = self.registry.owner_of(id)? else {
            return Ok(None);
        };
        let amount = self
            .ledger
            .db()
            .get_locked(id)?
            .ok_or_else(|| StakeError::InvariantViolation(format!("position {id} has an owner but no record")))?;
        Ok(Some(PositionView {
            id,
            owner,
            amount,
            approved: self.registry.approved_of(id)?,
        }))
    }

    /// Every live position held by `owner`.
    pub fn held_by(&self, owner: &AccountId) -> Result<Vec<PositionView>, StakeError> {
        let mut out = Vec::new();
        for id in self.registry.positions_of(owner)? {
            if let Some(view) = self.get(id)? {
                out.push(view);
            }
        }
        Ok(out)
    }

    /// Human-readable summary of a position.
    pub fn describe(&self, id: PositionId) -> Result<String, StakeError> {
        let view = self.get(id)?.ok_or(StakeError::PositionNotFound(id))?;
        let approval = match &view.approved {
            Some(spender) => format!("approved: {spender}"),
            None => "no approval".to_string(),
        };
        Ok(format!("Position {} | {} locked | owner: {} | {}", view.id, view.amount, view.owner, approval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakecert_state::{SledRegistry, StateDb};
    use std::sync::Arc;

    #[test]
    fn get_and_describe_live_position() {
        let db = Arc::new(StateDb::temporary().unwrap());
        let ledger = BalanceLedger::new(Arc::clone(&db));
        let registry = SledRegistry::new(db);
        let owner = AccountId::derive(b"owner");
        registry.create(&owner, PositionId(4)).unwrap();
        ledger.lock(PositionId(4), 25).unwrap();

        let q = PositionQuery::new(&ledger, &registry);
        let view = q.get(PositionId(4)).unwrap().unwrap();
        assert_eq!(view.amount, 25);
        assert_eq!(view.owner, owner);
        assert_eq!(q.held_by(&owner).unwrap(), vec![view]);

        let text = q.describe(PositionId(4)).unwrap();
        assert!(text.starts_with("Position #4 | 25 locked"));
        assert!(text.ends_with("no approval"));

        assert!(q.get(PositionId(5)).unwrap().is_none());
        assert!(matches!(q.describe(PositionId(5)), Err(StakeError::PositionNotFound(_))));
    }
}
