use std::sync::Arc;

use stakecert_core::error::StakeError;
use stakecert_core::traits::PositionRegistry;
use stakecert_core::types::{AccountId, PositionId};

use crate::db::StateDb;

/// Position certificate registry stored in the `owners`, `approvals` and
/// `operators` trees.
pub struct SledRegistry {
    db: Arc<StateDb>,
}

impl SledRegistry {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }

    fn require_owner(&self, id: PositionId) -> Result<AccountId, StakeError> {
        self.db.get_owner(id)?.ok_or(StakeError::PositionNotFound(id))
    }
}

impl PositionRegistry for SledRegistry {
    fn create(&self, owner: &AccountId, id: PositionId) -> Result<(), StakeError> {
        if self.db.get_owner(id)?.is_some() {
            return Err(StakeError::PositionExists(id));
        }
        self.db.put_owner(id, owner)
    }

    fn destroy(&self, id: PositionId) -> Result<(), StakeError> {
        self.require_owner(id)?;
        self.db.remove_approval(id)?;
        self.db.remove_owner(id)
    }

    fn owner_of(&self, id: PositionId) -> Result<Option<AccountId>, StakeError> {
        self.db.get_owner(id)
    }

    fn is_owner_or_approved(&self, caller: &AccountId, id: PositionId) -> Result<bool, StakeError> {
        let owner = match self.db.get_owner(id)? {
            Some(o) => o,
            None => return Ok(false),
        };
        if *caller == owner || self.db.is_operator(&owner, caller)? {
            return Ok(true);
        }
        Ok(self.db.get_approval(id)?.as_ref() == Some(caller))
    }

    fn transfer_from(
        &self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        id: PositionId,
    ) -> Result<(), StakeError> {
        let owner = self.require_owner(id)?;
        if owner != *from || !self.is_owner_or_approved(caller, id)? {
            return Err(StakeError::NoPermission { position: id, caller: caller.clone() });
        }
        self.db.remove_approval(id)?;
        self.db.put_owner(id, to)
    }

    fn approve(&self, caller: &AccountId, spender: &AccountId, id: PositionId) -> Result<(), StakeError> {
        let owner = self.require_owner(id)?;
        if *caller != owner && !self.db.is_operator(&owner, caller)? {
            return Err(StakeError::NoPermission { position: id, caller: caller.clone() });
        }
        self.db.put_approval(id, spender)
    }

    fn approved_of(&self, id: PositionId) -> Result<Option<AccountId>, StakeError> {
        self.db.get_approval(id)
    }

    fn set_approval_for_all(
        &self,
        owner: &AccountId,
        operator: &AccountId,
        approved: bool,
    ) -> Result<(), StakeError> {
        self.db.set_operator(owner, operator, approved)
    }

    fn positions_of(&self, owner: &AccountId) -> Result<Vec<PositionId>, StakeError> {
        Ok(self
            .db
            .iter_owners()?
            .into_iter()
            .filter(|(_, o)| o == owner)
            .map(|(id, _)| id)
            .collect())
    }
}
