use std::sync::Arc;

use stakecert_core::error::{StakeError, TransferFailed};
use stakecert_core::traits::AssetTransfer;
use stakecert_core::types::{AccountId, Balance};
use tracing::debug;

use crate::db::StateDb;

/// A plain fungible-asset book with balances and allowances, operated from
/// the point of view of the ledger's custodian account.
pub struct AssetBook {
    db: Arc<StateDb>,
    custodian: AccountId,
}

impl AssetBook {
    pub fn new(db: Arc<StateDb>, custodian: AccountId) -> Self {
        Self { db, custodian }
    }

    pub fn custodian(&self) -> &AccountId {
        &self.custodian
    }

    /// Credit `account` out of thin air. Setup and test funding only.
    pub fn mint_to(&self, account: &AccountId, amount: Balance) -> Result<(), StakeError> {
        let balance = self
            .db
            .get_asset_balance(account)?
            .checked_add(amount)
            .ok_or(StakeError::ArithmeticOverflow)?;
        self.db.put_asset_balance(account, balance)
    }

    pub fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Balance) -> Result<(), StakeError> {
        self.db.put_allowance(owner, spender, amount)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Result<Balance, StakeError> {
        self.db.get_allowance(owner, spender)
    }

    /// Move `amount` from `from` to `to`, checking `from`'s balance.
    pub fn transfer(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), TransferFailed> {
        let have = self.db.get_asset_balance(from).map_err(failed)?;
        if have < amount {
            return Err(TransferFailed::new(format!(
                "insufficient balance: need {amount}, have {have}"
            )));
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .db
            .get_asset_balance(to)
            .map_err(failed)?
            .checked_add(amount)
            .ok_or_else(|| TransferFailed::new("balance overflow"))?;
        self.db.put_asset_balance(from, have - amount).map_err(failed)?;
        self.db.put_asset_balance(to, credited).map_err(failed)?;
        debug!(from = %from, to = %to, amount, "asset moved");
        Ok(())
    }
}

fn failed(e: StakeError) -> TransferFailed {
    TransferFailed::new(e.to_string())
}

impl AssetTransfer for AssetBook {
    fn pull(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), TransferFailed> {
        if from == to {
            return Err(TransferFailed::new(format!("cannot pull from {from} into itself")));
        }
        let allowance = self.db.get_allowance(from, &self.custodian).map_err(failed)?;
        if allowance < amount {
            return Err(TransferFailed::new(format!(
                "insufficient allowance: need {amount}, have {allowance}"
            )));
        }
        self.transfer(from, to, amount)?;
        self.db
            .put_allowance(from, &self.custodian, allowance - amount)
            .map_err(failed)
    }

    fn push(&self, to: &AccountId, amount: Balance) -> Result<(), TransferFailed> {
        if *to == self.custodian {
            return Err(TransferFailed::new("cannot push from custody to the custodian"));
        }
        self.transfer(&self.custodian, to, amount)
    }

    fn balance_of(&self, account: &AccountId) -> Result<Balance, StakeError> {
        self.db.get_asset_balance(account)
    }
}
