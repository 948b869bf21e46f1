use serde::de::DeserializeOwned;
use serde::Serialize;
use stakecert_core::constants::{FIRST_POSITION_ID, META_EVENT_SEQ, META_NEXT_POSITION_ID, META_TX_INDEX};
use stakecert_core::error::StakeError;
use stakecert_core::request::EventRecord;
use stakecert_core::types::{AccountId, Balance, PositionId, TxIndex};
use std::path::Path;

fn storage(e: sled::Error) -> StakeError {
    StakeError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StakeError> {
    bincode::serialize(value).map_err(|e| StakeError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StakeError> {
    bincode::deserialize(bytes).map_err(|e| StakeError::Serialization(e.to_string()))
}

fn get<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, StakeError> {
    match tree.get(key).map_err(storage)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn read_u64(bytes: Option<&[u8]>) -> Option<u64> {
    bytes.and_then(|b| b.try_into().ok()).map(u64::from_be_bytes)
}

fn pair_key(a: &AccountId, b: &AccountId) -> [u8; 64] {
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(a.as_bytes());
    key[32..].copy_from_slice(b.as_bytes());
    key
}

/// Persistent ledger database backed by sled.
///
/// Named trees:
///   positions         — PositionId (BE)      → bincode(Balance)
///   owners            — PositionId (BE)      → bincode(AccountId)
///   approvals         — PositionId (BE)      → bincode(AccountId)
///   operators         — owner ‖ operator     → [] (membership set)
///   checkpoints       — series prefix ‖ TxIndex (BE) → bincode(Balance)
///   delegates         — AccountId bytes      → bincode(AccountId)
///   asset_balances    — AccountId bytes      → bincode(Balance)
///   asset_allowances  — owner ‖ spender      → bincode(Balance)
///   payouts           — AccountId bytes      → bincode(Balance)
///   events            — seq (BE)             → bincode(EventRecord)
///   meta              — utf8 key bytes       → u64 (BE)
pub struct StateDb {
    _db: sled::Db,
    positions: sled::Tree,
    owners: sled::Tree,
    approvals: sled::Tree,
    operators: sled::Tree,
    checkpoints: sled::Tree,
    delegates: sled::Tree,
    asset_balances: sled::Tree,
    asset_allowances: sled::Tree,
    payouts: sled::Tree,
    events: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the ledger database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StakeError> {
        Self::from_db(sled::open(path).map_err(storage)?)
    }

    /// Open a throwaway database that is removed when dropped.
    pub fn temporary() -> Result<Self, StakeError> {
        Self::from_db(sled::Config::new().temporary(true).open().map_err(storage)?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StakeError> {
        let positions        = db.open_tree("positions").map_err(storage)?;
        let owners           = db.open_tree("owners").map_err(storage)?;
        let approvals        = db.open_tree("approvals").map_err(storage)?;
        let operators        = db.open_tree("operators").map_err(storage)?;
        let checkpoints      = db.open_tree("checkpoints").map_err(storage)?;
        let delegates        = db.open_tree("delegates").map_err(storage)?;
        let asset_balances   = db.open_tree("asset_balances").map_err(storage)?;
        let asset_allowances = db.open_tree("asset_allowances").map_err(storage)?;
        let payouts          = db.open_tree("payouts").map_err(storage)?;
        let events           = db.open_tree("events").map_err(storage)?;
        let meta             = db.open_tree("meta").map_err(storage)?;
        Ok(Self {
            _db: db,
            positions,
            owners,
            approvals,
            operators,
            checkpoints,
            delegates,
            asset_balances,
            asset_allowances,
            payouts,
            events,
            meta,
        })
    }

    // ── Locked amounts ───────────────────────────────────────────────────────

    pub fn get_locked(&self, id: PositionId) -> Result<Option<Balance>, StakeError> {
        get(&self.positions, &id.to_key())
    }

    pub fn put_locked(&self, id: PositionId, amount: Balance) -> Result<(), StakeError> {
        self.positions.insert(id.to_key(), encode(&amount)?).map_err(storage)?;
        Ok(())
    }

    pub fn remove_locked(&self, id: PositionId) -> Result<Option<Balance>, StakeError> {
        match self.positions.remove(id.to_key()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every live record, in position order.
    pub fn iter_locked(&self) -> Result<Vec<(PositionId, Balance)>, StakeError> {
        let mut out = Vec::new();
        for item in self.positions.iter() {
            let (key, value) = item.map_err(storage)?;
            let id = PositionId::from_key(&key)
                .ok_or_else(|| StakeError::Serialization("malformed position key".into()))?;
            out.push((id, decode(&value)?));
        }
        Ok(out)
    }

    // ── Ownership / approvals ────────────────────────────────────────────────

    pub fn get_owner(&self, id: PositionId) -> Result<Option<AccountId>, StakeError> {
        get(&self.owners, &id.to_key())
    }

    pub fn put_owner(&self, id: PositionId, owner: &AccountId) -> Result<(), StakeError> {
        self.owners.insert(id.to_key(), encode(owner)?).map_err(storage)?;
        Ok(())
    }

    pub fn remove_owner(&self, id: PositionId) -> Result<(), StakeError> {
        self.owners.remove(id.to_key()).map_err(storage)?;
        Ok(())
    }

    pub fn iter_owners(&self) -> Result<Vec<(PositionId, AccountId)>, StakeError> {
        let mut out = Vec::new();
        for item in self.owners.iter() {
            let (key, value) = item.map_err(storage)?;
            let id = PositionId::from_key(&key)
                .ok_or_else(|| StakeError::Serialization("malformed owner key".into()))?;
            out.push((id, decode(&value)?));
        }
        Ok(out)
    }

    pub fn get_approval(&self, id: PositionId) -> Result<Option<AccountId>, StakeError> {
        get(&self.approvals, &id.to_key())
    }

    pub fn put_approval(&self, id: PositionId, spender: &AccountId) -> Result<(), StakeError> {
        self.approvals.insert(id.to_key(), encode(spender)?).map_err(storage)?;
        Ok(())
    }

    pub fn remove_approval(&self, id: PositionId) -> Result<(), StakeError> {
        self.approvals.remove(id.to_key()).map_err(storage)?;
        Ok(())
    }

    pub fn is_operator(&self, owner: &AccountId, operator: &AccountId) -> Result<bool, StakeError> {
        self.operators.contains_key(pair_key(owner, operator)).map_err(storage)
    }

    pub fn set_operator(&self, owner: &AccountId, operator: &AccountId, approved: bool) -> Result<(), StakeError> {
        let key = pair_key(owner, operator);
        if approved {
            self.operators.insert(key, b"".as_ref()).map_err(storage)?;
        } else {
            self.operators.remove(key).map_err(storage)?;
        }
        Ok(())
    }

    // ── Checkpoints ──────────────────────────────────────────────────────────

    fn checkpoint_key(prefix: &[u8], index: TxIndex) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + 8);
        key.extend_from_slice(prefix);
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    fn split_checkpoint(prefix: &[u8], key: &[u8], value: &[u8]) -> Result<(TxIndex, Balance), StakeError> {
        let index = read_u64(key.get(prefix.len()..))
            .ok_or_else(|| StakeError::Serialization("malformed checkpoint key".into()))?;
        Ok((index, decode(value)?))
    }

    pub fn put_checkpoint(&self, prefix: &[u8], index: TxIndex, value: Balance) -> Result<(), StakeError> {
        self.checkpoints
            .insert(Self::checkpoint_key(prefix, index), encode(&value)?)
            .map_err(storage)?;
        Ok(())
    }

    /// Newest entry of the series under `prefix`.
    pub fn last_checkpoint(&self, prefix: &[u8]) -> Result<Option<(TxIndex, Balance)>, StakeError> {
        match self.checkpoints.scan_prefix(prefix).next_back() {
            Some(item) => {
                let (key, value) = item.map_err(storage)?;
                Ok(Some(Self::split_checkpoint(prefix, &key, &value)?))
            }
            None => Ok(None),
        }
    }

    /// Newest entry of the series under `prefix` with index ≤ `index`.
    pub fn checkpoint_at(&self, prefix: &[u8], index: TxIndex) -> Result<Option<(TxIndex, Balance)>, StakeError> {
        let start = Self::checkpoint_key(prefix, 0);
        let end = Self::checkpoint_key(prefix, index);
        match self.checkpoints.range(start..=end).next_back() {
            Some(item) => {
                let (key, value) = item.map_err(storage)?;
                Ok(Some(Self::split_checkpoint(prefix, &key, &value)?))
            }
            None => Ok(None),
        }
    }

    // ── Delegation ───────────────────────────────────────────────────────────

    pub fn get_delegate(&self, account: &AccountId) -> Result<Option<AccountId>, StakeError> {
        get(&self.delegates, account.as_bytes())
    }

    pub fn put_delegate(&self, account: &AccountId, delegatee: &AccountId) -> Result<(), StakeError> {
        self.delegates.insert(account.as_bytes(), encode(delegatee)?).map_err(storage)?;
        Ok(())
    }

    // ── Asset book ───────────────────────────────────────────────────────────

    pub fn get_asset_balance(&self, account: &AccountId) -> Result<Balance, StakeError> {
        Ok(get(&self.asset_balances, account.as_bytes())?.unwrap_or(0))
    }

    pub fn put_asset_balance(&self, account: &AccountId, amount: Balance) -> Result<(), StakeError> {
        self.asset_balances.insert(account.as_bytes(), encode(&amount)?).map_err(storage)?;
        Ok(())
    }

    pub fn get_allowance(&self, owner: &AccountId, spender: &AccountId) -> Result<Balance, StakeError> {
        Ok(get(&self.asset_allowances, &pair_key(owner, spender))?.unwrap_or(0))
    }

    pub fn put_allowance(&self, owner: &AccountId, spender: &AccountId, amount: Balance) -> Result<(), StakeError> {
        self.asset_allowances
            .insert(pair_key(owner, spender), encode(&amount)?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Pending payouts ──────────────────────────────────────────────────────

    pub fn get_payout(&self, account: &AccountId) -> Result<Balance, StakeError> {
        Ok(get(&self.payouts, account.as_bytes())?.unwrap_or(0))
    }

    pub fn put_payout(&self, account: &AccountId, amount: Balance) -> Result<(), StakeError> {
        if amount == 0 {
            self.payouts.remove(account.as_bytes()).map_err(storage)?;
        } else {
            self.payouts.insert(account.as_bytes(), encode(&amount)?).map_err(storage)?;
        }
        Ok(())
    }

    pub fn iter_payouts(&self) -> Result<Vec<(AccountId, Balance)>, StakeError> {
        let mut out = Vec::new();
        for item in self.payouts.iter() {
            let (key, value) = item.map_err(storage)?;
            let arr: [u8; 32] = key
                .as_ref()
                .try_into()
                .map_err(|_| StakeError::Serialization("malformed payout key".into()))?;
            out.push((AccountId::from_bytes(arr), decode(&value)?));
        }
        Ok(out)
    }

    // ── Events ───────────────────────────────────────────────────────────────

    pub fn put_event(&self, record: &EventRecord) -> Result<(), StakeError> {
        self.events
            .insert(record.seq.to_be_bytes(), encode(record)?)
            .map_err(storage)?;
        Ok(())
    }

    /// Events with sequence number ≥ `seq`, in emission order.
    pub fn events_from(&self, seq: u64) -> Result<Vec<EventRecord>, StakeError> {
        let mut out = Vec::new();
        for item in self.events.range(seq.to_be_bytes()..) {
            let (_, value) = item.map_err(storage)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    // ── Meta counters ────────────────────────────────────────────────────────

    pub fn get_meta_u64(&self, key: &str) -> Result<Option<u64>, StakeError> {
        let value = self.meta.get(key.as_bytes()).map_err(storage)?;
        Ok(read_u64(value.as_deref()))
    }

    /// Atomically bump the counter at `key` (starting from `initial` when absent)
    /// and return the value it held before the bump. An exhausted counter is
    /// left untouched and reported as `ArithmeticOverflow`.
    pub fn fetch_increment(&self, key: &str, initial: u64) -> Result<u64, StakeError> {
        let mut exhausted = false;
        let previous = self
            .meta
            .fetch_and_update(key.as_bytes(), |old| {
                let current = read_u64(old).unwrap_or(initial);
                let next = current.checked_add(1);
                exhausted = next.is_none();
                Some(next.unwrap_or(current).to_be_bytes().to_vec())
            })
            .map_err(storage)?;
        if exhausted {
            return Err(StakeError::ArithmeticOverflow);
        }
        Ok(read_u64(previous.as_deref()).unwrap_or(initial))
    }

    pub fn next_position_counter(&self) -> Result<u64, StakeError> {
        self.fetch_increment(META_NEXT_POSITION_ID, FIRST_POSITION_ID)
    }

    pub fn tx_index(&self) -> Result<TxIndex, StakeError> {
        Ok(self.get_meta_u64(META_TX_INDEX)?.unwrap_or(0))
    }

    /// Advance the transaction index and return the new value.
    pub fn advance_tx_index(&self) -> Result<TxIndex, StakeError> {
        Ok(self.fetch_increment(META_TX_INDEX, 0)? + 1)
    }

    pub fn next_event_seq(&self) -> Result<u64, StakeError> {
        self.fetch_increment(META_EVENT_SEQ, 0)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), StakeError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}
