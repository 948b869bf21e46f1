use std::sync::Arc;

use stakecert_core::error::StakeError;
use stakecert_core::traits::CheckpointStore;
use stakecert_core::types::{Balance, CheckpointKey, TxIndex};

use crate::db::StateDb;

/// Checkpoint history in the `checkpoints` tree.
///
/// Entries for indices older than the newest one are never rewritten.
pub struct SledCheckpoints {
    db: Arc<StateDb>,
}

impl SledCheckpoints {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }
}

impl CheckpointStore for SledCheckpoints {
    fn push(&self, key: &CheckpointKey, value: Balance, index: TxIndex) -> Result<(), StakeError> {
        let prefix = key.prefix();
        if let Some((last, _)) = self.db.last_checkpoint(&prefix)? {
            if index < last {
                return Err(StakeError::CheckpointOutOfOrder { last, got: index });
            }
        }
        self.db.put_checkpoint(&prefix, index, value)
    }

    fn latest(&self, key: &CheckpointKey) -> Result<Balance, StakeError> {
        Ok(self.db.last_checkpoint(&key.prefix())?.map(|(_, v)| v).unwrap_or(0))
    }

    fn at(&self, key: &CheckpointKey, index: TxIndex) -> Result<Balance, StakeError> {
        Ok(self.db.checkpoint_at(&key.prefix(), index)?.map(|(_, v)| v).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakecert_core::types::AccountId;

    #[test]
    fn history_is_append_only() {
        let store = SledCheckpoints::new(Arc::new(StateDb::temporary().unwrap()));
        let key = CheckpointKey::Account(AccountId::derive(b"alice"));

        store.push(&key, 100, 2).unwrap();
        store.push(&key, 70, 5).unwrap();
        // Same index replaces the open entry.
        store.push(&key, 60, 5).unwrap();

        assert_eq!(store.at(&key, 1).unwrap(), 0);
        assert_eq!(store.at(&key, 2).unwrap(), 100);
        assert_eq!(store.at(&key, 4).unwrap(), 100);
        assert_eq!(store.at(&key, 5).unwrap(), 60);
        assert_eq!(store.latest(&key).unwrap(), 60);

        let err = store.push(&key, 1, 3).unwrap_err();
        assert!(matches!(err, StakeError::CheckpointOutOfOrder { last: 5, got: 3 }));
        assert_eq!(store.at(&key, 3).unwrap(), 100);
    }

    #[test]
    fn total_series_is_separate() {
        let store = SledCheckpoints::new(Arc::new(StateDb::temporary().unwrap()));
        let key = CheckpointKey::Account(AccountId::derive(b"alice"));
        store.push(&CheckpointKey::Total, 500, 1).unwrap();
        assert_eq!(store.latest(&key).unwrap(), 0);
        assert_eq!(store.latest(&CheckpointKey::Total).unwrap(), 500);
    }
}
