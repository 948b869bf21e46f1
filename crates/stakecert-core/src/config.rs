use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_MAX_BATCH_ITEMS;
use crate::error::StakeError;
use crate::types::AccountId;

/// Ledger configuration, usually read from a JSON file.
///
/// ```json
/// { "custodian": "<base58 account>", "max_batch_items": 64, "data_dir": "/var/lib/stakecert" }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Account holding custody of every locked stake (base-58).
    pub custodian: String,
    /// Largest accepted mint or burn batch.
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,
    /// sled directory. `None` means a temporary database.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_max_batch_items() -> usize {
    DEFAULT_MAX_BATCH_ITEMS
}

impl LedgerConfig {
    pub fn new(custodian: &AccountId) -> Self {
        Self {
            custodian: custodian.to_b58(),
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            data_dir: None,
        }
    }

    /// Load and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StakeError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StakeError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, StakeError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| StakeError::Config(e.to_string()))?;
        cfg.custodian_id()?;
        if cfg.max_batch_items == 0 {
            return Err(StakeError::Config("max_batch_items must be at least 1".into()));
        }
        Ok(cfg)
    }

    /// Parsed custodian account.
    pub fn custodian_id(&self) -> Result<AccountId, StakeError> {
        AccountId::from_b58(&self.custodian)
            .ok_or_else(|| StakeError::Config(format!("invalid custodian account: {}", self.custodian)))
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(&AccountId::derive(b"stakecert/custodian"))
    }
}
