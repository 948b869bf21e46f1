//! stakecert-state
//!
//! Persistent state for the staking ledger: the sled database, the
//! position-keyed Balance Ledger, and sled-backed reference implementations
//! of the registry, checkpoint and asset collaborators.

pub mod asset;
pub mod checkpoints;
pub mod db;
pub mod ledger;
pub mod registry;

pub use asset::AssetBook;
pub use checkpoints::SledCheckpoints;
pub use db::StateDb;
pub use ledger::BalanceLedger;
pub use registry::SledRegistry;
