//! stakecert-staking
//!
//! Position lifecycle for the staking ledger: batched mint and burn, transfers,
//! approvals, delegation and pending payouts. Storage lives in stakecert-state
//! and weight accounting in stakecert-voting; this crate sequences calls to
//! them and to the staked asset so that each batch is all-or-nothing.

pub mod batch;
pub mod guard;
pub mod lifecycle;
pub mod query;

pub use guard::ReentrancyGuard;
pub use lifecycle::StakingEngine;
pub use query::{PositionQuery, PositionView};
