//! stakecert-voting
//!
//! Voting weight derived from locked stake. Weight lives only in the
//! checkpoint history; the adapter turns mint, burn, transfer and
//! delegation into checkpoint pushes.

pub mod adapter;

pub use adapter::VotingPowerAdapter;
