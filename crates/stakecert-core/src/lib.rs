pub mod config;
pub mod constants;
pub mod error;
pub mod request;
pub mod traits;
pub mod types;

pub use config::LedgerConfig;
pub use constants::*;
pub use error::{StakeError, TransferFailed};
pub use request::*;
pub use traits::{AssetTransfer, CheckpointStore, PositionRegistry};
pub use types::*;
