/// ─── StakeCert Ledger Constants ─────────────────────────────────────────────
///
/// Locked stake is bound to a position certificate; the certificate is the
/// only way to get the stake back.

// ── Positions ────────────────────────────────────────────────────────────────

/// First identifier handed out by the ledger. Zero is never a valid position.
pub const FIRST_POSITION_ID: u64 = 1;

// ── Batches ──────────────────────────────────────────────────────────────────

/// Default upper bound on the number of items in one mint or burn batch.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 256;

// ── Checkpoints ──────────────────────────────────────────────────────────────

/// Index of the ledger before any state-changing call has been applied.
/// Every series reads zero at this index.
pub const GENESIS_INDEX: u64 = 0;

// ── Meta keys ────────────────────────────────────────────────────────────────

pub const META_NEXT_POSITION_ID: &str = "next_position_id";
pub const META_TX_INDEX: &str = "tx_index";
pub const META_EVENT_SEQ: &str = "event_seq";
