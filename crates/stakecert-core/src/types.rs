use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantity of the staked asset in base units.
pub type Balance = u128;

/// Monotonically increasing ledger clock. Every state-changing call
/// advances it once; checkpoints are keyed by it.
pub type TxIndex = u64;

// ── AccountId ────────────────────────────────────────────────────────────────

/// 32-byte account identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive an account from arbitrary key material: BLAKE3(seed).
    pub fn derive(seed: &[u8]) -> Self {
        Self(*blake3::hash(seed).as_bytes())
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Parse a base-58 account. Returns `None` unless the payload is exactly 32 bytes.
    pub fn from_b58(s: &str) -> Option<Self> {
        let bytes = bs58::decode(s).into_vec().ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b58 = self.to_b58();
        write!(f, "AccountId({})", &b58[..b58.len().min(8)])
    }
}

// ── PositionId ───────────────────────────────────────────────────────────────

/// Identifier of a position certificate. Assigned from 1 upward, never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl PositionId {
    /// Big-endian storage key, so sled iterates positions in id order.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(key: &[u8]) -> Option<Self> {
        let arr: [u8; 8] = key.try_into().ok()?;
        Some(Self(u64::from_be_bytes(arr)))
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PositionId({})", self.0)
    }
}

// ── Lookup keys ──────────────────────────────────────────────────────────────

/// Argument of `staked_amount_of`: a single position, or everything an account owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PositionOrAccount {
    Position(PositionId),
    Account(AccountId),
}

impl From<PositionId> for PositionOrAccount {
    fn from(id: PositionId) -> Self {
        Self::Position(id)
    }
}

impl From<AccountId> for PositionOrAccount {
    fn from(account: AccountId) -> Self {
        Self::Account(account)
    }
}

/// A series in the checkpoint store: one per delegatee, plus the total.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CheckpointKey {
    Account(AccountId),
    Total,
}

impl CheckpointKey {
    /// Storage prefix. A leading tag byte keeps the two kinds of series in
    /// disjoint key ranges.
    pub fn prefix(&self) -> Vec<u8> {
        match self {
            CheckpointKey::Account(a) => {
                let mut p = Vec::with_capacity(33);
                p.push(0x01);
                p.extend_from_slice(a.as_bytes());
                p
            }
            CheckpointKey::Total => vec![0x02],
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointKey::Account(a) => write!(f, "{}", a),
            CheckpointKey::Total => write!(f, "total"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn b58_roundtrip_and_length_check() {
        let a = AccountId::derive(b"alice");
        assert_eq!(AccountId::from_b58(&a.to_b58()), Some(a));
        assert_eq!(AccountId::from_b58("abc"), None);
    }

    #[test]
    fn position_keys_sort_numerically() {
        assert!(PositionId(2).to_key() < PositionId(10).to_key());
        assert_eq!(PositionId::from_key(&PositionId(42).to_key()), Some(PositionId(42)));
    }

    #[test]
    fn total_prefix_differs_from_accounts() {
        let a = CheckpointKey::Account(AccountId::from_bytes([0x02; 32]));
        assert_ne!(a.prefix()[0], CheckpointKey::Total.prefix()[0]);
        assert_eq!(a.prefix().len(), 33);
    }
}
