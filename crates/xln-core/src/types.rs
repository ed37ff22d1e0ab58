//! Core identifiers and numeric types shared by every XLN layer.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arbitrary-precision signed integer. Used for every balance, delta,
/// collateral, credit limit, and reserve in the system — no floating point,
/// no implicit saturation.
pub type Amount = BigInt;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Monotonically increasing per-signer counter (entity tx replay protection).
pub type Nonce = u64;

/// Monotonically increasing per-account-pair counter (bilateral replay
/// protection, §4.2 / §8 P10).
pub type Counter = u64;

/// Height of an entity frame, account frame, or jurisdiction block.
pub type Height = u64;

/// Arbitrary-precision token identifier (decimals are metadata only, never
/// interpreted by the core — §4.1).
pub type TokenId = u32;

// ── EntityId ───────────────────────────────────────────────────────────────

/// 32-byte entity identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub [u8; 32]);

impl EntityId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes[..32]);
        Ok(Self(arr))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", &self.to_hex()[..12])
    }
}

/// Signer identity within an entity's board (a validator/participant key).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignerId(pub String);

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerId({})", self.0)
    }
}

// ── AccountKey ───────────────────────────────────────────────────────────────

/// Canonical bilateral account key: the lexicographically ordered pair of
/// entity IDs (glossary: "canonical key"). `left < right` always holds.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
pub struct AccountKey {
    pub left: EntityId,
    pub right: EntityId,
}

impl AccountKey {
    /// Build the canonical key for two entities, ordering them
    /// lexicographically regardless of call-site order.
    pub fn canonical(a: EntityId, b: EntityId) -> Self {
        if a < b {
            AccountKey { left: a, right: b }
        } else {
            AccountKey { left: b, right: a }
        }
    }

    pub fn is_left(&self, who: &EntityId) -> bool {
        &self.left == who
    }

    pub fn counterparty(&self, who: &EntityId) -> EntityId {
        if &self.left == who {
            self.right.clone()
        } else {
            self.left.clone()
        }
    }

    /// The `"left:right"` string form used as a map key elsewhere in the
    /// ecosystem; kept here only for log/debug readability.
    pub fn to_display_string(&self) -> String {
        format!("{}:{}", self.left, self.right)
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

// ── Hash & frame identifiers ──────────────────────────────────────────────────

/// 32-byte output of the deterministic hash function H (§6).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes[..32]);
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", &self.to_hex()[..16])
    }
}

/// Identifier for an HTLC lock, unique within an account.
pub type LockId = String;

/// Identifier for a swap offer, unique within an account.
pub type OfferId = String;

/// Identifier for a governance/entity proposal.
pub type ProposalId = Hash32;

/// The hashlock committed to by an HTLC (H(secret)).
pub type HashLock = Hash32;

/// A signature produced by a `SignatureProvider` (§6). Opaque to the core —
/// never interpreted, only passed to `verify`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}b)", self.0.len())
    }
}

/// A public key as produced by a `SignatureProvider` (§6). Opaque to the core.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(pub Vec<u8>);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}b)", self.0.len())
    }
}
