//! Canonical byte encoding helpers (§6: "serialization MUST preserve map
//! insertion order where semantically significant"). Every hash input in the
//! system is built by sorting first, then `bincode`-serializing the sorted
//! `Vec` — never by iterating a `HashMap` directly, whose order is
//! unspecified.

use serde::Serialize;

/// Serialize `value` to its canonical byte form for hashing/signing.
/// Infallible for the plain-data types used throughout this crate — a
/// serialization failure here would indicate a programming error, not a
/// recoverable condition, matching the teacher's `body_bytes` contract.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    bincode::serialize(value).expect("canonical encoding is infallible for core data types")
}

/// Sort a `Vec` of `(key, value)` pairs by key and return just the values,
/// for composing deterministic hash inputs out of map-like collections
/// (`sort_by_tokenId`, `sort_by_lockId`, `sort_by_offerId`, §6).
pub fn sorted_by_key<K: Ord + Clone, V: Clone>(mut pairs: Vec<(K, V)>) -> Vec<V> {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs.into_iter().map(|(_, v)| v).collect()
}
