//! xln-crypto — the deterministic hash function H, the `SignatureProvider`
//! contract (§6), and Hanko threshold-signature aggregation (§4.8).
//!
//! Mirrors the teacher's `chronx-crypto`: hashing, keypairs, and signing
//! live in one crate below every consensus-bearing layer, so
//! `xln-account`/`xln-entity`/`xln-jurisdiction` depend on a signature
//! contract rather than a concrete key-management scheme.

pub mod hanko;
pub mod hash;
pub mod provider;

pub use hanko::{
    verify_hanko_for_hash, Hanko, HankoClaim, HankoVerification, PackedSignature, Principal,
    PublicKeyLookup, QuorumSource,
};
pub use hash::{hash, hash_concat};
pub use provider::{DilithiumKeyStore, SignatureError, SignatureProvider};
