//! The deterministic hash function H (§6): BLAKE3, used uniformly for frame
//! hashes, proof bodies, and Hanko digests.

use xln_core::Hash32;

/// `H(bytes) -> 32B`.
pub fn hash(data: &[u8]) -> Hash32 {
    Hash32(*blake3::hash(data).as_bytes())
}

/// `H` over the concatenation of several byte slices, without an
/// intermediate allocation per slice — used for composite hash inputs like
/// `EntityFrame.hash = H(height || H(concat(tx encodings)) || prevStateHash)`.
pub fn hash_concat(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Hash32(*hasher.finalize().as_bytes())
}
