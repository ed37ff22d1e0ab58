//! Hash-time-locked contracts (§4.3): a conditional transfer on one side of
//! an account that resolves by secret reveal or by timeout.

use serde::{Deserialize, Serialize};
use xln_core::{Amount, Height, HashLock, LockId, TokenId};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LockStatus {
    Pending,
    Revealed,
    TimedOut,
}

/// One HTLC held against a `Delta` on a specific account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HtlcLock {
    pub lock_id: LockId,
    pub token_id: TokenId,
    pub amount: Amount,
    pub hashlock: HashLock,
    /// J-height after which the lock can be timed out unilaterally.
    pub reveal_before_height: Height,
    /// True if this lock holds against the left party's outgoing capacity.
    pub held_from_left: bool,
    pub status: LockStatus,
    pub secret: Option<[u8; 32]>,
}

impl HtlcLock {
    pub fn new(
        lock_id: LockId,
        token_id: TokenId,
        amount: Amount,
        hashlock: HashLock,
        reveal_before_height: Height,
        held_from_left: bool,
    ) -> Self {
        Self {
            lock_id,
            token_id,
            amount,
            hashlock,
            reveal_before_height,
            held_from_left,
            status: LockStatus::Pending,
            secret: None,
        }
    }

    /// Verify a candidate preimage against `hashlock` using H (BLAKE3, §6).
    pub fn secret_matches(&self, candidate: &[u8; 32]) -> bool {
        xln_crypto::hash(candidate) == self.hashlock
    }

    pub fn is_expired(&self, current_j_height: Height) -> bool {
        current_j_height >= self.reveal_before_height
    }
}

/// Default window (in J-heights) before an HTLC becomes timeout-eligible,
/// used whenever `htlcPayment` doesn't specify one explicitly.
pub const DEFAULT_HTLC_TIMEOUT_HEIGHTS: Height = xln_core::constants::DEFAULT_HTLC_TIMEOUT_HEIGHTS;

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn secret_reveal_matches_hashlock() {
        let secret = [7u8; 32];
        let hashlock = xln_crypto::hash(&secret);
        let lock = HtlcLock::new(
            "lock-1".into(),
            1,
            BigInt::from(100),
            hashlock,
            20,
            true,
        );
        assert!(lock.secret_matches(&secret));
        assert!(!lock.secret_matches(&[8u8; 32]));
    }

    #[test]
    fn expiry_is_inclusive_of_the_boundary_height() {
        let lock = HtlcLock::new(
            "lock-1".into(),
            1,
            BigInt::from(1),
            HashLock::ZERO,
            20,
            true,
        );
        assert!(!lock.is_expired(19));
        assert!(lock.is_expired(20));
    }
}
