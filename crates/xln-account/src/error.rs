//! ─── Account Machine Errors ──────────────────────────────────────────────────

use thiserror::Error;
use xln_core::{Counter, CoreError, Height, LockId, OfferId, TokenId};

#[derive(Debug, Error)]
pub enum AccountError {
    // ── Delta algebra (propagated from xln-core) ──────────────────────────────
    #[error(transparent)]
    Delta(#[from] CoreError),

    // ── Frame lifecycle ────────────────────────────────────────────────────────
    #[error("a frame is already pending; cannot propose another")]
    FramePending,

    #[error("mempool is empty; nothing to propose")]
    EmptyMempool,

    #[error("replay protection failure: expected counter {expected}, got {got}")]
    ReplayProtectionFailure { expected: Counter, got: Counter },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("consensus divergence at height {height}: {reason}")]
    ConsensusDivergence { height: Height, reason: String },

    // ── Token/lock/offer lookups ───────────────────────────────────────────────
    #[error("unknown token: {0}")]
    UnknownToken(TokenId),

    #[error("unknown lock: {0}")]
    UnknownLock(LockId),

    #[error("unknown offer: {0}")]
    UnknownOffer(OfferId),

    // ── HTLC ────────────────────────────────────────────────────────────────────
    #[error("hashlock mismatch for lock {0}")]
    HtlcHashMismatch(LockId),

    #[error("htlc lock {lock_id} not yet expired (current jHeight {current}, reveals before {reveal_before})")]
    HtlcNotExpired {
        lock_id: LockId,
        current: Height,
        reveal_before: Height,
    },

    // ── Swap ────────────────────────────────────────────────────────────────────
    #[error("fill ratio {got} below offer minimum {min}")]
    FillRatioBelowMinimum { got: u32, min: u32 },

    #[error("swap offer {0} is not owned by the caller")]
    NotOfferOwner(OfferId),

    // ── Withdrawal ──────────────────────────────────────────────────────────────
    #[error("no pending withdrawal matching request for token {0}")]
    NoPendingWithdrawal(TokenId),
}

pub type AccountResult<T> = Result<T, AccountError>;
