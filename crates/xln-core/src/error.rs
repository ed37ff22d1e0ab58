use thiserror::Error;

/// Error taxonomy shared across layers (§7). Each subsystem crate wraps or
/// extends this with its own local variants; this is the common vocabulary
/// that can cross a layer boundary (e.g. an `AccountError` surfaced up
/// through an `EntityError`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    // ── Delta algebra ────────────────────────────────────────────────────────
    #[error("insufficient capacity: need {need}, have {have}")]
    InsufficientCapacity { need: String, have: String },

    #[error("overflow would occur applying amount {amount}")]
    OverflowWouldOccur { amount: String },

    #[error("credit limit exceeded: limit {limit}, requested {requested}")]
    CreditLimitExceeded { limit: String, requested: String },

    #[error("capacity safety invariant violated: |delta|={delta} exceeds bound {bound}")]
    CapacitySafetyViolated { delta: String, bound: String },

    #[error("unknown token: {0}")]
    UnknownToken(TokenId),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    // ── Admission / nonce ────────────────────────────────────────────────────
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("invalid signature")]
    InvalidSignature,

    // ── Serialization ────────────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

use crate::types::TokenId;

pub type CoreResult<T> = Result<T, CoreError>;
