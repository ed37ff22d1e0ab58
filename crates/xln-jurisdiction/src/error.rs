use thiserror::Error;
use xln_core::{EntityId, TokenId};

/// Error taxonomy for the jurisdiction layer (§4.6, §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JurisdictionError {
    // ── Batch application ────────────────────────────────────────────────────
    #[error("batch rejected: {reason}")]
    BatchRejected { reason: String },

    #[error("insufficient reserves for {entity_id} token {token_id}: need {need}, have {have}")]
    InsufficientReserves {
        entity_id: EntityId,
        token_id: TokenId,
        need: String,
        have: String,
    },

    #[error("entity {0} is not registered with this jurisdiction")]
    UnregisteredEntity(EntityId),

    // ── Block production ─────────────────────────────────────────────────────
    #[error("block {0} already produced")]
    DuplicateBlock(xln_core::Height),

    #[error("{0}")]
    Other(String),
}

pub type JurisdictionResult<T> = Result<T, JurisdictionError>;
