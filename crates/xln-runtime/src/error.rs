use thiserror::Error;
use xln_core::EntityId;

/// Error taxonomy for the runtime layer (§4.7, §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("no replica registered for entity {0} / signer {1}")]
    UnknownReplica(EntityId, xln_core::SignerId),

    #[error("no jurisdiction registered with id {0}")]
    UnknownJurisdiction(String),

    #[error("entity consensus error: {0}")]
    Entity(#[from] xln_entity::EntityError),

    #[error("jurisdiction error: {0}")]
    Jurisdiction(#[from] xln_jurisdiction::JurisdictionError),

    #[error("signature provider error for signer {0}")]
    Signature(xln_core::SignerId),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
