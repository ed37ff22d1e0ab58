use thiserror::Error;
use xln_core::{Height, ProposalId, SignerId};

/// Error taxonomy for the entity layer (§4.4, §4.5, §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EntityError {
    // ── Admission ────────────────────────────────────────────────────────────
    #[error("invalid nonce for signer {signer}: expected {expected}, got {got}")]
    InvalidNonce {
        signer: SignerId,
        expected: u64,
        got: u64,
    },

    #[error("message exceeds maximum length")]
    MessageTooLong,

    #[error("{0} is not a validator on this entity's board")]
    NotAValidator(SignerId),

    // ── Consensus ────────────────────────────────────────────────────────────
    #[error("frame rejected: expected height {expected}, got {got}")]
    WrongHeight { expected: Height, got: Height },

    #[error("prevStateHash mismatch for proposed frame at height {height}")]
    ChainMismatch { height: Height },

    #[error("signer {signer} is locked to a different frame at height {height}")]
    PrecommitLockViolation { signer: SignerId, height: Height },

    #[error("invalid proposer signature on proposed frame")]
    InvalidSignature,

    #[error("no proposal pending at this replica")]
    NoPendingProposal,

    // ── Proposals / votes ────────────────────────────────────────────────────
    #[error("unknown proposal {0:?}")]
    UnknownProposal(ProposalId),

    #[error("proposal {0:?} already finalized")]
    ProposalAlreadyFinalized(ProposalId),

    // ── Accounts ──────────────────────────────────────────────────────────────
    #[error("no account open with counterparty")]
    UnknownAccount,

    #[error("account error: {0}")]
    Account(#[from] xln_account::AccountError),

    #[error("htlc route for hashlock not found")]
    UnknownHtlcRoute,

    // ── J-Block observation (§4.5) ───────────────────────────────────────────
    #[error(
        "J-block fork detected at height {height}: signers disagree on (hash, events)"
    )]
    JBlockForkDetected { height: Height },

    #[error("observation for height {height} is below lastFinalizedJHeight {last_finalized}")]
    StaleJObservation { height: Height, last_finalized: Height },

    // ── Reserves / settlement ─────────────────────────────────────────────────
    #[error("insufficient reserves for token {token_id}: need {need}, have {have}")]
    InsufficientReserves {
        token_id: xln_core::TokenId,
        need: String,
        have: String,
    },

    #[error("{0}")]
    Other(String),
}

pub type EntityResult<T> = Result<T, EntityError>;
