//! xln-entity — entity BFT consensus (§4.4), J-block observation (§4.5),
//! and the `EntityState`/`EntityReplica` data model (§3) built on top of
//! `xln-account`'s bilateral accounts and `xln-htlc`'s routing/swap types.

pub mod board;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod jblock;
pub mod proposal;
pub mod replica;
pub mod state;

pub use board::{BoardConfig, ConsensusMode};
pub use dispatch::{account_signer_id, apply_entity_tx, EntityOutput};
pub use error::{EntityError, EntityResult};
pub use frame::{EntityFrame, ProposedEntityFrame, SignedEntityTx};
pub use jblock::{JBlockFinalized, JBlockObservationTracker, ObservedBlock};
pub use proposal::{Proposal, ProposalStatus};
pub use replica::EntityReplica;
pub use state::{EntityState, OrderbookExt};
