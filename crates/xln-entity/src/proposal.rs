//! Governance proposals and vote tallying (§3 `Proposal`, §4.4 `propose`/`vote`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xln_core::{EntityTx, ProposalId, SignerId, Timestamp, VoteChoice};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProposalStatus {
    Pending,
    Executed,
    Rejected,
}

/// `{id = H(action||proposer), proposer, action, votes, status, created}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: SignerId,
    pub action: Box<EntityTx>,
    pub votes: HashMap<SignerId, VoteChoice>,
    pub status: ProposalStatus,
    pub created: Timestamp,
}

impl Proposal {
    pub fn new(id: ProposalId, proposer: SignerId, action: EntityTx, created: Timestamp) -> Self {
        Self {
            id,
            proposer,
            action: Box::new(action),
            votes: HashMap::new(),
            status: ProposalStatus::Pending,
            created,
        }
    }

    /// `id = H(action||proposer,timestamp)`: deterministic identity so every
    /// replica that sees the same `propose` tx computes the same id.
    pub fn compute_id(action: &EntityTx, proposer: &SignerId, timestamp: Timestamp) -> ProposalId {
        let bytes = xln_core::canonical::canonical_bytes(&(action, proposer, timestamp));
        xln_crypto::hash(&bytes)
    }

    pub fn yes_voters(&self) -> impl Iterator<Item = &SignerId> {
        self.votes
            .iter()
            .filter(|(_, choice)| **choice == VoteChoice::Yes)
            .map(|(signer, _)| signer)
    }
}
