//! `EntityFrame`: one committed step of entity BFT consensus (§4.4, §6).

use serde::{Deserialize, Serialize};
use xln_core::{EntityTx, Hash32, Height, SignerId, Timestamp};

/// An `EntityTx` as it sits in the mempool and in a frame: the admission
/// envelope (signer, nonce) alongside the tx itself. Nonce checking happens
/// once, at mempool admission (§4.4 "every tx's nonce must equal
/// `nonces[signer]+1`"); replaying a committed frame's txs just re-applies
/// them in order, so the envelope travels with the tx rather than living
/// only in the admission call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SignedEntityTx {
    pub signer: SignerId,
    pub nonce: u64,
    pub tx: EntityTx,
}

/// `EntityFrame.hash = H(height || H(concat(tx encodings in order)) ||
/// prevStateHash)` (§6, exact). `prev_state_hash` chains to the previous
/// committed frame's hash, mirroring how `AccountFrame.prevFrameHash` chains
/// account frames.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntityFrame {
    pub height: Height,
    pub timestamp: Timestamp,
    pub txs: Vec<SignedEntityTx>,
    pub prev_state_hash: Hash32,
    pub hash: Hash32,
}

impl EntityFrame {
    pub fn compute_hash(height: Height, txs: &[SignedEntityTx], prev_state_hash: &Hash32) -> Hash32 {
        let txs_bytes = xln_core::canonical::canonical_bytes(&txs.to_vec());
        let txs_hash = xln_crypto::hash(&txs_bytes);
        xln_crypto::hash_concat(&[&height.to_be_bytes(), txs_hash.as_bytes(), prev_state_hash.as_bytes()])
    }
}

/// A frame broadcast by the height's proposer, awaiting precommits (§4.4
/// Propose phase).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProposedEntityFrame {
    pub frame: EntityFrame,
    pub proposer: SignerId,
    pub proposer_signature: xln_core::Signature,
    pub precommits: std::collections::HashMap<SignerId, xln_core::Signature>,
}

impl ProposedEntityFrame {
    pub fn precommit_weight(&self, board: &crate::board::BoardConfig) -> u64 {
        board.weight_of(self.precommits.keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_changes_with_height_and_prev() {
        let txs = vec![SignedEntityTx {
            signer: SignerId("A".into()),
            nonce: 1,
            tx: EntityTx::ChatMessage {
                from: SignerId("A".into()),
                message: "hi".into(),
            },
        }];
        let h1 = EntityFrame::compute_hash(1, &txs, &Hash32::ZERO);
        let h2 = EntityFrame::compute_hash(2, &txs, &Hash32::ZERO);
        assert_ne!(h1, h2);
        let h3 = EntityFrame::compute_hash(1, &txs, &h1);
        assert_ne!(h1, h3);
    }
}
