//! `EntityReplica`: one validator's view of one entity, driving the
//! propose → precommit → commit lifecycle (§4.4).

use xln_core::{Hash32, Height, Signature, SignerId, Timestamp};
use xln_crypto::SignatureProvider;

use crate::dispatch::{apply_entity_tx, EntityOutput};
use crate::error::{EntityError, EntityResult};
use crate::frame::{EntityFrame, ProposedEntityFrame, SignedEntityTx};
use crate::state::EntityState;

/// One validator's replica of an entity. The peer holds a structurally
/// identical, independently owned instance (§5 "each `AccountMachine` is
/// owned by its entity's replica" — the same ownership discipline applies
/// one level up).
pub struct EntityReplica {
    pub signer_id: SignerId,
    pub state: EntityState,
    pub mempool: Vec<SignedEntityTx>,
    /// The frame this replica is currently voting on, if any.
    pub proposal: Option<ProposedEntityFrame>,
    /// Precommit lock (§4.4 Safety): once set for a height, this replica
    /// refuses to sign a different frame at the same height.
    pub locked_frame: Option<(Height, Hash32)>,
    /// Hash of the last *committed* frame, chained into the next proposal's
    /// `prevStateHash` (`Hash32::ZERO` at genesis).
    pub last_frame_hash: Hash32,
}

impl EntityReplica {
    pub fn new(signer_id: SignerId, state: EntityState) -> Self {
        Self {
            signer_id,
            state,
            mempool: Vec::new(),
            proposal: None,
            locked_frame: None,
            last_frame_hash: Hash32::ZERO,
        }
    }

    pub fn is_proposer_for_next_height(&self) -> bool {
        self.state.config.proposer_for_height(self.state.height + 1) == Some(&self.signer_id)
    }

    /// Admit `tx` to the mempool. Full validation (nonce, financial state)
    /// happens again when the frame containing it is applied — `EntityState`
    /// has no cheap way to stage-then-discard a speculative clone, so this
    /// is a lightweight gate (validator membership, expected nonce) rather
    /// than a full dry run; see DESIGN.md.
    pub fn submit(&mut self, signer: SignerId, nonce: u64, tx: xln_core::EntityTx) -> EntityResult<()> {
        if !self.state.config.is_validator(&signer) {
            return Err(EntityError::NotAValidator(signer));
        }
        let queued_max = self
            .mempool
            .iter()
            .filter(|t| t.signer == signer)
            .map(|t| t.nonce)
            .max();
        let base = queued_max.unwrap_or_else(|| self.state.nonces.get(&signer).copied().unwrap_or(0));
        if nonce != base + 1 {
            return Err(EntityError::InvalidNonce {
                signer,
                expected: base + 1,
                got: nonce,
            });
        }
        self.mempool.push(SignedEntityTx { signer, nonce, tx });
        Ok(())
    }

    /// **Propose phase** (§4.4): drain `mempool`, build the frame, sign it,
    /// then independently apply it to our own state just as every other
    /// validator will on precommit (the proposer is a validator too, and
    /// its own precommit counts toward threshold).
    pub fn propose<P: SignatureProvider>(
        &mut self,
        provider: &P,
        timestamp: Timestamp,
    ) -> EntityResult<(ProposedEntityFrame, Vec<EntityOutput>)> {
        if self.proposal.is_some() {
            return Err(EntityError::Other("proposal already pending".into()));
        }
        if self.mempool.is_empty() {
            return Err(EntityError::Other("mempool empty".into()));
        }
        if !self.is_proposer_for_next_height() {
            return Err(EntityError::NotAValidator(self.signer_id.clone()));
        }

        let height = self.state.height + 1;
        let prev_state_hash = self.last_frame_hash;
        let txs = std::mem::take(&mut self.mempool);
        let hash = EntityFrame::compute_hash(height, &txs, &prev_state_hash);

        let mut outputs = Vec::new();
        for signed in &txs {
            match apply_entity_tx(&mut self.state, &signed.signer, signed.tx.clone(), signed.nonce, timestamp, provider)
            {
                Ok(mut out) => outputs.append(&mut out),
                Err(err) => tracing::warn!(?err, "entity tx rejected while proposing"),
            }
        }

        let frame = EntityFrame {
            height,
            timestamp,
            txs,
            prev_state_hash,
            hash,
        };

        let sig = provider
            .sign(&self.signer_id, frame.hash.as_bytes())
            .map_err(|_| EntityError::InvalidSignature)?;

        let mut precommits = std::collections::HashMap::new();
        precommits.insert(self.signer_id.clone(), sig.clone());

        let proposed = ProposedEntityFrame {
            frame,
            proposer: self.signer_id.clone(),
            proposer_signature: sig,
            precommits,
        };
        self.locked_frame = Some((proposed.frame.height, proposed.frame.hash));
        self.proposal = Some(proposed.clone());
        Ok((proposed, outputs))
    }

    /// **Precommit phase** (§4.4): verify `proposed`'s proposer signature
    /// and hash, apply its txs to local state, sign a precommit — unless
    /// this replica is already locked to a different frame at this height.
    pub fn receive_proposal<P: SignatureProvider>(
        &mut self,
        proposed: ProposedEntityFrame,
        provider: &P,
        proposer_public_key: &xln_core::PublicKey,
    ) -> EntityResult<(Signature, Vec<EntityOutput>)> {
        if let Some((height, hash)) = self.locked_frame {
            if height == proposed.frame.height && hash != proposed.frame.hash {
                return Err(EntityError::PrecommitLockViolation {
                    signer: self.signer_id.clone(),
                    height,
                });
            }
        }
        if proposed.frame.height != self.state.height + 1 {
            return Err(EntityError::WrongHeight {
                expected: self.state.height + 1,
                got: proposed.frame.height,
            });
        }
        if proposed.frame.prev_state_hash != self.last_frame_hash {
            return Err(EntityError::ChainMismatch { height: proposed.frame.height });
        }
        if !P::verify(proposer_public_key, proposed.frame.hash.as_bytes(), &proposed.proposer_signature) {
            return Err(EntityError::InvalidSignature);
        }
        let recomputed =
            EntityFrame::compute_hash(proposed.frame.height, &proposed.frame.txs, &proposed.frame.prev_state_hash);
        if recomputed != proposed.frame.hash {
            return Err(EntityError::InvalidSignature);
        }

        let mut outputs = Vec::new();
        for signed in &proposed.frame.txs {
            match apply_entity_tx(
                &mut self.state,
                &signed.signer,
                signed.tx.clone(),
                signed.nonce,
                proposed.frame.timestamp,
                provider,
            ) {
                Ok(mut out) => outputs.append(&mut out),
                Err(err) => tracing::warn!(?err, "entity tx rejected during frame replay"),
            }
        }

        let sig = provider
            .sign(&self.signer_id, proposed.frame.hash.as_bytes())
            .map_err(|_| EntityError::InvalidSignature)?;

        self.locked_frame = Some((proposed.frame.height, proposed.frame.hash));
        self.proposal = Some(proposed);
        Ok((sig, outputs))
    }

    /// Record a peer's precommit signature on the currently pending frame.
    pub fn record_precommit(&mut self, signer: SignerId, sig: Signature) -> EntityResult<()> {
        let proposal = self.proposal.as_mut().ok_or(EntityError::NoPendingProposal)?;
        proposal.precommits.insert(signer, sig);
        Ok(())
    }

    /// **Commit** (§4.4): once collected precommit weight crosses threshold,
    /// finalize the height, clear the lock, and bump `state.height`.
    pub fn try_commit(&mut self) -> EntityResult<bool> {
        let Some(proposal) = &self.proposal else {
            return Ok(false);
        };
        if proposal.precommit_weight(&self.state.config) < self.state.config.threshold {
            return Ok(false);
        }
        let proposal = self.proposal.take().unwrap();
        self.state.height = proposal.frame.height;
        self.state.timestamp = proposal.frame.timestamp;
        self.last_frame_hash = proposal.frame.hash;
        self.locked_frame = None;
        tracing::info!(height = proposal.frame.height, "entity frame committed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardConfig;
    use std::collections::HashMap;
    use xln_core::EntityId;
    use xln_crypto::DilithiumKeyStore;

    fn two_validator_board(a: &SignerId, b: &SignerId) -> BoardConfig {
        let mut shares = HashMap::new();
        shares.insert(a.clone(), 1);
        shares.insert(b.clone(), 1);
        BoardConfig::new(vec![a.clone(), b.clone()], shares, 2)
    }

    #[test]
    fn propose_precommit_commit_round_trip() {
        let entity_id = EntityId::from_bytes([1u8; 32]);
        let a = SignerId("a".into());
        let b = SignerId("b".into());
        let config = two_validator_board(&a, &b);

        let mut store = DilithiumKeyStore::new();
        store.generate(a.clone());
        store.generate(b.clone());

        // `proposer_for_height(1)` rotates to validators[1] == b.
        let mut proposer = EntityReplica::new(b.clone(), EntityState::new(entity_id.clone(), config.clone()));
        let mut follower = EntityReplica::new(a.clone(), EntityState::new(entity_id, config));

        proposer
            .submit(
                b.clone(),
                1,
                xln_core::EntityTx::ChatMessage {
                    from: b.clone(),
                    message: "hi".into(),
                },
            )
            .unwrap();

        let (proposed, _) = proposer.propose(&store, 100).unwrap();
        let b_pubkey = store.public_key(&b).unwrap();

        let (follower_sig, _) = follower.receive_proposal(proposed.clone(), &store, &b_pubkey).unwrap();
        proposer.record_precommit(a.clone(), follower_sig).unwrap();

        assert!(proposer.try_commit().unwrap());
        assert_eq!(proposer.state.height, 1);
        assert_eq!(proposer.state.message_log, vec!["hi".to_string()]);
    }
}
