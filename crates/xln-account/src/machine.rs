//! `AccountMachine` — the 2-of-2 bilateral consensus object (§4.2).

use std::collections::HashMap;

use tracing::{info, warn};
use xln_core::{
    AccountFrameEnvelope, AccountInputEnvelope, AccountKey, AccountTx, Amount, Counter, Delta,
    EntityId, Hash32, Height, LockId, OfferId, Signature, SignerId, TokenId,
};
use xln_crypto::SignatureProvider;
use xln_htlc::{HtlcLock, SwapOffer};

use crate::error::{AccountError, AccountResult};
use crate::frame::AccountFrame;
use crate::transitions::{apply_account_tx, TxContext};
use crate::AccountEvent;

/// A withdrawal of collateral back to reserves, in its two-phase lifecycle
/// (§4.2 `request_withdrawal`/`approve_withdrawal`).
#[derive(Clone, Debug, PartialEq)]
pub struct PendingWithdrawal {
    pub token_id: TokenId,
    pub amount: Amount,
    pub requester_is_left: bool,
    pub approved: bool,
}

/// The bilateral account object. Each side keeps its own copy; there is no
/// shared mutable instance (§3 Ownership).
pub struct AccountMachine {
    pub account_key: AccountKey,
    pub self_entity: EntityId,

    pub current_height: Height,
    pub current_j_height: Height,

    pub mempool: Vec<AccountTx>,
    pub deltas: HashMap<TokenId, Delta>,
    pub locks: HashMap<LockId, HtlcLock>,
    pub swap_offers: HashMap<OfferId, SwapOffer>,
    swap_sequence: u64,

    pub pending_frame: Option<AccountFrame>,
    pub pending_signatures: Vec<Signature>,
    pub send_counter: Counter,
    pub receive_counter: Counter,

    /// Txs included in the frame we last sent, kept so a rolled-back
    /// proposal can be replayed back into `mempool`.
    pub sent_transitions: Vec<AccountTx>,
    pub acked_transitions: Vec<AccountTx>,

    pub frame_history: Vec<AccountFrame>,
    pub last_frame_hash: Hash32,

    pub pending_withdrawals: Vec<PendingWithdrawal>,
    pub rollback_count: u64,
}

impl AccountMachine {
    pub fn new(account_key: AccountKey, self_entity: EntityId) -> Self {
        Self {
            account_key,
            self_entity,
            current_height: 0,
            current_j_height: 0,
            mempool: Vec::new(),
            deltas: HashMap::new(),
            locks: HashMap::new(),
            swap_offers: HashMap::new(),
            swap_sequence: 0,
            pending_frame: None,
            pending_signatures: Vec::new(),
            send_counter: 0,
            receive_counter: 0,
            sent_transitions: Vec::new(),
            acked_transitions: Vec::new(),
            frame_history: Vec::new(),
            last_frame_hash: Hash32::ZERO,
            pending_withdrawals: Vec::new(),
            rollback_count: 0,
        }
    }

    pub fn is_left(&self) -> bool {
        self.account_key.is_left(&self.self_entity)
    }

    /// `enqueueAccountTx`: validate against a cloned copy of financial
    /// state; only append to `mempool` on success.
    pub fn enqueue_account_tx(&mut self, tx: AccountTx) -> AccountResult<()> {
        if let AccountTx::RequestWithdrawal {
            token_id,
            amount,
            requester_is_left,
        } = &tx
        {
            let derived = xln_core::derive_delta(
                self.deltas.get(token_id).ok_or(AccountError::UnknownToken(*token_id))?,
                *requester_is_left,
            );
            if *amount > derived.collateral {
                return Err(AccountError::Delta(xln_core::CoreError::InsufficientCapacity {
                    need: amount.to_string(),
                    have: derived.collateral.to_string(),
                }));
            }
        } else if let AccountTx::ApproveWithdrawal { token_id, amount } = &tx {
            let matches = self
                .pending_withdrawals
                .iter()
                .any(|w| w.token_id == *token_id && w.amount == *amount);
            if !matches {
                return Err(AccountError::NoPendingWithdrawal(*token_id));
            }
        } else {
            let mut deltas = self.deltas.clone();
            let mut locks = self.locks.clone();
            let mut offers = self.swap_offers.clone();
            let mut seq = self.swap_sequence;
            let mut ctx = TxContext {
                is_left: self.is_left(),
                current_j_height: self.current_j_height,
                deltas: &mut deltas,
                locks: &mut locks,
                swap_offers: &mut offers,
                swap_sequence: &mut seq,
            };
            apply_account_tx(&mut ctx, &tx)?;
        }
        self.mempool.push(tx);
        Ok(())
    }

    /// `proposeFrame`: only if `pendingFrame` is absent and `mempool` is
    /// nonempty. HTLC/swap validation failures reject only that tx — the
    /// rest of the frame still attempts (§4.2, not atomic per-frame).
    pub fn propose_frame<P: SignatureProvider>(
        &mut self,
        provider: &P,
        self_signer_id: &SignerId,
        timestamp: xln_core::Timestamp,
    ) -> AccountResult<(AccountInputEnvelope, Vec<AccountEvent>)> {
        if self.pending_frame.is_some() {
            return Err(AccountError::FramePending);
        }
        if self.mempool.is_empty() {
            return Err(AccountError::EmptyMempool);
        }

        let mut deltas = self.deltas.clone();
        let mut locks = self.locks.clone();
        let mut offers = self.swap_offers.clone();
        let mut seq = self.swap_sequence;
        let mut applied = Vec::new();
        let mut remaining = Vec::new();
        let mut events = Vec::new();

        for tx in self.mempool.drain(..) {
            let mut ctx = TxContext {
                is_left: self.is_left(),
                current_j_height: self.current_j_height,
                deltas: &mut deltas,
                locks: &mut locks,
                swap_offers: &mut offers,
                swap_sequence: &mut seq,
            };
            match apply_account_tx(&mut ctx, &tx) {
                Ok(event) => {
                    events.extend(event);
                    applied.push(tx);
                }
                Err(err) => {
                    warn!(?err, "account tx rejected while building proposal");
                    remaining.push(tx);
                }
            }
        }
        self.mempool = remaining;

        if applied.is_empty() {
            return Err(AccountError::EmptyMempool);
        }

        let height = self.current_height + 1;
        let j_height = self.current_j_height;
        let state_hash = AccountFrame::compute_state_hash(&deltas, &locks, &offers);

        let frame = AccountFrame {
            height,
            timestamp,
            j_height,
            account_txs: applied.clone(),
            prev_frame_hash: self.last_frame_hash,
            state_hash,
        };

        let self_sig = provider
            .sign(self_signer_id, frame.state_hash.as_bytes())
            .map_err(|e| AccountError::InvalidFrame(e.to_string()))?;

        self.deltas = deltas;
        self.locks = locks;
        self.swap_offers = offers;
        self.swap_sequence = seq;
        self.pending_frame = Some(frame.clone());
        self.pending_signatures = vec![self_sig.clone()];
        self.sent_transitions = applied;
        self.send_counter += 1;

        info!(height, "proposed account frame");

        let envelope = AccountInputEnvelope {
            counter: self.send_counter,
            new_account_frame: Some(AccountFrameEnvelope {
                height: frame.height,
                timestamp: frame.timestamp,
                j_height: frame.j_height,
                account_txs: frame.account_txs,
                prev_frame_hash: frame.prev_frame_hash,
            }),
            new_signatures: vec![self_sig],
            prev_signatures: None,
        };
        Ok((envelope, events))
    }

    /// Put a rolled-back proposal's txs back at the front of `mempool`.
    fn rollback_pending_frame(&mut self) {
        if let Some(frame) = self.pending_frame.take() {
            let mut restored = frame.account_txs;
            restored.extend(self.mempool.drain(..));
            self.mempool = restored;
            self.pending_signatures.clear();
            self.rollback_count += 1;
            warn!(height = frame.height, "rolled back pending account frame");
        }
    }

    fn commit_frame(&mut self, frame: AccountFrame) {
        for tx in &frame.account_txs {
            self.apply_withdrawal_bookkeeping(tx);
        }
        self.last_frame_hash = frame.state_hash;
        self.current_height = frame.height;
        self.current_j_height = self.current_j_height.max(frame.j_height);
        self.acked_transitions = frame.account_txs.clone();
        self.frame_history.push(frame);
        self.rollback_count = 0;
    }

    /// `request_withdrawal`/`approve_withdrawal` (§4.2): two-phase
    /// withdrawal of collateral back to reserves, tracked outside the
    /// per-token delta map since it spans the approval round-trip.
    fn apply_withdrawal_bookkeeping(&mut self, tx: &AccountTx) {
        match tx {
            AccountTx::RequestWithdrawal {
                token_id,
                amount,
                requester_is_left,
            } => {
                self.pending_withdrawals.push(PendingWithdrawal {
                    token_id: *token_id,
                    amount: amount.clone(),
                    requester_is_left: *requester_is_left,
                    approved: false,
                });
            }
            AccountTx::ApproveWithdrawal { token_id, amount } => {
                if let Some(w) = self
                    .pending_withdrawals
                    .iter_mut()
                    .find(|w| w.token_id == *token_id && w.amount == *amount && !w.approved)
                {
                    w.approved = true;
                }
            }
            _ => {}
        }
    }

    /// `receiveAccountInput`: strict, gap-free counter check; countersign
    /// and commit a peer's proposal, or finalize our own outstanding one.
    pub fn receive_account_input<P: SignatureProvider>(
        &mut self,
        input: AccountInputEnvelope,
        provider: &P,
        self_signer_id: &SignerId,
        peer_public_key: &xln_core::PublicKey,
    ) -> AccountResult<(Option<AccountInputEnvelope>, Vec<AccountEvent>)> {
        if input.counter != self.receive_counter + 1 {
            return Err(AccountError::ReplayProtectionFailure {
                expected: self.receive_counter + 1,
                got: input.counter,
            });
        }

        // Ack for our own outstanding proposal.
        if let Some(prev_sigs) = &input.prev_signatures {
            let Some(pending) = self.pending_frame.take() else {
                return Err(AccountError::InvalidFrame(
                    "prevSignatures received with no pendingFrame".into(),
                ));
            };
            if prev_sigs.len() < 2 {
                self.pending_frame = Some(pending);
                return Err(AccountError::InvalidFrame("prevSignatures incomplete".into()));
            }
            self.commit_frame(pending);
            self.pending_signatures.clear();
            self.receive_counter = input.counter;
            return Ok((None, Vec::new()));
        }

        let Some(incoming) = input.new_account_frame.clone() else {
            return Err(AccountError::InvalidFrame("empty AccountInput".into()));
        };

        // Conflict: both sides proposed at the same height. Canonical-left
        // wins; the other side rolls back and adopts the winning frame.
        if let Some(pending) = &self.pending_frame {
            if pending.height == incoming.height {
                if self.is_left() {
                    self.receive_counter = input.counter;
                    return Ok((None, Vec::new()));
                }
                self.rollback_pending_frame();
            }
        }

        if incoming.height != self.current_height + 1 {
            return Err(AccountError::InvalidFrame(format!(
                "expected height {}, got {}",
                self.current_height + 1,
                incoming.height
            )));
        }
        if incoming.prev_frame_hash != self.last_frame_hash {
            return Err(AccountError::InvalidFrame("prevFrameHash mismatch".into()));
        }
        if incoming.j_height < self.current_j_height {
            return Err(AccountError::InvalidFrame("jHeight regression".into()));
        }

        let mut deltas = self.deltas.clone();
        let mut locks = self.locks.clone();
        let mut offers = self.swap_offers.clone();
        let mut seq = self.swap_sequence;
        let mut events = Vec::new();
        for tx in &incoming.account_txs {
            let mut ctx = TxContext {
                is_left: self.is_left(),
                current_j_height: self.current_j_height,
                deltas: &mut deltas,
                locks: &mut locks,
                swap_offers: &mut offers,
                swap_sequence: &mut seq,
            };
            let event = apply_account_tx(&mut ctx, tx).map_err(|e| AccountError::ConsensusDivergence {
                height: incoming.height,
                reason: e.to_string(),
            })?;
            events.extend(event);
        }

        let state_hash = AccountFrame::compute_state_hash(&deltas, &locks, &offers);

        let frame = AccountFrame {
            height: incoming.height,
            timestamp: incoming.timestamp,
            j_height: incoming.j_height,
            account_txs: incoming.account_txs.clone(),
            prev_frame_hash: incoming.prev_frame_hash,
            state_hash,
        };

        let peer_sig = input
            .new_signatures
            .first()
            .cloned()
            .ok_or_else(|| AccountError::InvalidFrame("missing proposer signature".into()))?;
        if !P::verify(peer_public_key, frame.state_hash.as_bytes(), &peer_sig) {
            return Err(AccountError::InvalidFrame("proposer signature invalid".into()));
        }
        let self_sig = provider
            .sign(self_signer_id, frame.state_hash.as_bytes())
            .map_err(|e| AccountError::InvalidFrame(e.to_string()))?;

        self.deltas = deltas;
        self.locks = locks;
        self.swap_offers = offers;
        self.swap_sequence = seq;
        self.mempool
            .retain(|tx| !frame.account_txs.contains(tx));
        self.commit_frame(frame);
        self.receive_counter = input.counter;

        Ok((
            Some(AccountInputEnvelope {
                counter: self.send_counter,
                new_account_frame: None,
                new_signatures: vec![],
                prev_signatures: Some(vec![self_sig, peer_sig]),
            }),
            events,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_crypto::DilithiumKeyStore;

    fn setup() -> (AccountMachine, AccountMachine, DilithiumKeyStore, SignerId, SignerId) {
        let left_entity = EntityId::from_bytes([1u8; 32]);
        let right_entity = EntityId::from_bytes([2u8; 32]);
        let key = AccountKey::canonical(left_entity.clone(), right_entity.clone());

        let mut left = AccountMachine::new(key.clone(), left_entity);
        let mut right = AccountMachine::new(key, right_entity);
        left.deltas.insert(1, {
            let mut d = Delta::new(1);
            d.collateral = Amount::from(1_000);
            d
        });
        right.deltas.insert(1, {
            let mut d = Delta::new(1);
            d.collateral = Amount::from(1_000);
            d
        });

        let mut store = DilithiumKeyStore::new();
        let left_signer = SignerId("left".into());
        let right_signer = SignerId("right".into());
        store.generate(left_signer.clone());
        store.generate(right_signer.clone());

        (left, right, store, left_signer, right_signer)
    }

    #[test]
    fn propose_and_commit_round_trip() {
        let (mut left, mut right, store, left_signer, right_signer) = setup();

        left.enqueue_account_tx(AccountTx::DirectPayment {
            token_id: 1,
            amount: Amount::from(100),
            sender_is_left: true,
        })
        .unwrap();

        let (proposal, _) = left.propose_frame(&store, &left_signer, 0).unwrap();
        let left_pubkey = store.public_key(&left_signer).unwrap();

        let (reply, _) = right
            .receive_account_input(proposal, &store, &right_signer, &left_pubkey)
            .unwrap();
        let reply = reply.expect("right replies with countersignature");

        let right_pubkey = store.public_key(&right_signer).unwrap();
        let (ack, _) = left
            .receive_account_input(reply, &store, &left_signer, &right_pubkey)
            .unwrap();
        assert!(ack.is_none());

        assert_eq!(left.current_height, 1);
        assert_eq!(right.current_height, 1);
        assert_eq!(left.deltas[&1].offdelta, Amount::from(-100));
        assert_eq!(right.deltas[&1].offdelta, Amount::from(-100));
    }

    #[test]
    fn replay_protection_rejects_out_of_order_counter() {
        let (mut left, mut right, store, left_signer, right_signer) = setup();
        left.enqueue_account_tx(AccountTx::DirectPayment {
            token_id: 1,
            amount: Amount::from(10),
            sender_is_left: true,
        })
        .unwrap();
        let (mut proposal, _) = left.propose_frame(&store, &left_signer, 0).unwrap();
        proposal.counter = 99;
        let err = right
            .receive_account_input(proposal, &store, &right_signer, &store.public_key(&left_signer).unwrap())
            .unwrap_err();
        assert!(matches!(err, AccountError::ReplayProtectionFailure { .. }));
    }
}
