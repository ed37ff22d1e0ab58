//! Entity transaction dispatch (§4.4): admits one signer-authored
//! `EntityTx` against `nonces`, then applies its effect to `EntityState`.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use xln_core::{
    AccountInputEnvelope, AccountKey, AccountTx, EntityId, EntityTx, JBatchOp, JTx,
    SettlementDiff, SignerId, Timestamp, VoteChoice,
};
use xln_crypto::SignatureProvider;
use xln_htlc::HtlcRoute;

use crate::error::{EntityError, EntityResult};
use crate::jblock::ObservedBlock;
use crate::proposal::{Proposal, ProposalStatus};
use crate::state::EntityState;

const MAX_CHAT_MESSAGE_LEN: usize = 4096;

/// Something the replica hands back to the runtime for delivery elsewhere
/// (§4.7 step 5/6): another entity's mempool, or a jurisdiction's.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum EntityOutput {
    EntityInput { target_entity: EntityId, tx: EntityTx },
    JInput { jurisdiction_id: String, j_tx: JTx },
}

/// Every entity is its own bilateral-account signer, keyed off its own id —
/// a single-process simplification (accounts are entity-to-entity, but
/// `SignatureProvider` is keyed by `SignerId`); see DESIGN.md.
pub fn account_signer_id(entity: &EntityId) -> SignerId {
    SignerId(entity.to_hex())
}

/// Admit + apply one `EntityTx` authored by `signer` (§4.4). Nonce is
/// checked here: it must be exactly `nonces[signer] + 1`, gap-free.
pub fn apply_entity_tx<P: SignatureProvider>(
    state: &mut EntityState,
    signer: &SignerId,
    tx: EntityTx,
    nonce: u64,
    timestamp: Timestamp,
    provider: &P,
) -> EntityResult<Vec<EntityOutput>> {
    if !state.config.is_validator(signer) {
        return Err(EntityError::NotAValidator(signer.clone()));
    }
    let expected = state.nonces.get(signer).copied().unwrap_or(0) + 1;
    if nonce != expected {
        return Err(EntityError::InvalidNonce {
            signer: signer.clone(),
            expected,
            got: nonce,
        });
    }

    // The nonce slot is consumed as soon as admission succeeds (§7: only
    // `InvalidNonce` itself withholds advancement) — a tx that fails for
    // some other reason still occupied this signer's nonce.
    state.nonces.insert(signer.clone(), nonce);
    dispatch(state, signer, tx, timestamp, provider)
}

/// Apply `tx`'s effect with no admission check — used both for directly
/// admitted txs and for executing a `Proposal.action` once it crosses
/// threshold (§4.4 `vote`).
fn dispatch<P: SignatureProvider>(
    state: &mut EntityState,
    signer: &SignerId,
    tx: EntityTx,
    timestamp: Timestamp,
    provider: &P,
) -> EntityResult<Vec<EntityOutput>> {
    match tx {
        EntityTx::ChatMessage { from, message } => {
            if message.len() > MAX_CHAT_MESSAGE_LEN {
                return Err(EntityError::MessageTooLong);
            }
            tracing::debug!(%from, "chat message appended");
            state.message_log.push(message);
            Ok(Vec::new())
        }

        EntityTx::Propose {
            proposer,
            action,
            timestamp: proposed_at,
        } => {
            let id = Proposal::compute_id(&action, &proposer, proposed_at);
            state
                .proposals
                .entry(id)
                .or_insert_with(|| Proposal::new(id, proposer, *action, proposed_at));
            Ok(Vec::new())
        }

        EntityTx::Vote {
            proposal_id,
            voter,
            choice,
        } => apply_vote(state, proposal_id, voter, choice, timestamp, provider),

        EntityTx::ProfileUpdate { field, value } => {
            state.profile.insert(field, value);
            Ok(Vec::new())
        }

        EntityTx::JEvent {
            signer: reporter,
            block_number,
            block_hash,
            events,
            observed_at,
        } => apply_j_event(state, reporter, block_number, block_hash, events, observed_at),

        EntityTx::OpenAccount { target_entity_id } => {
            let key = AccountKey::canonical(state.entity_id.clone(), target_entity_id);
            state
                .accounts
                .entry(key.clone())
                .or_insert_with(|| xln_account::AccountMachine::new(key, state.entity_id.clone()));
            Ok(Vec::new())
        }

        EntityTx::AccountInputTx { account, input } => {
            apply_account_input(state, account, input, provider)
        }

        EntityTx::DirectPayment {
            target,
            token_id,
            amount,
            route: _,
        } => {
            let sender_is_left = state.account_key_with(&target).is_left(&state.entity_id);
            let machine = state
                .accounts
                .get_mut(&state.account_key_with(&target))
                .ok_or(EntityError::UnknownAccount)?;
            machine.enqueue_account_tx(AccountTx::DirectPayment {
                token_id,
                amount,
                sender_is_left,
            })?;
            Ok(Vec::new())
        }

        EntityTx::HtlcPayment {
            target,
            token_id,
            amount,
            route,
            hashlock,
            secret,
        } => apply_htlc_payment(state, target, token_id, amount, route, hashlock, secret),

        EntityTx::RequestWithdrawal {
            counterparty,
            token_id,
            amount,
        } => {
            let requester_is_left = state.account_key_with(&counterparty).is_left(&state.entity_id);
            let machine = state
                .accounts
                .get_mut(&state.account_key_with(&counterparty))
                .ok_or(EntityError::UnknownAccount)?;
            machine.enqueue_account_tx(AccountTx::RequestWithdrawal {
                token_id,
                amount,
                requester_is_left,
            })?;
            Ok(Vec::new())
        }

        EntityTx::SettleDiffs { counterparty, diffs } | EntityTx::CreateSettlement { counterparty, diffs } => {
            let key = state.account_key_with(&counterparty);
            state.j_batch_state.push(JBatchOp::Settle {
                left: key.left.clone(),
                right: key.right.clone(),
                diffs,
            });
            Ok(Vec::new())
        }

        EntityTx::DepositCollateral {
            counterparty,
            token_id,
            amount,
        } => {
            let key = state.account_key_with(&counterparty);
            state.j_batch_state.push(JBatchOp::Settle {
                left: key.left.clone(),
                right: key.right.clone(),
                diffs: vec![SettlementDiff {
                    token_id,
                    collateral_delta: amount,
                    ondelta_delta: xln_core::Amount::from(0),
                }],
            });
            Ok(Vec::new())
        }

        EntityTx::ReserveToReserve { to, token_id, amount } => {
            let have = state
                .reserves
                .get(&token_id)
                .cloned()
                .unwrap_or_else(|| xln_core::Amount::from(0));
            if have < amount {
                return Err(EntityError::InsufficientReserves {
                    token_id,
                    need: amount.to_string(),
                    have: have.to_string(),
                });
            }
            state.reserves.insert(token_id, have - amount.clone());
            state.j_batch_state.push(JBatchOp::ReserveToReserve {
                from: state.entity_id.clone(),
                to,
                token_id,
                amount,
            });
            Ok(Vec::new())
        }

        EntityTx::JBroadcast { hanko_signature } => {
            if state.j_batch_state.is_empty() {
                return Ok(Vec::new());
            }
            let ops = std::mem::take(&mut state.j_batch_state);
            Ok(vec![EntityOutput::JInput {
                jurisdiction_id: "default".into(),
                j_tx: JTx::Batch {
                    from: state.entity_id.clone(),
                    ops,
                    hanko_signature,
                },
            }])
        }

        EntityTx::ExtendCredit {
            counterparty,
            token_id,
            side_is_left,
            amount,
        } => {
            let machine = state
                .accounts
                .get_mut(&state.account_key_with(&counterparty))
                .ok_or(EntityError::UnknownAccount)?;
            machine.enqueue_account_tx(AccountTx::SetCreditLimit {
                side_is_left,
                token_id,
                amount,
            })?;
            Ok(Vec::new())
        }

        EntityTx::PlaceSwapOffer {
            counterparty,
            offer_id,
            give_token_id,
            give_amount,
            want_token_id,
            want_amount,
            min_fill_ratio,
        } => {
            let maker_is_left = state.account_key_with(&counterparty).is_left(&state.entity_id);
            let machine = state
                .accounts
                .get_mut(&state.account_key_with(&counterparty))
                .ok_or(EntityError::UnknownAccount)?;
            machine.enqueue_account_tx(AccountTx::SwapOffer {
                offer_id,
                maker_is_left,
                give_token_id,
                give_amount,
                want_token_id,
                want_amount,
                min_fill_ratio,
            })?;
            Ok(Vec::new())
        }

        EntityTx::ResolveSwap {
            counterparty,
            offer_id,
            fill_ratio,
            cancel_remainder,
        } => {
            let machine = state
                .accounts
                .get_mut(&state.account_key_with(&counterparty))
                .ok_or(EntityError::UnknownAccount)?;
            machine.enqueue_account_tx(AccountTx::SwapResolve {
                offer_id,
                fill_ratio,
                cancel_remainder,
            })?;
            Ok(Vec::new())
        }

        EntityTx::CancelSwap { counterparty, offer_id } => {
            let machine = state
                .accounts
                .get_mut(&state.account_key_with(&counterparty))
                .ok_or(EntityError::UnknownAccount)?;
            machine.enqueue_account_tx(AccountTx::SwapCancel { offer_id })?;
            Ok(Vec::new())
        }

        EntityTx::InitOrderbookExt => {
            state.orderbook_ext.get_or_insert_with(std::collections::HashMap::new);
            Ok(Vec::new())
        }

        EntityTx::MintReserves { to, token_id, amount } => {
            state.j_batch_state.push(JBatchOp::MintReserves { to, token_id, amount });
            Ok(Vec::new())
        }
    }
}

/// `vote` (§4.4): tally `yes` weight against the board threshold; on first
/// crossing, execute the proposal's boxed action and mark it `Executed`.
fn apply_vote<P: SignatureProvider>(
    state: &mut EntityState,
    proposal_id: xln_core::ProposalId,
    voter: SignerId,
    choice: VoteChoice,
    timestamp: Timestamp,
    provider: &P,
) -> EntityResult<Vec<EntityOutput>> {
    {
        let proposal = state
            .proposals
            .get_mut(&proposal_id)
            .ok_or(EntityError::UnknownProposal(proposal_id))?;
        if proposal.status != ProposalStatus::Pending {
            return Err(EntityError::ProposalAlreadyFinalized(proposal_id));
        }
        proposal.votes.insert(voter, choice);
    }

    let proposal = &state.proposals[&proposal_id];
    let yes_voters: Vec<SignerId> = proposal.yes_voters().cloned().collect();
    if !state.config.meets_threshold(yes_voters.iter()) {
        return Ok(Vec::new());
    }

    let proposal = state.proposals.get_mut(&proposal_id).unwrap();
    proposal.status = ProposalStatus::Executed;
    let action = (*proposal.action).clone();
    let author = proposal.proposer.clone();

    tracing::info!(?proposal_id, "proposal reached threshold, executing");
    dispatch(state, &author, action, timestamp, provider)
}

/// `j_event` admission (§4.5): record the reporting signer's observation,
/// tally, and on finalization fold the events into local state.
fn apply_j_event(
    state: &mut EntityState,
    reporter: SignerId,
    block_number: xln_core::Height,
    block_hash: xln_core::Hash32,
    events: Vec<xln_core::JurisdictionEvent>,
    observed_at: Timestamp,
) -> EntityResult<Vec<EntityOutput>> {
    if block_number < state.last_finalized_j_height {
        return Err(EntityError::StaleJObservation {
            height: block_number,
            last_finalized: state.last_finalized_j_height,
        });
    }

    state.j_block_observations.record(
        block_number,
        reporter,
        ObservedBlock {
            block_hash,
            events,
            observed_at,
        },
    );

    match state.j_block_observations.tally(block_number, &state.config) {
        Ok(None) => Ok(Vec::new()),
        Ok(Some(finalized)) => {
            for event in &finalized.events {
                apply_finalized_j_event(state, event);
            }
            state.last_finalized_j_height = finalized.j_height;
            tracing::info!(height = finalized.j_height, "j-block finalized");
            state.j_block_chain.push(finalized);
            Ok(Vec::new())
        }
        Err(EntityError::JBlockForkDetected { height }) => {
            state.j_view_halted = true;
            tracing::error!(height, "j-block fork detected, halting j-view");
            Err(EntityError::JBlockForkDetected { height })
        }
        Err(other) => Err(other),
    }
}

fn apply_finalized_j_event(state: &mut EntityState, event: &xln_core::JurisdictionEvent) {
    match event {
        xln_core::JurisdictionEvent::ReserveUpdated {
            entity_id,
            token_id,
            new_balance,
        } if *entity_id == state.entity_id => {
            state.reserves.insert(*token_id, new_balance.clone());
        }
        xln_core::JurisdictionEvent::AccountSettled {
            account,
            token_id,
            collateral,
            ondelta,
        } if account.left == state.entity_id || account.right == state.entity_id => {
            if let Some(machine) = state.accounts.get_mut(account) {
                let _ = machine.enqueue_account_tx(AccountTx::JSync {
                    j_block_number: state.last_finalized_j_height,
                    token_id: *token_id,
                    collateral: collateral.clone(),
                    ondelta: ondelta.clone(),
                });
            }
        }
        _ => {}
    }
}

/// `AccountInputTx` (§4.2): forward a peer's envelope into the matching
/// `AccountMachine`, turning any countersignature or emitted HTLC event into
/// follow-up outputs (secret/timeout propagation, §4.3).
fn apply_account_input<P: SignatureProvider>(
    state: &mut EntityState,
    account: AccountKey,
    input: AccountInputEnvelope,
    provider: &P,
) -> EntityResult<Vec<EntityOutput>> {
    let self_entity = state.entity_id.clone();
    let self_signer = account_signer_id(&self_entity);
    let counterparty = account.counterparty(&self_entity);
    let peer_signer = account_signer_id(&counterparty);
    let peer_pubkey = provider
        .public_key(&peer_signer)
        .map_err(|_| EntityError::InvalidSignature)?;

    let machine = state.accounts.get_mut(&account).ok_or(EntityError::UnknownAccount)?;
    let (reply, events) = machine.receive_account_input(input, provider, &self_signer, &peer_pubkey)?;

    let mut outputs = Vec::new();
    if let Some(reply) = reply {
        outputs.push(EntityOutput::EntityInput {
            target_entity: counterparty.clone(),
            tx: EntityTx::AccountInputTx { account: account.clone(), input: reply },
        });
    }

    for event in events {
        outputs.extend(propagate_htlc_event(state, event));
    }

    Ok(outputs)
}

/// Push a secret backward to the inbound hop, or fail the inbound lock on a
/// downstream timeout, per §4.3's routing contract. The backward
/// `HtlcReveal`/`HtlcTimeout` is enqueued directly into the inbound
/// account's mempool rather than routed as an `EntityInput`, since both
/// accounts are owned by this same entity replica when it sits mid-route.
fn propagate_htlc_event(state: &mut EntityState, event: xln_core::AccountEvent) -> Vec<EntityOutput> {
    match event {
        xln_core::AccountEvent::HtlcRevealed { hashlock, secret } => {
            let Ok(secret_bytes) = <[u8; 32]>::try_from(secret.as_slice()) else {
                tracing::warn!("htlc secret has unexpected length, dropping reveal");
                return Vec::new();
            };
            state.htlc_routes.record_secret(&hashlock, secret_bytes);
            let Some(route) = state.htlc_routes.get(&hashlock) else {
                return Vec::new();
            };
            let (Some(inbound_entity), Some(inbound_lock_id)) =
                (route.inbound_entity.clone(), route.inbound_lock_id.clone())
            else {
                return Vec::new();
            };
            let account = state.account_key_with(&inbound_entity);
            if let Some(machine) = state.accounts.get_mut(&account) {
                let _ = machine.enqueue_account_tx(AccountTx::HtlcReveal {
                    lock_id: inbound_lock_id,
                    secret: secret_bytes.to_vec(),
                });
            }
            Vec::new()
        }
        xln_core::AccountEvent::HtlcTimedOut { hashlock } => {
            let Some(route) = state.htlc_routes.get(&hashlock) else {
                return Vec::new();
            };
            if let (Some(inbound_entity), Some(inbound_lock_id)) =
                (route.inbound_entity.clone(), route.inbound_lock_id.clone())
            {
                let account = state.account_key_with(&inbound_entity);
                if let Some(machine) = state.accounts.get_mut(&account) {
                    let _ = machine.enqueue_account_tx(AccountTx::HtlcTimeout { lock_id: inbound_lock_id });
                }
            }
            Vec::new()
        }
    }
}

/// `htlcPayment` (§4.3): lock funds on the first hop toward `target`,
/// generating a fresh secret when the caller doesn't supply one (the
/// sender-generated-preimage path; see DESIGN.md).
fn apply_htlc_payment(
    state: &mut EntityState,
    target: EntityId,
    token_id: xln_core::TokenId,
    amount: xln_core::Amount,
    route: Vec<EntityId>,
    hashlock: Option<xln_core::HashLock>,
    secret: Option<Vec<u8>>,
) -> EntityResult<Vec<EntityOutput>> {
    let (hashlock, secret) = match (hashlock, secret) {
        (Some(h), s) => (h, s.and_then(|s| <[u8; 32]>::try_from(s.as_slice()).ok())),
        (None, _) => {
            let mut preimage = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut preimage);
            (xln_crypto::hash(&preimage), Some(preimage))
        }
    };

    let next_hop = route.first().cloned().unwrap_or_else(|| target.clone());
    let reveal_before_height = state.last_finalized_j_height + xln_htlc::DEFAULT_HTLC_TIMEOUT_HEIGHTS;
    let sender_is_left = state.account_key_with(&next_hop).is_left(&state.entity_id);
    let lock_id = format!("{}-{}", hashlock.to_hex(), state.height);

    let machine = state
        .accounts
        .get_mut(&state.account_key_with(&next_hop))
        .ok_or(EntityError::UnknownAccount)?;
    machine.enqueue_account_tx(AccountTx::HtlcLock {
        lock_id: lock_id.clone(),
        token_id,
        amount,
        hashlock,
        timelock: 0,
        reveal_before_height,
        sender_is_left,
        envelope: None,
    })?;

    if next_hop != target {
        state.htlc_routes.insert(
            hashlock,
            HtlcRoute {
                inbound_entity: None,
                inbound_lock_id: None,
                outbound_entity: Some(next_hop),
                outbound_lock_id: Some(lock_id),
                secret,
                pending_fee: None,
            },
        );
    }

    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardConfig;
    use std::collections::HashMap;
    use xln_core::Amount;
    use xln_crypto::DilithiumKeyStore;

    fn entity(id: u8) -> EntityId {
        EntityId::from_bytes([id; 32])
    }

    fn solo_board(signer: &SignerId) -> BoardConfig {
        let mut shares = HashMap::new();
        shares.insert(signer.clone(), 1);
        BoardConfig::new(vec![signer.clone()], shares, 1)
    }

    #[test]
    fn chat_message_appends_to_log() {
        let a = entity(1);
        let signer = SignerId("s1".into());
        let mut state = EntityState::new(a, solo_board(&signer));
        let store = DilithiumKeyStore::new();
        let tx = EntityTx::ChatMessage {
            from: signer.clone(),
            message: "hello".into(),
        };
        apply_entity_tx(&mut state, &signer, tx, 1, 0, &store).unwrap();
        assert_eq!(state.message_log, vec!["hello".to_string()]);
    }

    #[test]
    fn nonce_must_be_gap_free() {
        let a = entity(1);
        let signer = SignerId("s1".into());
        let mut state = EntityState::new(a, solo_board(&signer));
        let store = DilithiumKeyStore::new();
        let tx = EntityTx::ChatMessage {
            from: signer.clone(),
            message: "hi".into(),
        };
        let err = apply_entity_tx(&mut state, &signer, tx, 2, 0, &store).unwrap_err();
        assert!(matches!(err, EntityError::InvalidNonce { expected: 1, got: 2, .. }));
    }

    #[test]
    fn proposal_executes_once_threshold_votes_in() {
        let a = entity(1);
        let signer = SignerId("s1".into());
        let mut state = EntityState::new(a, solo_board(&signer));
        let store = DilithiumKeyStore::new();

        let action = EntityTx::ProfileUpdate {
            field: "name".into(),
            value: "acme".into(),
        };
        let propose = EntityTx::Propose {
            proposer: signer.clone(),
            action: Box::new(action.clone()),
            timestamp: 0,
        };
        apply_entity_tx(&mut state, &signer, propose, 1, 0, &store).unwrap();

        let id = Proposal::compute_id(&action, &signer, 0);
        let vote = EntityTx::Vote {
            proposal_id: id,
            voter: signer.clone(),
            choice: VoteChoice::Yes,
        };
        apply_entity_tx(&mut state, &signer, vote, 2, 0, &store).unwrap();

        assert_eq!(state.profile.get("name"), Some(&"acme".to_string()));
        assert_eq!(state.proposals[&id].status, ProposalStatus::Executed);
    }

    #[test]
    fn reserve_to_reserve_requires_sufficient_balance() {
        let a = entity(1);
        let b = entity(2);
        let signer = SignerId("s1".into());
        let mut state = EntityState::new(a, solo_board(&signer));
        let store = DilithiumKeyStore::new();
        let tx = EntityTx::ReserveToReserve {
            to: b,
            token_id: 1,
            amount: Amount::from(10),
        };
        let err = apply_entity_tx(&mut state, &signer, tx, 1, 0, &store).unwrap_err();
        assert!(matches!(err, EntityError::InsufficientReserves { .. }));
    }
}
