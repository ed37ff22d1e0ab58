//! `AccountFrame` and the dispute-proof shapes (§4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xln_core::{AccountTx, Amount, Delta, Hash32, Height, LockId, OfferId, Signature, Timestamp, TokenId};
use xln_htlc::{HtlcLock, SwapOffer};

/// One committed (or pending) step of bilateral account consensus.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountFrame {
    pub height: Height,
    pub timestamp: Timestamp,
    pub j_height: Height,
    pub account_txs: Vec<AccountTx>,
    pub prev_frame_hash: Hash32,
    pub state_hash: Hash32,
}

impl AccountFrame {
    /// `AccountFrame.stateHash` (§6): `H(concat(sort_by_tokenId(tokenIds,
    /// deltas), sort_by_lockId(locks), sort_by_offerId(swapOffers)))` — a
    /// content commitment to the *resulting* financial state, not the tx
    /// list, so two replicas that replay the same txs from the same start
    /// always agree regardless of map iteration order.
    pub fn compute_state_hash(
        deltas: &HashMap<TokenId, Delta>,
        locks: &HashMap<LockId, HtlcLock>,
        swap_offers: &HashMap<OfferId, SwapOffer>,
    ) -> Hash32 {
        let mut token_ids: Vec<&TokenId> = deltas.keys().collect();
        token_ids.sort();
        let sorted_deltas: Vec<&Delta> = token_ids.iter().map(|id| &deltas[*id]).collect();

        let mut lock_ids: Vec<&LockId> = locks.keys().collect();
        lock_ids.sort();
        let sorted_locks: Vec<&HtlcLock> = lock_ids.iter().map(|id| &locks[*id]).collect();

        let mut offer_ids: Vec<&OfferId> = swap_offers.keys().collect();
        offer_ids.sort();
        let sorted_offers: Vec<&SwapOffer> =
            offer_ids.iter().map(|id| &swap_offers[*id]).collect();

        let deltas_bytes = xln_core::canonical::canonical_bytes(&sorted_deltas);
        let locks_bytes = xln_core::canonical::canonical_bytes(&sorted_locks);
        let offers_bytes = xln_core::canonical::canonical_bytes(&sorted_offers);

        xln_crypto::hash_concat(&[&deltas_bytes, &locks_bytes, &offers_bytes])
    }
}

/// `(cooperativeNonce, disputeNonce)` ordering key for dispute resolution:
/// the highest pair wins (§4.2).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProofHeader {
    pub cooperative_nonce: u64,
    pub dispute_nonce: u64,
}

/// `(tokenIds, deltas, htlcLocks[])` sorted canonically — computed for
/// on-chain dispute submission, never executed here (§4.2, explicit
/// non-goal to settle on-chain in this crate).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProofBody {
    pub token_ids: Vec<TokenId>,
    pub deltas: Vec<(TokenId, Amount, Amount)>, // (tokenId, ondelta, offdelta)
    pub htlc_locks: Vec<(LockId, TokenId, Amount, Hash32, Height)>,
}

/// A signed dispute proof: the highest-`(cooperativeNonce, disputeNonce)`
/// proof for an account wins on dispute.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SignedProof {
    pub header: ProofHeader,
    pub body: ProofBody,
    pub counterparty_signature: Signature,
}
