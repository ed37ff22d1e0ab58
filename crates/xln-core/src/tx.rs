//! Sealed tagged unions for every transaction/event kind that crosses a
//! layer boundary (§9 design note: "Duck-typed event objects. Replace with a
//! sealed tagged union"). Each layer's machine matches exhaustively over its
//! own enum; there is no untyped JSON blob anywhere in the core.

use serde::{Deserialize, Serialize};

use crate::types::{
    AccountKey, Amount, EntityId, Hash32, HashLock, Height, LockId, Nonce, OfferId, ProposalId,
    SignerId, Timestamp, TokenId,
};

// ── AccountTx (§4.2) ───────────────────────────────────────────────────────────

/// A single bilateral-account state transition proposed inside an
/// `AccountFrame`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum AccountTx {
    DirectPayment {
        token_id: TokenId,
        amount: Amount,
        /// Sender -> receiver, from the canonical ordering's perspective.
        sender_is_left: bool,
    },
    AddDelta {
        token_id: TokenId,
    },
    SetCreditLimit {
        /// Side whose credit limit is being set, from the canonical
        /// ordering's perspective.
        side_is_left: bool,
        token_id: TokenId,
        amount: Amount,
    },
    HtlcLock {
        lock_id: LockId,
        token_id: TokenId,
        amount: Amount,
        hashlock: HashLock,
        timelock: Timestamp,
        reveal_before_height: Height,
        /// Sender -> receiver, from the canonical ordering's perspective.
        sender_is_left: bool,
        /// Opaque onion-style routing envelope for the next hop.
        envelope: Option<Vec<u8>>,
    },
    HtlcReveal {
        lock_id: LockId,
        secret: Vec<u8>,
    },
    HtlcTimeout {
        lock_id: LockId,
    },
    SwapOffer {
        offer_id: OfferId,
        maker_is_left: bool,
        give_token_id: TokenId,
        give_amount: Amount,
        want_token_id: TokenId,
        want_amount: Amount,
        min_fill_ratio: u32,
    },
    SwapResolve {
        offer_id: OfferId,
        fill_ratio: u32,
        cancel_remainder: bool,
    },
    SwapCancel {
        offer_id: OfferId,
    },
    JSync {
        j_block_number: Height,
        token_id: TokenId,
        collateral: Amount,
        ondelta: Amount,
    },
    RequestWithdrawal {
        token_id: TokenId,
        amount: Amount,
        requester_is_left: bool,
    },
    ApproveWithdrawal {
        token_id: TokenId,
        amount: Amount,
    },
}

// ── AccountEvent (§4.3) ────────────────────────────────────────────────────────

/// Events an `AccountMachine` emits for its owning entity to act on — most
/// importantly secret propagation for HTLC routing (§4.3).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum AccountEvent {
    HtlcRevealed { hashlock: HashLock, secret: Vec<u8> },
    HtlcTimedOut { hashlock: HashLock },
}

// ── EntityTx (§4.4, §9) ────────────────────────────────────────────────────────

/// Every state-changing operation an `EntityReplica` can admit to its
/// mempool and apply during consensus (§9 design note).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum EntityTx {
    ChatMessage {
        from: SignerId,
        message: String,
    },
    Propose {
        proposer: SignerId,
        action: Box<EntityTx>,
        timestamp: Timestamp,
    },
    Vote {
        proposal_id: ProposalId,
        voter: SignerId,
        choice: VoteChoice,
    },
    ProfileUpdate {
        field: String,
        value: String,
    },
    JEvent {
        signer: SignerId,
        block_number: Height,
        block_hash: Hash32,
        events: Vec<crate::tx::JurisdictionEvent>,
        observed_at: Timestamp,
    },
    OpenAccount {
        target_entity_id: EntityId,
    },
    AccountInputTx {
        account: AccountKey,
        input: crate::tx::AccountInputEnvelope,
    },
    DirectPayment {
        target: EntityId,
        token_id: TokenId,
        amount: Amount,
        route: Vec<EntityId>,
    },
    HtlcPayment {
        target: EntityId,
        token_id: TokenId,
        amount: Amount,
        route: Vec<EntityId>,
        hashlock: Option<HashLock>,
        secret: Option<Vec<u8>>,
    },
    RequestWithdrawal {
        counterparty: EntityId,
        token_id: TokenId,
        amount: Amount,
    },
    SettleDiffs {
        counterparty: EntityId,
        diffs: Vec<SettlementDiff>,
    },
    DepositCollateral {
        counterparty: EntityId,
        token_id: TokenId,
        amount: Amount,
    },
    ReserveToReserve {
        to: EntityId,
        token_id: TokenId,
        amount: Amount,
    },
    JBroadcast {
        hanko_signature: Option<Vec<u8>>,
    },
    ExtendCredit {
        counterparty: EntityId,
        token_id: TokenId,
        side_is_left: bool,
        amount: Amount,
    },
    PlaceSwapOffer {
        counterparty: EntityId,
        offer_id: OfferId,
        give_token_id: TokenId,
        give_amount: Amount,
        want_token_id: TokenId,
        want_amount: Amount,
        min_fill_ratio: u32,
    },
    ResolveSwap {
        counterparty: EntityId,
        offer_id: OfferId,
        fill_ratio: u32,
        cancel_remainder: bool,
    },
    CancelSwap {
        counterparty: EntityId,
        offer_id: OfferId,
    },
    InitOrderbookExt,
    MintReserves {
        to: EntityId,
        token_id: TokenId,
        amount: Amount,
    },
    CreateSettlement {
        counterparty: EntityId,
        diffs: Vec<SettlementDiff>,
    },
}

/// One leg of a settlement batch (§4.4 `createSettlement`, §4.6 `settle`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SettlementDiff {
    pub token_id: TokenId,
    pub collateral_delta: Amount,
    pub ondelta_delta: Amount,
}

/// The envelope carried by an `AccountInputTx`: exactly the wire shape a
/// peer's `AccountInput` takes when forwarded through the entity layer
/// (§4.2 `receiveAccountInput`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountInputEnvelope {
    pub counter: crate::types::Counter,
    pub new_account_frame: Option<AccountFrameEnvelope>,
    pub new_signatures: Vec<crate::types::Signature>,
    pub prev_signatures: Option<Vec<crate::types::Signature>>,
}

/// The wire shape of a proposed `AccountFrame` (mirrors §3's `AccountFrame`
/// but carries only what travels over the account-input envelope; the full
/// typed frame lives in `xln-account`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountFrameEnvelope {
    pub height: Height,
    pub timestamp: Timestamp,
    pub j_height: Height,
    pub account_txs: Vec<AccountTx>,
    pub prev_frame_hash: Hash32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

// ── RuntimeTx (§4.7, §9) ───────────────────────────────────────────────────────

/// Inputs that mutate the runtime's replica set directly; not consensus
/// traffic (§4.7 step 2).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum RuntimeTx {
    ImportReplica {
        entity_id: EntityId,
        signer_id: SignerId,
        is_proposer: bool,
    },
    RemoveReplica {
        entity_id: EntityId,
        signer_id: SignerId,
    },
}

// ── JurisdictionEvent (§4.6, §9) ───────────────────────────────────────────────

/// Events emitted by a finalized jurisdiction block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum JurisdictionEvent {
    ReserveUpdated {
        entity_id: EntityId,
        token_id: TokenId,
        new_balance: Amount,
    },
    AccountSettled {
        account: AccountKey,
        token_id: TokenId,
        collateral: Amount,
        ondelta: Amount,
    },
    InsuranceClaimed {
        account: AccountKey,
        token_id: TokenId,
        amount: Amount,
    },
    GovernanceEnabled {
        entity_id: EntityId,
    },
}

// ── JTx (§4.6) ──────────────────────────────────────────────────────────────────

/// A batch of operations an entity submits to the jurisdiction's mempool
/// (§4.4 `j_broadcast`, §4.6).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum JTx {
    Batch {
        from: EntityId,
        ops: Vec<JBatchOp>,
        hanko_signature: Option<Vec<u8>>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum JBatchOp {
    ReserveToReserve {
        from: EntityId,
        to: EntityId,
        token_id: TokenId,
        amount: Amount,
    },
    Settle {
        left: EntityId,
        right: EntityId,
        diffs: Vec<SettlementDiff>,
    },
    MintReserves {
        to: EntityId,
        token_id: TokenId,
        amount: Amount,
    },
    RegisterEntity {
        entity_id: EntityId,
    },
}
