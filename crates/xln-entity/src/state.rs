//! `EntityState` (§3): everything committed into an entity frame.

use std::collections::HashMap;

use xln_core::{AccountKey, Amount, EntityId, Height, JBatchOp, ProposalId, SignerId, TokenId};
use xln_htlc::RoutingTable;

use crate::board::BoardConfig;
use crate::jblock::{JBlockFinalized, JBlockObservationTracker};
use crate::proposal::Proposal;

/// Price-time priority book per traded token pair, the optional extension
/// mentioned in §4.3/§3 `orderbookExt`.
pub type OrderbookExt = HashMap<(TokenId, TokenId), xln_htlc::OrderBook>;

/// In-memory only (§3 Ownership, §4.7: the runtime keeps no persistence
/// backend) — never (de)serialized, so the fields below don't need
/// `Serialize` even though most of the value types happen to derive it.
pub struct EntityState {
    pub entity_id: EntityId,
    pub height: Height,
    pub timestamp: xln_core::Timestamp,
    pub nonces: HashMap<SignerId, u64>,
    pub message_log: Vec<String>,
    pub profile: HashMap<String, String>,
    pub proposals: HashMap<ProposalId, Proposal>,
    pub config: BoardConfig,
    pub reserves: HashMap<TokenId, Amount>,
    pub accounts: HashMap<AccountKey, xln_account::AccountMachine>,
    pub last_finalized_j_height: Height,
    pub j_block_observations: JBlockObservationTracker,
    pub j_block_chain: Vec<JBlockFinalized>,
    pub j_view_halted: bool,
    pub htlc_routes: RoutingTable,
    /// Settlement/reserve ops accumulated since the last `j_broadcast`
    /// (§4.4 `jBatchState`); empty means "absent".
    pub j_batch_state: Vec<JBatchOp>,
    pub orderbook_ext: Option<OrderbookExt>,
}

impl EntityState {
    pub fn new(entity_id: EntityId, config: BoardConfig) -> Self {
        Self {
            entity_id,
            height: 0,
            timestamp: 0,
            nonces: HashMap::new(),
            message_log: Vec::new(),
            profile: HashMap::new(),
            proposals: HashMap::new(),
            config,
            reserves: HashMap::new(),
            accounts: HashMap::new(),
            last_finalized_j_height: 0,
            j_block_observations: JBlockObservationTracker::new(),
            j_block_chain: Vec::new(),
            j_view_halted: false,
            htlc_routes: RoutingTable::new(),
            j_batch_state: Vec::new(),
            orderbook_ext: None,
        }
    }

    pub fn account_key_with(&self, counterparty: &EntityId) -> AccountKey {
        AccountKey::canonical(self.entity_id.clone(), counterparty.clone())
    }

    pub fn account_with(&self, counterparty: &EntityId) -> Option<&xln_account::AccountMachine> {
        self.accounts.get(&self.account_key_with(counterparty))
    }

    pub fn account_with_mut(
        &mut self,
        counterparty: &EntityId,
    ) -> Option<&mut xln_account::AccountMachine> {
        let key = self.account_key_with(counterparty);
        self.accounts.get_mut(&key)
    }
}
