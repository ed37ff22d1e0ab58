//! `JurisdictionAdapter` (§6, external interface #5): the contract a
//! jurisdiction's block producer exposes to collaborators outside this
//! crate (the runtime, and ultimately a real chain client).

use xln_core::{AccountKey, Amount, EntityId, Hash32, Height, JTx, TokenId};

use crate::error::JurisdictionResult;

/// What one applied batch produced, handed back to the caller for mempool
/// bookkeeping and J-event fan-out.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockProduced {
    pub block_number: Height,
    pub block_hash: Hash32,
    pub events: Vec<xln_core::JurisdictionEvent>,
}

/// The contract every jurisdiction implementation exposes (§6 contract #5).
/// `JReplica` is the reference implementation; a production deployment
/// would back this trait with a real chain client instead.
pub trait JurisdictionAdapter {
    fn apply_batch(&mut self, batch: JTx) -> JurisdictionResult<Vec<xln_core::JurisdictionEvent>>;
    fn get_block_number(&self) -> Height;
    fn get_block_hash(&self) -> Hash32;
    fn get_reserves(&self, entity_id: &EntityId, token_id: TokenId) -> Amount;
    fn get_collateral(&self, account: &AccountKey, token_id: TokenId) -> (Amount, Amount);
}
