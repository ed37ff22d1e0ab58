//! `RuntimeInput` (§6 external interface #1): the only mutator entry.

use serde::{Deserialize, Serialize};
use xln_core::{EntityId, EntityTx, JTx, RuntimeTx, SignerId};

/// A tx the runtime admits into one entity's mempool on behalf of `signer`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntityInputItem {
    pub entity_id: EntityId,
    pub signer: SignerId,
    pub nonce: u64,
    pub tx: EntityTx,
    /// Drop this input if it hasn't been processed by this tick deadline
    /// (§4.7 "Cancellation: an input may carry a `cancelAfter` deadline").
    pub cancel_after: Option<xln_core::Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JInputItem {
    pub jurisdiction_id: String,
    pub j_tx: JTx,
}

/// `{ runtimeTxs[], entityInputs[], jInputs[] }` (§6).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeInput {
    pub runtime_txs: Vec<RuntimeTx>,
    pub entity_inputs: Vec<EntityInputItem>,
    pub j_inputs: Vec<JInputItem>,
}

impl RuntimeInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `other` into `self` (§4.7 step 1: "merge all externally
    /// delivered `RuntimeInput` into a single record for this tick").
    pub fn merge(&mut self, mut other: RuntimeInput) {
        self.runtime_txs.append(&mut other.runtime_txs);
        self.entity_inputs.append(&mut other.entity_inputs);
        self.j_inputs.append(&mut other.j_inputs);
    }
}
