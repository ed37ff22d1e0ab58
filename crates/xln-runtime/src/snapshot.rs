//! `EnvSnapshot` (§6 external interface #2): one tick's append-only history
//! entry. `EntityState`/`AccountMachine` hold no `Clone`/`Serialize` impl
//! (they're live consensus objects, not wire DTOs — see `xln-entity::state`),
//! so a snapshot records the tick's inputs/outputs/logs and each live
//! replica's committed height rather than a deep clone of replica state;
//! reconstructing full state at a past height means replaying `runtimeInput`
//! from genesis (§8 P8), which this lean snapshot still supports.

use serde::{Deserialize, Serialize};
use xln_core::{EntityId, Height, SignerId, Timestamp};

use crate::input::RuntimeInput;
use crate::log::LogEntry;
use xln_entity::EntityOutput;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReplicaHeightRecord {
    pub entity_id: EntityId,
    pub signer_id: SignerId,
    pub height: Height,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnvSnapshot {
    pub height: Height,
    pub timestamp: Timestamp,
    pub runtime_input: RuntimeInput,
    pub runtime_outputs: Vec<EntityOutput>,
    pub replica_heights: Vec<ReplicaHeightRecord>,
    pub j_block_numbers: Vec<(String, Height)>,
    pub logs: Vec<LogEntry>,
}
