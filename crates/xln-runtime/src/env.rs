//! `Env`: the runtime's owned world — entity and jurisdiction replicas, the
//! pending-output queue, and tick history (§4.7, §5 "`env.eReplicas`,
//! `env.jReplicas` owned by R; no other component mutates them").

use std::collections::{HashMap, VecDeque};

use xln_core::{EntityId, Height, SignerId, Timestamp};
use xln_crypto::SignatureProvider;
use xln_entity::{EntityOutput, EntityReplica};
use xln_jurisdiction::JReplica;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::input::{EntityInputItem, JInputItem, RuntimeInput};
use crate::log::{LogCategory, LogEntry, LogLevel};
use crate::snapshot::{EnvSnapshot, ReplicaHeightRecord};

/// One participant's in-process world. A real deployment runs one `Env` per
/// physical node, holding only the replicas it's a validator for; this `Env`
/// can hold several validators of the same entity (keyed by `(entity_id,
/// signer_id)`) so a single test harness can drive a full BFT round, the
/// same way `chronx-node`'s smoke test drives one full node process.
pub struct Env {
    pub config: RuntimeConfig,
    pub e_replicas: HashMap<(EntityId, SignerId), EntityReplica>,
    pub j_replicas: HashMap<String, JReplica>,
    pub height: Height,
    pub timestamp: Timestamp,
    pending_outputs: HashMap<String, VecDeque<EntityOutput>>,
    pub history: Vec<EnvSnapshot>,
}

impl Env {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            e_replicas: HashMap::new(),
            j_replicas: HashMap::new(),
            height: 0,
            timestamp: 0,
            pending_outputs: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn import_replica(&mut self, entity_id: EntityId, replica: EntityReplica) {
        let key = (entity_id, replica.signer_id.clone());
        self.e_replicas.insert(key, replica);
    }

    pub fn import_jurisdiction(&mut self, jurisdiction_id: String, replica: JReplica) {
        self.j_replicas.insert(jurisdiction_id, replica);
    }

    /// Queue `output` for delivery no earlier than the *next* tick (§4.7
    /// step 5, §5 "same-tick cascade is forbidden"), with per-destination
    /// backpressure (§4.7 "excess is dropped with a warning").
    fn queue_output(&mut self, output: EntityOutput, logs: &mut Vec<LogEntry>) {
        let dest = match &output {
            EntityOutput::EntityInput { target_entity, .. } => target_entity.to_hex(),
            EntityOutput::JInput { jurisdiction_id, .. } => jurisdiction_id.clone(),
        };
        let queue = self.pending_outputs.entry(dest.clone()).or_default();
        if queue.len() >= self.config.pending_outputs_bound {
            queue.pop_front();
            let entry = LogEntry::new(
                LogLevel::Warn,
                LogCategory::Backpressure,
                format!("P2P_QUEUE_PRESSURE: dropped oldest output for {dest}"),
            );
            entry.emit();
            logs.push(entry);
        }
        queue.push_back(output);
    }

    /// Drain every destination's queue into this tick's `RuntimeInput`,
    /// converting each `EntityOutput` back into the input shape a replica
    /// admits. Outputs carry no signer/nonce of their own (they're
    /// entity-to-entity system messages, not locally-authored validator
    /// txs); the runtime attributes them to the *target* entity's own
    /// account-channel identity and auto-assigns the next nonce, the same
    /// convention `dispatch::account_signer_id` documents for bilateral
    /// account traffic.
    fn drain_pending_into(&mut self, input: &mut RuntimeInput) {
        for queue in self.pending_outputs.values_mut() {
            for output in queue.drain(..) {
                match output {
                    EntityOutput::EntityInput { target_entity, tx } => {
                        let signer = xln_entity::account_signer_id(&target_entity);
                        input.entity_inputs.push(EntityInputItem {
                            entity_id: target_entity,
                            signer,
                            nonce: 0, // resolved against live state in `admit_entity_inputs`
                            tx,
                            cancel_after: None,
                        });
                    }
                    EntityOutput::JInput { jurisdiction_id, j_tx } => {
                        input.j_inputs.push(JInputItem { jurisdiction_id, j_tx });
                    }
                }
            }
        }
    }

    /// One tick (§4.7 steps 1-6).
    pub fn tick<P: SignatureProvider>(
        &mut self,
        external_input: RuntimeInput,
        provider: &P,
        now: Timestamp,
    ) -> RuntimeResult<EnvSnapshot> {
        let mut logs = Vec::new();

        // Step 1: merge external input with outputs deferred from prior ticks.
        let mut input = RuntimeInput::new();
        self.drain_pending_into(&mut input);
        input.merge(external_input);

        // Step 2: runtime txs (replica lifecycle, not consensus traffic).
        for rtx in &input.runtime_txs {
            self.apply_runtime_tx(rtx.clone(), &mut logs);
        }

        // Step 3: entity inputs.
        let mut produced = Vec::new();
        for item in &input.entity_inputs {
            if let Some(cancel_after) = item.cancel_after {
                if now > cancel_after {
                    logs.push(LogEntry::new(
                        LogLevel::Warn,
                        LogCategory::Deadline,
                        "dropping entity input past its cancelAfter deadline",
                    ).with_entity(item.entity_id.clone()));
                    continue;
                }
            }
            match self.admit_entity_input(item, provider, now, &mut logs) {
                Ok(mut outputs) => produced.append(&mut outputs),
                Err(err) => logs.push(
                    LogEntry::new(LogLevel::Warn, LogCategory::Admission, err.to_string())
                        .with_entity(item.entity_id.clone()),
                ),
            }
        }

        // Run a consensus round for every entity that now has queued txs.
        let entity_ids: Vec<EntityId> = self.e_replicas.keys().map(|(e, _)| e.clone()).collect::<std::collections::HashSet<_>>().into_iter().collect();
        for entity_id in entity_ids {
            match self.run_consensus_round(&entity_id, provider, now, &mut logs) {
                Ok(mut outputs) => produced.append(&mut outputs),
                Err(err) => logs.push(
                    LogEntry::new(LogLevel::Warn, LogCategory::Consensus, err.to_string())
                        .with_entity(entity_id),
                ),
            }
        }

        // Step 4: jurisdiction inputs, then block production.
        for item in &input.j_inputs {
            match self.j_replicas.get_mut(&item.jurisdiction_id) {
                Some(j) => j.enqueue(item.j_tx.clone()),
                None => logs.push(LogEntry::new(
                    LogLevel::Warn,
                    LogCategory::JBlock,
                    format!("no jurisdiction {} registered", item.jurisdiction_id),
                )),
            }
        }
        let mut j_block_numbers = Vec::new();
        for (jurisdiction_id, j) in self.j_replicas.iter_mut() {
            if let Some(produced_block) = j.produce_block_if_due(now) {
                logs.push(LogEntry::new(
                    LogLevel::Info,
                    LogCategory::JBlock,
                    format!("jurisdiction {jurisdiction_id} produced block {}", produced_block.block_number),
                ));
            }
            j_block_numbers.push((jurisdiction_id.clone(), j.block_number));
        }

        // Step 5: same-tick cascade prevention — defer this tick's outputs.
        for output in produced.clone() {
            self.queue_output(output, &mut logs);
        }

        // Step 6: advance the clock, record the snapshot.
        self.height += 1;
        self.timestamp = now;

        for entry in &logs {
            entry.emit();
        }

        let replica_heights = self
            .e_replicas
            .iter()
            .map(|((entity_id, signer_id), replica)| ReplicaHeightRecord {
                entity_id: entity_id.clone(),
                signer_id: signer_id.clone(),
                height: replica.state.height,
            })
            .collect();

        let snapshot = EnvSnapshot {
            height: self.height,
            timestamp: self.timestamp,
            runtime_input: input,
            runtime_outputs: produced,
            replica_heights,
            j_block_numbers,
            logs,
        };
        self.history.push(snapshot.clone());
        Ok(snapshot)
    }

    /// `importReplica` carries no board config (§9 lists it only as
    /// `{entityId, signerId, isProposer}`), so a tx-driven import seeds a
    /// solo-validator board for `signer_id` — the same single-signer default
    /// the board layer otherwise requires an explicit `BoardConfig` for. A
    /// replica that should share an existing multi-validator board is
    /// expected to arrive via [`Env::import_replica`] with a fully built
    /// `EntityReplica` instead (the path `xln-node`'s bootstrap uses); see
    /// DESIGN.md.
    fn apply_runtime_tx(&mut self, tx: xln_core::RuntimeTx, logs: &mut Vec<LogEntry>) {
        match tx {
            xln_core::RuntimeTx::ImportReplica { entity_id, signer_id, is_proposer: _ } => {
                self.e_replicas.entry((entity_id.clone(), signer_id.clone())).or_insert_with(|| {
                    let mut shares = HashMap::new();
                    shares.insert(signer_id.clone(), 1);
                    let board = xln_entity::BoardConfig::new(vec![signer_id.clone()], shares, 1);
                    EntityReplica::new(signer_id, xln_entity::EntityState::new(entity_id.clone(), board))
                });
            }
            xln_core::RuntimeTx::RemoveReplica { entity_id, signer_id } => {
                if self.e_replicas.remove(&(entity_id.clone(), signer_id.clone())).is_none() {
                    logs.push(
                        LogEntry::new(LogLevel::Warn, LogCategory::Admission, "removeReplica: no such replica")
                            .with_entity(entity_id),
                    );
                }
            }
        }
    }

    fn admit_entity_input<P: SignatureProvider>(
        &mut self,
        item: &EntityInputItem,
        provider: &P,
        now: Timestamp,
        logs: &mut Vec<LogEntry>,
    ) -> RuntimeResult<Vec<EntityOutput>> {
        let mut any = false;
        for ((entity_id, _signer_id), replica) in self.e_replicas.iter_mut() {
            if entity_id != &item.entity_id {
                continue;
            }
            any = true;
            let nonce = if item.nonce != 0 {
                item.nonce
            } else {
                replica.state.nonces.get(&item.signer).copied().unwrap_or(0) + 1
            };
            if let Err(err) = replica.submit(item.signer.clone(), nonce, item.tx.clone()) {
                logs.push(
                    LogEntry::new(LogLevel::Warn, LogCategory::Admission, err.to_string())
                        .with_entity(item.entity_id.clone()),
                );
            }
        }
        if !any {
            return Err(RuntimeError::UnknownReplica(item.entity_id.clone(), item.signer.clone()));
        }
        let _ = (provider, now);
        Ok(Vec::new())
    }

    /// Run one full propose → precommit → commit round for `entity_id` if
    /// any of its replicas has a nonempty mempool (§4.4).
    fn run_consensus_round<P: SignatureProvider>(
        &mut self,
        entity_id: &EntityId,
        provider: &P,
        now: Timestamp,
        logs: &mut Vec<LogEntry>,
    ) -> RuntimeResult<Vec<EntityOutput>> {
        let signers: Vec<SignerId> = self
            .e_replicas
            .keys()
            .filter(|(e, _)| e == entity_id)
            .map(|(_, s)| s.clone())
            .collect();

        let Some(proposer_signer) = signers.iter().find(|s| {
            self.e_replicas[&(entity_id.clone(), (*s).clone())].is_proposer_for_next_height()
        }) else {
            return Ok(Vec::new());
        };
        let proposer_signer = proposer_signer.clone();

        if self.e_replicas[&(entity_id.clone(), proposer_signer.clone())].mempool.is_empty() {
            return Ok(Vec::new());
        }

        let proposer = self.e_replicas.get_mut(&(entity_id.clone(), proposer_signer.clone())).unwrap();
        let (proposed, mut outputs) = match proposer.propose(provider, now) {
            Ok(ok) => ok,
            Err(err) => return Err(RuntimeError::Entity(err)),
        };
        let proposer_pubkey = provider
            .public_key(&proposer_signer)
            .map_err(|_| RuntimeError::Signature(proposer_signer.clone()))?;

        for signer in &signers {
            if signer == &proposer_signer {
                continue;
            }
            let follower = self.e_replicas.get_mut(&(entity_id.clone(), signer.clone())).unwrap();
            match follower.receive_proposal(proposed.clone(), provider, &proposer_pubkey) {
                Ok((sig, mut follower_outputs)) => {
                    outputs.append(&mut follower_outputs);
                    let proposer = self.e_replicas.get_mut(&(entity_id.clone(), proposer_signer.clone())).unwrap();
                    let _ = proposer.record_precommit(signer.clone(), sig);
                }
                Err(err) => logs.push(
                    LogEntry::new(LogLevel::Warn, LogCategory::Consensus, err.to_string())
                        .with_entity(entity_id.clone()),
                ),
            }
        }

        // Broadcast the proposer's fully collected precommit certificate back
        // to every follower before anyone checks threshold — `receive_proposal`
        // only ever sees the proposal as it stood when sent (just the
        // proposer's own precommit), so without this a follower's local
        // `precommit_weight` could never cross threshold on its own.
        let final_proposal = self.e_replicas[&(entity_id.clone(), proposer_signer.clone())].proposal.clone();
        if let Some(final_proposal) = final_proposal {
            for signer in &signers {
                if signer == &proposer_signer {
                    continue;
                }
                if let Some(follower) = self.e_replicas.get_mut(&(entity_id.clone(), signer.clone())) {
                    follower.proposal = Some(final_proposal.clone());
                }
            }
        }

        for signer in &signers {
            let replica = self.e_replicas.get_mut(&(entity_id.clone(), signer.clone())).unwrap();
            match replica.try_commit() {
                Ok(true) => logs.push(
                    LogEntry::new(LogLevel::Info, LogCategory::Consensus, "entity frame committed")
                        .with_entity(entity_id.clone()),
                ),
                Ok(false) => {}
                Err(err) => logs.push(
                    LogEntry::new(LogLevel::Error, LogCategory::Consensus, err.to_string())
                        .with_entity(entity_id.clone()),
                ),
            }
        }

        Ok(outputs)
    }
}
