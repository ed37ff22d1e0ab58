//! xln-node — a single-process demonstration host for the runtime.
//!
//! Wires one [`xln_runtime::Env`] to an in-memory [`DilithiumKeyStore`] and
//! a reference [`JReplica`] jurisdiction, then drives it through a scripted
//! sequence of ticks. There is no P2P transport, RPC surface, or persistence
//! layer here — those are external collaborators by design (§6); this
//! binary plays all of their roles in-process so the runtime can be driven
//! and observed end to end.

use std::collections::HashMap;

use clap::Parser;
use tracing::info;

use xln_core::{EntityId, EntityTx, JBatchOp, JTx, RuntimeTx, SignerId, TokenId};
use xln_crypto::DilithiumKeyStore;
use xln_entity::{BoardConfig, EntityReplica, EntityState};
use xln_jurisdiction::{JReplica, JurisdictionConfig};
use xln_runtime::{Env, EntityInputItem, JInputItem, RuntimeConfig, RuntimeInput};

#[derive(Parser, Debug)]
#[command(name = "xln-node", version, about = "XLN runtime demonstration host")]
struct Args {
    /// Number of ticks to run before exiting.
    #[arg(long, default_value_t = 20)]
    ticks: u64,

    /// Wall-clock milliseconds advanced per tick.
    #[arg(long, default_value_t = 200)]
    tick_interval_ms: i64,

    /// Jurisdiction block production delay, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    j_block_delay_ms: u64,
}

const DEMO_TOKEN: TokenId = 1;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,xln=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("xln-node starting");

    let alice = EntityId::from_bytes([1u8; 32]);
    let bob = EntityId::from_bytes([2u8; 32]);
    let alice_signer = SignerId("alice".into());
    let bob_signer = SignerId("bob".into());

    let mut keys = DilithiumKeyStore::new();
    keys.generate(alice_signer.clone());
    keys.generate(bob_signer.clone());

    let solo_board = |signer: &SignerId| {
        let mut shares = HashMap::new();
        shares.insert(signer.clone(), 1);
        BoardConfig::new(vec![signer.clone()], shares, 1)
    };

    let mut env = Env::new(RuntimeConfig {
        tick_interval_ms: args.tick_interval_ms,
        ..RuntimeConfig::default()
    });
    env.import_replica(
        alice.clone(),
        EntityReplica::new(alice_signer.clone(), EntityState::new(alice.clone(), solo_board(&alice_signer))),
    );
    env.import_replica(
        bob.clone(),
        EntityReplica::new(bob_signer.clone(), EntityState::new(bob.clone(), solo_board(&bob_signer))),
    );
    env.import_jurisdiction(
        "default".into(),
        JReplica::new("default".into(), JurisdictionConfig { block_delay_ms: args.j_block_delay_ms, ..Default::default() }),
    );

    let mut timestamp: i64 = 0;
    for height in 0..args.ticks {
        let input = scripted_input(height, &alice, &bob, &alice_signer, &bob_signer);
        let snapshot = env.tick(input, &keys, timestamp)?;
        info!(
            height = snapshot.height,
            outputs = snapshot.runtime_outputs.len(),
            logs = snapshot.logs.len(),
            "tick complete"
        );
        timestamp += args.tick_interval_ms;
    }

    info!(final_height = env.height, "xln-node demo run complete");
    Ok(())
}

/// A fixed script exercising chat, governance, reserves, and settlement —
/// enough to touch every layer at least once (entity consensus, jurisdiction
/// batching, and the deferred-output cascade across the layers).
fn scripted_input(
    height: u64,
    alice: &EntityId,
    bob: &EntityId,
    alice_signer: &SignerId,
    bob_signer: &SignerId,
) -> RuntimeInput {
    let mut input = RuntimeInput::new();
    match height {
        0 => {
            input.entity_inputs.push(EntityInputItem {
                entity_id: alice.clone(),
                signer: alice_signer.clone(),
                nonce: 1,
                tx: EntityTx::ChatMessage { from: alice_signer.clone(), message: "hello from alice".into() },
                cancel_after: None,
            });
            input.entity_inputs.push(EntityInputItem {
                entity_id: bob.clone(),
                signer: bob_signer.clone(),
                nonce: 1,
                tx: EntityTx::ChatMessage { from: bob_signer.clone(), message: "hello from bob".into() },
                cancel_after: None,
            });
        }
        1 => {
            input.entity_inputs.push(EntityInputItem {
                entity_id: alice.clone(),
                signer: alice_signer.clone(),
                nonce: 2,
                tx: EntityTx::OpenAccount { target_entity_id: bob.clone() },
                cancel_after: None,
            });
            input.entity_inputs.push(EntityInputItem {
                entity_id: bob.clone(),
                signer: bob_signer.clone(),
                nonce: 2,
                tx: EntityTx::OpenAccount { target_entity_id: alice.clone() },
                cancel_after: None,
            });
        }
        2 => {
            input.j_inputs.push(JInputItem {
                jurisdiction_id: "default".into(),
                j_tx: JTx::Batch {
                    from: alice.clone(),
                    ops: vec![JBatchOp::MintReserves { to: alice.clone(), token_id: DEMO_TOKEN, amount: xln_core::Amount::from(1_000) }],
                    hanko_signature: None,
                },
            });
        }
        6 => {
            input.entity_inputs.push(EntityInputItem {
                entity_id: alice.clone(),
                signer: alice_signer.clone(),
                nonce: 3,
                tx: EntityTx::ReserveToReserve { to: bob.clone(), token_id: DEMO_TOKEN, amount: xln_core::Amount::from(100) },
                cancel_after: None,
            });
        }
        7 => {
            input.entity_inputs.push(EntityInputItem {
                entity_id: alice.clone(),
                signer: alice_signer.clone(),
                nonce: 4,
                tx: EntityTx::JBroadcast { hanko_signature: None },
                cancel_after: None,
            });
        }
        10 => {
            input.runtime_txs.push(RuntimeTx::ImportReplica {
                entity_id: alice.clone(),
                signer_id: alice_signer.clone(),
                is_proposer: true,
            });
        }
        _ => {}
    }
    input
}
