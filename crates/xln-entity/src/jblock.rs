//! J-Block Observation (§4.5): multi-signer threshold agreement on
//! jurisdiction block events, with fork-halt on disagreement.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xln_core::{Hash32, Height, JurisdictionEvent, SignerId, Timestamp};

use crate::board::BoardConfig;
use crate::error::{EntityError, EntityResult};

/// One signer's report of a jurisdiction block (§4.4 `j_event`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObservedBlock {
    pub block_hash: Hash32,
    pub events: Vec<JurisdictionEvent>,
    pub observed_at: Timestamp,
}

/// `{jHeight, jBlockHash, events[], finalizedAt, signerCount}` (§3).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JBlockFinalized {
    pub j_height: Height,
    pub j_block_hash: Hash32,
    pub events: Vec<JurisdictionEvent>,
    pub finalized_at: Timestamp,
    pub signer_count: usize,
}

/// Per-height observation ledger, discarded for a height once finalized.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct JBlockObservationTracker {
    observations: HashMap<Height, HashMap<SignerId, ObservedBlock>>,
}

impl JBlockObservationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `signer`'s observation for `height`. Identical `(height,hash)`
    /// from the same signer is deduped (overwritten with the same value);
    /// the caller must reject observations below `lastFinalizedJHeight`
    /// before calling this.
    pub fn record(&mut self, height: Height, signer: SignerId, observed: ObservedBlock) {
        self.observations.entry(height).or_default().insert(signer, observed);
    }

    /// Tally observations at `height` against `board`. Returns:
    /// - `Ok(Some(finalized))` once one `(hash, events)` group reaches threshold,
    /// - `Ok(None)` if no group has reached threshold yet,
    /// - `Err(JBlockForkDetected)` if two distinct groups both reach threshold.
    pub fn tally(&mut self, height: Height, board: &BoardConfig) -> EntityResult<Option<JBlockFinalized>> {
        let Some(by_signer) = self.observations.get(&height) else {
            return Ok(None);
        };

        // Group signers by identical (block_hash, events).
        let mut groups: Vec<(ObservedBlock, Vec<SignerId>)> = Vec::new();
        for (signer, obs) in by_signer {
            if let Some((_, signers)) = groups
                .iter_mut()
                .find(|(g, _)| g.block_hash == obs.block_hash && g.events == obs.events)
            {
                signers.push(signer.clone());
            } else {
                groups.push((obs.clone(), vec![signer.clone()]));
            }
        }

        let winners: Vec<&(ObservedBlock, Vec<SignerId>)> = groups
            .iter()
            .filter(|(_, signers)| board.meets_threshold(signers.iter()))
            .collect();

        if winners.len() > 1 {
            return Err(EntityError::JBlockForkDetected { height });
        }

        if let Some((obs, signers)) = winners.into_iter().next() {
            let finalized = JBlockFinalized {
                j_height: height,
                j_block_hash: obs.block_hash,
                events: obs.events.clone(),
                finalized_at: obs.observed_at,
                signer_count: signers.len(),
            };
            self.observations.remove(&height);
            return Ok(Some(finalized));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn board() -> BoardConfig {
        let validators = (1..=5).map(|i| SignerId(format!("s{i}"))).collect::<Vec<_>>();
        let mut shares = Map::new();
        for v in &validators {
            shares.insert(v.clone(), 1);
        }
        BoardConfig::new(validators, shares, 3)
    }

    #[test]
    fn finalizes_once_threshold_signers_agree() {
        let b = board();
        let mut tracker = JBlockObservationTracker::new();
        let events = vec![JurisdictionEvent::GovernanceEnabled {
            entity_id: xln_core::EntityId::from_bytes([9u8; 32]),
        }];
        for i in 1..=3 {
            tracker.record(
                7,
                SignerId(format!("s{i}")),
                ObservedBlock {
                    block_hash: Hash32([0xaa; 32]),
                    events: events.clone(),
                    observed_at: 100,
                },
            );
        }
        tracker.record(
            7,
            SignerId("s4".into()),
            ObservedBlock {
                block_hash: Hash32([0xbb; 32]),
                events: vec![],
                observed_at: 100,
            },
        );
        let finalized = tracker.tally(7, &b).unwrap().expect("threshold reached");
        assert_eq!(finalized.j_height, 7);
        assert_eq!(finalized.signer_count, 3);
    }

    #[test]
    fn fork_detected_when_two_groups_reach_threshold() {
        let validators = (1..=6).map(|i| SignerId(format!("s{i}"))).collect::<Vec<_>>();
        let mut shares = Map::new();
        for v in &validators {
            shares.insert(v.clone(), 1);
        }
        let b = BoardConfig::new(validators, shares, 3);
        let mut tracker = JBlockObservationTracker::new();
        for i in 1..=3 {
            tracker.record(
                7,
                SignerId(format!("s{i}")),
                ObservedBlock {
                    block_hash: Hash32([0xaa; 32]),
                    events: vec![],
                    observed_at: 100,
                },
            );
        }
        for i in 4..=6 {
            tracker.record(
                7,
                SignerId(format!("s{i}")),
                ObservedBlock {
                    block_hash: Hash32([0xbb; 32]),
                    events: vec![],
                    observed_at: 100,
                },
            );
        }
        let err = tracker.tally(7, &b).unwrap_err();
        assert!(matches!(err, EntityError::JBlockForkDetected { height: 7 }));
    }
}
