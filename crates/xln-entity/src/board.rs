//! The per-entity board configuration: validators, shares, threshold (§3
//! `Entity.config`, §4.4).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xln_core::SignerId;

/// Consensus mode for the board. Only proposer-rotation BFT is specified
/// (§4.4); kept as an enum so a future mode doesn't reshape every call site.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsensusMode {
    ProposerBft,
}

/// `{validators, shares, threshold, mode}` (§3). `sum(shares) >= threshold`
/// is required at construction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoardConfig {
    pub validators: Vec<SignerId>,
    pub shares: HashMap<SignerId, u64>,
    pub threshold: u64,
    pub mode: ConsensusMode,
}

impl BoardConfig {
    pub fn new(validators: Vec<SignerId>, shares: HashMap<SignerId, u64>, threshold: u64) -> Self {
        Self {
            validators,
            shares,
            threshold,
            mode: ConsensusMode::ProposerBft,
        }
    }

    pub fn share_of(&self, signer: &SignerId) -> u64 {
        self.shares.get(signer).copied().unwrap_or(0)
    }

    pub fn sum_shares(&self) -> u64 {
        self.shares.values().sum()
    }

    pub fn is_validator(&self, signer: &SignerId) -> bool {
        self.validators.contains(signer)
    }

    /// Proposer for `height`, by deterministic rotation over the
    /// *configured* validator order (not stake-sorted).
    pub fn proposer_for_height(&self, height: u64) -> Option<&SignerId> {
        if self.validators.is_empty() {
            return None;
        }
        let idx = (height as usize) % self.validators.len();
        self.validators.get(idx)
    }

    /// Weighted sum of shares held by `signers`.
    pub fn weight_of<'a>(&self, signers: impl IntoIterator<Item = &'a SignerId>) -> u64 {
        signers.into_iter().map(|s| self.share_of(s)).sum()
    }

    pub fn meets_threshold<'a>(&self, signers: impl IntoIterator<Item = &'a SignerId>) -> bool {
        self.weight_of(signers) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> BoardConfig {
        let validators = vec![SignerId("A".into()), SignerId("B".into()), SignerId("C".into())];
        let mut shares = HashMap::new();
        shares.insert(SignerId("A".into()), 1);
        shares.insert(SignerId("B".into()), 1);
        shares.insert(SignerId("C".into()), 1);
        BoardConfig::new(validators, shares, 2)
    }

    #[test]
    fn proposer_rotates_by_height_mod_validator_count() {
        let b = board();
        assert_eq!(b.proposer_for_height(0), Some(&SignerId("A".into())));
        assert_eq!(b.proposer_for_height(1), Some(&SignerId("B".into())));
        assert_eq!(b.proposer_for_height(3), Some(&SignerId("A".into())));
    }

    #[test]
    fn threshold_met_by_two_of_three() {
        let b = board();
        let a = SignerId("A".into());
        let c = SignerId("C".into());
        assert!(b.meets_threshold([&a, &c]));
        assert!(!b.meets_threshold([&a]));
    }
}
