//! Hanko — threshold signature aggregation and packaging (§4.8).
//!
//! A Hanko assembles entity-level thresholds out of individual leaf
//! signatures. Claims may nest: a claim's quorum can be satisfied by other
//! claims that already resolved (a sub-entity's own board threshold met),
//! letting one Hanko express an arbitrarily deep chain of delegated
//! thresholds without the core ever seeing a private key.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use xln_core::{EntityId, Hash32, Signature, SignerId};

use crate::provider::SignatureProvider;

/// Either a signer or an entity, for reporting who voted yes/no on a claim.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Principal {
    Signer(SignerId),
    Entity(EntityId),
}

/// One leaf (EOA-equivalent) signature packed into a Hanko.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PackedSignature {
    pub signer_id: SignerId,
    pub signature: Signature,
}

/// Where a claim's weighted quorum member comes from: a packed leaf
/// signature, or another claim in the same Hanko that already resolved its
/// own sub-threshold.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuorumSource {
    PackedSignature(usize),
    Claim(usize),
}

/// Assembles one entity-level threshold out of weighted quorum members
/// (§4.8 `claims[]`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HankoClaim {
    pub entity_id: EntityId,
    pub entity_indexes: Vec<QuorumSource>,
    pub weights: Vec<u64>,
    pub threshold: u64,
    /// Digest of the expected validator set, so a claim cannot be replayed
    /// against a board that has since changed composition.
    pub expected_quorum_hash: Hash32,
}

/// A (possibly partial) aggregated signature over some digest.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Hanko {
    pub placeholders: Vec<EntityId>,
    pub packed_signatures: Vec<PackedSignature>,
    pub claims: Vec<HankoClaim>,
}

impl Hanko {
    pub fn empty() -> Self {
        Self {
            placeholders: Vec::new(),
            packed_signatures: Vec::new(),
            claims: Vec::new(),
        }
    }

    /// Merge two partial Hankos over the same digest: union the packed
    /// signatures and re-count weights (§4.8: "Safe to merge two partial
    /// Hankos by union of packedSignatures and re-counting weights").
    pub fn merge(&self, other: &Hanko) -> Hanko {
        let mut packed = self.packed_signatures.clone();
        let mut seen: HashSet<SignerId> =
            packed.iter().map(|p| p.signer_id.clone()).collect();
        for p in &other.packed_signatures {
            if seen.insert(p.signer_id.clone()) {
                packed.push(p.clone());
            }
        }
        // Claims are keyed by entity_id; prefer `self`'s claim definitions
        // but accept any the other Hanko carries that we're missing.
        let mut claims = self.claims.clone();
        let have: HashSet<EntityId> = claims.iter().map(|c| c.entity_id.clone()).collect();
        for c in &other.claims {
            if !have.contains(&c.entity_id) {
                claims.push(c.clone());
            }
        }
        let mut placeholders = self.placeholders.clone();
        for p in &other.placeholders {
            if !placeholders.contains(p) {
                placeholders.push(p.clone());
            }
        }
        Hanko {
            placeholders,
            packed_signatures: packed,
            claims,
        }
    }
}

/// Result of resolving a claim (or the whole Hanko) against a digest.
#[derive(Clone, Debug, PartialEq)]
pub struct HankoVerification {
    pub valid: bool,
    pub entity_id: EntityId,
    pub yes_entities: Vec<Principal>,
    pub no_entities: Vec<Principal>,
    pub completion_pct: f64,
}

/// A leaf signer's public key, as resolved from the board configuration the
/// claim was issued against. The Hanko itself never stores keys.
pub trait PublicKeyLookup {
    fn lookup(&self, signer_id: &SignerId) -> Option<xln_core::PublicKey>;
}

fn resolve_claim<P: SignatureProvider, L: PublicKeyLookup>(
    hanko: &Hanko,
    claim_idx: usize,
    digest: &[u8],
    keys: &L,
    memo: &mut Vec<Option<HankoVerification>>,
) -> HankoVerification {
    if let Some(Some(cached)) = memo.get(claim_idx) {
        return cached.clone();
    }
    let claim = &hanko.claims[claim_idx];
    let mut yes_weight: u64 = 0;
    let mut yes_entities = Vec::new();
    let mut no_entities = Vec::new();

    for (member, weight) in claim.entity_indexes.iter().zip(claim.weights.iter()) {
        match member {
            QuorumSource::PackedSignature(i) => {
                let Some(packed) = hanko.packed_signatures.get(*i) else {
                    continue;
                };
                let ok = match keys.lookup(&packed.signer_id) {
                    Some(pk) => P::verify(&pk, digest, &packed.signature),
                    None => false,
                };
                if ok {
                    yes_weight += weight;
                    yes_entities.push(Principal::Signer(packed.signer_id.clone()));
                } else {
                    no_entities.push(Principal::Signer(packed.signer_id.clone()));
                }
            }
            QuorumSource::Claim(j) => {
                if *j == claim_idx {
                    // A claim may never reference itself — treat as a no-vote.
                    continue;
                }
                let sub = resolve_claim::<P, L>(hanko, *j, digest, keys, memo);
                if sub.valid {
                    yes_weight += weight;
                    yes_entities.push(Principal::Entity(sub.entity_id.clone()));
                } else {
                    no_entities.push(Principal::Entity(sub.entity_id.clone()));
                }
            }
        }
    }

    let total_weight: u64 = claim.weights.iter().sum();
    let completion_pct = if total_weight == 0 {
        0.0
    } else {
        (yes_weight as f64 / total_weight as f64) * 100.0
    };

    let result = HankoVerification {
        valid: yes_weight >= claim.threshold,
        entity_id: claim.entity_id.clone(),
        yes_entities,
        no_entities,
        completion_pct,
    };
    if memo.len() <= claim_idx {
        memo.resize(claim_idx + 1, None);
    }
    memo[claim_idx] = Some(result.clone());
    result
}

/// `verifyHankoForHash(hanko, hash, expectedEntityId)` (§4.8): recursively
/// resolve the claim for `expected_entity_id` against `digest`.
pub fn verify_hanko_for_hash<P: SignatureProvider, L: PublicKeyLookup>(
    hanko: &Hanko,
    digest: &[u8],
    expected_entity_id: &EntityId,
    keys: &L,
) -> HankoVerification {
    let Some(idx) = hanko
        .claims
        .iter()
        .position(|c| &c.entity_id == expected_entity_id)
    else {
        return HankoVerification {
            valid: false,
            entity_id: expected_entity_id.clone(),
            yes_entities: Vec::new(),
            no_entities: Vec::new(),
            completion_pct: 0.0,
        };
    };
    let mut memo = vec![None; hanko.claims.len()];
    resolve_claim::<P, L>(hanko, idx, digest, keys, &mut memo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DilithiumKeyStore;
    use std::collections::HashMap;

    struct MapLookup(HashMap<SignerId, xln_core::PublicKey>);
    impl PublicKeyLookup for MapLookup {
        fn lookup(&self, signer_id: &SignerId) -> Option<xln_core::PublicKey> {
            self.0.get(signer_id).cloned()
        }
    }

    #[test]
    fn two_of_three_leaf_threshold() {
        let mut store = DilithiumKeyStore::new();
        let a = SignerId("a".into());
        let b = SignerId("b".into());
        let c = SignerId("c".into());
        for s in [&a, &b, &c] {
            store.generate(s.clone());
        }
        let digest = b"entity frame digest";
        let sig_a = store.sign(&a, digest).unwrap();
        let sig_b = store.sign(&b, digest).unwrap();

        let mut lookup = HashMap::new();
        for s in [&a, &b, &c] {
            lookup.insert(s.clone(), store.public_key(s).unwrap());
        }
        let lookup = MapLookup(lookup);

        let entity_id = EntityId::from_bytes([7u8; 32]);
        let hanko = Hanko {
            placeholders: vec![],
            packed_signatures: vec![
                PackedSignature { signer_id: a.clone(), signature: sig_a },
                PackedSignature { signer_id: b.clone(), signature: sig_b },
            ],
            claims: vec![HankoClaim {
                entity_id: entity_id.clone(),
                entity_indexes: vec![
                    QuorumSource::PackedSignature(0),
                    QuorumSource::PackedSignature(1),
                ],
                weights: vec![1, 1],
                threshold: 2,
                expected_quorum_hash: Hash32::ZERO,
            }],
        };

        let verification = verify_hanko_for_hash::<DilithiumKeyStore, _>(
            &hanko,
            digest,
            &entity_id,
            &lookup,
        );
        assert!(verification.valid);
        assert_eq!(verification.yes_entities.len(), 2);
    }

    #[test]
    fn nested_claim_resolves_recursively() {
        let mut store = DilithiumKeyStore::new();
        let a = SignerId("a".into());
        store.generate(a.clone());
        let digest = b"digest";
        let sig_a = store.sign(&a, digest).unwrap();
        let mut map = HashMap::new();
        map.insert(a.clone(), store.public_key(&a).unwrap());
        let lookup = MapLookup(map);

        let sub_entity = EntityId::from_bytes([1u8; 32]);
        let root_entity = EntityId::from_bytes([2u8; 32]);

        let hanko = Hanko {
            placeholders: vec![],
            packed_signatures: vec![PackedSignature {
                signer_id: a.clone(),
                signature: sig_a,
            }],
            claims: vec![
                HankoClaim {
                    entity_id: sub_entity.clone(),
                    entity_indexes: vec![QuorumSource::PackedSignature(0)],
                    weights: vec![1],
                    threshold: 1,
                    expected_quorum_hash: Hash32::ZERO,
                },
                HankoClaim {
                    entity_id: root_entity.clone(),
                    entity_indexes: vec![QuorumSource::Claim(0)],
                    weights: vec![1],
                    threshold: 1,
                    expected_quorum_hash: Hash32::ZERO,
                },
            ],
        };

        let verification = verify_hanko_for_hash::<DilithiumKeyStore, _>(
            &hanko,
            digest,
            &root_entity,
            &lookup,
        );
        assert!(verification.valid);
    }

    #[test]
    fn merge_unions_packed_signatures() {
        let a = SignerId("a".into());
        let b = SignerId("b".into());
        let h1 = Hanko {
            placeholders: vec![],
            packed_signatures: vec![PackedSignature {
                signer_id: a.clone(),
                signature: Signature(vec![1]),
            }],
            claims: vec![],
        };
        let h2 = Hanko {
            placeholders: vec![],
            packed_signatures: vec![PackedSignature {
                signer_id: b.clone(),
                signature: Signature(vec![2]),
            }],
            claims: vec![],
        };
        let merged = h1.merge(&h2);
        assert_eq!(merged.packed_signatures.len(), 2);
    }
}
