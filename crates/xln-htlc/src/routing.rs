//! HTLC routing context (§4.3, §7 "cyclic HTLC routing graph"): owned by
//! the intermediary entity that sees both legs of a forwarded payment.
//! Kept as a flat map, never a shared graph — no node here is visible to
//! any other entity's replica.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xln_core::{Amount, EntityId, HashLock, LockId};

/// One hop's worth of routing state for a hash-locked forward.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HtlcRoute {
    pub inbound_entity: Option<EntityId>,
    pub inbound_lock_id: Option<LockId>,
    pub outbound_entity: Option<EntityId>,
    pub outbound_lock_id: Option<LockId>,
    pub secret: Option<[u8; 32]>,
    pub pending_fee: Option<Amount>,
}

impl HtlcRoute {
    pub fn is_terminal(&self) -> bool {
        self.outbound_entity.is_none()
    }

    pub fn is_origin(&self) -> bool {
        self.inbound_entity.is_none()
    }
}

/// `htlcRoutes: hashlock -> HtlcRoute`, owned by one entity (§4.3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: HashMap<HashLock, HtlcRoute>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hashlock: HashLock, route: HtlcRoute) {
        self.routes.insert(hashlock, route);
    }

    pub fn get(&self, hashlock: &HashLock) -> Option<&HtlcRoute> {
        self.routes.get(hashlock)
    }

    pub fn get_mut(&mut self, hashlock: &HashLock) -> Option<&mut HtlcRoute> {
        self.routes.get_mut(hashlock)
    }

    pub fn remove(&mut self, hashlock: &HashLock) -> Option<HtlcRoute> {
        self.routes.remove(hashlock)
    }

    /// Record the secret on an existing route so it can be pushed to the
    /// inbound leg — the backward-propagation step of §4.3.
    pub fn record_secret(&mut self, hashlock: &HashLock, secret: [u8; 32]) -> Option<&HtlcRoute> {
        let route = self.routes.get_mut(hashlock)?;
        route.secret = Some(secret);
        Some(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_origin_detection() {
        let mut table = RoutingTable::new();
        let hashlock = HashLock::ZERO;
        table.insert(
            hashlock,
            HtlcRoute {
                inbound_entity: Some(EntityId::from_bytes([1u8; 32])),
                inbound_lock_id: Some("in-1".into()),
                outbound_entity: None,
                outbound_lock_id: None,
                secret: None,
                pending_fee: None,
            },
        );
        let route = table.get(&hashlock).unwrap();
        assert!(route.is_terminal());
        assert!(!route.is_origin());
    }

    #[test]
    fn secret_propagates_onto_existing_route() {
        let mut table = RoutingTable::new();
        let hashlock = HashLock::ZERO;
        table.insert(hashlock, HtlcRoute::default());
        let secret = [9u8; 32];
        assert!(table.record_secret(&hashlock, secret).is_some());
        assert_eq!(table.get(&hashlock).unwrap().secret, Some(secret));
    }
}
