//! In-memory CRDT store for [`GossipProfile`]s, one per entity. Merge is
//! commutative and idempotent, so profiles can arrive over any transport,
//! in any order, any number of times, without a merge ever regressing
//! state already applied.

use std::collections::HashMap;

use xln_core::{EntityId, GossipProfile, TokenId};

#[derive(Clone, Debug, Default)]
pub struct GossipStore {
    profiles: HashMap<EntityId, GossipProfile>,
}

impl GossipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an incoming profile. Returns `true` if it actually advanced
    /// the stored profile (i.e. wasn't a stale replay).
    pub fn apply(&mut self, incoming: GossipProfile) -> bool {
        match self.profiles.get_mut(&incoming.entity_id) {
            Some(existing) => {
                let before = existing.updated_at;
                existing.merge(&incoming);
                let advanced = existing.updated_at > before;
                if advanced {
                    tracing::debug!(entity = %incoming.entity_id, "gossip profile advanced");
                }
                advanced
            }
            None => {
                self.profiles.insert(incoming.entity_id.clone(), incoming);
                true
            }
        }
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&GossipProfile> {
        self.profiles.get(entity_id)
    }

    pub fn fee_for(
        &self,
        entity_id: &EntityId,
        token: TokenId,
        amount: xln_core::Collateral,
    ) -> Option<xln_core::Collateral> {
        self.get(entity_id)
            .and_then(|p| p.fee_schedule_for(token))
            .map(|fs| fs.fee_for(amount))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GossipProfile> {
        self.profiles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_core::FeeSchedule;

    fn profile(id: u8, ts: i64) -> GossipProfile {
        GossipProfile {
            entity_id: EntityId::from_bytes([id; 32]),
            onion_public_key: [0u8; 32],
            fee_schedules: vec![(TokenId(0), FeeSchedule { base_fee: 1, fee_rate_ppm: 100 })],
            updated_at: ts,
        }
    }

    #[test]
    fn first_apply_is_always_an_advance() {
        let mut store = GossipStore::new();
        assert!(store.apply(profile(1, 5)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stale_replay_does_not_advance() {
        let mut store = GossipStore::new();
        store.apply(profile(1, 10));
        assert!(!store.apply(profile(1, 5)));
        assert_eq!(store.get(&EntityId::from_bytes([1; 32])).unwrap().updated_at, 10);
    }
}
