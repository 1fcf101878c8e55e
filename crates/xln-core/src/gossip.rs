//! The one piece of state entities publish about themselves for routing
//! purposes. Merged CRDT-style by the routing layer: last-writer-wins on
//! `updated_at`, no deletes, so a stale gossip store never loses data by
//! merging with a fresher one out of order.

use serde::{Deserialize, Serialize};

use crate::types::{Collateral, EntityId, TokenId, Timestamp};

/// One token's advertised per-hop fee schedule: a flat base plus a rate
/// applied to the forwarded amount, in parts-per-million.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_fee: Collateral,
    pub fee_rate_ppm: u32,
}

impl FeeSchedule {
    pub fn fee_for(&self, amount: Collateral) -> Collateral {
        self.base_fee + (amount * self.fee_rate_ppm as u128) / 1_000_000
    }
}

/// An entity's self-published routing hints: which tokens it holds
/// accounts in, what it charges to forward, and the X25519 key peers
/// encrypt onion layers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipProfile {
    pub entity_id: EntityId,
    pub onion_public_key: [u8; 32],
    pub fee_schedules: Vec<(TokenId, FeeSchedule)>,
    pub updated_at: Timestamp,
}

impl GossipProfile {
    /// Last-writer-wins merge: `incoming` replaces `self` only if it is
    /// strictly newer. Ties keep the existing profile so merge is
    /// idempotent under replay.
    pub fn merge(&mut self, incoming: &GossipProfile) {
        if incoming.updated_at > self.updated_at {
            *self = incoming.clone();
        }
    }

    pub fn fee_schedule_for(&self, token: TokenId) -> Option<FeeSchedule> {
        self.fee_schedules
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, fs)| *fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: u8, ts: Timestamp) -> GossipProfile {
        GossipProfile {
            entity_id: EntityId::from_bytes([id; 32]),
            onion_public_key: [0u8; 32],
            fee_schedules: vec![],
            updated_at: ts,
        }
    }

    #[test]
    fn newer_profile_wins() {
        let mut a = profile(1, 10);
        let b = profile(1, 20);
        a.merge(&b);
        assert_eq!(a.updated_at, 20);
    }

    #[test]
    fn older_profile_is_ignored() {
        let mut a = profile(1, 20);
        let b = profile(1, 10);
        a.merge(&b);
        assert_eq!(a.updated_at, 20);
    }
}
