//! Turns a batch of jurisdiction events into the initial entity state the
//! runtime starts from. This is the one place state is created without a
//! consensus round — entities do not yet have replicas or mempools here,
//! only the reserves and board commitment the jurisdiction oracle attests
//! to at registration time.

use std::collections::{BTreeSet, HashMap};

use xln_core::{EntityId, JEvent, JEventEnvelope, XlnError};
use xln_entity::EntityDomainState;

#[derive(Clone, Debug, Default)]
pub struct GenesisState {
    pub entities: HashMap<EntityId, EntityDomainState>,
    /// The jurisdiction's attested board commitment per entity. The full
    /// board membership arrives later, out of band; only its hash is
    /// known at registration time.
    pub board_commitments: HashMap<EntityId, [u8; 32]>,
}

/// Fold `events` into a [`GenesisState`], in order. Events already seen
/// under the same `(j_height, event_hash)` pair are skipped rather than
/// reapplied, so the same batch can be replayed safely.
pub fn apply_genesis(events: &[JEventEnvelope]) -> Result<GenesisState, XlnError> {
    let mut state = GenesisState::default();
    let mut seen = BTreeSet::new();

    for envelope in events {
        let key = envelope.dedup_key();
        if !seen.insert(key) {
            tracing::debug!(j_height = key.0, "duplicate genesis event, skipping");
            continue;
        }
        apply_one(&mut state, &envelope.event)?;
    }

    tracing::info!(entities = state.entities.len(), "genesis state built");
    Ok(state)
}

fn apply_one(state: &mut GenesisState, event: &JEvent) -> Result<(), XlnError> {
    match event {
        JEvent::EntityRegistered { entity_id, board_commitment, initial_reserves } => {
            if state.entities.contains_key(entity_id) {
                return Err(XlnError::ConsensusReject(format!(
                    "entity {entity_id} registered twice in genesis batch"
                )));
            }
            let mut domain = EntityDomainState::default();
            for (token, amount) in initial_reserves {
                if *amount < 0 {
                    return Err(XlnError::InvariantViolation(
                        "negative initial reserve".into(),
                    ));
                }
                domain.reserves.insert(*token, *amount);
            }
            state.entities.insert(entity_id.clone(), domain);
            state.board_commitments.insert(entity_id.clone(), *board_commitment);
            tracing::info!(entity = %entity_id, "genesis: entity registered");
            Ok(())
        }

        JEvent::ReserveCredited { entity_id, token, amount } => {
            let domain = state
                .entities
                .get_mut(entity_id)
                .ok_or_else(|| XlnError::DependencyGap(format!("unknown entity {entity_id}")))?;
            let current = domain.reserves.entry(*token).or_insert(0);
            *current = current
                .checked_add(*amount)
                .ok_or_else(|| XlnError::InvariantViolation("reserve overflow".into()))?;
            Ok(())
        }

        // Account-layer concerns: no account machine exists yet at
        // genesis time, so these are no-ops until replayed post-bootstrap.
        JEvent::CollateralUpdated { .. } | JEvent::DisputeOutcome { .. } => {
            tracing::debug!("genesis: ignoring account-layer event");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_core::TokenId;

    fn envelope(j_height: u64, hash_seed: u8, event: JEvent) -> JEventEnvelope {
        JEventEnvelope { j_height, event_hash: [hash_seed; 32], event }
    }

    #[test]
    fn registers_entity_with_initial_reserves() {
        let entity_id = EntityId::from_bytes([9u8; 32]);
        let events = vec![envelope(
            1,
            1,
            JEvent::EntityRegistered {
                entity_id: entity_id.clone(),
                board_commitment: [0u8; 32],
                initial_reserves: vec![(TokenId(0), 1_000)],
            },
        )];
        let state = apply_genesis(&events).unwrap();
        assert_eq!(state.entities[&entity_id].reserves[&TokenId(0)], 1_000);
    }

    #[test]
    fn duplicate_events_are_idempotent() {
        let entity_id = EntityId::from_bytes([9u8; 32]);
        let register = JEvent::EntityRegistered {
            entity_id: entity_id.clone(),
            board_commitment: [0u8; 32],
            initial_reserves: vec![(TokenId(0), 500)],
        };
        let events = vec![envelope(1, 1, register.clone()), envelope(1, 1, register)];
        let state = apply_genesis(&events).unwrap();
        assert_eq!(state.entities[&entity_id].reserves[&TokenId(0)], 500);
    }

    #[test]
    fn reserve_credit_to_unknown_entity_fails() {
        let events = vec![envelope(
            1,
            1,
            JEvent::ReserveCredited { entity_id: EntityId::from_bytes([1u8; 32]), token: TokenId(0), amount: 10 },
        )];
        assert!(apply_genesis(&events).is_err());
    }
}
