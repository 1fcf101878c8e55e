//! Pure per-transaction state transitions. No I/O, no clock reads beyond
//! the `timestamp` handed in by the caller — replaying the same tx list
//! against the same starting state always yields the same domain state
//! and the same output list.

use xln_core::{JEvent, XlnError};

use crate::state::EntityDomainState;
use crate::tx::EntityTx;

/// Side effects an entity-layer tx produces that something outside this
/// crate needs to act on (the runtime opening an account machine, a
/// gossip store relay, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityOutput {
    AccountOpenRequested { counterparty: xln_core::EntityId },
    HtlcHopObserved { account_key: xln_core::AccountKey, hop_index: u32 },
}

const CHAT_LOG_CAP: usize = 1_000;

/// Apply one tx to `state` in place. Returns the outputs it produced.
/// On error, `state` must not have been mutated — callers rely on this
/// to discard a bad tx without rebuilding the whole proposal.
pub fn apply_tx(state: &mut EntityDomainState, tx: &EntityTx) -> Result<Vec<EntityOutput>, XlnError> {
    match tx {
        EntityTx::Chat { message } => {
            if message.is_empty() {
                return Err(XlnError::ConsensusReject("empty chat message".into()));
            }
            state.chat_log.push(message.clone());
            if state.chat_log.len() > CHAT_LOG_CAP {
                let overflow = state.chat_log.len() - CHAT_LOG_CAP;
                state.chat_log.drain(0..overflow);
            }
            Ok(vec![])
        }

        EntityTx::AccountOpen { counterparty } => {
            if !state.opened_accounts.insert(counterparty.clone()) {
                return Err(XlnError::ConsensusReject("account already open".into()));
            }
            Ok(vec![EntityOutput::AccountOpenRequested { counterparty: counterparty.clone() }])
        }

        EntityTx::JEventApply { envelope } => {
            let key = envelope.dedup_key();
            if state.applied_jevents.contains(&key) {
                // Already applied by an earlier frame; idempotent no-op
                // so an oracle replaying history can't double-credit.
                return Ok(vec![]);
            }
            match &envelope.event {
                JEvent::ReserveCredited { token, amount, .. } => {
                    // Incoming reserves vacuum the debt queue for this
                    // token first; only the remainder becomes spendable
                    // reserve balance.
                    let consumed = state.debts.entry(*token).or_default().vacuum(*amount as u128);
                    let credited = amount.checked_sub(consumed as i128).ok_or_else(|| {
                        XlnError::InvariantViolation("reserve overflow".into())
                    })?;
                    if credited > 0 {
                        let entry = state.reserves.entry(*token).or_insert(0);
                        *entry = entry.checked_add(credited).ok_or_else(|| {
                            XlnError::InvariantViolation("reserve overflow".into())
                        })?;
                    }
                }
                JEvent::EntityRegistered { initial_reserves, .. } => {
                    for (token, amount) in initial_reserves {
                        let entry = state.reserves.entry(*token).or_insert(0);
                        *entry = entry.checked_add(*amount).ok_or_else(|| {
                            XlnError::InvariantViolation("reserve overflow".into())
                        })?;
                    }
                }
                // The collateral change itself lives on the named
                // account's `Delta`, one layer down; the runtime applies
                // that half and runs enforce-debts against `self.debts`
                // if it breaches RCPAN (`xln-runtime`'s `apply_one`).
                // This layer only needs the dedup record to reject
                // replay. Same for dispute outcomes.
                JEvent::CollateralUpdated { .. } | JEvent::DisputeOutcome { .. } => {}
            }
            state.applied_jevents.insert(key);
            Ok(vec![])
        }

        EntityTx::GossipPublish { profile } => {
            state
                .gossip
                .entry(profile.entity_id.clone())
                .and_modify(|existing| existing.merge(profile))
                .or_insert_with(|| profile.clone());
            Ok(vec![])
        }

        EntityTx::HtlcForward { account_key, hop_index } => {
            Ok(vec![EntityOutput::HtlcHopObserved { account_key: account_key.clone(), hop_index: *hop_index }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_core::{EntityId, JEventEnvelope, TokenId};

    #[test]
    fn duplicate_jevent_is_idempotent() {
        let mut state = EntityDomainState::default();
        let envelope = JEventEnvelope {
            j_height: 1,
            event_hash: [1u8; 32],
            event: JEvent::ReserveCredited {
                entity_id: EntityId::from_bytes([2u8; 32]),
                token: TokenId(0),
                amount: 100,
            },
        };
        let tx = EntityTx::JEventApply { envelope: envelope.clone() };
        apply_tx(&mut state, &tx).unwrap();
        apply_tx(&mut state, &tx).unwrap();
        assert_eq!(state.reserves[&TokenId(0)], 100);
    }

    #[test]
    fn reserve_credit_vacuums_outstanding_debt_before_crediting_reserves() {
        let mut state = EntityDomainState::default();
        let creditor = EntityId::from_bytes([3u8; 32]);
        state.debts.entry(TokenId(0)).or_default().push(creditor, 500, 0);

        let envelope = JEventEnvelope {
            j_height: 1,
            event_hash: [1u8; 32],
            event: JEvent::ReserveCredited {
                entity_id: EntityId::from_bytes([2u8; 32]),
                token: TokenId(0),
                amount: 300,
            },
        };
        apply_tx(&mut state, &EntityTx::JEventApply { envelope }).unwrap();

        assert_eq!(state.debts[&TokenId(0)].total(), 200);
        assert_eq!(state.reserves.get(&TokenId(0)), None, "fully consumed by the debt queue");
    }

    #[test]
    fn reopening_account_is_rejected() {
        let mut state = EntityDomainState::default();
        let counterparty = EntityId::from_bytes([9u8; 32]);
        let tx = EntityTx::AccountOpen { counterparty: counterparty.clone() };
        apply_tx(&mut state, &tx).unwrap();
        assert!(apply_tx(&mut state, &tx).is_err());
    }
}
