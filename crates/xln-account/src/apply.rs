//! Pure per-transaction transitions over [`AccountState`].

use xln_core::{Delta, HtlcResolution, Role, Timestamp, XlnError};

use crate::htlc::PendingHtlc;
use crate::state::AccountState;
use crate::tx::AccountTx;

/// Apply one tx, proposed by whichever side holds `proposer_role` this
/// round. Mutates `state` only on success.
pub fn apply_account_tx(
    state: &mut AccountState,
    tx: &AccountTx,
    proposer_role: Role,
    now: Timestamp,
) -> Result<(), XlnError> {
    match tx {
        AccountTx::DirectPayment { token, amount } => {
            if *amount == 0 {
                return Err(XlnError::InvariantViolation("zero amount payment".into()));
            }
            // A voluntary bilateral payment that would breach RCPAN
            // simply rejects — debt is never created here. Debt only
            // ever comes from the entity-level enforce-debts procedure
            // reacting to a J-event-driven collateral shortfall
            // (`xln_entity::apply`), and the outgoing freeze it imposes
            // is enforced one layer up, before this tx is even proposed.
            let delta = state.deltas.entry(*token).or_insert_with(|| Delta::zero(0));
            let from_left = proposer_role == Role::Left;
            delta.apply_payment(*amount as i128, from_left)
        }

        AccountTx::HtlcLock { lock } => {
            if state.htlc_locks.contains_key(&lock.lock.hashlock) {
                return Err(XlnError::ConsensusReject("hashlock already locked".into()));
            }
            let delta = state
                .deltas
                .entry(lock.lock.token)
                .or_insert_with(|| Delta::zero(0));
            let on_left = proposer_role == Role::Left;
            delta.lock_hold(lock.lock.amount, on_left)?;
            state.htlc_locks.insert(lock.lock.hashlock.clone(), lock.clone());
            Ok(())
        }

        AccountTx::HtlcReveal { hashlock, secret } => {
            let pending = state
                .htlc_locks
                .get(hashlock)
                .ok_or_else(|| XlnError::DependencyGap("unknown hashlock".into()))?
                .clone();
            let computed = xln_crypto::hashlock_of(secret);
            if &computed != hashlock {
                return Err(XlnError::ConsensusReject("secret does not match hashlock".into()));
            }
            settle_htlc(state, hashlock, &pending, true)
        }

        AccountTx::HtlcResolve { hashlock, resolution } => {
            let pending = state
                .htlc_locks
                .get(hashlock)
                .ok_or_else(|| XlnError::DependencyGap("unknown hashlock".into()))?
                .clone();
            match resolution {
                HtlcResolution::Reveal { secret } => {
                    let computed = xln_crypto::hashlock_of(secret);
                    if &computed != hashlock {
                        return Err(XlnError::ConsensusReject("bad reveal secret".into()));
                    }
                    settle_htlc(state, hashlock, &pending, true)
                }
                HtlcResolution::Timeout => settle_htlc(state, hashlock, &pending, false),
                HtlcResolution::Cancel => settle_htlc(state, hashlock, &pending, false),
            }
        }

        AccountTx::CreditUpdate { token, new_limit } => {
            let delta = state.deltas.entry(*token).or_insert_with(|| Delta::zero(0));
            match proposer_role {
                Role::Left => delta.right_credit_limit = *new_limit,
                Role::Right => delta.left_credit_limit = *new_limit,
            }
            delta.check_rcpan()
        }
    }
}

/// Release an HTLC's hold. `paid` decides whether the locked amount also
/// moves as a payment toward the direction the lock was headed
/// (reveal) or simply unwinds back to the holder (timeout/cancel).
fn settle_htlc(
    state: &mut AccountState,
    hashlock: &xln_core::SecretHash,
    pending: &PendingHtlc,
    paid: bool,
) -> Result<(), XlnError> {
    let on_left = pending.lock.direction == xln_core::Direction::Left;
    let delta = state
        .deltas
        .get_mut(&pending.lock.token)
        .ok_or_else(|| XlnError::StateCorruption("delta missing for locked token".into()))?;
    delta.release_hold(pending.lock.amount, on_left)?;
    if paid {
        delta.apply_payment(pending.lock.amount as i128, on_left)?;
    }
    state.htlc_locks.remove(hashlock);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_core::{Direction, HtlcLock, SecretHash, TokenId};

    fn htlc(token: TokenId, amount: u128, hashlock: SecretHash) -> PendingHtlc {
        PendingHtlc {
            lock: HtlcLock {
                hashlock,
                amount,
                token,
                timelock_block: 100,
                direction: Direction::Left,
                onion_layers: vec![],
            },
            created_at: 0,
        }
    }

    #[test]
    fn direct_payment_beyond_limit_rejects_instead_of_becoming_debt() {
        let mut state = AccountState::default();
        let tx = AccountTx::DirectPayment { token: TokenId(0), amount: 500 };
        let err = apply_account_tx(&mut state, &tx, Role::Left, 10).unwrap_err();
        assert!(matches!(err, XlnError::InvariantViolation(_)));
        assert_eq!(state.deltas.get(&TokenId(0)).map(|d| d.net()).unwrap_or(0), 0);
    }

    #[test]
    fn reveal_releases_hold_and_pays() {
        let mut state = AccountState::default();
        state.deltas.insert(TokenId(0), xln_core::Delta {
            collateral: 1_000,
            ..xln_core::Delta::zero(1_000)
        });
        let secret = b"s3cr3t".to_vec();
        let hashlock = xln_crypto::hashlock_of(&secret);
        let lock = AccountTx::HtlcLock { lock: htlc(TokenId(0), 100, hashlock.clone()) };
        apply_account_tx(&mut state, &lock, Role::Left, 0).unwrap();
        assert_eq!(state.deltas[&TokenId(0)].left_htlc_hold, 100);

        let reveal = AccountTx::HtlcReveal { hashlock: hashlock.clone(), secret };
        apply_account_tx(&mut state, &reveal, Role::Left, 1).unwrap();
        assert_eq!(state.deltas[&TokenId(0)].left_htlc_hold, 0);
        assert_eq!(state.deltas[&TokenId(0)].net(), -100);
        assert!(!state.htlc_locks.contains_key(&hashlock));
    }
}
