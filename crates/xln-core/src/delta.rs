//! Per-token bilateral balance state and the RCPAN invariant.

use serde::{Deserialize, Serialize};

use crate::error::XlnError;
use crate::types::{Balance, Collateral};

/// Per-token bilateral accounting for one account (channel).
///
/// `on_delta` moves only via jurisdiction settlement events; `off_delta`
/// moves via committed account frames. The RCPAN invariant bounds their
/// sum: `-left_credit_limit <= on_delta + off_delta <= collateral +
/// right_credit_limit`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub on_delta: Balance,
    pub off_delta: Balance,
    pub collateral: Collateral,
    pub left_credit_limit: Collateral,
    pub right_credit_limit: Collateral,
    pub left_htlc_hold: Collateral,
    pub right_htlc_hold: Collateral,
}

impl Delta {
    pub fn zero(collateral: Collateral) -> Self {
        Self {
            on_delta: 0,
            off_delta: 0,
            collateral,
            left_credit_limit: 0,
            right_credit_limit: 0,
            left_htlc_hold: 0,
            right_htlc_hold: 0,
        }
    }

    pub fn net(&self) -> Balance {
        self.on_delta + self.off_delta
    }

    /// RCPAN: `-L_l <= net <= C + L_r`. Checked after every committed
    /// frame and every applied HTLC lock/reveal/timeout.
    pub fn check_rcpan(&self) -> Result<(), XlnError> {
        let net = self.net();
        let lower = -(self.left_credit_limit as i128);
        let upper = self.collateral as i128 + self.right_credit_limit as i128;
        if net < lower || net > upper {
            return Err(XlnError::InvariantViolation(format!(
                "RCPAN breach: {net} not in [{lower}, {upper}]"
            )));
        }
        Ok(())
    }

    /// Funds the left side could spend right now: collateral + left's
    /// granted credit, minus what is already committed and minus any
    /// outstanding HTLC hold on that side.
    pub fn left_spendable(&self) -> Balance {
        let cap = self.collateral as i128 + self.left_credit_limit as i128;
        (cap - self.net() - self.left_htlc_hold as i128).max(0)
    }

    pub fn right_spendable(&self) -> Balance {
        let cap = self.collateral as i128 + self.right_credit_limit as i128;
        (cap + self.net() - self.right_htlc_hold as i128).max(0)
    }

    /// Apply a direct payment. `amount` is always positive; `from_left`
    /// selects the payer side. A left-send decreases `off_delta`, a
    /// right-send increases it.
    pub fn apply_payment(&mut self, amount: Balance, from_left: bool) -> Result<(), XlnError> {
        if amount <= 0 {
            return Err(XlnError::InvariantViolation("zero or negative amount".into()));
        }
        let mut trial = self.clone();
        if from_left {
            trial.off_delta -= amount;
        } else {
            trial.off_delta += amount;
        }
        trial.check_rcpan()?;
        *self = trial;
        Ok(())
    }

    pub fn lock_hold(&mut self, amount: Collateral, on_left: bool) -> Result<(), XlnError> {
        let mut trial = self.clone();
        if on_left {
            trial.left_htlc_hold += amount;
        } else {
            trial.right_htlc_hold += amount;
        }
        trial.check_rcpan()?;
        *self = trial;
        Ok(())
    }

    /// Release a hold (reveal success or timeout/cancel). Guards against
    /// underflow — releasing more than is held is a bug, never a valid
    /// state transition.
    pub fn release_hold(&mut self, amount: Collateral, on_left: bool) -> Result<(), XlnError> {
        let hold = if on_left { &mut self.left_htlc_hold } else { &mut self.right_htlc_hold };
        *hold = hold
            .checked_sub(amount)
            .ok_or_else(|| XlnError::InvariantViolation("hold underflow on release".into()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_within_collateral_accepted() {
        let mut d = Delta::zero(1000);
        d.left_credit_limit = 500;
        d.apply_payment(400, true).unwrap();
        assert_eq!(d.net(), -400);
    }

    #[test]
    fn payment_exceeding_limit_rejected() {
        let mut d = Delta::zero(1000);
        // left_credit_limit = 0 → left may not go negative at all.
        let err = d.apply_payment(400, true).unwrap_err();
        assert!(matches!(err, XlnError::InvariantViolation(_)));
        assert_eq!(d.net(), 0, "rejected payment must not mutate state via apply_payment's own check");
    }

    #[test]
    fn hold_release_underflow_guarded() {
        let mut d = Delta::zero(1000);
        let err = d.release_hold(1, true).unwrap_err();
        assert!(matches!(err, XlnError::InvariantViolation(_)));
    }
}
