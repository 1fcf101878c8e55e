//! The bilateral account state machine: a 2-of-2 analogue of the entity
//! board's BFT consensus, with a fixed left/right membership instead of
//! a weighted quorum.

use std::collections::HashMap;

use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;

use xln_core::{AccountKey, BlockHeight, EntityId, Role, Timestamp, XlnError};
use xln_crypto::{derive_account_key, verify_digest};

use crate::apply::apply_account_tx;
use crate::frame::{AccountFrame, AccountFrameHeader};
use crate::state::AccountState;
use crate::tx::AccountTx;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountPhase {
    Idle,
    Proposing,
    Locked,
}

struct PendingFrame {
    header: AccountFrameHeader,
    txs: Vec<AccountTx>,
    new_state: AccountState,
    proposer_role: Role,
    signatures: HashMap<Role, Signature>,
    proposed_at: Timestamp,
}

pub struct AccountMachine {
    pub entity_id: EntityId,
    pub counterparty_id: EntityId,
    pub account_key: AccountKey,
    pub role: Role,
    pub height: BlockHeight,
    pub phase: AccountPhase,
    pub state: AccountState,
    pending: Option<PendingFrame>,
}

impl AccountMachine {
    pub fn new(entity_id: EntityId, counterparty_id: EntityId) -> Self {
        let role = Role::of(&entity_id, &counterparty_id);
        let account_key = derive_account_key(&entity_id, &counterparty_id);
        Self {
            entity_id,
            counterparty_id,
            account_key,
            role,
            height: 0,
            phase: AccountPhase::Idle,
            state: AccountState::default(),
            pending: None,
        }
    }

    /// Propose the next frame on behalf of `proposer_role`. A proposer's
    /// own signature is logically part of sending a proposal, so a
    /// simultaneous collision is the norm, not the exception — the left
    /// role's proposal always wins it and discards whatever right had
    /// pending, signed or not. A right proposal never preempts an
    /// existing one.
    pub fn propose(
        &mut self,
        proposer_role: Role,
        txs: Vec<AccountTx>,
        now: Timestamp,
    ) -> Result<AccountFrameHeader, XlnError> {
        if let Some(existing) = &self.pending {
            let can_preempt = proposer_role == Role::Left && existing.proposer_role == Role::Right;
            if !can_preempt {
                return Err(XlnError::ConsensusReject("proposal already in flight".into()));
            }
        }
        if txs.is_empty() {
            return Err(XlnError::ConsensusReject("empty tx list".into()));
        }

        let prev_state_root = self.state.root();
        let mut new_state = self.state.clone();
        let mut accepted = Vec::with_capacity(txs.len());
        for tx in txs {
            if apply_account_tx(&mut new_state, &tx, proposer_role, now).is_ok() {
                accepted.push(tx);
            }
        }
        if accepted.is_empty() {
            return Err(XlnError::ConsensusReject("no tx survived validation".into()));
        }

        let header = AccountFrameHeader {
            account_key: self.account_key.clone(),
            height: self.height + 1,
            timestamp: now,
            proposer_role,
            prev_state_root,
            post_state_root: new_state.root(),
            tx_hashes: AccountFrame::tx_hashes(&accepted),
        };

        tracing::debug!(
            account = %self.account_key,
            height = header.height,
            "account frame proposed"
        );
        self.phase = AccountPhase::Proposing;
        self.pending = Some(PendingFrame {
            header: header.clone(),
            txs: accepted,
            new_state,
            proposer_role,
            signatures: HashMap::new(),
            proposed_at: now,
        });
        Ok(header)
    }

    /// Record `signer_role`'s signature over the in-flight header.
    /// Returns `true` once both sides have signed.
    pub fn precommit(
        &mut self,
        signer_role: Role,
        signature: Signature,
        pubkey: &PublicKey,
    ) -> Result<bool, XlnError> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| XlnError::ConsensusReject("no proposal in flight".into()))?;
        let digest = pending.header.hash();
        if !verify_digest(pubkey, &digest, &signature) {
            return Err(XlnError::ConsensusReject("bad precommit signature".into()));
        }
        pending.signatures.insert(signer_role, signature);
        let reached = pending.signatures.contains_key(&Role::Left)
            && pending.signatures.contains_key(&Role::Right);
        if reached {
            self.phase = AccountPhase::Locked;
        }
        Ok(reached)
    }

    pub fn commit(&mut self) -> Result<AccountFrame, XlnError> {
        if self.phase != AccountPhase::Locked {
            return Err(XlnError::ConsensusReject("proposal not locked".into()));
        }
        let pending = self.pending.take().expect("locked implies a pending frame");
        self.state = pending.new_state;
        self.height = pending.header.height;
        self.phase = AccountPhase::Idle;
        tracing::info!(account = %self.account_key, height = self.height, "account frame committed");
        Ok(AccountFrame { header: pending.header, txs: pending.txs })
    }

    /// Drop a stalled proposal if its counter-signature never arrived.
    /// The caller is responsible for re-submitting the dropped txs.
    pub fn check_proposal_timeout(&mut self, now: Timestamp, timeout_ms: u64) -> bool {
        let Some(pending) = &self.pending else { return false };
        if self.phase == AccountPhase::Locked {
            return false;
        }
        let elapsed_ms = now.saturating_sub(pending.proposed_at).saturating_mul(1000);
        if elapsed_ms < timeout_ms as i64 {
            return false;
        }
        self.pending = None;
        self.phase = AccountPhase::Idle;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_core::{Delta, TokenId};
    use xln_crypto::KeyPair;

    #[test]
    fn bilateral_payment_commits_with_both_signatures() {
        let left_kp = KeyPair::generate();
        let right_kp = KeyPair::generate();
        let mut left_id = [1u8; 32];
        let mut right_id = [2u8; 32];
        // Force a deterministic left/right ordering regardless of the
        // generated keys' signer bytes.
        left_id[0] = 0;
        right_id[0] = 1;
        let left_entity = EntityId::from_bytes(left_id);
        let right_entity = EntityId::from_bytes(right_id);

        let mut machine = AccountMachine::new(left_entity, right_entity);
        machine.state.deltas.insert(TokenId(0), Delta::zero(1_000));
        assert_eq!(machine.role, Role::Left);

        let tx = AccountTx::DirectPayment { token: TokenId(0), amount: 100 };
        let header = machine.propose(Role::Left, vec![tx], 1).unwrap();

        let sig_left = left_kp.sign_digest(&header.hash());
        assert!(!machine.precommit(Role::Left, sig_left, &left_kp.public_key).unwrap());

        let sig_right = right_kp.sign_digest(&header.hash());
        assert!(machine.precommit(Role::Right, sig_right, &right_kp.public_key).unwrap());

        let frame = machine.commit().unwrap();
        assert_eq!(frame.header.height, 1);
        assert_eq!(machine.state.deltas[&TokenId(0)].net(), -100);
    }

    #[test]
    fn left_proposal_preempts_unsigned_right_proposal() {
        let left_entity = EntityId::from_bytes([0u8; 32]);
        let right_entity = EntityId::from_bytes([1u8; 32]);
        let mut machine = AccountMachine::new(left_entity, right_entity);
        machine.state.deltas.insert(TokenId(0), Delta::zero(1_000));

        machine
            .propose(Role::Right, vec![AccountTx::DirectPayment { token: TokenId(0), amount: 10 }], 1)
            .unwrap();
        let header = machine
            .propose(Role::Left, vec![AccountTx::DirectPayment { token: TokenId(0), amount: 20 }], 1)
            .unwrap();
        assert_eq!(header.tx_hashes.len(), 1);
    }

    #[test]
    fn left_proposal_preempts_right_proposal_even_once_signed() {
        let left_entity = EntityId::from_bytes([0u8; 32]);
        let right_entity = EntityId::from_bytes([1u8; 32]);
        let right_kp = KeyPair::generate();
        let mut machine = AccountMachine::new(left_entity, right_entity);
        machine.state.deltas.insert(TokenId(0), Delta::zero(1_000));

        let right_header = machine
            .propose(Role::Right, vec![AccountTx::DirectPayment { token: TokenId(0), amount: 10 }], 1)
            .unwrap();
        // Right has already countersigned its own proposal — per spec
        // this is the realistic collision, and left still wins it.
        let right_sig = right_kp.sign_digest(&right_header.hash());
        assert!(!machine.precommit(Role::Right, right_sig, &right_kp.public_key).unwrap());

        let header = machine
            .propose(Role::Left, vec![AccountTx::DirectPayment { token: TokenId(0), amount: 20 }], 1)
            .unwrap();
        assert_eq!(header.tx_hashes.len(), 1);
        assert_eq!(machine.state.deltas.get(&TokenId(0)).map(|d| d.net()).unwrap_or(0), 0);
    }
}
