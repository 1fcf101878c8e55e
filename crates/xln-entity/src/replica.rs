//! The entity replica: a single-parent BFT state machine. Every signer
//! on the board runs its own copy and reaches the same frames because
//! `propose`/`apply_tx` are pure functions of mempool contents.

use std::collections::{HashMap, HashSet};

use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;

use xln_core::constants::TIMEOUT_PROPOSAL_MS;
use xln_core::{sort_mempool, Board, BlockHeight, Signer, Timestamp, XlnError};
use xln_crypto::{verify_digest, Hanko};

use crate::apply::{apply_tx, EntityOutput};
use crate::frame::{EntityFrame, EntityFrameHeader};
use crate::state::EntityDomainState;
use crate::tx::{tx_hash, unsigned_digest, SignedEntityTx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaPhase {
    /// No proposal in flight; any member may call `propose`.
    Idle,
    /// A header has been built and broadcast; collecting precommits.
    Proposing,
    /// Quorum reached; waiting for `commit` to fold it into state.
    Locked,
}

struct PendingProposal {
    header: EntityFrameHeader,
    txs: Vec<SignedEntityTx>,
    new_state: EntityDomainState,
    signatures: HashMap<Signer, Signature>,
    proposed_at: Timestamp,
}

pub struct EntityReplica {
    pub entity_id: xln_core::EntityId,
    pub board: Board,
    pub height: BlockHeight,
    pub phase: ReplicaPhase,
    pub state: EntityDomainState,
    pub mempool: Vec<SignedEntityTx>,
    pub signer_nonces: HashMap<Signer, u64>,
    proposal: Option<PendingProposal>,
}

impl EntityReplica {
    pub fn genesis(entity_id: xln_core::EntityId, board: Board) -> Self {
        Self {
            entity_id,
            board,
            height: 0,
            phase: ReplicaPhase::Idle,
            state: EntityDomainState::default(),
            mempool: Vec::new(),
            signer_nonces: HashMap::new(),
            proposal: None,
        }
    }

    /// The proposer eligible to build the *next* frame, `height + 1`.
    pub fn expected_proposer(&self) -> &Signer {
        self.board.proposer_at(self.height + 1)
    }

    /// Admit a tx into the mempool. Strict per-signer nonce ordering:
    /// each signer's next tx must carry exactly `last_seen + 1`.
    pub fn submit_tx(
        &mut self,
        signed: SignedEntityTx,
        pubkey: &PublicKey,
    ) -> Result<(), XlnError> {
        if !self.board.is_member(&signed.from) {
            return Err(XlnError::NotAuthorized("signer not on board".into()));
        }
        let expected = self.signer_nonces.get(&signed.from).copied().unwrap_or(0) + 1;
        if signed.nonce != expected {
            return Err(XlnError::ConsensusReject(format!(
                "nonce {} != expected {}",
                signed.nonce, expected
            )));
        }
        let digest = unsigned_digest(&signed.tx, &signed.from, signed.nonce);
        if !verify_digest(pubkey, digest.as_bytes(), &signed.signature) {
            return Err(XlnError::ConsensusReject("bad tx signature".into()));
        }
        self.signer_nonces.insert(signed.from.clone(), signed.nonce);
        self.mempool.push(signed);
        Ok(())
    }

    /// Build a proposal from the current mempool. The single-signer
    /// board is always its own proposer regardless of height; a
    /// multi-member board requires `proposer` to match
    /// `expected_proposer()`.
    pub fn propose(
        &mut self,
        proposer: &Signer,
        timestamp: Timestamp,
    ) -> Result<EntityFrameHeader, XlnError> {
        if self.phase != ReplicaPhase::Idle {
            return Err(XlnError::ConsensusReject("proposal already in flight".into()));
        }
        if !self.board.is_single_signer() && proposer != self.expected_proposer() {
            return Err(XlnError::NotAuthorized("not this height's proposer".into()));
        }
        if self.mempool.is_empty() {
            return Err(XlnError::ConsensusReject("empty mempool".into()));
        }

        let mut txs = std::mem::take(&mut self.mempool);
        sort_mempool(&mut txs);

        let prev_state_root = self.state.root();
        let mut new_state = self.state.clone();
        let mut accepted = Vec::with_capacity(txs.len());
        for signed in txs {
            // A rejected tx is dropped from this frame, not fatal to the
            // proposal — the submitter's other txs still land. Outputs
            // are discarded here and recomputed for real in `commit`,
            // once quorum has actually accepted this exact tx list.
            if apply_tx(&mut new_state, &signed.tx).is_ok() {
                accepted.push(signed);
            }
        }
        if accepted.is_empty() {
            return Err(XlnError::ConsensusReject("no tx survived validation".into()));
        }

        let header = EntityFrameHeader {
            height: self.height + 1,
            timestamp,
            proposer: proposer.clone(),
            prev_state_root,
            post_state_root: new_state.root(),
            tx_hashes: accepted.iter().map(tx_hash).collect(),
        };

        tracing::debug!(height = header.height, txs = header.tx_hashes.len(), "entity frame proposed");
        self.phase = ReplicaPhase::Proposing;
        self.proposal = Some(PendingProposal {
            header: header.clone(),
            txs: accepted,
            new_state,
            signatures: HashMap::new(),
            proposed_at: timestamp,
        });
        Ok(header)
    }

    /// Record one board member's signature over the in-flight proposal's
    /// header hash. Returns `true` once quorum is reached.
    pub fn precommit(
        &mut self,
        signer: &Signer,
        signature: Signature,
        pubkey: &PublicKey,
    ) -> Result<bool, XlnError> {
        let proposal = self
            .proposal
            .as_mut()
            .ok_or_else(|| XlnError::ConsensusReject("no proposal in flight".into()))?;
        if !self.board.is_member(signer) {
            return Err(XlnError::NotAuthorized("signer not on board".into()));
        }
        let digest = proposal.header.hash();
        if !verify_digest(pubkey, &digest, &signature) {
            return Err(XlnError::ConsensusReject("bad precommit signature".into()));
        }
        proposal.signatures.insert(signer.clone(), signature);

        let reached = self.board.quorum_met(proposal.signatures.keys());
        if reached {
            self.phase = ReplicaPhase::Locked;
        }
        Ok(reached)
    }

    /// Fold the locked proposal into committed state and return the
    /// finished frame plus the outputs its transactions produced.
    pub fn commit(&mut self) -> Result<(EntityFrame, Vec<EntityOutput>), XlnError> {
        if self.phase != ReplicaPhase::Locked {
            return Err(XlnError::ConsensusReject("proposal not locked".into()));
        }
        let proposal = self.proposal.take().expect("locked implies a proposal exists");

        let hanko = Hanko { signatures: proposal.signatures.into_iter().collect() };
        if !self.board.quorum_met(hanko.signatures.iter().map(|(s, _)| s)) {
            return Err(XlnError::ConsensusReject("quorum lost before commit".into()));
        }

        let mut outputs = Vec::new();
        let mut replay_state = self.state.clone();
        for signed in &proposal.txs {
            if let Ok(mut o) = apply_tx(&mut replay_state, &signed.tx) {
                outputs.append(&mut o);
            }
        }
        debug_assert_eq!(replay_state.root(), proposal.new_state.root());

        self.state = proposal.new_state;
        self.height = proposal.header.height;
        self.phase = ReplicaPhase::Idle;

        let frame = EntityFrame { header: proposal.header, txs: proposal.txs, hanko };
        tracing::info!(height = frame.header.height, "entity frame committed");
        Ok((frame, outputs))
    }

    /// If the current proposer has gone silent past
    /// `TIMEOUT_PROPOSAL_MS`, drop the proposal and return its txs to
    /// the mempool so the next rotation's proposer can retry them.
    pub fn check_proposal_timeout(&mut self, now: Timestamp) -> bool {
        let Some(proposal) = &self.proposal else { return false };
        if self.phase == ReplicaPhase::Locked {
            return false; // already has quorum, nothing to time out
        }
        let elapsed_ms = now.saturating_sub(proposal.proposed_at).saturating_mul(1000);
        if elapsed_ms < TIMEOUT_PROPOSAL_MS as i64 {
            return false;
        }
        let proposal = self.proposal.take().unwrap();
        self.mempool.splice(0..0, proposal.txs);
        self.phase = ReplicaPhase::Idle;
        true
    }

    pub fn known_precommitters(&self) -> HashSet<Signer> {
        self.proposal
            .as_ref()
            .map(|p| p.signatures.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_core::{BoardMember, EntityId};
    use xln_crypto::KeyPair;

    fn signed_chat(kp: &KeyPair, nonce: u64, message: &str) -> SignedEntityTx {
        let tx = crate::tx::EntityTx::Chat { message: message.into() };
        let digest = unsigned_digest(&tx, &kp.signer, nonce);
        let signature = kp.sign_digest(digest.as_bytes());
        SignedEntityTx { tx, from: kp.signer.clone(), nonce, signature }
    }

    #[test]
    fn single_signer_happy_path_commits() {
        let kp = KeyPair::generate();
        let board = Board::single_signer(kp.signer.clone());
        let mut replica = EntityReplica::genesis(EntityId::from_bytes([1; 32]), board);

        let tx = signed_chat(&kp, 1, "hello");
        replica.submit_tx(tx, &kp.public_key).unwrap();

        let header = replica.propose(&kp.signer, 1_000).unwrap();
        let sig = kp.sign_digest(&header.hash());
        let reached = replica.precommit(&kp.signer, sig, &kp.public_key).unwrap();
        assert!(reached);

        let (frame, _outputs) = replica.commit().unwrap();
        assert_eq!(frame.header.height, 1);
        assert_eq!(replica.height, 1);
        assert_eq!(replica.phase, ReplicaPhase::Idle);
        assert_eq!(replica.state.chat_log, vec!["hello".to_string()]);
    }

    #[test]
    fn precommit_from_non_member_is_rejected() {
        let kp = KeyPair::generate();
        let outsider = KeyPair::generate();
        let board = Board::single_signer(kp.signer.clone());
        let mut replica = EntityReplica::genesis(EntityId::from_bytes([1; 32]), board);

        let tx = signed_chat(&kp, 1, "hello");
        replica.submit_tx(tx, &kp.public_key).unwrap();
        let header = replica.propose(&kp.signer, 1_000).unwrap();
        let sig = outsider.sign_digest(&header.hash());
        assert!(replica.precommit(&outsider.signer, sig, &outsider.public_key).is_err());
    }

    #[test]
    fn multi_member_board_requires_threshold_shares() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();
        let board = Board {
            members: vec![
                BoardMember { signer: a.signer.clone(), shares: 34 },
                BoardMember { signer: b.signer.clone(), shares: 33 },
                BoardMember { signer: c.signer.clone(), shares: 33 },
            ],
            threshold: 67,
        };
        let mut replica = EntityReplica::genesis(EntityId::from_bytes([2; 32]), board);
        let proposer = replica.expected_proposer().clone();
        let kp = if proposer == a.signer {
            &a
        } else if proposer == b.signer {
            &b
        } else {
            &c
        };

        replica.submit_tx(signed_chat(kp, 1, "quorum test"), &kp.public_key).unwrap();
        let header = replica.propose(&proposer, 1_000).unwrap();

        let sig_a = a.sign_digest(&header.hash());
        assert!(!replica.precommit(&a.signer, sig_a, &a.public_key).unwrap());

        let sig_b = b.sign_digest(&header.hash());
        assert!(replica.precommit(&b.signer, sig_b, &b.public_key).unwrap());

        let (frame, _) = replica.commit().unwrap();
        assert_eq!(frame.header.height, 1);
    }
}
