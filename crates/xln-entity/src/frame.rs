//! Entity frames: the height-chained, single-parent unit a board commits
//! by hanko.

use secp256k1::ecdsa::Signature;

use xln_codec::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{BlockHeight, Signer, Timestamp, TxHash};
use xln_crypto::{frame_hash_of, Hanko};

use crate::tx::SignedEntityTx;

/// The part of a frame that gets hashed and signed. Transactions are
/// committed to by their hash, not their full bytes — the full tx list
/// still travels alongside the frame for replay, but only the hashes are
/// consensus-visible, so a handler's private fields (nonce ordering
/// aside) never leak into the chain of frame hashes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityFrameHeader {
    pub height: BlockHeight,
    pub timestamp: Timestamp,
    pub proposer: Signer,
    pub prev_state_root: [u8; 32],
    pub post_state_root: [u8; 32],
    pub tx_hashes: Vec<TxHash>,
}

impl Encodable for EntityFrameHeader {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(6);
        s.append(&self.height);
        s.append(&(self.timestamp as u64));
        s.append(&self.proposer);
        s.append(&self.prev_state_root.as_ref());
        s.append(&self.post_state_root.as_ref());
        s.append_list(&self.tx_hashes);
    }
}

impl Decodable for EntityFrameHeader {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let prev: Vec<u8> = rlp.val_at(3)?;
        let post: Vec<u8> = rlp.val_at(4)?;
        if prev.len() != 32 || post.len() != 32 {
            return Err(DecoderError::RlpInvalidLength);
        }
        let mut prev_state_root = [0u8; 32];
        prev_state_root.copy_from_slice(&prev);
        let mut post_state_root = [0u8; 32];
        post_state_root.copy_from_slice(&post);
        Ok(EntityFrameHeader {
            height: rlp.val_at(0)?,
            timestamp: rlp.val_at::<u64>(1)? as i64,
            proposer: rlp.val_at(2)?,
            prev_state_root,
            post_state_root,
            tx_hashes: rlp.list_at(5)?,
        })
    }
}

impl EntityFrameHeader {
    /// `keccak256(rlp(header))`. Computed once the header's post-state
    /// root is known, so this is the value the board signs, and the
    /// value the next frame's `prev_state_root` chains from by proxy
    /// (via `post_state_root`, not the frame hash itself — the chain is
    /// a state-root chain, the frame hash only identifies this commit).
    pub fn hash(&self) -> [u8; 32] {
        *frame_hash_of(&xln_codec::encode(self)).as_bytes()
    }
}

/// A committed frame: header plus the full transaction bodies that hash
/// to `header.tx_hashes`, plus the hanko proving the board reached
/// quorum over `header.hash()`. Testable property #3 ("a committed
/// entity frame has a hanko whose recovered signer shares sum to at
/// least the threshold") is checkable directly off this field — a
/// snapshot/WAL reader or a dispute-resolution consumer never has to
/// reconstruct the quorum proof from raw precommits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityFrame {
    pub header: EntityFrameHeader,
    pub txs: Vec<SignedEntityTx>,
    pub hanko: Hanko,
}

impl EntityFrame {
    pub fn frame_hash(&self) -> [u8; 32] {
        self.header.hash()
    }
}

impl Encodable for EntityFrame {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.header);
        s.begin_list(self.txs.len());
        for tx in &self.txs {
            s.append(tx);
        }
        s.begin_list(self.hanko.signatures.len());
        for (signer, sig) in &self.hanko.signatures {
            s.begin_list(2);
            s.append(signer);
            s.append(&sig.serialize_compact().as_ref());
        }
    }
}

impl Decodable for EntityFrame {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let mut signatures = Vec::new();
        for item in rlp.at(2)?.iter() {
            let signer: Signer = item.val_at(0)?;
            let sig_bytes: Vec<u8> = item.val_at(1)?;
            if sig_bytes.len() != 64 {
                return Err(DecoderError::RlpInvalidLength);
            }
            let mut arr = [0u8; 64];
            arr.copy_from_slice(&sig_bytes);
            let signature = Signature::from_compact(&arr)
                .map_err(|_| DecoderError::Custom("malformed hanko signature"))?;
            signatures.push((signer, signature));
        }
        Ok(EntityFrame {
            header: rlp.val_at(0)?,
            txs: rlp.list_at(1)?,
            hanko: Hanko { signatures },
        })
    }
}
