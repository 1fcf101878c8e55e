//! Account frames: the bilateral analogue of an entity frame, signed by
//! both sides instead of a board quorum.

use xln_codec::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{AccountKey, BlockHeight, Role, Timestamp};

use crate::tx::{account_tx_hash, AccountTx};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountFrameHeader {
    pub account_key: AccountKey,
    pub height: BlockHeight,
    pub timestamp: Timestamp,
    /// Which side proposed this frame. Carried in the header (not just
    /// in the proposer's local `PendingFrame`) so a recovering node can
    /// replay the frame's txs through `apply_account_tx` without
    /// guessing which side's credit line absorbed each payment.
    pub proposer_role: Role,
    pub prev_state_root: [u8; 32],
    pub post_state_root: [u8; 32],
    pub tx_hashes: Vec<[u8; 32]>,
}

impl Encodable for AccountFrameHeader {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(7);
        s.append(&self.account_key);
        s.append(&self.height);
        s.append(&(self.timestamp as u64));
        s.append(&self.proposer_role);
        s.append(&self.prev_state_root.as_ref());
        s.append(&self.post_state_root.as_ref());
        s.begin_list(self.tx_hashes.len());
        for h in &self.tx_hashes {
            s.append(&h.as_ref());
        }
    }
}

impl Decodable for AccountFrameHeader {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let prev: Vec<u8> = rlp.val_at(4)?;
        let post: Vec<u8> = rlp.val_at(5)?;
        if prev.len() != 32 || post.len() != 32 {
            return Err(DecoderError::RlpInvalidLength);
        }
        let mut prev_state_root = [0u8; 32];
        prev_state_root.copy_from_slice(&prev);
        let mut post_state_root = [0u8; 32];
        post_state_root.copy_from_slice(&post);

        let list = rlp.at(6)?;
        let mut tx_hashes = Vec::with_capacity(list.item_count()?);
        for item in list.iter() {
            let bytes: Vec<u8> = item.as_val()?;
            if bytes.len() != 32 {
                return Err(DecoderError::RlpInvalidLength);
            }
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            tx_hashes.push(arr);
        }

        Ok(AccountFrameHeader {
            account_key: rlp.val_at(0)?,
            height: rlp.val_at(1)?,
            timestamp: rlp.val_at::<u64>(2)? as i64,
            proposer_role: rlp.val_at(3)?,
            prev_state_root,
            post_state_root,
            tx_hashes,
        })
    }
}

impl AccountFrameHeader {
    pub fn hash(&self) -> [u8; 32] {
        xln_crypto::keccak256(&xln_codec::encode(self))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountFrame {
    pub header: AccountFrameHeader,
    pub txs: Vec<AccountTx>,
}

impl AccountFrame {
    pub fn tx_hashes(txs: &[AccountTx]) -> Vec<[u8; 32]> {
        txs.iter().map(account_tx_hash).collect()
    }
}

impl Encodable for AccountFrame {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.header);
        s.begin_list(self.txs.len());
        for tx in &self.txs {
            s.append(tx);
        }
    }
}

impl Decodable for AccountFrame {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(AccountFrame { header: rlp.val_at(0)?, txs: rlp.list_at(1)? })
    }
}
