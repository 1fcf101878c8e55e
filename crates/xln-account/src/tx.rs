//! Account-level transactions: what the two parties of a bilateral
//! account propose to each other.

use serde::{Deserialize, Serialize};
use xln_codec::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{Collateral, SecretHash, TokenId};
use xln_crypto::keccak256;

use crate::htlc::PendingHtlc;

/// The closed set of things an account frame can contain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountTx {
    /// Move `amount` of `token` from the proposer to the counterparty.
    DirectPayment { token: TokenId, amount: Collateral },
    /// Lock `amount` of `token` behind `lock.hashlock` until
    /// `lock.timelock_block`.
    HtlcLock { lock: PendingHtlc },
    /// Reveal the preimage for a previously locked HTLC, releasing the
    /// hold to the receiving side.
    HtlcReveal { hashlock: SecretHash, secret: Vec<u8> },
    /// Resolve a previously locked HTLC by timeout or cooperative cancel
    /// — the two non-reveal branches of `xln_core::HtlcResolution`.
    HtlcResolve { hashlock: SecretHash, resolution: xln_core::HtlcResolution },
    /// Adjust the credit limit this side extends to the counterparty.
    CreditUpdate { token: TokenId, new_limit: Collateral },
}

impl AccountTx {
    pub fn kind(&self) -> u8 {
        match self {
            AccountTx::DirectPayment { .. } => 0,
            AccountTx::HtlcLock { .. } => 1,
            AccountTx::HtlcReveal { .. } => 2,
            AccountTx::HtlcResolve { .. } => 3,
            AccountTx::CreditUpdate { .. } => 4,
        }
    }
}

impl Encodable for AccountTx {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            AccountTx::DirectPayment { token, amount } => {
                s.begin_list(3);
                s.append(&0u8);
                s.append(token);
                s.append(&amount.to_be_bytes().as_ref());
            }
            AccountTx::HtlcLock { lock } => {
                s.begin_list(2);
                s.append(&1u8);
                s.append(lock);
            }
            AccountTx::HtlcReveal { hashlock, secret } => {
                s.begin_list(3);
                s.append(&2u8);
                s.append(hashlock);
                s.append(secret);
            }
            AccountTx::HtlcResolve { hashlock, resolution } => {
                s.begin_list(3);
                s.append(&3u8);
                s.append(hashlock);
                s.append(resolution);
            }
            AccountTx::CreditUpdate { token, new_limit } => {
                s.begin_list(3);
                s.append(&4u8);
                s.append(token);
                s.append(&new_limit.to_be_bytes().as_ref());
            }
        }
    }
}

impl Decodable for AccountTx {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.val_at::<u8>(0)? {
            0 => Ok(AccountTx::DirectPayment {
                token: rlp.val_at(1)?,
                amount: decode_u128(rlp, 2)?,
            }),
            1 => Ok(AccountTx::HtlcLock { lock: rlp.val_at(1)? }),
            2 => Ok(AccountTx::HtlcReveal { hashlock: rlp.val_at(1)?, secret: rlp.val_at(2)? }),
            3 => Ok(AccountTx::HtlcResolve { hashlock: rlp.val_at(1)?, resolution: rlp.val_at(2)? }),
            4 => Ok(AccountTx::CreditUpdate {
                token: rlp.val_at(1)?,
                new_limit: decode_u128(rlp, 2)?,
            }),
            _ => Err(DecoderError::Custom("unknown AccountTx tag")),
        }
    }
}

fn decode_u128(rlp: &Rlp, index: usize) -> Result<u128, DecoderError> {
    let bytes: Vec<u8> = rlp.val_at(index)?;
    if bytes.len() != 16 {
        return Err(DecoderError::RlpInvalidLength);
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(&bytes);
    Ok(u128::from_be_bytes(arr))
}

/// `keccak256(rlp(tx))` — identifies a tx inside a frame the same way
/// `xln_entity::tx_hash` does at the layer above.
pub fn account_tx_hash(tx: &AccountTx) -> [u8; 32] {
    keccak256(&xln_codec::encode(tx))
}
