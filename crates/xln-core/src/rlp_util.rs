//! Small helpers shared by the `wire` module's hand-written RLP impls:
//! fixed-width big-endian encoding for the 128-bit balance types RLP has
//! no native support for.

use rlp::{DecoderError, Rlp, RlpStream};

use crate::types::{Balance, TokenId};

pub fn decode_u128(rlp: &Rlp, index: usize) -> Result<u128, DecoderError> {
    let bytes: Vec<u8> = rlp.val_at(index)?;
    if bytes.len() != 16 {
        return Err(DecoderError::RlpInvalidLength);
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(&bytes);
    Ok(u128::from_be_bytes(arr))
}

pub fn decode_i128(rlp: &Rlp, index: usize) -> Result<i128, DecoderError> {
    let bytes: Vec<u8> = rlp.val_at(index)?;
    if bytes.len() != 16 {
        return Err(DecoderError::RlpInvalidLength);
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(&bytes);
    Ok(i128::from_be_bytes(arr))
}

pub fn decode_i64(rlp: &Rlp, index: usize) -> Result<i64, DecoderError> {
    let bytes: Vec<u8> = rlp.val_at(index)?;
    if bytes.len() != 8 {
        return Err(DecoderError::RlpInvalidLength);
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes);
    Ok(i64::from_be_bytes(arr))
}

pub fn append_balance_list(s: &mut RlpStream, entries: &[(TokenId, Balance)]) {
    s.begin_list(entries.len());
    for (token, amount) in entries {
        s.begin_list(2);
        s.append(token);
        s.append(&amount.to_be_bytes().as_ref());
    }
}

pub fn decode_balance_list(rlp: &Rlp) -> Result<Vec<(TokenId, Balance)>, DecoderError> {
    let mut out = Vec::with_capacity(rlp.item_count()?);
    for item in rlp.iter() {
        let token: TokenId = item.val_at(0)?;
        let amount = decode_i128(&item, 1)?;
        out.push((token, amount));
    }
    Ok(out)
}
