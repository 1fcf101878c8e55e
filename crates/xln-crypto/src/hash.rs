use sha3::{Digest, Keccak256};
use xln_core::{AccountKey, EntityId, FrameHash, SecretHash, TxHash};

/// Compute keccak256 of arbitrary bytes: the canonical hash everywhere a
/// frame hash, account key, or hashlock commitment is needed.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// `H(min(a,b) ‖ max(a,b))` — both sides of a bilateral account compute
/// the same key regardless of which one calls this first.
pub fn derive_account_key(a: &EntityId, b: &EntityId) -> AccountKey {
    let (lo, hi) = if a.as_bytes() <= b.as_bytes() { (a, b) } else { (b, a) };
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(lo.as_bytes());
    buf.extend_from_slice(hi.as_bytes());
    AccountKey::from_bytes(keccak256(&buf))
}

pub fn frame_hash_of(bytes: &[u8]) -> FrameHash {
    FrameHash::from_bytes(keccak256(bytes))
}

pub fn tx_hash_of(bytes: &[u8]) -> TxHash {
    TxHash::from_bytes(keccak256(bytes))
}

/// Hashlock commitment for an HTLC: `keccak256(secret)`.
pub fn hashlock_of(secret: &[u8]) -> SecretHash {
    SecretHash::from_bytes(keccak256(secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_is_order_independent() {
        let a = EntityId::from_bytes([1u8; 32]);
        let b = EntityId::from_bytes([2u8; 32]);
        assert_eq!(derive_account_key(&a, &b), derive_account_key(&b, &a));
    }
}
