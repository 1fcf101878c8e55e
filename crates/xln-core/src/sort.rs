//! The one deterministic ordering rule every mempool in the protocol
//! obeys, reused verbatim by the account layer's own mempool.

use crate::types::Signer;

/// Anything that can sit in a mempool and be ordered into a frame.
/// Implementors provide the four-tuple sort key `(nonce, signer, kind,
/// insertion index)`; the insertion index is threaded in by the caller
/// (it is not a property of the tx itself).
pub trait SortableTx {
    fn nonce_key(&self) -> u64;
    fn signer_key(&self) -> &Signer;
    fn kind_key(&self) -> u8;
}

/// Stable sort a mempool snapshot into frame order: `(nonce, signer,
/// kind, insertion index)` ascending. Stable sort preserves insertion
/// order for ties that remain after the first three keys, so this is
/// equivalent to adding insertion index as an explicit fourth key.
pub fn sort_mempool<T: SortableTx>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.nonce_key()
            .cmp(&b.nonce_key())
            .then_with(|| a.signer_key().cmp(b.signer_key()))
            .then_with(|| a.kind_key().cmp(&b.kind_key()))
    });
}
