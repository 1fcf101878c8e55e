//! Hash-time-locked contract records shared by the account and entity
//! layers.

use serde::{Deserialize, Serialize};

use crate::types::{BlockHeight, Collateral, Direction, SecretHash, TokenId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcLock {
    pub hashlock: SecretHash,
    pub amount: Collateral,
    pub token: TokenId,
    pub timelock_block: BlockHeight,
    pub direction: Direction,
    /// Encrypted onion payload for the next hop. Opaque to everyone but
    /// the holder of the matching X25519 key; the ciphertext itself
    /// feeds a frame hash only as opaque bytes, never decrypted for it.
    pub onion_layers: Vec<u8>,
}

/// Outcome a `htlc_resolve` transaction selects between.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtlcResolution {
    /// Secret matches the hashlock and the timelock has not yet expired.
    Reveal { secret: Vec<u8> },
    /// `current_block > timelock_block` and no reveal occurred.
    Timeout,
    /// Sender-initiated cooperative cancel before any reveal.
    Cancel,
}
