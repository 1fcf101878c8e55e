//! Shared identifier and scalar types for the XLN protocol.
//!
//! All hash-derived identifiers are 32-byte blobs displayed as hex. Each
//! gets its own newtype so the compiler keeps an `EntityId` from being
//! passed where an `AccountKey` is expected, even though both are
//! `[u8; 32]` underneath.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bilateral account balance delta, in base units. Signed: negative means
/// the left party has sent more than it has received.
pub type Balance = i128;

/// On-chain collateral / credit limit, in base units. Never negative.
pub type Collateral = u128;

/// Unix timestamp (seconds, UTC). The single permitted wall-clock entry
/// point; handlers only ever read this as a parameter, never a clock.
pub type Timestamp = i64;

/// External-chain block height used for HTLC timelocks.
pub type BlockHeight = u64;

/// Per-signer transaction sequence number (entity layer) or per-account
/// frame counter (account layer). Monotonically increasing.
pub type Nonce = u64;

/// Token identifier. Wrapped so it is never confused with a plain
/// integer at a call site that also takes amounts or heights.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! hash_id {
    ($name:ident, $prefix:literal) => {
        /// 32-byte identifier derived from a keccak256 digest.
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn from_bytes(b: [u8; 32]) -> Self {
                Self(b)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes[..32]);
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({}…)"), &self.to_hex()[..8])
            }
        }
    };
}

hash_id!(EntityId, "Entity");
hash_id!(Signer, "Signer");
hash_id!(AccountKey, "Account");
hash_id!(FrameHash, "Frame");
hash_id!(TxHash, "Tx");
hash_id!(SecretHash, "Hashlock");

/// Which side of a bilateral account an entity plays. Derived from the
/// same lexicographic ordering used to build the [`AccountKey`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Left,
    Right,
}

impl Role {
    pub fn of(a: &EntityId, counterparty: &EntityId) -> Self {
        if a.0 <= counterparty.0 {
            Role::Left
        } else {
            Role::Right
        }
    }

    pub fn other(self) -> Role {
        match self {
            Role::Left => Role::Right,
            Role::Right => Role::Left,
        }
    }
}

/// Direction an HTLC hold is carried on, relative to the account's
/// left/right roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}
