pub mod hanko;
pub mod hash;
pub mod keypair;
pub mod onion;

pub use hanko::{verify_hanko, Hanko};
pub use hash::{derive_account_key, frame_hash_of, hashlock_of, keccak256, tx_hash_of};
pub use keypair::{signer_from_pubkey, verify_digest, KeyPair};
pub use onion::{open_layer, seal_layer, OnionError, OnionPayload};
