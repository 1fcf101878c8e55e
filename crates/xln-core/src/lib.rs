pub mod board;
pub mod constants;
pub mod delta;
pub mod error;
pub mod gossip;
pub mod htlc;
pub mod jevent;
pub mod rlp_util;
pub mod sort;
pub mod types;
pub mod wire;

pub use board::{Board, BoardMember};
pub use delta::Delta;
pub use error::XlnError;
pub use gossip::{FeeSchedule, GossipProfile};
pub use htlc::{HtlcLock, HtlcResolution};
pub use jevent::{JEvent, JEventEnvelope};
pub use sort::{sort_mempool, SortableTx};
pub use types::{
    AccountKey, Balance, BlockHeight, Collateral, Direction, EntityId, FrameHash, Nonce, Role,
    SecretHash, Signer, Timestamp, TokenId, TxHash,
};
