pub mod apply;
pub mod debt;
pub mod frame;
pub mod replica;
pub mod state;
pub mod tx;

pub use apply::{apply_tx, EntityOutput};
pub use debt::{DebtEntry, DebtQueue};
pub use frame::{EntityFrame, EntityFrameHeader};
pub use replica::{EntityReplica, ReplicaPhase};
pub use state::EntityDomainState;
pub use tx::{tx_hash, unsigned_digest, EntityTx, SignedEntityTx};
