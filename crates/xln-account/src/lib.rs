pub mod apply;
pub mod frame;
pub mod htlc;
pub mod machine;
pub mod state;
pub mod tx;

pub use apply::apply_account_tx;
pub use frame::{AccountFrame, AccountFrameHeader};
pub use htlc::PendingHtlc;
pub use machine::{AccountMachine, AccountPhase};
pub use state::AccountState;
pub use tx::{account_tx_hash, AccountTx};
