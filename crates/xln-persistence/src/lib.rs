pub mod recovery;
pub mod snapshot;
pub mod wal;

pub use recovery::recover;
pub use snapshot::{latest_snapshot_frame_id, read_snapshot, write_snapshot, Snapshot};
pub use wal::{list_wal_epochs, read_wal_file, WalEntry, WalRecord, WalWriter};
