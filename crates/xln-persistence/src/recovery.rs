//! Startup recovery: load the latest snapshot, verify it, then replay
//! whatever the write-ahead log recorded since.

use std::path::Path;

use xln_core::XlnError;

use crate::snapshot::{latest_snapshot_frame_id, read_snapshot, Snapshot};
use crate::wal::{list_wal_epochs, read_wal_file, WalRecord};

/// Load the latest snapshot (or an empty one if none exists yet) and
/// every WAL record committed after it, ready for the caller to replay
/// through the tick function in order.
pub fn recover(dir: &Path) -> Result<(Snapshot, Vec<WalRecord>), XlnError> {
    let snapshot = match latest_snapshot_frame_id(dir)? {
        Some(frame_id) => {
            tracing::info!(frame_id, "loading snapshot");
            read_snapshot(dir, frame_id)?
        }
        None => {
            tracing::info!("no snapshot found, starting from empty state");
            Snapshot::empty()
        }
    };

    let mut pending = Vec::new();
    for epoch in list_wal_epochs(dir)? {
        let path = dir.join("wal").join(format!("entries-{epoch}.log"));
        for record in read_wal_file(&path)? {
            if record.frame_id > snapshot.frame_id {
                pending.push(record);
            }
        }
    }

    tracing::info!(pending = pending.len(), "wal replay ready");
    Ok((snapshot, pending))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::write_snapshot;
    use crate::wal::{WalEntry, WalWriter};
    use xln_core::{EntityId, JEvent, JEventEnvelope, TokenId};

    #[test]
    fn recovers_empty_state_with_no_snapshot_or_wal() {
        let dir = std::env::temp_dir().join(format!("xln_recovery_empty_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let (snapshot, pending) = recover(&dir).unwrap();
        assert_eq!(snapshot.frame_id, 0);
        assert!(pending.is_empty());
    }

    #[test]
    fn replays_only_wal_records_after_snapshot() {
        let dir = std::env::temp_dir().join(format!("xln_recovery_replay_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut snapshot = Snapshot::empty();
        snapshot.frame_id = 5;
        write_snapshot(&dir, &snapshot).unwrap();

        let mut writer = WalWriter::open(&dir, 0).unwrap();
        let envelope = JEventEnvelope {
            j_height: 1,
            event_hash: [1u8; 32],
            event: JEvent::ReserveCredited {
                entity_id: EntityId::from_bytes([1u8; 32]),
                token: TokenId(0),
                amount: 1,
            },
        };
        writer
            .append(&WalRecord { frame_id: 3, entry: WalEntry::Genesis { envelope: envelope.clone() } })
            .unwrap();
        writer
            .append(&WalRecord { frame_id: 6, entry: WalEntry::Genesis { envelope } })
            .unwrap();

        let (loaded, pending) = recover(&dir).unwrap();
        assert_eq!(loaded.frame_id, 5);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].frame_id, 6);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
