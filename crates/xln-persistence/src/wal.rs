//! `wal/entries-<epoch>.log`: an append-only log of every frame committed
//! since the last snapshot, framed as `(len: u32 LE, crc32: u32 LE,
//! rlp(record))`, fsynced before the tick that produced it returns.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use xln_account::AccountFrame;
use xln_codec::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{AccountKey, EntityId, JEventEnvelope, XlnError};
use xln_entity::EntityFrame;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalEntry {
    EntityFrame { entity_id: EntityId, frame: EntityFrame },
    AccountFrame { account_key: AccountKey, frame: AccountFrame },
    Genesis { envelope: JEventEnvelope },
}

impl Encodable for WalEntry {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            WalEntry::EntityFrame { entity_id, frame } => {
                s.begin_list(3);
                s.append(&0u8);
                s.append(entity_id);
                s.append(frame);
            }
            WalEntry::AccountFrame { account_key, frame } => {
                s.begin_list(3);
                s.append(&1u8);
                s.append(account_key);
                s.append(frame);
            }
            WalEntry::Genesis { envelope } => {
                s.begin_list(2);
                s.append(&2u8);
                s.append(envelope);
            }
        }
    }
}

impl Decodable for WalEntry {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.val_at::<u8>(0)? {
            0 => Ok(WalEntry::EntityFrame { entity_id: rlp.val_at(1)?, frame: rlp.val_at(2)? }),
            1 => Ok(WalEntry::AccountFrame { account_key: rlp.val_at(1)?, frame: rlp.val_at(2)? }),
            2 => Ok(WalEntry::Genesis { envelope: rlp.val_at(1)? }),
            _ => Err(DecoderError::Custom("unknown wal entry tag")),
        }
    }
}

/// A logged entry tagged with the global frame counter it belongs to, so
/// recovery can filter out everything a loaded snapshot already covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalRecord {
    pub frame_id: u64,
    pub entry: WalEntry,
}

impl Encodable for WalRecord {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.frame_id);
        s.append(&self.entry);
    }
}

impl Decodable for WalRecord {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(WalRecord { frame_id: rlp.val_at(0)?, entry: rlp.val_at(1)? })
    }
}

fn wal_path(dir: &Path, epoch: u64) -> PathBuf {
    dir.join("wal").join(format!("entries-{epoch}.log"))
}

pub struct WalWriter {
    file: File,
}

impl WalWriter {
    pub fn open(dir: &Path, epoch: u64) -> Result<Self, XlnError> {
        let wal_dir = dir.join("wal");
        std::fs::create_dir_all(&wal_dir)
            .map_err(|e| XlnError::StateCorruption(format!("cannot create wal dir: {e}")))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(wal_path(dir, epoch))
            .map_err(|e| XlnError::StateCorruption(format!("cannot open wal file: {e}")))?;
        Ok(Self { file })
    }

    /// Append one record and fsync before returning, so the caller's
    /// in-memory mutation is never ahead of durable storage.
    pub fn append(&mut self, record: &WalRecord) -> Result<(), XlnError> {
        let body = xln_codec::encode(record);
        let crc = crc32fast::hash(&body);
        self.file
            .write_all(&(body.len() as u32).to_le_bytes())
            .map_err(|e| XlnError::StateCorruption(format!("wal write failed: {e}")))?;
        self.file
            .write_all(&crc.to_le_bytes())
            .map_err(|e| XlnError::StateCorruption(format!("wal write failed: {e}")))?;
        self.file
            .write_all(&body)
            .map_err(|e| XlnError::StateCorruption(format!("wal write failed: {e}")))?;
        self.file
            .sync_data()
            .map_err(|e| XlnError::StateCorruption(format!("wal fsync failed: {e}")))?;
        Ok(())
    }
}

/// Read every well-formed record from `path`. A truncated trailing
/// record (a crash mid-write) is treated as the natural end of the log,
/// not an error; a length-correct record with a bad checksum is not —
/// that indicates on-disk corruption of a record the writer believed it
/// had completed.
pub fn read_wal_file(path: &Path) -> Result<Vec<WalRecord>, XlnError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(XlnError::StateCorruption(format!("cannot open wal file: {e}"))),
    };
    let mut records = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        if file.read_exact(&mut len_buf).is_err() {
            break;
        }
        let mut crc_buf = [0u8; 4];
        if file.read_exact(&mut crc_buf).is_err() {
            break;
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        if file.read_exact(&mut body).is_err() {
            break;
        }
        let expected_crc = u32::from_le_bytes(crc_buf);
        if crc32fast::hash(&body) != expected_crc {
            return Err(XlnError::StateCorruption("wal record failed crc check".into()));
        }
        let record: WalRecord = xln_codec::decode(&body)
            .map_err(|e| XlnError::StateCorruption(format!("corrupt wal record: {e}")))?;
        records.push(record);
    }
    Ok(records)
}

/// Every `entries-<epoch>.log` under `dir/wal`, sorted by epoch.
pub fn list_wal_epochs(dir: &Path) -> Result<Vec<u64>, XlnError> {
    let wal_dir = dir.join("wal");
    if !wal_dir.exists() {
        return Ok(Vec::new());
    }
    let mut epochs = Vec::new();
    for entry in std::fs::read_dir(&wal_dir)
        .map_err(|e| XlnError::StateCorruption(format!("cannot list wal dir: {e}")))?
    {
        let entry = entry.map_err(|e| XlnError::StateCorruption(e.to_string()))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(rest) = name.strip_prefix("entries-").and_then(|s| s.strip_suffix(".log")) else {
            continue;
        };
        if let Ok(epoch) = rest.parse::<u64>() {
            epochs.push(epoch);
        }
    }
    epochs.sort_unstable();
    Ok(epochs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_round_trips() {
        let dir = std::env::temp_dir().join(format!("xln_wal_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut writer = WalWriter::open(&dir, 0).unwrap();
        let envelope = JEventEnvelope {
            j_height: 1,
            event_hash: [9u8; 32],
            event: xln_core::JEvent::ReserveCredited {
                entity_id: EntityId::from_bytes([1u8; 32]),
                token: xln_core::TokenId(0),
                amount: 10,
            },
        };
        let record = WalRecord { frame_id: 1, entry: WalEntry::Genesis { envelope } };
        writer.append(&record).unwrap();

        let records = read_wal_file(&wal_path(&dir, 0)).unwrap();
        assert_eq!(records, vec![record]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn truncated_trailing_record_is_not_an_error() {
        let dir = std::env::temp_dir().join(format!("xln_wal_trunc_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("wal")).unwrap();
        std::fs::write(wal_path(&dir, 0), [1u8, 2, 3]).unwrap();
        let records = read_wal_file(&wal_path(&dir, 0)).unwrap();
        assert!(records.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
