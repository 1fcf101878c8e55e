//! `snapshots/snapshot-<frame_id>.rlp`: the canonical binary dump of the
//! whole entity/account arena, plus a `.debug.txt` sibling meant for a
//! human, never read back by recovery.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use xln_account::AccountState;
use xln_codec::{merkle::merkle_root, Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{AccountKey, EntityId, XlnError};
use xln_entity::EntityDomainState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub frame_id: u64,
    pub entities: BTreeMap<EntityId, EntityDomainState>,
    pub accounts: BTreeMap<AccountKey, AccountState>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot { frame_id: 0, entities: BTreeMap::new(), accounts: BTreeMap::new() }
    }

    /// Merkle root over every entity's and account's own root, the value
    /// stored alongside the snapshot and re-verified on load.
    pub fn compute_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> =
            self.entities.values().map(EntityDomainState::root).collect();
        leaves.extend(self.accounts.values().map(AccountState::root));
        merkle_root(&leaves)
    }
}

impl Encodable for Snapshot {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.frame_id);
        s.append(&self.compute_root().as_ref());
        s.begin_list(self.entities.len());
        for (id, domain) in &self.entities {
            s.begin_list(2);
            s.append(id);
            s.append(domain);
        }
        s.begin_list(self.accounts.len());
        for (key, account) in &self.accounts {
            s.begin_list(2);
            s.append(key);
            s.append(account);
        }
    }
}

impl Decodable for Snapshot {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let frame_id = rlp.val_at(0)?;
        let stored_root: Vec<u8> = rlp.val_at(1)?;
        if stored_root.len() != 32 {
            return Err(DecoderError::RlpInvalidLength);
        }

        let mut entities = BTreeMap::new();
        for item in rlp.at(2)?.iter() {
            entities.insert(item.val_at(0)?, item.val_at(1)?);
        }
        let mut accounts = BTreeMap::new();
        for item in rlp.at(3)?.iter() {
            accounts.insert(item.val_at(0)?, item.val_at(1)?);
        }

        let snapshot = Snapshot { frame_id, entities, accounts };
        if snapshot.compute_root().as_slice() != stored_root.as_slice() {
            return Err(DecoderError::Custom("snapshot root mismatch"));
        }
        Ok(snapshot)
    }
}

fn snapshot_path(dir: &Path, frame_id: u64) -> std::path::PathBuf {
    dir.join("snapshots").join(format!("snapshot-{frame_id}.rlp"))
}

fn debug_path(dir: &Path, frame_id: u64) -> std::path::PathBuf {
    dir.join("snapshots").join(format!("snapshot-{frame_id}.debug.txt"))
}

pub fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<(), XlnError> {
    let snapshots_dir = dir.join("snapshots");
    fs::create_dir_all(&snapshots_dir)
        .map_err(|e| XlnError::StateCorruption(format!("cannot create snapshots dir: {e}")))?;

    let bytes = xln_codec::encode(snapshot);
    let path = snapshot_path(dir, snapshot.frame_id);
    let mut file = File::create(&path)
        .map_err(|e| XlnError::StateCorruption(format!("cannot create snapshot file: {e}")))?;
    file.write_all(&bytes)
        .map_err(|e| XlnError::StateCorruption(format!("cannot write snapshot: {e}")))?;
    file.sync_all()
        .map_err(|e| XlnError::StateCorruption(format!("cannot fsync snapshot: {e}")))?;

    let debug_text = render_debug(snapshot);
    fs::write(debug_path(dir, snapshot.frame_id), debug_text)
        .map_err(|e| XlnError::StateCorruption(format!("cannot write debug snapshot: {e}")))?;

    tracing::info!(frame_id = snapshot.frame_id, "snapshot written");
    Ok(())
}

pub fn read_snapshot(dir: &Path, frame_id: u64) -> Result<Snapshot, XlnError> {
    let bytes = fs::read(snapshot_path(dir, frame_id))
        .map_err(|e| XlnError::StateCorruption(format!("cannot read snapshot: {e}")))?;
    xln_codec::decode(&bytes)
        .map_err(|e| XlnError::StateCorruption(format!("corrupt snapshot: {e}")))
}

/// The highest `frame_id` with a snapshot on disk, if any.
pub fn latest_snapshot_frame_id(dir: &Path) -> Result<Option<u64>, XlnError> {
    let snapshots_dir = dir.join("snapshots");
    if !snapshots_dir.exists() {
        return Ok(None);
    }
    let mut max_id = None;
    for entry in fs::read_dir(&snapshots_dir)
        .map_err(|e| XlnError::StateCorruption(format!("cannot list snapshots dir: {e}")))?
    {
        let entry = entry.map_err(|e| XlnError::StateCorruption(e.to_string()))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(rest) = name.strip_prefix("snapshot-").and_then(|s| s.strip_suffix(".rlp")) else {
            continue;
        };
        if let Ok(id) = rest.parse::<u64>() {
            max_id = Some(max_id.map_or(id, |m: u64| m.max(id)));
        }
    }
    Ok(max_id)
}

fn render_debug(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!("frame_id: {}\n", snapshot.frame_id));
    out.push_str(&format!("root: {}\n", hex::encode(snapshot.compute_root())));
    out.push_str(&format!("entities: {}\n", snapshot.entities.len()));
    for (id, domain) in &snapshot.entities {
        out.push_str(&format!(
            "  {} reserves={:?} chat_lines={} gossip_peers={} opened_accounts={} tokens_with_debt={}\n",
            id,
            domain.reserves,
            domain.chat_log.len(),
            domain.gossip.len(),
            domain.opened_accounts.len(),
            domain.debts.values().filter(|q| !q.is_empty()).count(),
        ));
    }
    out.push_str(&format!("accounts: {}\n", snapshot.accounts.len()));
    for (key, account) in &snapshot.accounts {
        out.push_str(&format!(
            "  {} tokens={} htlc_locks={}\n",
            key,
            account.deltas.len(),
            account.htlc_locks.len(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_rlp() {
        let mut snapshot = Snapshot::empty();
        snapshot.frame_id = 7;
        snapshot.entities.insert(EntityId::from_bytes([1u8; 32]), EntityDomainState::default());
        let bytes = xln_codec::encode(&snapshot);
        let decoded: Snapshot = xln_codec::decode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn write_and_read_round_trip_on_disk() {
        let dir = std::env::temp_dir().join(format!("xln_snapshot_test_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let mut snapshot = Snapshot::empty();
        snapshot.frame_id = 3;
        write_snapshot(&dir, &snapshot).unwrap();
        assert_eq!(latest_snapshot_frame_id(&dir).unwrap(), Some(3));
        let loaded = read_snapshot(&dir, 3).unwrap();
        assert_eq!(loaded, snapshot);
        let _ = fs::remove_dir_all(&dir);
    }
}
