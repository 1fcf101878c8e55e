//! Bilateral account state: one [`Delta`] per token and the HTLCs
//! currently locked. Debt is an entity-wide concern that lives one layer
//! up, in `xln_entity::EntityDomainState` — a bilateral account never
//! carries its own debt queue.

use std::collections::{BTreeMap, HashMap};

use xln_codec::{merkle::merkle_root, Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{Delta, SecretHash, TokenId};
use xln_crypto::keccak256;

use crate::htlc::PendingHtlc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    pub deltas: BTreeMap<TokenId, Delta>,
    pub htlc_locks: HashMap<SecretHash, PendingHtlc>,
}

impl AccountState {
    fn deltas_hash(&self) -> [u8; 32] {
        let mut s = RlpStream::new();
        s.begin_list(self.deltas.len());
        for (token, delta) in &self.deltas {
            s.begin_list(2);
            s.append(token);
            s.append(delta);
        }
        keccak256(&s.out())
    }

    fn htlc_hash(&self) -> [u8; 32] {
        let mut sorted: Vec<(&SecretHash, &PendingHtlc)> = self.htlc_locks.iter().collect();
        sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        let mut s = RlpStream::new();
        s.begin_list(sorted.len());
        for (hashlock, pending) in sorted {
            s.begin_list(2);
            s.append(hashlock);
            s.append(pending);
        }
        keccak256(&s.out())
    }

    pub fn root(&self) -> [u8; 32] {
        merkle_root(&[self.deltas_hash(), self.htlc_hash()])
    }
}

impl Encodable for AccountState {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.begin_list(self.deltas.len());
        for (token, delta) in &self.deltas {
            s.begin_list(2);
            s.append(token);
            s.append(delta);
        }
        let mut sorted: Vec<(&SecretHash, &PendingHtlc)> = self.htlc_locks.iter().collect();
        sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        s.begin_list(sorted.len());
        for (hashlock, pending) in sorted {
            s.begin_list(2);
            s.append(hashlock);
            s.append(pending);
        }
    }
}

impl Decodable for AccountState {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let mut deltas = BTreeMap::new();
        for item in rlp.at(0)?.iter() {
            deltas.insert(item.val_at(0)?, item.val_at(1)?);
        }

        let mut htlc_locks = HashMap::new();
        for item in rlp.at(1)?.iter() {
            let hashlock: SecretHash = item.val_at(0)?;
            let pending: PendingHtlc = item.val_at(1)?;
            htlc_locks.insert(hashlock, pending);
        }

        Ok(AccountState { deltas, htlc_locks })
    }
}
