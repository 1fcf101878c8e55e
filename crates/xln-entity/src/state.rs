//! The entity's own domain state: everything a frame's `post_state_root`
//! commits to besides the accounts it has open (those live one layer
//! down, in `xln-account`, keyed by `AccountKey`).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use xln_codec::{merkle::merkle_root, Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::rlp_util::{append_balance_list, decode_balance_list};
use xln_core::{Balance, EntityId, GossipProfile, TokenId};
use xln_crypto::keccak256;

use crate::debt::DebtQueue;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityDomainState {
    pub reserves: BTreeMap<TokenId, Balance>,
    pub chat_log: Vec<String>,
    pub gossip: HashMap<EntityId, GossipProfile>,
    pub applied_jevents: BTreeSet<(u64, [u8; 32])>,
    pub opened_accounts: BTreeSet<EntityId>,
    /// Enforce-debts FIFO, one queue per token this entity owes
    /// against. Non-empty entries freeze this entity's outgoing sends
    /// on that token until a future reserve credit vacuums them.
    pub debts: BTreeMap<TokenId, DebtQueue>,
}

impl EntityDomainState {
    fn reserves_hash(&self) -> [u8; 32] {
        // `reserves` is a `BTreeMap<TokenId, _>`, already key-sorted.
        let mut stream = RlpStream::new();
        stream.begin_list(self.reserves.len());
        for (token, balance) in &self.reserves {
            stream.begin_list(2);
            stream.append(token);
            stream.append(&balance.to_be_bytes().as_ref());
        }
        keccak256(&stream.out())
    }

    fn chat_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new();
        stream.begin_list(self.chat_log.len());
        for line in &self.chat_log {
            stream.append(line);
        }
        keccak256(&stream.out())
    }

    fn gossip_hash(&self) -> [u8; 32] {
        let mut sorted: Vec<&GossipProfile> = self.gossip.values().collect();
        sorted.sort_by(|a, b| a.entity_id.as_bytes().cmp(b.entity_id.as_bytes()));
        let mut stream = RlpStream::new();
        stream.begin_list(sorted.len());
        for profile in sorted {
            stream.append(profile);
        }
        keccak256(&stream.out())
    }

    fn jevents_hash(&self) -> [u8; 32] {
        // Already in `(j_height, event_hash)` order via `BTreeSet`.
        let mut stream = RlpStream::new();
        stream.begin_list(self.applied_jevents.len());
        for (height, hash) in &self.applied_jevents {
            stream.begin_list(2);
            stream.append(height);
            stream.append(&hash.as_ref());
        }
        keccak256(&stream.out())
    }

    fn accounts_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new();
        stream.begin_list(self.opened_accounts.len());
        for id in &self.opened_accounts {
            stream.append(&id.as_bytes().as_ref());
        }
        keccak256(&stream.out())
    }

    fn debts_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new();
        stream.begin_list(self.debts.len());
        for (token, queue) in &self.debts {
            stream.begin_list(2);
            stream.append(token);
            stream.append(&queue.total().to_be_bytes().as_ref());
        }
        keccak256(&stream.out())
    }

    /// Merkle root committing to every field above. The next frame's
    /// header carries this as `post_state_root`.
    pub fn root(&self) -> [u8; 32] {
        merkle_root(&[
            self.reserves_hash(),
            self.chat_hash(),
            self.gossip_hash(),
            self.jevents_hash(),
            self.accounts_hash(),
            self.debts_hash(),
        ])
    }
}

/// Full-fidelity encoding for snapshot persistence, distinct from the
/// component hashes above — those commit to state, this reconstructs it.
impl Encodable for EntityDomainState {
    fn rlp_append(&self, s: &mut RlpStream) {
        let reserves: Vec<(TokenId, Balance)> =
            self.reserves.iter().map(|(t, b)| (*t, *b)).collect();
        let mut gossip: Vec<&GossipProfile> = self.gossip.values().collect();
        gossip.sort_by(|a, b| a.entity_id.as_bytes().cmp(b.entity_id.as_bytes()));

        s.begin_list(6);
        append_balance_list(s, &reserves);
        s.begin_list(self.chat_log.len());
        for line in &self.chat_log {
            s.append(line);
        }
        s.begin_list(gossip.len());
        for profile in gossip {
            s.append(profile);
        }
        s.begin_list(self.applied_jevents.len());
        for (height, hash) in &self.applied_jevents {
            s.begin_list(2);
            s.append(height);
            s.append(&hash.as_ref());
        }
        s.begin_list(self.opened_accounts.len());
        for id in &self.opened_accounts {
            s.append(id);
        }
        s.begin_list(self.debts.len());
        for (token, queue) in &self.debts {
            s.begin_list(2);
            s.append(token);
            s.append(queue);
        }
    }
}

impl Decodable for EntityDomainState {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let reserves = decode_balance_list(&rlp.at(0)?)?.into_iter().collect();

        let mut chat_log = Vec::new();
        for item in rlp.at(1)?.iter() {
            chat_log.push(item.as_val()?);
        }

        let mut gossip = HashMap::new();
        for item in rlp.at(2)?.iter() {
            let profile: GossipProfile = GossipProfile::decode(&item)?;
            gossip.insert(profile.entity_id.clone(), profile);
        }

        let mut applied_jevents = BTreeSet::new();
        for item in rlp.at(3)?.iter() {
            let height: u64 = item.val_at(0)?;
            let hash_bytes: Vec<u8> = item.val_at(1)?;
            if hash_bytes.len() != 32 {
                return Err(DecoderError::RlpInvalidLength);
            }
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&hash_bytes);
            applied_jevents.insert((height, hash));
        }

        let mut opened_accounts = BTreeSet::new();
        for item in rlp.at(4)?.iter() {
            opened_accounts.insert(EntityId::decode(&item)?);
        }

        let mut debts = BTreeMap::new();
        for item in rlp.at(5)?.iter() {
            debts.insert(item.val_at(0)?, item.val_at(1)?);
        }

        Ok(EntityDomainState { reserves, chat_log, gossip, applied_jevents, opened_accounts, debts })
    }
}
