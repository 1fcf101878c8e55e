//! The `Environment` arena: every entity replica and account machine the
//! node currently tracks, plus the routing gossip store. Keyed lookups
//! only — the tick function is what gives this structure meaning.

use std::collections::HashMap;

use x25519_dalek::StaticSecret;

use xln_account::AccountMachine;
use xln_core::{AccountKey, Board, EntityId};
use xln_entity::EntityReplica;
use xln_genesis::GenesisState;
use xln_persistence::Snapshot;
use xln_routing::GossipStore;

#[derive(Default)]
pub struct Environment {
    pub entities: HashMap<EntityId, EntityReplica>,
    pub accounts: HashMap<AccountKey, AccountMachine>,
    pub gossip: GossipStore,
    /// Global counter stamped onto every WAL record so recovery can tell
    /// which records a given snapshot already covers.
    pub frame_counter: u64,
    /// The local node's onion private key for every entity it forwards
    /// HTLCs on behalf of. Supplied out of band, the same way board
    /// membership is — never reconstructed from on-chain state.
    pub onion_secrets: HashMap<EntityId, StaticSecret>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial arena from a genesis batch. `boards` supplies
    /// each entity's full board membership, revealed out of band from
    /// the jurisdiction event that only carried its commitment hash.
    pub fn bootstrap(genesis: GenesisState, boards: &HashMap<EntityId, Board>) -> Self {
        let mut env = Environment::new();
        for (entity_id, domain) in genesis.entities {
            let board = boards.get(&entity_id).cloned().unwrap_or_else(|| {
                tracing::warn!(entity = %entity_id, "no board supplied at bootstrap, defaulting to single-signer on entity_id");
                Board::single_signer(xln_core::Signer::from_bytes(*entity_id.as_bytes()))
            });
            let mut replica = EntityReplica::genesis(entity_id.clone(), board);
            replica.state = domain;
            env.entities.insert(entity_id, replica);
        }
        env
    }

    /// Rebuild the arena from a recovered snapshot. `AccountMachine`s are
    /// reconstructed by pairing each entity's `opened_accounts` against
    /// the snapshot's account keys, since the snapshot itself only has
    /// room for the derived key, not the two entity ids that produced it.
    pub fn from_snapshot(snapshot: Snapshot, boards: &HashMap<EntityId, Board>) -> Self {
        let mut env = Environment::new();
        env.frame_counter = snapshot.frame_id;

        let mut pairs: HashMap<AccountKey, (EntityId, EntityId)> = HashMap::new();
        for (entity_id, domain) in &snapshot.entities {
            for counterparty in &domain.opened_accounts {
                let key = xln_crypto::derive_account_key(entity_id, counterparty);
                pairs.insert(key, (entity_id.clone(), counterparty.clone()));
            }
        }

        for (entity_id, domain) in snapshot.entities {
            let board = boards
                .get(&entity_id)
                .cloned()
                .unwrap_or_else(|| Board::single_signer(xln_core::Signer::from_bytes(*entity_id.as_bytes())));
            let mut replica = EntityReplica::genesis(entity_id.clone(), board);
            replica.state = domain;
            replica.height = snapshot.frame_id;
            env.entities.insert(entity_id, replica);
        }

        for (account_key, state) in snapshot.accounts {
            let Some((a, b)) = pairs.get(&account_key) else {
                tracing::warn!(account = %account_key, "snapshot account has no matching entity pair, dropping");
                continue;
            };
            let mut machine = AccountMachine::new(a.clone(), b.clone());
            machine.state = state;
            machine.height = snapshot.frame_id;
            env.accounts.insert(account_key, machine);
        }

        env
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            frame_id: self.frame_counter,
            entities: self.entities.iter().map(|(id, r)| (id.clone(), r.state.clone())).collect(),
            accounts: self.accounts.iter().map(|(k, m)| (k.clone(), m.state.clone())).collect(),
        }
    }

    pub fn next_frame_id(&mut self) -> u64 {
        self.frame_counter += 1;
        self.frame_counter
    }

    /// Register the onion private key this node forwards `entity_id`'s
    /// HTLCs with. A node with no registered key for an entity is never
    /// the forwarding hop for a lock addressed to it — see
    /// `tick::peel_htlc_hop`.
    pub fn set_onion_secret(&mut self, entity_id: EntityId, secret: StaticSecret) {
        self.onion_secrets.insert(entity_id, secret);
    }
}
