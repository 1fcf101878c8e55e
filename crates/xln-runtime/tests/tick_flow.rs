//! End-to-end exercises of the tick loop, driving `Environment` the same
//! way `xln-node`'s stdin loop does but in-process, without going through
//! JSON at all. There is no RPC surface to hit from outside (that
//! transport is explicitly out of scope), so these tests are the
//! integration-level check on `tick`, `Environment::bootstrap`, and
//! snapshot/WAL round trips.

use std::collections::HashMap;

use xln_account::{AccountMachine, AccountTx};
use xln_core::{Board, BoardMember, Delta, EntityId, JEvent, JEventEnvelope, Role, TokenId};
use xln_crypto::{derive_account_key, KeyPair};
use xln_entity::{unsigned_digest, EntityTx, SignedEntityTx};
use xln_runtime::{tick, Environment, Input, Output};

fn signed_chat(kp: &KeyPair, nonce: u64, message: &str) -> SignedEntityTx {
    let tx = EntityTx::Chat { message: message.into() };
    let digest = unsigned_digest(&tx, &kp.signer, nonce);
    let signature = kp.sign_digest(digest.as_bytes());
    SignedEntityTx { tx, from: kp.signer.clone(), nonce, signature }
}

#[test]
fn entity_consensus_round_commits_through_tick() {
    let kp = KeyPair::generate();
    let board = Board::single_signer(kp.signer.clone());
    let entity_id = EntityId::from_bytes([7; 32]);

    let mut env = Environment::new();
    env.entities.insert(entity_id.clone(), xln_entity::EntityReplica::genesis(entity_id.clone(), board));

    let tx = signed_chat(&kp, 1, "genesis block zero");
    let (env, outputs) = tick(
        env,
        vec![Input::SubmitEntityTx { entity_id: entity_id.clone(), tx, pubkey: kp.public_key }],
        1_000,
    );
    assert!(outputs.is_empty(), "submitting to the mempool produces no output yet");

    let (env, outputs) = tick(
        env,
        vec![Input::ProposeEntityFrame { entity_id: entity_id.clone(), proposer: kp.signer.clone() }],
        1_000,
    );
    assert!(outputs.is_empty());

    let header_hash = {
        let replica = &env.entities[&entity_id];
        assert_eq!(replica.phase, xln_entity::ReplicaPhase::Proposing);
        // The header itself isn't exposed by tick; re-derive the hash a
        // board member would sign from what `propose` already computed
        // by asking the replica to propose again would reject (already
        // in flight), so sign over the replica's own recomputation.
        let mut scratch = xln_entity::EntityReplica::genesis(entity_id.clone(), replica.board.clone());
        scratch.mempool.push(signed_chat(&kp, 1, "genesis block zero"));
        scratch.propose(&kp.signer, 1_000).unwrap().hash()
    };
    let sig = kp.sign_digest(&header_hash);

    let (env, outputs) = tick(
        env,
        vec![Input::PrecommitEntityFrame {
            entity_id: entity_id.clone(),
            signer: kp.signer.clone(),
            signature: sig,
            pubkey: kp.public_key,
        }],
        1_000,
    );

    assert_eq!(outputs.len(), 1);
    match &outputs[0] {
        Output::EntityFrameCommitted { entity_id: id, frame, .. } => {
            assert_eq!(id, &entity_id);
            assert_eq!(frame.header.height, 1);
        }
        other => panic!("expected EntityFrameCommitted, got {other:?}"),
    }
    assert_eq!(env.entities[&entity_id].height, 1);
    assert_eq!(env.entities[&entity_id].state.chat_log, vec!["genesis block zero".to_string()]);
}

#[test]
fn account_bilateral_payment_commits_through_tick() {
    let left_kp = KeyPair::generate();
    let right_kp = KeyPair::generate();
    let mut left_bytes = [3u8; 32];
    let mut right_bytes = [9u8; 32];
    left_bytes[0] = 0;
    right_bytes[0] = 1;
    let left_entity = EntityId::from_bytes(left_bytes);
    let right_entity = EntityId::from_bytes(right_bytes);
    let account_key = derive_account_key(&left_entity, &right_entity);

    let mut machine = AccountMachine::new(left_entity.clone(), right_entity.clone());
    machine.state.deltas.insert(TokenId(0), Delta::zero(1_000));
    assert_eq!(machine.role, Role::Left);

    let mut env = Environment::new();
    env.accounts.insert(account_key.clone(), machine);

    let (env, outputs) = tick(
        env,
        vec![Input::ProposeAccountFrame {
            account_key: account_key.clone(),
            proposer_role: Role::Left,
            txs: vec![AccountTx::DirectPayment { token: TokenId(0), amount: 250 }],
        }],
        2_000,
    );
    assert!(outputs.is_empty());

    // Re-derive the signed header the same way `propose` built it, since
    // the pending frame's header isn't exposed outside the machine.
    let mut scratch = AccountMachine::new(left_entity.clone(), right_entity.clone());
    scratch.state.deltas.insert(TokenId(0), Delta::zero(1_000));
    let header = scratch
        .propose(Role::Left, vec![AccountTx::DirectPayment { token: TokenId(0), amount: 250 }], 2_000)
        .unwrap();
    let digest = header.hash();

    let sig_left = left_kp.sign_digest(&digest);
    let (env, outputs) = tick(
        env,
        vec![Input::PrecommitAccountFrame {
            account_key: account_key.clone(),
            signer_role: Role::Left,
            signature: sig_left,
            pubkey: left_kp.public_key,
        }],
        2_000,
    );
    assert!(outputs.is_empty(), "one signature is not quorum yet");

    let sig_right = right_kp.sign_digest(&digest);
    let (env, outputs) = tick(
        env,
        vec![Input::PrecommitAccountFrame {
            account_key: account_key.clone(),
            signer_role: Role::Right,
            signature: sig_right,
            pubkey: right_kp.public_key,
        }],
        2_000,
    );

    assert_eq!(outputs.len(), 1);
    match &outputs[0] {
        Output::AccountFrameCommitted { account_key: key, frame } => {
            assert_eq!(key, &account_key);
            assert_eq!(frame.header.height, 1);
            assert_eq!(frame.header.proposer_role, Role::Left);
        }
        other => panic!("expected AccountFrameCommitted, got {other:?}"),
    }
    assert_eq!(env.accounts[&account_key].state.deltas[&TokenId(0)].net(), -250);
}

#[test]
fn genesis_bootstrap_then_snapshot_round_trips_through_recovery() {
    let entity_id = EntityId::from_bytes([4; 32]);
    let kp = KeyPair::generate();
    let board = Board {
        members: vec![BoardMember { signer: kp.signer.clone(), shares: 1 }],
        threshold: 1,
    };

    let events = vec![JEventEnvelope {
        j_height: 1,
        event_hash: [1; 32],
        event: JEvent::EntityRegistered {
            entity_id: entity_id.clone(),
            board_commitment: [0; 32],
            initial_reserves: vec![(TokenId(0), 5_000)],
        },
    }];
    let genesis = xln_genesis::apply_genesis(&events).unwrap();

    let mut boards = HashMap::new();
    boards.insert(entity_id.clone(), board);
    let env = Environment::bootstrap(genesis, &boards);
    assert_eq!(env.entities[&entity_id].state.reserves[&TokenId(0)], 5_000);

    let snapshot = env.to_snapshot();
    let encoded = xln_codec::encode(&snapshot);
    let decoded: xln_persistence::Snapshot = xln_codec::decode(&encoded).unwrap();

    let recovered = Environment::from_snapshot(decoded, &boards);
    assert_eq!(recovered.entities[&entity_id].state.reserves[&TokenId(0)], 5_000);
}
