//! The pure per-tick state transition: a batch of [`Input`]s folded over
//! an [`Environment`], producing the [`Output`]s an embedder dispatches
//! (persist, notify, re-route) and a new environment to tick again.

use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;

use xln_account::{AccountFrame, AccountTx, PendingHtlc};
use xln_core::{AccountKey, Direction, EntityId, JEvent, JEventEnvelope, Role, Signer, Timestamp, XlnError};
use xln_entity::apply::EntityOutput;
use xln_entity::{EntityFrame, SignedEntityTx};
use xln_routing::CapacityEdge;

use crate::environment::Environment;

pub enum Input {
    SubmitEntityTx { entity_id: EntityId, tx: SignedEntityTx, pubkey: PublicKey },
    ProposeEntityFrame { entity_id: EntityId, proposer: Signer },
    PrecommitEntityFrame { entity_id: EntityId, signer: Signer, signature: Signature, pubkey: PublicKey },
    ApplyJEvent { entity_id: EntityId, envelope: JEventEnvelope },
    PublishGossip { profile: xln_core::GossipProfile },
    ProposeAccountFrame { account_key: AccountKey, proposer_role: Role, txs: Vec<AccountTx> },
    PrecommitAccountFrame { account_key: AccountKey, signer_role: Role, signature: Signature, pubkey: PublicKey },
}

#[derive(Debug)]
pub enum Output {
    EntityFrameCommitted { entity_id: EntityId, frame: EntityFrame, outputs: Vec<EntityOutput> },
    AccountFrameCommitted { account_key: AccountKey, frame: AccountFrame },
    AccountOpened { entity_id: EntityId, counterparty: EntityId, account_key: AccountKey },
    GossipAdvanced { entity_id: EntityId },
    /// This node peeled an onion layer off a locked HTLC and proposed the
    /// reduced-amount lock for the next hop.
    HtlcForwarded { account_key: AccountKey, next_account_key: AccountKey },
    /// An `EntityTx::HtlcForward` committed, relaying a forwarding notice
    /// to gossip/gateway observers without exposing the onion's contents.
    HtlcHopRelayed { entity_id: EntityId, account_key: AccountKey, hop_index: u32 },
    Rejected { reason: String },
}

/// Fold `inputs` over `env`. Every rejected input becomes an
/// `Output::Rejected` rather than aborting the batch, so one bad input
/// never blocks the rest of the tick.
pub fn tick(mut env: Environment, inputs: Vec<Input>, now: Timestamp) -> (Environment, Vec<Output>) {
    let mut outputs = Vec::new();
    for input in inputs {
        match apply_one(&mut env, input, now) {
            Ok(mut produced) => outputs.append(&mut produced),
            Err(e) => outputs.push(Output::Rejected { reason: e.to_string() }),
        }
    }
    (env, outputs)
}

fn apply_one(env: &mut Environment, input: Input, now: Timestamp) -> Result<Vec<Output>, XlnError> {
    match input {
        Input::SubmitEntityTx { entity_id, tx, pubkey } => {
            let replica = env
                .entities
                .get_mut(&entity_id)
                .ok_or_else(|| XlnError::DependencyGap(format!("unknown entity {entity_id}")))?;
            replica.submit_tx(tx, &pubkey)?;
            Ok(Vec::new())
        }

        Input::ProposeEntityFrame { entity_id, proposer } => {
            let replica = env
                .entities
                .get_mut(&entity_id)
                .ok_or_else(|| XlnError::DependencyGap(format!("unknown entity {entity_id}")))?;
            replica.propose(&proposer, now)?;
            Ok(Vec::new())
        }

        Input::PrecommitEntityFrame { entity_id, signer, signature, pubkey } => {
            let replica = env
                .entities
                .get_mut(&entity_id)
                .ok_or_else(|| XlnError::DependencyGap(format!("unknown entity {entity_id}")))?;
            let reached = replica.precommit(&signer, signature, &pubkey)?;
            if !reached {
                return Ok(Vec::new());
            }
            let (frame, entity_outputs) = replica.commit()?;
            env.next_frame_id();
            let mut produced = vec![Output::EntityFrameCommitted {
                entity_id: entity_id.clone(),
                frame,
                outputs: entity_outputs.clone(),
            }];
            for out in entity_outputs {
                match out {
                    EntityOutput::AccountOpenRequested { counterparty } => {
                        let account_key = xln_crypto::derive_account_key(&entity_id, &counterparty);
                        env.accounts.entry(account_key.clone()).or_insert_with(|| {
                            xln_account::AccountMachine::new(entity_id.clone(), counterparty.clone())
                        });
                        produced.push(Output::AccountOpened {
                            entity_id: entity_id.clone(),
                            counterparty,
                            account_key,
                        });
                    }
                    EntityOutput::HtlcHopObserved { account_key, hop_index } => {
                        produced.push(Output::HtlcHopRelayed {
                            entity_id: entity_id.clone(),
                            account_key,
                            hop_index,
                        });
                    }
                }
            }
            Ok(produced)
        }

        Input::ApplyJEvent { entity_id, envelope } => {
            {
                let replica = env
                    .entities
                    .get_mut(&entity_id)
                    .ok_or_else(|| XlnError::DependencyGap(format!("unknown entity {entity_id}")))?;
                let tx = xln_entity::tx::EntityTx::JEventApply { envelope: envelope.clone() };
                xln_entity::apply::apply_tx(&mut replica.state, &tx)?;
            }
            // The entity layer only recorded the dedup entry; the
            // collateral change itself lives on the named account's
            // `Delta`, and a breach here runs enforce-debts against the
            // debtor entity's debt queue.
            if let JEvent::CollateralUpdated { account_key, token, new_collateral } = &envelope.event {
                apply_collateral_update(env, account_key, *token, *new_collateral, now)?;
            }
            Ok(Vec::new())
        }

        Input::PublishGossip { profile } => {
            let entity_id = profile.entity_id.clone();
            let advanced = env.gossip.apply(profile);
            if advanced {
                Ok(vec![Output::GossipAdvanced { entity_id }])
            } else {
                Ok(Vec::new())
            }
        }

        Input::ProposeAccountFrame { account_key, proposer_role, txs } => {
            propose_account_frame(env, account_key, proposer_role, txs, now)
        }

        Input::PrecommitAccountFrame { account_key, signer_role, signature, pubkey } => {
            let machine = env
                .accounts
                .get_mut(&account_key)
                .ok_or_else(|| XlnError::DependencyGap(format!("unknown account {account_key}")))?;
            let reached = machine.precommit(signer_role, signature, &pubkey)?;
            if !reached {
                return Ok(Vec::new());
            }
            let frame = machine.commit()?;
            env.next_frame_id();
            Ok(vec![Output::AccountFrameCommitted { account_key, frame }])
        }
    }
}

/// Apply a J-event-driven collateral change to the named account's
/// `Delta` and, if it breaches RCPAN, run enforce-debts: push
/// `(creditor, shortfall, now)` onto the debtor entity's `Debt[token]`.
/// A voluntary bilateral payment never reaches this path — only a
/// jurisdiction-sourced collateral change does.
fn apply_collateral_update(
    env: &mut Environment,
    account_key: &AccountKey,
    token: xln_core::TokenId,
    new_collateral: xln_core::Collateral,
    now: Timestamp,
) -> Result<(), XlnError> {
    let machine = env
        .accounts
        .get_mut(account_key)
        .ok_or_else(|| XlnError::DependencyGap(format!("unknown account {account_key}")))?;
    let delta = machine.state.deltas.entry(token).or_insert_with(|| xln_core::Delta::zero(0));
    delta.collateral = new_collateral;

    if delta.check_rcpan().is_ok() {
        return Ok(());
    }

    let net = delta.net();
    let lower = -(delta.left_credit_limit as i128);
    let upper = delta.collateral as i128 + delta.right_credit_limit as i128;
    let (left_entity, right_entity) = match machine.role {
        Role::Left => (machine.entity_id.clone(), machine.counterparty_id.clone()),
        Role::Right => (machine.counterparty_id.clone(), machine.entity_id.clone()),
    };
    let (debtor, creditor, shortfall) = if net < lower {
        (left_entity, right_entity, (lower - net) as u128)
    } else {
        (right_entity, left_entity, (net - upper) as u128)
    };

    let debtor_replica = env
        .entities
        .get_mut(&debtor)
        .ok_or_else(|| XlnError::DependencyGap(format!("unknown entity {debtor}")))?;
    debtor_replica.state.debts.entry(token).or_default().push(creditor, shortfall, now);
    tracing::info!(account = %account_key, token = ?token, debtor = %debtor, shortfall, "debt queued after collateral shortfall");
    Ok(())
}

/// Reject any outgoing `DirectPayment`/`HtlcLock` a frozen entity would
/// propose on a token where it still owes debt. Checked before any state
/// mutation, same as every other consensus rejection.
fn check_outgoing_not_frozen(
    env: &Environment,
    proposer_entity: &EntityId,
    txs: &[AccountTx],
) -> Result<(), XlnError> {
    let Some(replica) = env.entities.get(proposer_entity) else { return Ok(()) };
    for tx in txs {
        let token = match tx {
            AccountTx::DirectPayment { token, .. } => Some(*token),
            AccountTx::HtlcLock { lock } => Some(lock.lock.token),
            _ => None,
        };
        let Some(token) = token else { continue };
        if replica.state.debts.get(&token).map(|q| !q.is_empty()).unwrap_or(false) {
            return Err(XlnError::InvariantViolation(format!(
                "outgoing sends frozen for token {token:?} while debt is outstanding"
            )));
        }
    }
    Ok(())
}

/// Propose `txs` on `account_key` after checking the entity-wide debt
/// freeze, then chain the HTLC multi-hop pipeline: any `HtlcLock` this
/// node can peel (it holds the receiving entity's onion key) and that
/// names a next hop gets forwarded as a reduced-amount lock proposed on
/// the downstream account, recursively, one hop at a time.
fn propose_account_frame(
    env: &mut Environment,
    account_key: AccountKey,
    proposer_role: Role,
    txs: Vec<AccountTx>,
    now: Timestamp,
) -> Result<Vec<Output>, XlnError> {
    let forwards = {
        let machine = env
            .accounts
            .get(&account_key)
            .ok_or_else(|| XlnError::DependencyGap(format!("unknown account {account_key}")))?;
        let proposer_entity = if machine.role == proposer_role {
            machine.entity_id.clone()
        } else {
            machine.counterparty_id.clone()
        };
        check_outgoing_not_frozen(env, &proposer_entity, &txs)?;

        let mut forwards = Vec::new();
        for tx in &txs {
            if let AccountTx::HtlcLock { lock } = tx {
                if let Some(next) = peel_htlc_hop(env, &account_key, &lock.lock, now)? {
                    forwards.push(next);
                }
            }
        }
        forwards
    };

    let machine = env
        .accounts
        .get_mut(&account_key)
        .ok_or_else(|| XlnError::DependencyGap(format!("unknown account {account_key}")))?;
    machine.propose(proposer_role, txs, now)?;

    let mut outputs = Vec::new();
    for (next_account_key, next_role, next_tx) in forwards {
        match propose_account_frame(env, next_account_key.clone(), next_role, vec![next_tx], now) {
            Ok(mut produced) => {
                outputs.push(Output::HtlcForwarded {
                    account_key: account_key.clone(),
                    next_account_key: next_account_key.clone(),
                });
                outputs.append(&mut produced);
            }
            Err(e) => outputs.push(Output::Rejected {
                reason: format!("htlc forward {account_key} -> {next_account_key}: {e}"),
            }),
        }
    }
    Ok(outputs)
}

fn role_to_direction(role: Role) -> Direction {
    match role {
        Role::Left => Direction::Left,
        Role::Right => Direction::Right,
    }
}

fn direction_to_role(direction: Direction) -> Role {
    match direction {
        Direction::Left => Role::Left,
        Direction::Right => Role::Right,
    }
}

/// Peel one onion layer off `lock` if this node holds the receiving
/// entity's onion key, and validate the forwarding constraints: the
/// forwarded amount must not exceed the incoming
/// lock (the difference is this hop's fee), and the incoming timelock
/// must clear `HTLC_SAFETY_DELTA_BLOCKS` over the outgoing one. Returns
/// `None` when this node isn't the receiving hop, or when the peeled
/// payload names no next hop (the lock terminates here).
fn peel_htlc_hop(
    env: &Environment,
    account_key: &AccountKey,
    lock: &xln_core::HtlcLock,
    now: Timestamp,
) -> Result<Option<(AccountKey, Role, AccountTx)>, XlnError> {
    let machine = env
        .accounts
        .get(account_key)
        .ok_or_else(|| XlnError::DependencyGap(format!("unknown account {account_key}")))?;
    let receiving_role = direction_to_role(lock.direction);
    let receiving_entity = if machine.role == receiving_role {
        machine.entity_id.clone()
    } else {
        machine.counterparty_id.clone()
    };

    let Some(secret) = env.onion_secrets.get(&receiving_entity) else {
        return Ok(None);
    };

    let payload = xln_crypto::open_layer(secret, &lock.onion_layers)
        .map_err(|_| XlnError::InvariantViolation("failed to peel HTLC onion layer".into()))?;

    if payload.next_hop.is_empty() {
        return Ok(None);
    }
    if payload.forwarded_amount > lock.amount {
        return Err(XlnError::InvariantViolation(
            "forwarded amount exceeds incoming lock amount".into(),
        ));
    }
    if payload.forwarded_timelock + xln_core::constants::HTLC_SAFETY_DELTA_BLOCKS > lock.timelock_block {
        return Err(XlnError::InvariantViolation(
            "incoming timelock does not clear the safety delta over the outgoing one".into(),
        ));
    }
    if payload.next_hop.len() != 32 {
        return Err(XlnError::InvariantViolation("malformed next hop entity id".into()));
    }
    let mut next_hop_bytes = [0u8; 32];
    next_hop_bytes.copy_from_slice(&payload.next_hop);
    let next_counterparty = EntityId::from_bytes(next_hop_bytes);
    let next_account_key = xln_crypto::derive_account_key(&receiving_entity, &next_counterparty);
    let forwarder_role = Role::of(&receiving_entity, &next_counterparty);

    let next_lock = xln_core::HtlcLock {
        hashlock: lock.hashlock.clone(),
        amount: payload.forwarded_amount,
        token: lock.token,
        timelock_block: payload.forwarded_timelock,
        direction: role_to_direction(forwarder_role.other()),
        onion_layers: payload.inner,
    };
    let tx = AccountTx::HtlcLock { lock: PendingHtlc { lock: next_lock, created_at: now } };
    Ok(Some((next_account_key, forwarder_role, tx)))
}

/// Build the capacity graph edges visible from one side of every open
/// account, for the routing layer to search over. One edge per
/// direction per token: `from`'s spendable balance toward `to`.
pub fn capacity_edges(env: &Environment) -> Vec<CapacityEdge> {
    let mut edges = Vec::new();
    for machine in env.accounts.values() {
        for (token, delta) in &machine.state.deltas {
            let left_cap = delta.left_spendable().max(0) as u128;
            let right_cap = delta.right_spendable().max(0) as u128;
            let total = (delta.collateral as f64).max(1.0);
            edges.push(CapacityEdge {
                from: machine.entity_id.clone(),
                to: machine.counterparty_id.clone(),
                token: *token,
                capacity: left_cap,
                utilization: 1.0 - (left_cap as f64 / total).min(1.0),
            });
            edges.push(CapacityEdge {
                from: machine.counterparty_id.clone(),
                to: machine.entity_id.clone(),
                token: *token,
                capacity: right_cap,
                utilization: 1.0 - (right_cap as f64 / total).min(1.0),
            });
        }
    }
    edges
}
