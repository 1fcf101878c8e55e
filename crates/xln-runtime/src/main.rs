//! xln-node — a minimal demonstration binary.
//!
//! Startup sequence, mirrored from a conventional full node shell with
//! its network transport stripped out:
//!   1. Open (or initialise) the persistent data directory
//!   2. Recover the latest snapshot and replay its trailing WAL records
//!   3. Apply genesis if the directory is fresh
//!   4. Run the main loop: read newline-delimited JSON test inputs from
//!      stdin, tick them through the environment, print the outputs
//!
//! This is explicitly not a production transport: no P2P gossip, no
//! RPC server, no CLI flag parsing. Inputs arrive as JSON lines; board
//! membership and genesis events are read from fixed files in the data
//! directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use xln_account::AccountTx;
use xln_core::{AccountKey, Board, EntityId, GossipProfile, JEventEnvelope, Role, Signer};
use xln_entity::SignedEntityTx;
use xln_persistence::{WalEntry, WalRecord, WalWriter};
use xln_runtime::{tick, Environment, Input, Output, RuntimeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,xln=debug".parse().unwrap()),
        )
        .init();

    let config = load_config();
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let boards = load_boards(&config.data_dir).unwrap_or_default();
    let (mut env, start_frame) = boot(&config.data_dir, &boards).context("booting environment")?;
    tracing::info!(frame = start_frame, entities = env.entities.len(), accounts = env.accounts.len(), "node ready");

    let mut wal = WalWriter::open(&config.data_dir, 0).context("opening wal")?;

    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(1024);
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read error");
                    break;
                }
            }
        }
    });

    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(config.tick_interval_ms));
    let mut frames_since_snapshot = 0u64;
    let mut stdin_closed = false;

    loop {
        ticker.tick().await;

        let mut batch = Vec::new();
        loop {
            match line_rx.try_recv() {
                Ok(line) => match parse_command(&line) {
                    Ok(input) => batch.push(input),
                    Err(e) => tracing::warn!(error = %e, line = %line, "dropping malformed input line"),
                },
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => break,
                Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => {
                    stdin_closed = true;
                    break;
                }
            }
        }

        if batch.is_empty() && stdin_closed {
            break;
        }
        if batch.is_empty() {
            continue;
        }

        let now = chrono::Utc::now().timestamp();
        let (next_env, outputs) = tick(env, batch, now);
        env = next_env;

        for output in &outputs {
            match output {
                Output::EntityFrameCommitted { entity_id, frame, .. } => {
                    wal.append(&WalRecord {
                        frame_id: env.frame_counter,
                        entry: WalEntry::EntityFrame { entity_id: entity_id.clone(), frame: frame.clone() },
                    })?;
                    frames_since_snapshot += 1;
                }
                Output::AccountFrameCommitted { account_key, frame } => {
                    wal.append(&WalRecord {
                        frame_id: env.frame_counter,
                        entry: WalEntry::AccountFrame { account_key: account_key.clone(), frame: frame.clone() },
                    })?;
                    frames_since_snapshot += 1;
                }
                _ => {}
            }
            println!("{}", describe(output));
        }

        if frames_since_snapshot >= config.snapshot_interval_frames {
            let snapshot = env.to_snapshot();
            xln_persistence::write_snapshot(&config.data_dir, &snapshot).context("writing snapshot")?;
            frames_since_snapshot = 0;
            tracing::info!(frame = snapshot.frame_id, "snapshot written");
        }
    }

    let snapshot = env.to_snapshot();
    xln_persistence::write_snapshot(&config.data_dir, &snapshot).context("writing final snapshot")?;
    tracing::info!("node shutting down");
    Ok(())
}

fn load_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    if let Ok(dir) = std::env::var("XLN_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(ms) = std::env::var("XLN_TICK_INTERVAL_MS") {
        if let Ok(parsed) = ms.parse() {
            config.tick_interval_ms = parsed;
        }
    }
    config
}

fn load_boards(data_dir: &Path) -> Option<HashMap<EntityId, Board>> {
    let path = data_dir.join("boards.json");
    let bytes = std::fs::read(path).ok()?;
    let raw: HashMap<String, Board> = serde_json::from_slice(&bytes).ok()?;
    let mut boards = HashMap::new();
    for (hex_id, board) in raw {
        let id = EntityId::from_hex(&hex_id).ok()?;
        boards.insert(id, board);
    }
    Some(boards)
}

/// Recover from disk. A fresh data directory with no snapshot, no WAL,
/// and a `genesis.json` present bootstraps from it; otherwise the node
/// starts from whatever `xln_persistence::recover` found (possibly a
/// wholly empty environment, for a brand-new deployment with no
/// genesis file either — useful for exercising the tick loop alone).
fn boot(data_dir: &Path, boards: &HashMap<EntityId, Board>) -> anyhow::Result<(Environment, u64)> {
    let (snapshot, wal_records) = xln_persistence::recover(data_dir).context("recovering from disk")?;

    if snapshot.entities.is_empty() && snapshot.accounts.is_empty() && wal_records.is_empty() {
        if let Some(events) = load_genesis(data_dir)? {
            tracing::info!(events = events.len(), "fresh data directory, applying genesis");
            let genesis = xln_genesis::apply_genesis(&events).context("applying genesis")?;
            return Ok((Environment::bootstrap(genesis, boards), 0));
        }
        tracing::info!("fresh data directory, no genesis file found, starting empty");
        return Ok((Environment::new(), 0));
    }

    let mut env = Environment::from_snapshot(snapshot, boards);
    replay(&mut env, wal_records)?;
    let frame = env.frame_counter;
    Ok((env, frame))
}

fn load_genesis(data_dir: &Path) -> anyhow::Result<Option<Vec<JEventEnvelope>>> {
    let path = data_dir.join("genesis.json");
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Re-derive the mutations a committed frame made, past what the last
/// snapshot already captured. Entity frames replay straight through
/// `apply_tx`; account frames carry their proposer's role in the header
/// so `apply_account_tx` can be replayed the same way a live precommit
/// would have driven it.
fn replay(env: &mut Environment, records: Vec<WalRecord>) -> anyhow::Result<()> {
    for record in records {
        match record.entry {
            WalEntry::EntityFrame { entity_id, frame } => {
                let Some(replica) = env.entities.get_mut(&entity_id) else {
                    tracing::warn!(entity = %entity_id, "wal record for unknown entity, skipping");
                    continue;
                };
                for signed in &frame.txs {
                    xln_entity::apply::apply_tx(&mut replica.state, &signed.tx)?;
                }
                replica.height = frame.header.height;
            }
            WalEntry::AccountFrame { account_key, frame } => {
                let Some(machine) = env.accounts.get_mut(&account_key) else {
                    tracing::warn!(account = %account_key, "wal record for unknown account, skipping");
                    continue;
                };
                for tx in &frame.txs {
                    xln_account::apply::apply_account_tx(
                        &mut machine.state,
                        tx,
                        frame.header.proposer_role,
                        frame.header.timestamp,
                    )?;
                }
                machine.height = frame.header.height;
            }
            WalEntry::Genesis { .. } => {
                tracing::warn!("unexpected genesis record in wal, skipping");
            }
        }
        env.frame_counter = env.frame_counter.max(record.frame_id);
    }
    Ok(())
}

fn describe(output: &Output) -> serde_json::Value {
    match output {
        Output::EntityFrameCommitted { entity_id, frame, outputs } => serde_json::json!({
            "event": "entity_frame_committed",
            "entity": entity_id.to_hex(),
            "height": frame.header.height,
            "outputs": outputs.len(),
        }),
        Output::AccountFrameCommitted { account_key, frame } => serde_json::json!({
            "event": "account_frame_committed",
            "account": account_key.to_hex(),
            "height": frame.header.height,
        }),
        Output::AccountOpened { entity_id, counterparty, account_key } => serde_json::json!({
            "event": "account_opened",
            "entity": entity_id.to_hex(),
            "counterparty": counterparty.to_hex(),
            "account": account_key.to_hex(),
        }),
        Output::GossipAdvanced { entity_id } => serde_json::json!({
            "event": "gossip_advanced",
            "entity": entity_id.to_hex(),
        }),
        Output::HtlcForwarded { account_key, next_account_key } => serde_json::json!({
            "event": "htlc_forwarded",
            "account": account_key.to_hex(),
            "next_account": next_account_key.to_hex(),
        }),
        Output::HtlcHopRelayed { entity_id, account_key, hop_index } => serde_json::json!({
            "event": "htlc_hop_relayed",
            "entity": entity_id.to_hex(),
            "account": account_key.to_hex(),
            "hop_index": hop_index,
        }),
        Output::Rejected { reason } => serde_json::json!({
            "event": "rejected",
            "reason": reason,
        }),
    }
}

/// The stdin wire format. Deliberately narrow — a real transport would
/// carry these as signed wire frames; this is a test harness, so
/// signatures and public keys travel as hex-encoded compact/compressed
/// bytes rather than requiring a full RLP wire decoder on stdin.
#[derive(Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command {
    SubmitEntityTx { entity_id: String, tx: SignedEntityTx, pubkey: String },
    ProposeEntityFrame { entity_id: String, proposer: String },
    PrecommitEntityFrame { entity_id: String, signer: String, signature: String, pubkey: String },
    ApplyJEvent { entity_id: String, envelope: JEventEnvelope },
    PublishGossip { profile: GossipProfile },
    ProposeAccountFrame { account_key: String, proposer_role: Role, txs: Vec<AccountTx> },
    PrecommitAccountFrame { account_key: String, signer_role: Role, signature: String, pubkey: String },
}

fn parse_command(line: &str) -> anyhow::Result<Input> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        anyhow::bail!("empty line");
    }
    let command: Command = serde_json::from_str(trimmed)?;
    Ok(match command {
        Command::SubmitEntityTx { entity_id, tx, pubkey } => Input::SubmitEntityTx {
            entity_id: EntityId::from_hex(&entity_id)?,
            tx,
            pubkey: parse_pubkey(&pubkey)?,
        },
        Command::ProposeEntityFrame { entity_id, proposer } => Input::ProposeEntityFrame {
            entity_id: EntityId::from_hex(&entity_id)?,
            proposer: Signer::from_hex(&proposer)?,
        },
        Command::PrecommitEntityFrame { entity_id, signer, signature, pubkey } => Input::PrecommitEntityFrame {
            entity_id: EntityId::from_hex(&entity_id)?,
            signer: Signer::from_hex(&signer)?,
            signature: parse_signature(&signature)?,
            pubkey: parse_pubkey(&pubkey)?,
        },
        Command::ApplyJEvent { entity_id, envelope } => {
            Input::ApplyJEvent { entity_id: EntityId::from_hex(&entity_id)?, envelope }
        }
        Command::PublishGossip { profile } => Input::PublishGossip { profile },
        Command::ProposeAccountFrame { account_key, proposer_role, txs } => Input::ProposeAccountFrame {
            account_key: AccountKey::from_hex(&account_key)?,
            proposer_role,
            txs,
        },
        Command::PrecommitAccountFrame { account_key, signer_role, signature, pubkey } => Input::PrecommitAccountFrame {
            account_key: AccountKey::from_hex(&account_key)?,
            signer_role,
            signature: parse_signature(&signature)?,
            pubkey: parse_pubkey(&pubkey)?,
        },
    })
}

fn parse_signature(hex_str: &str) -> anyhow::Result<Signature> {
    let bytes = hex::decode(hex_str)?;
    let arr: [u8; 64] = bytes.as_slice().try_into().map_err(|_| anyhow::anyhow!("signature must be 64 bytes"))?;
    Ok(Signature::from_compact(&arr)?)
}

fn parse_pubkey(hex_str: &str) -> anyhow::Result<PublicKey> {
    let bytes = hex::decode(hex_str)?;
    Ok(PublicKey::from_slice(&bytes)?)
}
