//! Inputs produced by the jurisdiction oracle, external to this crate.

use serde::{Deserialize, Serialize};

use crate::types::{AccountKey, Balance, Collateral, EntityId, FrameHash, TokenId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JEvent {
    EntityRegistered {
        entity_id: EntityId,
        board_commitment: [u8; 32],
        initial_reserves: Vec<(TokenId, Balance)>,
    },
    CollateralUpdated {
        account_key: AccountKey,
        token: TokenId,
        new_collateral: Collateral,
    },
    DisputeOutcome {
        account_key: AccountKey,
        accepted_frame_hash: FrameHash,
    },
    ReserveCredited {
        entity_id: EntityId,
        token: TokenId,
        amount: Balance,
    },
}

/// A `JEvent` wrapped with the monotonic jurisdiction height and the
/// `(j_height, event_hash)` pair a replica uses to reject replays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JEventEnvelope {
    pub j_height: u64,
    pub event_hash: [u8; 32],
    pub event: JEvent,
}

impl JEventEnvelope {
    pub fn dedup_key(&self) -> (u64, [u8; 32]) {
        (self.j_height, self.event_hash)
    }
}
