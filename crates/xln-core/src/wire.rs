//! RLP encodability for every type whose bytes ever feed a consensus hash.
//!
//! Handwritten rather than derived: `rlp_derive` only covers plain
//! structs, and several of these types are closed enums where the first
//! list element is a variant tag.

use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use crate::board::{Board, BoardMember};
use crate::delta::Delta;
use crate::gossip::{FeeSchedule, GossipProfile};
use crate::htlc::{HtlcLock, HtlcResolution};
use crate::jevent::{JEvent, JEventEnvelope};
use crate::types::{
    AccountKey, Direction, EntityId, FrameHash, Role, SecretHash, Signer, TokenId, TxHash,
};

macro_rules! impl_rlp_for_hash_id {
    ($name:ident) => {
        impl Encodable for $name {
            fn rlp_append(&self, s: &mut RlpStream) {
                s.append(&self.0.as_ref());
            }
        }

        impl Decodable for $name {
            fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
                let bytes: Vec<u8> = rlp.as_val()?;
                if bytes.len() != 32 {
                    return Err(DecoderError::RlpInvalidLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }
    };
}

impl_rlp_for_hash_id!(EntityId);
impl_rlp_for_hash_id!(Signer);
impl_rlp_for_hash_id!(AccountKey);
impl_rlp_for_hash_id!(FrameHash);
impl_rlp_for_hash_id!(TxHash);
impl_rlp_for_hash_id!(SecretHash);

impl Encodable for TokenId {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&self.0);
    }
}

impl Decodable for TokenId {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(TokenId(rlp.as_val()?))
    }
}

impl Encodable for Role {
    fn rlp_append(&self, s: &mut RlpStream) {
        let tag: u8 = match self {
            Role::Left => 0,
            Role::Right => 1,
        };
        s.append(&tag);
    }
}

impl Decodable for Role {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.as_val::<u8>()? {
            0 => Ok(Role::Left),
            1 => Ok(Role::Right),
            _ => Err(DecoderError::Custom("unknown Role tag")),
        }
    }
}

impl Encodable for Direction {
    fn rlp_append(&self, s: &mut RlpStream) {
        let tag: u8 = match self {
            Direction::Left => 0,
            Direction::Right => 1,
        };
        s.append(&tag);
    }
}

impl Decodable for Direction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.as_val::<u8>()? {
            0 => Ok(Direction::Left),
            1 => Ok(Direction::Right),
            _ => Err(DecoderError::Custom("unknown Direction tag")),
        }
    }
}

impl Encodable for BoardMember {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.signer);
        s.append(&self.shares);
    }
}

impl Decodable for BoardMember {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(BoardMember {
            signer: rlp.val_at(0)?,
            shares: rlp.val_at(1)?,
        })
    }
}

impl Encodable for Board {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append_list(&self.members);
        s.append(&self.threshold);
    }
}

impl Decodable for Board {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Board {
            members: rlp.list_at(0)?,
            threshold: rlp.val_at(1)?,
        })
    }
}

impl Encodable for HtlcLock {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(6);
        s.append(&self.hashlock);
        s.append(&self.amount.to_be_bytes().as_ref());
        s.append(&self.token);
        s.append(&self.timelock_block);
        s.append(&self.direction);
        s.append(&self.onion_layers);
    }
}

impl Decodable for HtlcLock {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let amount_bytes: Vec<u8> = rlp.val_at(1)?;
        if amount_bytes.len() != 16 {
            return Err(DecoderError::RlpInvalidLength);
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&amount_bytes);
        Ok(HtlcLock {
            hashlock: rlp.val_at(0)?,
            amount: u128::from_be_bytes(arr),
            token: rlp.val_at(2)?,
            timelock_block: rlp.val_at(3)?,
            direction: rlp.val_at(4)?,
            onion_layers: rlp.val_at(5)?,
        })
    }
}

impl Encodable for HtlcResolution {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            HtlcResolution::Reveal { secret } => {
                s.begin_list(2);
                s.append(&0u8);
                s.append(secret);
            }
            HtlcResolution::Timeout => {
                s.begin_list(1);
                s.append(&1u8);
            }
            HtlcResolution::Cancel => {
                s.begin_list(1);
                s.append(&2u8);
            }
        }
    }
}

impl Decodable for HtlcResolution {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.val_at::<u8>(0)? {
            0 => Ok(HtlcResolution::Reveal { secret: rlp.val_at(1)? }),
            1 => Ok(HtlcResolution::Timeout),
            2 => Ok(HtlcResolution::Cancel),
            _ => Err(DecoderError::Custom("unknown HtlcResolution tag")),
        }
    }
}

impl Encodable for JEvent {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            JEvent::EntityRegistered { entity_id, board_commitment, initial_reserves } => {
                s.begin_list(4);
                s.append(&0u8);
                s.append(entity_id);
                s.append(&board_commitment.as_ref());
                crate::rlp_util::append_balance_list(s, initial_reserves);
            }
            JEvent::CollateralUpdated { account_key, token, new_collateral } => {
                s.begin_list(4);
                s.append(&1u8);
                s.append(account_key);
                s.append(token);
                s.append(&new_collateral.to_be_bytes().as_ref());
            }
            JEvent::DisputeOutcome { account_key, accepted_frame_hash } => {
                s.begin_list(3);
                s.append(&2u8);
                s.append(account_key);
                s.append(accepted_frame_hash);
            }
            JEvent::ReserveCredited { entity_id, token, amount } => {
                s.begin_list(4);
                s.append(&3u8);
                s.append(entity_id);
                s.append(token);
                s.append(&amount.to_be_bytes().as_ref());
            }
        }
    }
}

impl Decodable for JEvent {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.val_at::<u8>(0)? {
            0 => Ok(JEvent::EntityRegistered {
                entity_id: rlp.val_at(1)?,
                board_commitment: {
                    let v: Vec<u8> = rlp.val_at(2)?;
                    if v.len() != 32 {
                        return Err(DecoderError::RlpInvalidLength);
                    }
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(&v);
                    arr
                },
                initial_reserves: crate::rlp_util::decode_balance_list(&rlp.at(3)?)?,
            }),
            1 => Ok(JEvent::CollateralUpdated {
                account_key: rlp.val_at(1)?,
                token: rlp.val_at(2)?,
                new_collateral: crate::rlp_util::decode_u128(rlp, 3)?,
            }),
            2 => Ok(JEvent::DisputeOutcome {
                account_key: rlp.val_at(1)?,
                accepted_frame_hash: rlp.val_at(2)?,
            }),
            3 => Ok(JEvent::ReserveCredited {
                entity_id: rlp.val_at(1)?,
                token: rlp.val_at(2)?,
                amount: crate::rlp_util::decode_i128(rlp, 3)?,
            }),
            _ => Err(DecoderError::Custom("unknown JEvent tag")),
        }
    }
}

impl Encodable for JEventEnvelope {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.j_height);
        s.append(&self.event_hash.as_ref());
        s.append(&self.event);
    }
}

impl Decodable for JEventEnvelope {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let hash_bytes: Vec<u8> = rlp.val_at(1)?;
        if hash_bytes.len() != 32 {
            return Err(DecoderError::RlpInvalidLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&hash_bytes);
        Ok(JEventEnvelope {
            j_height: rlp.val_at(0)?,
            event_hash: arr,
            event: rlp.val_at(2)?,
        })
    }
}

impl Encodable for FeeSchedule {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.base_fee.to_be_bytes().as_ref());
        s.append(&self.fee_rate_ppm);
    }
}

impl Decodable for FeeSchedule {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(FeeSchedule {
            base_fee: crate::rlp_util::decode_u128(rlp, 0)?,
            fee_rate_ppm: rlp.val_at(1)?,
        })
    }
}

impl Encodable for GossipProfile {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.entity_id);
        s.append(&self.onion_public_key.as_ref());
        s.begin_list(self.fee_schedules.len());
        for (token, fee) in &self.fee_schedules {
            s.begin_list(2);
            s.append(token);
            s.append(fee);
        }
        s.append(&self.updated_at.to_be_bytes().as_ref());
    }
}

impl Decodable for GossipProfile {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let pk_bytes: Vec<u8> = rlp.val_at(1)?;
        if pk_bytes.len() != 32 {
            return Err(DecoderError::RlpInvalidLength);
        }
        let mut onion_public_key = [0u8; 32];
        onion_public_key.copy_from_slice(&pk_bytes);

        let list = rlp.at(2)?;
        let mut fee_schedules = Vec::with_capacity(list.item_count()?);
        for item in list.iter() {
            fee_schedules.push((item.val_at(0)?, item.val_at(1)?));
        }

        Ok(GossipProfile {
            entity_id: rlp.val_at(0)?,
            onion_public_key,
            fee_schedules,
            updated_at: crate::rlp_util::decode_i64(rlp, 3)?,
        })
    }
}

impl Encodable for Delta {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(7);
        s.append(&self.on_delta.to_be_bytes().as_ref());
        s.append(&self.off_delta.to_be_bytes().as_ref());
        s.append(&self.collateral.to_be_bytes().as_ref());
        s.append(&self.left_credit_limit.to_be_bytes().as_ref());
        s.append(&self.right_credit_limit.to_be_bytes().as_ref());
        s.append(&self.left_htlc_hold.to_be_bytes().as_ref());
        s.append(&self.right_htlc_hold.to_be_bytes().as_ref());
    }
}

impl Decodable for Delta {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Delta {
            on_delta: crate::rlp_util::decode_i128(rlp, 0)?,
            off_delta: crate::rlp_util::decode_i128(rlp, 1)?,
            collateral: crate::rlp_util::decode_u128(rlp, 2)?,
            left_credit_limit: crate::rlp_util::decode_u128(rlp, 3)?,
            right_credit_limit: crate::rlp_util::decode_u128(rlp, 4)?,
            left_htlc_hold: crate::rlp_util::decode_u128(rlp, 5)?,
            right_htlc_hold: crate::rlp_util::decode_u128(rlp, 6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_round_trips() {
        let id = EntityId::from_bytes([9u8; 32]);
        let bytes = rlp::encode(&id);
        let back: EntityId = rlp::decode(&bytes).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn delta_round_trips() {
        let d = Delta {
            on_delta: -500,
            off_delta: 250,
            collateral: 1_000,
            left_credit_limit: 100,
            right_credit_limit: 50,
            left_htlc_hold: 10,
            right_htlc_hold: 5,
        };
        let bytes = rlp::encode(&d);
        let back: Delta = rlp::decode(&bytes).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn jevent_envelope_round_trips() {
        let env = JEventEnvelope {
            j_height: 42,
            event_hash: [3u8; 32],
            event: JEvent::ReserveCredited {
                entity_id: EntityId::from_bytes([1u8; 32]),
                token: TokenId(7),
                amount: 12_345,
            },
        };
        let bytes = rlp::encode(&env);
        let back: JEventEnvelope = rlp::decode(&bytes).unwrap();
        assert_eq!(env, back);
    }
}

#[cfg(test)]
mod debug_tmp {
    use super::*;
    #[test]
    fn debug_jevent_only() {
        let env = JEventEnvelope {
            j_height: 42,
            event_hash: [3u8; 32],
            event: JEvent::ReserveCredited {
                entity_id: EntityId::from_bytes([1u8; 32]),
                token: TokenId(7),
                amount: 12_345,
            },
        };
        let bytes = rlp::encode(&env);
        eprintln!("env bytes len {} = {}", bytes.len(), hex::encode(&bytes[..]));
        let rlp_view = rlp::Rlp::new(&bytes);
        eprintln!("item_count = {:?}", rlp_view.item_count());
        for i in 0..4usize {
            let item = rlp_view.at(i);
            eprintln!("item {} = {:?}", i, item.map(|r| hex::encode(r.as_raw())));
        }
        let back: JEventEnvelope = rlp::decode(&bytes).unwrap();
        assert_eq!(env, back);
    }
}
