//! Per-entity, per-token debt FIFO and the vacuum procedure that drains
//! it. Debt is created only by the J-event-driven enforce-debts
//! procedure when a collateral change would otherwise breach RCPAN on
//! one of the entity's accounts — never by a voluntary bilateral
//! payment, which must simply reject instead.
//!
//! While the queue for a token is non-empty, outgoing sends on that
//! token from this entity are frozen (the "liquidity trap"); any
//! incoming reserve credit is vacuumed against the oldest debt first.

use std::collections::VecDeque;

use xln_codec::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::rlp_util::decode_u128;
use xln_core::{Collateral, EntityId, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebtEntry {
    pub creditor: EntityId,
    pub amount: Collateral,
    pub created_at: Timestamp,
}

impl Encodable for DebtEntry {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.creditor);
        s.append(&self.amount.to_be_bytes().as_ref());
        s.append(&(self.created_at as u64));
    }
}

impl Decodable for DebtEntry {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(DebtEntry {
            creditor: rlp.val_at(0)?,
            amount: decode_u128(rlp, 1)?,
            created_at: rlp.val_at::<u64>(2)? as i64,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebtQueue {
    entries: VecDeque<DebtEntry>,
}

impl Encodable for DebtQueue {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(self.entries.len());
        for entry in &self.entries {
            s.append(entry);
        }
    }
}

impl Decodable for DebtQueue {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let mut entries = VecDeque::new();
        for item in rlp.iter() {
            entries.push_back(DebtEntry::decode(&item)?);
        }
        Ok(DebtQueue { entries })
    }
}

impl DebtQueue {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> Collateral {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn push(&mut self, creditor: EntityId, amount: Collateral, now: Timestamp) {
        if amount > 0 {
            self.entries.push_back(DebtEntry { creditor, amount, created_at: now });
        }
    }

    /// Apply `available` liquidity against the oldest debts first.
    /// Returns the amount actually consumed (`<= available`); the
    /// remainder is the caller's to keep as spendable reserves.
    pub fn vacuum(&mut self, available: Collateral) -> Collateral {
        let mut remaining = available;
        while remaining > 0 {
            let Some(front) = self.entries.front_mut() else { break };
            if front.amount <= remaining {
                remaining -= front.amount;
                self.entries.pop_front();
            } else {
                front.amount -= remaining;
                remaining = 0;
            }
        }
        available - remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creditor(byte: u8) -> EntityId {
        EntityId::from_bytes([byte; 32])
    }

    #[test]
    fn vacuum_drains_oldest_first() {
        let mut q = DebtQueue::default();
        q.push(creditor(1), 100, 1);
        q.push(creditor(2), 50, 2);
        let consumed = q.vacuum(120);
        assert_eq!(consumed, 120);
        assert_eq!(q.total(), 30);
    }

    #[test]
    fn vacuum_with_surplus_empties_queue() {
        let mut q = DebtQueue::default();
        q.push(creditor(1), 10, 1);
        let consumed = q.vacuum(100);
        assert_eq!(consumed, 10);
        assert!(q.is_empty());
    }

    #[test]
    fn vacuum_on_empty_queue_is_a_no_op() {
        let mut q = DebtQueue::default();
        assert_eq!(q.vacuum(50), 0);
    }

    #[test]
    fn partial_payment_preserves_fifo_order() {
        let mut q = DebtQueue::default();
        q.push(creditor(1), 500, 0);
        let consumed = q.vacuum(300);
        assert_eq!(consumed, 300);
        assert_eq!(q.total(), 200);
    }
}
