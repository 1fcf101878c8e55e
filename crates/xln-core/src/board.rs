//! Entity board and quorum accounting.
//!
//! A board is an ordered list of signers with share weights, plus the
//! threshold sum of shares a quorum must reach.

use serde::{Deserialize, Serialize};

use crate::types::Signer;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMember {
    pub signer: Signer,
    pub shares: u32,
}

/// An entity's governance board. Ordering is significant: the proposer at
/// height `h` is `members[h % members.len()]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub members: Vec<BoardMember>,
    pub threshold: u32,
}

impl Board {
    pub fn single_signer(signer: Signer) -> Self {
        Self {
            members: vec![BoardMember { signer, shares: 1 }],
            threshold: 1,
        }
    }

    pub fn is_single_signer(&self) -> bool {
        self.members.len() == 1
    }

    pub fn proposer_at(&self, height: u64) -> &Signer {
        let idx = (height as usize) % self.members.len();
        &self.members[idx].signer
    }

    pub fn is_member(&self, signer: &Signer) -> bool {
        self.members.iter().any(|m| &m.signer == signer)
    }

    pub fn shares_of(&self, signer: &Signer) -> u32 {
        self.members
            .iter()
            .find(|m| &m.signer == signer)
            .map(|m| m.shares)
            .unwrap_or(0)
    }

    /// Sum of shares for `signers`, deduplicated, ignoring unknown signers.
    pub fn shares_sum<'a>(&self, signers: impl Iterator<Item = &'a Signer>) -> u32 {
        let mut seen = std::collections::HashSet::new();
        let mut total = 0u32;
        for s in signers {
            if seen.insert(s.clone()) {
                total += self.shares_of(s);
            }
        }
        total
    }

    pub fn quorum_met<'a>(&self, signers: impl Iterator<Item = &'a Signer>) -> bool {
        self.shares_sum(signers) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(b: u8) -> Signer {
        Signer::from_bytes([b; 32])
    }

    #[test]
    fn proposer_rotates_by_height() {
        let board = Board {
            members: vec![
                BoardMember { signer: signer(1), shares: 1 },
                BoardMember { signer: signer(2), shares: 1 },
                BoardMember { signer: signer(3), shares: 1 },
            ],
            threshold: 2,
        };
        assert_eq!(board.proposer_at(0), &signer(1));
        assert_eq!(board.proposer_at(1), &signer(2));
        assert_eq!(board.proposer_at(3), &signer(1));
    }

    #[test]
    fn quorum_requires_threshold_shares() {
        let board = Board {
            members: vec![
                BoardMember { signer: signer(1), shares: 33 },
                BoardMember { signer: signer(2), shares: 33 },
                BoardMember { signer: signer(3), shares: 34 },
            ],
            threshold: 67,
        };
        assert!(!board.quorum_met([signer(1)].iter()));
        assert!(board.quorum_met([signer(1), signer(3)].iter()));
        // Duplicate signer does not double-count.
        assert!(!board.quorum_met([signer(1), signer(1)].iter()));
    }
}
