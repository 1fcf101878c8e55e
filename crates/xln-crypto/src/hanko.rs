//! Hanko: the aggregate quorum signature proving a board-approved frame.
//!
//! Verification iterates the signature set, matches each against a board
//! member's key, accumulates verified share weight, and compares it
//! against the board's threshold. At least one signature must resolve to
//! a plain EOA signer whose address was derived from the matching public
//! key — a forged signer field can't borrow another member's shares.

use secp256k1::{ecdsa::Signature, PublicKey};
use std::collections::HashSet;

use xln_core::{Board, Signer};

use crate::keypair::{signer_from_pubkey, verify_digest};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hanko {
    pub signatures: Vec<(Signer, Signature)>,
}

/// Verify a hanko against `board` over `frame_hash`. `pubkeys` resolves a
/// signer back to the public key needed for ECDSA verification (the
/// runtime's signer registry — hankos carry addresses, not keys).
pub fn verify_hanko(
    hanko: &Hanko,
    board: &Board,
    frame_hash: &[u8; 32],
    pubkeys: impl Fn(&Signer) -> Option<PublicKey>,
) -> bool {
    let mut verified = HashSet::new();
    for (signer, sig) in &hanko.signatures {
        if !board.is_member(signer) {
            continue;
        }
        let Some(pk) = pubkeys(signer) else { continue };
        if signer_from_pubkey(&pk) != *signer {
            continue;
        }
        if verify_digest(&pk, frame_hash, sig) {
            verified.insert(signer.clone());
        }
    }
    if verified.is_empty() {
        return false;
    }
    board.quorum_met(verified.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;
    use xln_core::BoardMember;

    #[test]
    fn quorum_of_shares_verifies() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let kp3 = KeyPair::generate();
        let board = Board {
            members: vec![
                BoardMember { signer: kp1.signer.clone(), shares: 33 },
                BoardMember { signer: kp2.signer.clone(), shares: 33 },
                BoardMember { signer: kp3.signer.clone(), shares: 34 },
            ],
            threshold: 67,
        };
        let frame_hash = crate::hash::keccak256(b"frame");
        let hanko = Hanko {
            signatures: vec![
                (kp1.signer.clone(), kp1.sign_digest(&frame_hash)),
                (kp3.signer.clone(), kp3.sign_digest(&frame_hash)),
            ],
        };
        let keys = [(kp1.signer.clone(), kp1.public_key), (kp3.signer.clone(), kp3.public_key)];
        assert!(verify_hanko(&hanko, &board, &frame_hash, |s| keys
            .iter()
            .find(|(sig, _)| sig == s)
            .map(|(_, pk)| *pk)));
    }

    #[test]
    fn short_of_threshold_fails() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let board = Board {
            members: vec![
                BoardMember { signer: kp1.signer.clone(), shares: 50 },
                BoardMember { signer: kp2.signer.clone(), shares: 50 },
            ],
            threshold: 67,
        };
        let frame_hash = crate::hash::keccak256(b"frame");
        let hanko = Hanko { signatures: vec![(kp1.signer.clone(), kp1.sign_digest(&frame_hash))] };
        assert!(!verify_hanko(&hanko, &board, &frame_hash, |s| if *s == kp1.signer {
            Some(kp1.public_key)
        } else {
            None
        }));
    }
}
