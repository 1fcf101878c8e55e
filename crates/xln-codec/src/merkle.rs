//! Binary Merkle tree over sorted leaves.
//!
//! Pairs of leaves accumulate into parents until one root remains, with
//! an odd trailing node promoted unchanged rather than duplicated, which
//! keeps the tree from being length-extension-forgeable by an attacker
//! who controls the leaf count.

use sha3::{Digest, Keccak256};

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// Compute the Merkle root of `leaves`, sorted ascending first so the
/// result does not depend on caller-supplied ordering.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut sorted = leaves.to_vec();
    sorted.sort();

    let mut level = sorted;
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut iter = level.chunks(2);
        for pair in &mut iter {
            if pair.len() == 2 {
                next.push(hash_pair(&pair[0], &pair[1]));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn single_leaf_is_itself() {
        let leaf = [7u8; 32];
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn order_independent() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        assert_eq!(merkle_root(&[a, b, c]), merkle_root(&[c, b, a]));
    }

    #[test]
    fn differs_from_different_leaves() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[a, c]));
    }
}
