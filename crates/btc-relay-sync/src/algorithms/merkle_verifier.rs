//! # Merkle Proof Verification
//!
//! Bitcoin transaction merkle trees: double SHA-256 nodes, last node
//! duplicated on odd levels, leaf position bits select the hashing order.
//!
//! # Algorithm
//!
//! 1. Start with the txid as the current hash
//! 2. For level `i`, if bit `i` of the position is set the current node is a
//!    right child: `hash = sha256d(sibling || current)`, otherwise
//!    `hash = sha256d(current || sibling)`
//! 3. The final hash must equal the header's merkle root
//!
//! # Time Complexity: O(log n)

use crate::domain::{MerkleProof, RelayError};
use btc_relay_types::{sha256d, H256};

/// Verify a merkle proof for `leaf` against `expected_root`.
pub fn verify_merkle_proof(leaf: &H256, proof: &MerkleProof, expected_root: &H256) -> bool {
    if proof.siblings.len() < 32 && (proof.position >> proof.siblings.len()) != 0 {
        return false;
    }
    compute_root_from_proof(leaf, proof) == *expected_root
}

/// Fold a proof into the root it implies.
pub fn compute_root_from_proof(leaf: &H256, proof: &MerkleProof) -> H256 {
    let mut current = *leaf;
    for (level, sibling) in proof.siblings.iter().enumerate() {
        let is_right = level < 32 && (proof.position >> level) & 1 == 1;
        current = if is_right {
            hash_pair(sibling, &current)
        } else {
            hash_pair(&current, sibling)
        };
    }
    current
}

fn hash_pair(left: &H256, right: &H256) -> H256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    sha256d(&buf)
}

fn next_level(level: &[H256]) -> Vec<H256> {
    level
        .chunks(2)
        .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

/// Merkle root of a block's txids (raw order).
pub fn compute_merkle_root(txids: &[H256]) -> H256 {
    if txids.is_empty() {
        return H256::zero();
    }
    let mut level = txids.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Build the proof for the txid at `index`.
///
/// # Errors
/// - `NotFound` if `index` is out of range
pub fn build_merkle_proof(txids: &[H256], index: usize) -> Result<MerkleProof, RelayError> {
    if index >= txids.len() {
        return Err(RelayError::NotFound(format!(
            "transaction index {index} out of {} in block",
            txids.len()
        )));
    }

    let mut siblings = Vec::new();
    let mut level = txids.to_vec();
    let mut at = index;
    while level.len() > 1 {
        let sibling = level.get(at ^ 1).unwrap_or(&level[at]);
        siblings.push(*sibling);
        level = next_level(&level);
        at /= 2;
    }

    Ok(MerkleProof {
        position: index as u32,
        siblings,
    })
}
