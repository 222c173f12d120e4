//! # Header Replay
//!
//! Rebuilds the stored headers a relay transaction committed by replaying
//! `compute_next` from the payload's leading stored header.

use super::call_trace::RelayPayload;
use crate::domain::ResolvedHeader;
use btc_relay_types::{BlockHash, H256};

/// What a lookup is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitTarget {
    /// Commit hash emitted by the relay.
    Commit(H256),
    /// Bitcoin block hash.
    Block(BlockHash),
}

impl CommitTarget {
    fn matches(&self, resolved: &ResolvedHeader) -> bool {
        match self {
            CommitTarget::Commit(commit) => resolved.commit_hash == *commit,
            CommitTarget::Block(block) => resolved.header.block_hash == *block,
        }
    }
}

/// Every stored header a payload implies, leading header first.
pub fn replay_payload(payload: &RelayPayload) -> Vec<ResolvedHeader> {
    match payload {
        RelayPayload::Genesis(genesis) => vec![ResolvedHeader::new(*genesis)],
        RelayPayload::Submission(submission) => submission
            .from
            .compute_chain(&submission.headers)
            .into_iter()
            .map(ResolvedHeader::new)
            .collect(),
    }
}

/// Replay each payload until `target` is reached.
pub fn replay_to_target(payloads: &[RelayPayload], target: CommitTarget) -> Option<ResolvedHeader> {
    payloads
        .iter()
        .flat_map(|payload| replay_payload(payload).into_iter())
        .find(|resolved| target.matches(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::calldata::HeaderSubmission;
    use crate::domain::ForkId;
    use btc_relay_types::{BtcHeader, StoredHeader, U256};

    fn header(nonce: u32) -> BtcHeader {
        BtcHeader {
            version: 1,
            prev_block_hash: BlockHash::ZERO,
            merkle_root: H256::repeat_byte(nonce as u8),
            timestamp: 1_700_000_000 + nonce,
            nbits: 0x207f_ffff,
            nonce,
        }
    }

    fn submission() -> (StoredHeader, RelayPayload) {
        let from = StoredHeader::new(header(0), U256::from(50u64), 200, 0, [1; 10]);
        let payload = RelayPayload::Submission(HeaderSubmission {
            fork_id: ForkId::Main,
            from,
            headers: vec![header(1), header(2), header(3)],
        });
        (from, payload)
    }

    #[test]
    fn test_replay_finds_nth_header() {
        let (from, payload) = submission();
        let chain = from.compute_chain(&[header(1), header(2), header(3)]);
        let target = chain[2].commit_hash();

        let found = replay_to_target(&[payload], CommitTarget::Commit(target)).unwrap();
        assert_eq!(found.header, chain[2]);
        assert_eq!(found.header.block_height, 202);
        assert_eq!(found.commit_hash, target);
    }

    #[test]
    fn test_replay_by_block_hash() {
        let (from, payload) = submission();
        let chain = from.compute_chain(&[header(1), header(2), header(3)]);
        let found = replay_to_target(&[payload], CommitTarget::Block(chain[3].block_hash)).unwrap();
        assert_eq!(found.header, chain[3]);
    }

    #[test]
    fn test_replay_matches_leading_header() {
        let (from, payload) = submission();
        let found = replay_to_target(&[payload], CommitTarget::Commit(from.commit_hash()));
        assert_eq!(found.map(|r| r.header), Some(from));
    }

    #[test]
    fn test_replay_missing_target() {
        let (_, payload) = submission();
        assert!(replay_to_target(&[payload], CommitTarget::Commit(H256::repeat_byte(1))).is_none());
    }

    #[test]
    fn test_genesis_payload() {
        let genesis = StoredHeader::new(header(9), U256::one(), 0, 0, [0; 10]);
        let payload = RelayPayload::Genesis(genesis);
        assert_eq!(replay_payload(&payload).len(), 1);
        assert!(replay_to_target(&[payload], CommitTarget::Block(genesis.block_hash)).is_some());
    }
}
