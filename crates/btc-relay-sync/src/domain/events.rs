//! # Relay Events
//!
//! Decoding of the three events the relay contract emits.
//!
//! | Event             | topics[1]  | topics[2] | topics[3] | data                    |
//! |-------------------|------------|-----------|-----------|-------------------------|
//! | `StoreHeader`     | commitHash | blockHash |           |                         |
//! | `StoreForkHeader` | commitHash | blockHash | forkId    |                         |
//! | `ChainReorg`      | commitHash | blockHash | forkId    | submitter ‖ startHeight |

use super::errors::RelayError;
use super::value_objects::EvmLog;
use btc_relay_types::{keccak256, BlockHash, H160, H256, U256};

/// Canonical signature of `StoreHeader`.
pub const STORE_HEADER_SIGNATURE: &str = "StoreHeader(bytes32,bytes32)";
/// Canonical signature of `StoreForkHeader`.
pub const STORE_FORK_HEADER_SIGNATURE: &str = "StoreForkHeader(bytes32,bytes32,uint256)";
/// Canonical signature of `ChainReorg`.
pub const CHAIN_REORG_SIGNATURE: &str = "ChainReorg(bytes32,bytes32,uint256,address,uint256)";

/// topic0 of `StoreHeader`.
pub fn store_header_topic() -> H256 {
    keccak256(STORE_HEADER_SIGNATURE.as_bytes())
}

/// topic0 of `StoreForkHeader`.
pub fn store_fork_header_topic() -> H256 {
    keccak256(STORE_FORK_HEADER_SIGNATURE.as_bytes())
}

/// topic0 of `ChainReorg`.
pub fn chain_reorg_topic() -> H256 {
    keccak256(CHAIN_REORG_SIGNATURE.as_bytes())
}

/// Topics that mark a header being written to the relay.
pub fn header_topics() -> Vec<H256> {
    vec![store_header_topic(), store_fork_header_topic()]
}

/// Decoded relay event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    /// Header appended to the main chain.
    StoreHeader {
        /// Commit hash of the stored header
        commit_hash: H256,
        /// Bitcoin block hash, raw order
        block_hash: BlockHash,
    },
    /// Header appended to a fork.
    StoreForkHeader {
        /// Commit hash of the stored header
        commit_hash: H256,
        /// Bitcoin block hash, raw order
        block_hash: BlockHash,
        /// Fork id (0 for short forks)
        fork_id: u64,
    },
    /// A fork overtook the main chain.
    ChainReorg {
        /// Commit hash of the new tip
        commit_hash: H256,
        /// Block hash of the new tip
        block_hash: BlockHash,
        /// Fork that became main
        fork_id: u64,
        /// Account that submitted the overtaking batch
        submitter: H160,
        /// First height replaced
        start_height: u32,
    },
}

impl RelayEvent {
    /// Decode a log emitted by the relay.
    ///
    /// # Errors
    /// - `Rpc` if the topic0 is unknown or topics/data are short
    pub fn decode(log: &EvmLog) -> Result<Self, RelayError> {
        let topic = |i: usize| {
            log.topics
                .get(i)
                .copied()
                .ok_or_else(|| RelayError::Rpc(format!("relay log missing topic {i}")))
        };
        let topic0 = topic(0)?;

        if topic0 == store_header_topic() {
            Ok(RelayEvent::StoreHeader {
                commit_hash: topic(1)?,
                block_hash: BlockHash(topic(2)?),
            })
        } else if topic0 == store_fork_header_topic() {
            Ok(RelayEvent::StoreForkHeader {
                commit_hash: topic(1)?,
                block_hash: BlockHash(topic(2)?),
                fork_id: word_to_u64(&topic(3)?),
            })
        } else if topic0 == chain_reorg_topic() {
            if log.data.len() < 64 {
                return Err(RelayError::Rpc("ChainReorg data too short".into()));
            }
            Ok(RelayEvent::ChainReorg {
                commit_hash: topic(1)?,
                block_hash: BlockHash(topic(2)?),
                fork_id: word_to_u64(&topic(3)?),
                submitter: H160::from_slice(&log.data[12..32]),
                start_height: U256::from_big_endian(&log.data[32..64]).low_u32(),
            })
        } else {
            Err(RelayError::Rpc(format!("unknown relay event topic {topic0:?}")))
        }
    }

    /// Topics and data for this event, as the contract emits them.
    pub fn encode(&self) -> (Vec<H256>, Vec<u8>) {
        match *self {
            RelayEvent::StoreHeader {
                commit_hash,
                block_hash,
            } => (
                vec![store_header_topic(), commit_hash, block_hash.0],
                Vec::new(),
            ),
            RelayEvent::StoreForkHeader {
                commit_hash,
                block_hash,
                fork_id,
            } => (
                vec![
                    store_fork_header_topic(),
                    commit_hash,
                    block_hash.0,
                    u64_to_word(fork_id),
                ],
                Vec::new(),
            ),
            RelayEvent::ChainReorg {
                commit_hash,
                block_hash,
                fork_id,
                submitter,
                start_height,
            } => {
                let mut data = vec![0u8; 64];
                data[12..32].copy_from_slice(submitter.as_bytes());
                data[60..64].copy_from_slice(&start_height.to_be_bytes());
                (
                    vec![
                        chain_reorg_topic(),
                        commit_hash,
                        block_hash.0,
                        u64_to_word(fork_id),
                    ],
                    data,
                )
            }
        }
    }

    /// Commit hash carried by the event.
    pub fn commit_hash(&self) -> H256 {
        match self {
            RelayEvent::StoreHeader { commit_hash, .. }
            | RelayEvent::StoreForkHeader { commit_hash, .. }
            | RelayEvent::ChainReorg { commit_hash, .. } => *commit_hash,
        }
    }

    /// Block hash carried by the event.
    pub fn block_hash(&self) -> BlockHash {
        match self {
            RelayEvent::StoreHeader { block_hash, .. }
            | RelayEvent::StoreForkHeader { block_hash, .. }
            | RelayEvent::ChainReorg { block_hash, .. } => *block_hash,
        }
    }
}

fn word_to_u64(word: &H256) -> u64 {
    U256::from_big_endian(word.as_bytes()).low_u64()
}

fn u64_to_word(value: u64) -> H256 {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    H256(word)
}
