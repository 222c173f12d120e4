//! # Value Objects
//!
//! Immutable values exchanged with the relay contract, the EVM node and the
//! Bitcoin node.

use btc_relay_types::{BlockHash, BtcHeader, H160, H256};
use serde::{Deserialize, Serialize};

/// Largest long-fork id (48 bits).
pub const MAX_FORK_ID: u64 = 0xFFFF_FFFF_FFFF;

/// Fork designation attached to a header submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForkId {
    /// Canonical chain (raw 0).
    Main,
    /// Fork expected to overtake within one transaction (raw -1).
    ShortFork,
    /// Fork tracked on-chain under a random 48-bit id (raw > 0).
    LongFork(u64),
}

impl ForkId {
    /// Signed raw value used by the relay ABI conventions.
    pub fn raw(&self) -> i64 {
        match self {
            ForkId::Main => 0,
            ForkId::ShortFork => -1,
            ForkId::LongFork(id) => *id as i64,
        }
    }

    /// Inverse of [`raw`](Self::raw). Returns `None` for other negatives.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(ForkId::Main),
            -1 => Some(ForkId::ShortFork),
            id if id > 0 => Some(ForkId::LongFork(id as u64)),
            _ => None,
        }
    }

    /// True for short and long forks.
    pub fn is_fork(&self) -> bool {
        !matches!(self, ForkId::Main)
    }
}

/// Which relay write a transaction performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayTxKind {
    /// `submitMainBlockheaders(bytes)`
    SubmitMain,
    /// `submitShortForkBlockheaders(bytes)`
    SubmitShortFork,
    /// `submitForkBlockheaders(uint256,bytes)`
    SubmitLongFork {
        /// Fork id the calldata targets
        fork_id: u64,
    },
}

/// Unsigned relay transaction. Signing, fees and nonces are handled by the
/// caller's transaction manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTx {
    /// Sender (the signer's address).
    pub from: H160,
    /// Relay contract.
    pub to: H160,
    /// ABI-encoded calldata.
    pub data: Vec<u8>,
    /// Decoded intent, for bookkeeping.
    pub kind: RelayTxKind,
    /// Number of headers in the batch.
    pub header_count: usize,
}

/// Merkle inclusion proof for a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf index; bit `i` set means the node at level `i` is a right child.
    pub position: u32,
    /// Sibling hashes from leaf to root, raw byte order.
    pub siblings: Vec<H256>,
}

impl MerkleProof {
    /// Relay encoding: `position(4B BE) ‖ count(32B BE) ‖ siblings`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(36 + 32 * self.siblings.len());
        out.extend_from_slice(&self.position.to_be_bytes());
        let mut count = [0u8; 32];
        count[24..].copy_from_slice(&(self.siblings.len() as u64).to_be_bytes());
        out.extend_from_slice(&count);
        for sibling in &self.siblings {
            out.extend_from_slice(sibling.as_bytes());
        }
        out
    }
}

/// Header as reported by a Bitcoin node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcBlockInfo {
    /// Raw header.
    pub header: BtcHeader,
    /// Block height.
    pub height: u32,
    /// Successor on the node's best chain, if any.
    pub next_block_hash: Option<BlockHash>,
    /// Confirmations on the node's best chain (0 when stale).
    pub confirmations: u32,
}

/// A block the caller needs proven at some depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderRequest {
    /// Block containing the transaction.
    pub block_hash: BlockHash,
    /// Height of that block.
    pub block_height: u32,
    /// Confirmations the consumer contract requires.
    pub required_confirmations: u32,
}

impl HeaderRequest {
    /// Relay height at which the block has `required_confirmations`.
    pub fn required_relay_height(&self) -> u32 {
        (self.block_height + self.required_confirmations.max(1)) - 1
    }
}

/// `eth_getLogs` filter restricted to what the relay scans need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Emitting contract.
    pub address: H160,
    /// First block, inclusive.
    pub from_block: u64,
    /// Last block, inclusive.
    pub to_block: u64,
    /// Accepted topic0 values (any of).
    pub topic0: Vec<H256>,
    /// Required topic1, if any.
    pub topic1: Option<H256>,
    /// Required topic2, if any.
    pub topic2: Option<H256>,
}

impl LogFilter {
    /// Whether a log passes this filter.
    pub fn matches(&self, log: &EvmLog) -> bool {
        let topic = |i: usize| log.topics.get(i).copied();
        log.address == self.address
            && log.block_number >= self.from_block
            && log.block_number <= self.to_block
            && topic(0).is_some_and(|t| self.topic0.contains(&t))
            && self.topic1.is_none_or(|t| topic(1) == Some(t))
            && self.topic2.is_none_or(|t| topic(2) == Some(t))
    }
}

/// An EVM log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmLog {
    /// Emitting contract.
    pub address: H160,
    /// Indexed topics.
    pub topics: Vec<H256>,
    /// Non-indexed data.
    pub data: Vec<u8>,
    /// Block containing the transaction.
    pub block_number: u64,
    /// Emitting transaction.
    pub tx_hash: H256,
    /// Position within the block.
    pub log_index: u64,
}

/// Call frame type in a transaction trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Regular call.
    Call,
    /// Static call.
    StaticCall,
    /// Delegate call.
    DelegateCall,
    /// Contract creation; `to` is the created address, `input` the initcode.
    Create,
}

/// One frame of a `callTracer` style trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    /// Frame type.
    pub kind: CallKind,
    /// Caller.
    pub from: H160,
    /// Callee, or created contract.
    pub to: Option<H160>,
    /// Calldata or initcode.
    pub input: Vec<u8>,
    /// Whether this frame reverted.
    pub reverted: bool,
    /// Nested calls, in execution order.
    pub calls: Vec<CallFrame>,
}

impl CallFrame {
    /// Successful call with no children.
    pub fn call(from: H160, to: H160, input: Vec<u8>) -> Self {
        Self {
            kind: CallKind::Call,
            from,
            to: Some(to),
            input,
            reverted: false,
            calls: Vec::new(),
        }
    }
}
