//! # Stored Header
//!
//! The relay contract's chain-state node: a Bitcoin header plus the
//! cumulative validation state the contract tracks for it. The contract only
//! keeps `keccak256(serialize())` on-chain, so the byte layout here must match
//! it exactly:
//!
//! ```text
//! offset  size  field
//! 0       80    header (consensus encoding)
//! 80      32    chain_work (big-endian)
//! 112     4     block_height (big-endian)
//! 116     4     last_diff_adjustment (big-endian)
//! 120     40    prev_block_timestamps[0..10] (big-endian each)
//! ```

use crate::errors::EncodingError;
use crate::hash::{keccak256, BlockHash};
use crate::header::{BtcHeader, HEADER_SIZE};
use crate::work::block_work;
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};

/// Serialized size of a [`StoredHeader`].
pub const STORED_HEADER_SIZE: usize = 160;

/// Number of trailing timestamps kept for median-time-past checks.
pub const TIMESTAMP_WINDOW: usize = 10;

/// Blocks between difficulty retargets.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u32 = 2016;

const CHAIN_WORK_OFFSET: usize = HEADER_SIZE;
const HEIGHT_OFFSET: usize = CHAIN_WORK_OFFSET + 32;
const DIFF_ADJ_OFFSET: usize = HEIGHT_OFFSET + 4;
const TIMESTAMPS_OFFSET: usize = DIFF_ADJ_OFFSET + 4;

/// Header together with the relay's cumulative chain state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeader {
    /// The Bitcoin header.
    pub header: BtcHeader,
    /// Cached `header.hash()`.
    pub block_hash: BlockHash,
    /// Cumulative proof-of-work up to and including this block.
    pub chain_work: U256,
    /// Height of this block.
    pub block_height: u32,
    /// Timestamp of the block that started the current difficulty epoch.
    pub last_diff_adjustment: u32,
    /// Last ten block timestamps, oldest first; index 9 is this block's.
    pub prev_block_timestamps: [u32; TIMESTAMP_WINDOW],
}

impl StoredHeader {
    /// Build a stored header from its parts; the block hash is derived.
    pub fn new(
        header: BtcHeader,
        chain_work: U256,
        block_height: u32,
        last_diff_adjustment: u32,
        prev_block_timestamps: [u32; TIMESTAMP_WINDOW],
    ) -> Self {
        Self {
            block_hash: header.hash(),
            header,
            chain_work,
            block_height,
            last_diff_adjustment,
            prev_block_timestamps,
        }
    }

    /// Derive the child node for `next` without touching `self`.
    ///
    /// `next.prev_block_hash` is overwritten with this node's hash, so a
    /// header decoded from the 48-byte compact form can be passed directly.
    pub fn compute_next(&self, next: &BtcHeader) -> StoredHeader {
        let header = next.with_prev_block_hash(self.block_hash);
        let block_height = self.block_height.wrapping_add(1);

        let mut prev_block_timestamps = [0u32; TIMESTAMP_WINDOW];
        prev_block_timestamps[..TIMESTAMP_WINDOW - 1]
            .copy_from_slice(&self.prev_block_timestamps[1..]);
        prev_block_timestamps[TIMESTAMP_WINDOW - 1] = header.timestamp;

        let last_diff_adjustment = if block_height.is_multiple_of(DIFFICULTY_ADJUSTMENT_INTERVAL) {
            header.timestamp
        } else {
            self.last_diff_adjustment
        };

        StoredHeader {
            block_hash: header.hash(),
            header,
            chain_work: self.chain_work.overflowing_add(block_work(header.nbits)).0,
            block_height,
            last_diff_adjustment,
            prev_block_timestamps,
        }
    }

    /// Apply [`compute_next`](Self::compute_next) over a batch.
    ///
    /// The returned vector starts with `self`, so `n` headers yield `n + 1`
    /// entries.
    pub fn compute_chain(&self, headers: &[BtcHeader]) -> Vec<StoredHeader> {
        let mut out = Vec::with_capacity(headers.len() + 1);
        out.push(*self);
        let mut current = *self;
        for header in headers {
            current = current.compute_next(header);
            out.push(current);
        }
        out
    }

    /// Chain work as a 32-byte big-endian buffer.
    pub fn chain_work_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.chain_work.to_big_endian(&mut out);
        out
    }

    /// Canonical 160-byte encoding.
    pub fn serialize(&self) -> [u8; STORED_HEADER_SIZE] {
        let mut out = [0u8; STORED_HEADER_SIZE];
        out[..HEADER_SIZE].copy_from_slice(&self.header.serialize());
        out[CHAIN_WORK_OFFSET..HEIGHT_OFFSET].copy_from_slice(&self.chain_work_bytes());
        out[HEIGHT_OFFSET..DIFF_ADJ_OFFSET].copy_from_slice(&self.block_height.to_be_bytes());
        out[DIFF_ADJ_OFFSET..TIMESTAMPS_OFFSET]
            .copy_from_slice(&self.last_diff_adjustment.to_be_bytes());
        for (i, ts) in self.prev_block_timestamps.iter().enumerate() {
            let at = TIMESTAMPS_OFFSET + i * 4;
            out[at..at + 4].copy_from_slice(&ts.to_be_bytes());
        }
        out
    }

    /// Decode the canonical encoding.
    ///
    /// # Errors
    /// - `InvalidLength` unless `bytes` is exactly 160 bytes long
    pub fn deserialize(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() != STORED_HEADER_SIZE {
            return Err(EncodingError::InvalidLength {
                context: "stored header",
                got: bytes.len(),
            });
        }

        let header = BtcHeader::deserialize(&bytes[..HEADER_SIZE])?;
        let chain_work = U256::from_big_endian(&bytes[CHAIN_WORK_OFFSET..HEIGHT_OFFSET]);
        let block_height = read_u32_be(&bytes[HEIGHT_OFFSET..DIFF_ADJ_OFFSET]);
        let last_diff_adjustment = read_u32_be(&bytes[DIFF_ADJ_OFFSET..TIMESTAMPS_OFFSET]);

        let mut prev_block_timestamps = [0u32; TIMESTAMP_WINDOW];
        for (i, ts) in prev_block_timestamps.iter_mut().enumerate() {
            let at = TIMESTAMPS_OFFSET + i * 4;
            *ts = read_u32_be(&bytes[at..at + 4]);
        }

        Ok(Self::new(
            header,
            chain_work,
            block_height,
            last_diff_adjustment,
            prev_block_timestamps,
        ))
    }

    /// `keccak256(serialize())`, the value the relay stores per height.
    pub fn commit_hash(&self) -> H256 {
        keccak256(&self.serialize())
    }

    /// Fork choice: strictly more cumulative work wins.
    pub fn has_more_work_than(&self, other: &StoredHeader) -> bool {
        self.chain_work > other.chain_work
    }
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}
