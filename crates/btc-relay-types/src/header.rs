//! # Bitcoin Block Header
//!
//! The 80-byte consensus header and the 48-byte compact form the relay
//! accepts in header batches (the previous block hash is implied by the
//! position in the batch).

use crate::errors::EncodingError;
use crate::hash::{sha256d, BlockHash};
use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// Size of a full consensus header.
pub const HEADER_SIZE: usize = 80;

/// Size of a compact header (no previous block hash).
pub const COMPACT_HEADER_SIZE: usize = 48;

/// Bitcoin block header.
///
/// Hashes are stored in raw consensus byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BtcHeader {
    /// Block version.
    pub version: u32,
    /// Hash of the parent block.
    pub prev_block_hash: BlockHash,
    /// Merkle root of the block's transactions.
    pub merkle_root: H256,
    /// Block timestamp (unix seconds).
    pub timestamp: u32,
    /// Compact difficulty target.
    pub nbits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
}

impl BtcHeader {
    /// Copy of this header linked to a different parent.
    #[must_use]
    pub fn with_prev_block_hash(mut self, prev_block_hash: BlockHash) -> Self {
        self.prev_block_hash = prev_block_hash;
        self
    }

    /// Full 80-byte little-endian consensus encoding.
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.nbits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Compact 48-byte encoding: version, merkle root, timestamp, nbits, nonce.
    pub fn serialize_compact(&self) -> [u8; COMPACT_HEADER_SIZE] {
        let mut out = [0u8; COMPACT_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.merkle_root.as_bytes());
        out[36..40].copy_from_slice(&self.timestamp.to_le_bytes());
        out[40..44].copy_from_slice(&self.nbits.to_le_bytes());
        out[44..48].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Decode either encoding.
    ///
    /// A compact header decodes with a zero parent hash; the caller fills it
    /// in from chain linkage (see `StoredHeader::compute_next`).
    ///
    /// # Errors
    /// - `InvalidLength` unless `bytes` is exactly 80 or 48 bytes long
    pub fn deserialize(bytes: &[u8]) -> Result<Self, EncodingError> {
        match bytes.len() {
            HEADER_SIZE => Ok(Self {
                version: read_u32_le(&bytes[0..4]),
                prev_block_hash: BlockHash(H256::from_slice(&bytes[4..36])),
                merkle_root: H256::from_slice(&bytes[36..68]),
                timestamp: read_u32_le(&bytes[68..72]),
                nbits: read_u32_le(&bytes[72..76]),
                nonce: read_u32_le(&bytes[76..80]),
            }),
            COMPACT_HEADER_SIZE => Ok(Self {
                version: read_u32_le(&bytes[0..4]),
                prev_block_hash: BlockHash::ZERO,
                merkle_root: H256::from_slice(&bytes[4..36]),
                timestamp: read_u32_le(&bytes[36..40]),
                nbits: read_u32_le(&bytes[40..44]),
                nonce: read_u32_le(&bytes[44..48]),
            }),
            got => Err(EncodingError::InvalidLength {
                context: "block header",
                got,
            }),
        }
    }

    /// Block hash (double SHA-256 of the full encoding), raw byte order.
    pub fn hash(&self) -> BlockHash {
        BlockHash(sha256d(&self.serialize()))
    }
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}
