//! # Claim Types
//!
//! Facts about Bitcoin that a consumer contract can be asked to accept, and
//! the data needed to prove them.

use super::errors::RelayError;
use btc_relay_types::{BlockHash, BtcTransaction, Txid, H256};
use serde::{Deserialize, Serialize};

/// Lock times below this are block heights, not timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Claim kinds supported by the verifier registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimKind {
    /// A transaction with a given txid was confirmed.
    TxId,
    /// An output paying an amount to a script was confirmed.
    Output,
    /// Like `Output`, also bound to a nonce carried by the funding tx.
    NoncedOutput,
    /// The preimage of a payment hash is known.
    Htlc,
}

impl ClaimKind {
    /// Whether proving this kind needs a relay header and merkle proof.
    pub fn needs_bitcoin_proof(&self) -> bool {
        !matches!(self, ClaimKind::Htlc)
    }

    /// Whether the witness carries the raw transaction.
    pub fn carries_transaction(&self) -> bool {
        matches!(self, ClaimKind::Output | ClaimKind::NoncedOutput)
    }
}

/// Data a claim commitment is computed from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimData {
    /// Transaction id claim.
    TxId {
        /// Expected txid, raw order
        txid: Txid,
        /// Required confirmations
        confirmations: u32,
    },
    /// Output claim.
    Output {
        /// Amount in satoshis
        amount: u64,
        /// Locking script
        script: Vec<u8>,
        /// Required confirmations
        confirmations: u32,
    },
    /// Nonced output claim.
    NoncedOutput {
        /// Nonce derived from the funding transaction
        nonce: u64,
        /// Amount in satoshis
        amount: u64,
        /// Locking script
        script: Vec<u8>,
        /// Required confirmations
        confirmations: u32,
    },
    /// Hash-lock claim.
    Htlc {
        /// `sha256(secret)`
        payment_hash: H256,
    },
}

impl ClaimData {
    /// Kind of this data.
    pub fn kind(&self) -> ClaimKind {
        match self {
            ClaimData::TxId { .. } => ClaimKind::TxId,
            ClaimData::Output { .. } => ClaimKind::Output,
            ClaimData::NoncedOutput { .. } => ClaimKind::NoncedOutput,
            ClaimData::Htlc { .. } => ClaimKind::Htlc,
        }
    }

    /// Required confirmations; `None` for hash-lock claims.
    pub fn confirmations(&self) -> Option<u32> {
        match self {
            ClaimData::TxId { confirmations, .. }
            | ClaimData::Output { confirmations, .. }
            | ClaimData::NoncedOutput { confirmations, .. } => Some(*confirmations),
            ClaimData::Htlc { .. } => None,
        }
    }
}

/// A claim as stored by the consumer contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Kind of fact claimed.
    pub kind: ClaimKind,
    /// Commitment the witness must reproduce.
    pub commitment: H256,
}

/// Where a transaction was mined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInclusion {
    /// Block containing the transaction.
    pub block_hash: BlockHash,
    /// Height of that block.
    pub block_height: u32,
}

/// Data supplied by the claimer to build a witness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessData {
    /// Prove a txid.
    TxId {
        /// Transaction id, raw order
        txid: Txid,
        /// Block it was mined in
        inclusion: TxInclusion,
        /// Confirmations the claim requires
        confirmations: u32,
    },
    /// Prove an output.
    Output {
        /// Raw transaction (segwit encoding accepted)
        raw_tx: Vec<u8>,
        /// Output index
        vout: u32,
        /// Block it was mined in
        inclusion: TxInclusion,
        /// Confirmations the claim requires
        confirmations: u32,
    },
    /// Prove a nonced output.
    NoncedOutput {
        /// Raw transaction (segwit encoding accepted)
        raw_tx: Vec<u8>,
        /// Output index
        vout: u32,
        /// Block it was mined in
        inclusion: TxInclusion,
        /// Confirmations the claim requires
        confirmations: u32,
    },
    /// Reveal a hash-lock secret.
    Htlc {
        /// 32-byte preimage
        secret: [u8; 32],
    },
}

impl WitnessData {
    /// Kind of this witness data.
    pub fn kind(&self) -> ClaimKind {
        match self {
            WitnessData::TxId { .. } => ClaimKind::TxId,
            WitnessData::Output { .. } => ClaimKind::Output,
            WitnessData::NoncedOutput { .. } => ClaimKind::NoncedOutput,
            WitnessData::Htlc { .. } => ClaimKind::Htlc,
        }
    }

    /// Inclusion point for Bitcoin-proof kinds.
    pub fn inclusion(&self) -> Option<(TxInclusion, u32)> {
        match self {
            WitnessData::TxId {
                inclusion,
                confirmations,
                ..
            }
            | WitnessData::Output {
                inclusion,
                confirmations,
                ..
            }
            | WitnessData::NoncedOutput {
                inclusion,
                confirmations,
                ..
            } => Some((*inclusion, *confirmations)),
            WitnessData::Htlc { .. } => None,
        }
    }
}

/// Nonce bound into nonced-output claims.
///
/// `((lock_time - 500_000_000) << 24) | (input0.sequence & 0x00FF_FFFF)`
///
/// # Errors
/// - `InvalidClaim` if the lock time is a block height or the tx has no inputs
pub fn extract_nonce(tx: &BtcTransaction) -> Result<u64, RelayError> {
    if tx.lock_time < LOCKTIME_THRESHOLD {
        return Err(RelayError::InvalidClaim(format!(
            "lock time {} is below {LOCKTIME_THRESHOLD}",
            tx.lock_time
        )));
    }
    let first = tx
        .inputs
        .first()
        .ok_or_else(|| RelayError::InvalidClaim("transaction has no inputs".into()))?;

    let high = u64::from(tx.lock_time - LOCKTIME_THRESHOLD) << 24;
    Ok(high | u64::from(first.sequence & 0x00FF_FFFF))
}
