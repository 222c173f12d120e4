//! # Domain Errors
//!
//! Error taxonomy for relay synchronization and proof construction.
//!
//! Only [`RelayError::RpcTransient`] and [`RelayError::NotFound`] are worth
//! retrying; everything else is a hard failure surfaced to the caller.

use btc_relay_types::{BlockHash, EncodingError, U256};
use thiserror::Error;

/// Relay client error types.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Header, commit hash, event or trace is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Wire data could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Recomputed commitment or proof does not match the expected value.
    #[error("Invalid commitment: {0}")]
    InvalidCommitment(String),

    /// Relay is behind the height a proof needs and no synchronizer was
    /// available to catch it up.
    #[error("Relay unsynchronized for block {block_hash}: height {relay_height} < required {required_height}")]
    Unsynchronized {
        /// Block that could not be proven
        block_hash: BlockHash,
        /// Current relay height
        relay_height: u32,
        /// Height the proof needs
        required_height: u32,
    },

    /// Network or provider fault that may succeed on retry.
    #[error("Transient RPC error: {0}")]
    RpcTransient(String),

    /// Non-retryable RPC failure (revert, bad response).
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Headers do not form a valid extension of the given stored header.
    #[error("Invalid header chain: {0}")]
    InvalidHeaderChain(String),

    /// Synchronization ended on a fork that never overtook the relay tip.
    #[error("Fork does not overtake relay tip: fork work {fork_work} <= tip work {tip_work}")]
    ForkNotOvertaking {
        /// Cumulative work of the fork tip
        fork_work: U256,
        /// Cumulative work of the relay tip
        tip_work: U256,
    },

    /// Scan aborted through the cancellation flag.
    #[error("Operation cancelled")]
    Cancelled,

    /// Claim kind, data or witness data is inconsistent.
    #[error("Invalid claim: {0}")]
    InvalidClaim(String),
}

impl RelayError {
    /// Whether a bounded retry may resolve this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::RpcTransient(_) | RelayError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(RelayError::RpcTransient("timeout".into()).is_retryable());
        assert!(RelayError::NotFound("event".into()).is_retryable());
        assert!(!RelayError::Rpc("reverted".into()).is_retryable());
        assert!(!RelayError::InvalidCommitment("mismatch".into()).is_retryable());
        assert!(!RelayError::Cancelled.is_retryable());
    }

    #[test]
    fn test_encoding_error_converts() {
        let err: RelayError = EncodingError::InvalidLength {
            context: "stored header",
            got: 3,
        }
        .into();
        assert!(matches!(err, RelayError::Encoding(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unsynchronized_message() {
        let err = RelayError::Unsynchronized {
            block_hash: BlockHash::ZERO,
            relay_height: 100,
            required_height: 105,
        };
        assert!(err.to_string().contains("100 < required 105"));
    }

    #[test]
    fn test_fork_not_overtaking_message() {
        let err = RelayError::ForkNotOvertaking {
            fork_work: U256::from(5u64),
            tip_work: U256::from(7u64),
        };
        assert!(err.to_string().contains("5 <= tip work 7"));
    }
}
