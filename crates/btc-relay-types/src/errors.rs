//! # Encoding Errors
//!
//! Failures raised while decoding wire data. All of them are fatal: malformed
//! bytes never become valid by retrying.

use thiserror::Error;

/// Errors produced by the byte codecs in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Input has a length the codec does not accept.
    #[error("Invalid length for {context}: got {got} bytes")]
    InvalidLength {
        /// What was being decoded
        context: &'static str,
        /// Number of bytes received
        got: usize,
    },

    /// Input ended before the structure was complete.
    #[error("Unexpected end of data while reading {context}")]
    UnexpectedEof {
        /// Field being read when data ran out
        context: &'static str,
    },

    /// Input is structurally invalid.
    #[error("Malformed {context}: {reason}")]
    Malformed {
        /// What was being decoded
        context: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Hex string could not be decoded.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for EncodingError {
    fn from(err: hex::FromHexError) -> Self {
        EncodingError::InvalidHex(err.to_string())
    }
}
