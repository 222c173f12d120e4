//! # Hashing
//!
//! Digest helpers and the two Bitcoin hash newtypes.
//!
//! [`BlockHash`] and [`Txid`] always hold bytes in raw consensus order, which
//! is what the relay contract hashes and stores. Display order (reversed) is
//! only reachable through the explicit `*_display_hex` conversions.

use crate::errors::EncodingError;
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> H256 {
    H256::from_slice(&Sha256::digest(data))
}

/// Double SHA-256, as used for Bitcoin block hashes, txids and merkle nodes.
pub fn sha256d(data: &[u8]) -> H256 {
    let first = Sha256::digest(data);
    H256::from_slice(&Sha256::digest(first))
}

/// Keccak-256, as used by the EVM.
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

macro_rules! bitcoin_hash_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub H256);

        impl $name {
            /// All-zero hash.
            pub const ZERO: Self = Self(H256::zero());

            /// Wrap raw consensus-order bytes.
            pub const fn from_raw(bytes: [u8; 32]) -> Self {
                Self(H256(bytes))
            }

            /// Raw consensus-order bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_fixed_bytes()
            }

            /// Parse the byte-reversed hex form used by explorers and bitcoind RPC.
            pub fn from_display_hex(s: &str) -> Result<Self, EncodingError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(EncodingError::InvalidLength {
                        context: $label,
                        got: bytes.len(),
                    });
                }
                let mut raw = [0u8; 32];
                for (dst, src) in raw.iter_mut().zip(bytes.iter().rev()) {
                    *dst = *src;
                }
                Ok(Self::from_raw(raw))
            }

            /// Byte-reversed hex form used by explorers and bitcoind RPC.
            pub fn to_display_hex(&self) -> String {
                let mut reversed = *self.as_bytes();
                reversed.reverse();
                hex::encode(reversed)
            }

            /// Raw-order hex, as seen in EVM event topics and calldata.
            pub fn to_raw_hex(&self) -> String {
                hex::encode(self.as_bytes())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_display_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_display_hex())
            }
        }

        impl From<H256> for $name {
            fn from(hash: H256) -> Self {
                Self(hash)
            }
        }

        impl From<$name> for H256 {
            fn from(hash: $name) -> Self {
                hash.0
            }
        }
    };
}

bitcoin_hash_type!(
    /// Bitcoin block hash in raw consensus byte order.
    BlockHash,
    "block hash"
);

bitcoin_hash_type!(
    /// Bitcoin transaction id in raw consensus byte order.
    Txid,
    "txid"
);
