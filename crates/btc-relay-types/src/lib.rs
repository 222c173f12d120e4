//! # Bitcoin Relay Types
//!
//! Value types shared by every part of the relay client.
//!
//! The relay contract on the EVM side only persists `keccak256` fingerprints of
//! [`StoredHeader`]s, so the client has to reproduce the exact byte layout and
//! state transition the contract applies. Everything in this crate is pure and
//! deterministic: no I/O, no clocks, no randomness.
//!
//! ## Module Structure
//!
//! ```text
//! btc-relay-types/
//! ├── hash.rs           # sha256d / keccak256, BlockHash + Txid (raw vs display order)
//! ├── header.rs         # BtcHeader (80-byte full / 48-byte compact encodings)
//! ├── stored_header.rs  # StoredHeader (160-byte relay chain-state node)
//! ├── work.rs           # Compact target expansion and per-block work
//! ├── tx.rs             # Minimal Bitcoin transaction codec (segwit aware)
//! ├── op_return.rs      # OP_RETURN commitment payloads
//! └── errors.rs         # EncodingError
//! ```
//!
//! ## Byte Order
//!
//! Block hashes and txids are kept in raw consensus order internally. The
//! byte-reversed "display" hex used by block explorers and bitcoind RPC is
//! only produced or consumed through [`BlockHash::to_display_hex`],
//! [`BlockHash::from_display_hex`] and their [`Txid`] counterparts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hash;
pub mod header;
pub mod op_return;
pub mod stored_header;
pub mod tx;
pub mod work;

pub use errors::EncodingError;
pub use hash::{keccak256, sha256, sha256d, BlockHash, Txid};
pub use header::{BtcHeader, COMPACT_HEADER_SIZE, HEADER_SIZE};
pub use op_return::OpReturnCommitment;
pub use stored_header::{
    StoredHeader, DIFFICULTY_ADJUSTMENT_INTERVAL, STORED_HEADER_SIZE, TIMESTAMP_WINDOW,
};
pub use tx::{BtcTransaction, TxInput, TxOutput};
pub use work::{block_work, compact_to_target};

pub use primitive_types::{H160, H256, U256};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
