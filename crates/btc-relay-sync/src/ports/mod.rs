//! # Ports Module
//!
//! Hexagonal boundaries: inbound API traits and outbound dependency traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{ClaimVerifierApi, HeaderSynchronizer};
pub use outbound::{BitcoinRpc, EvmChainRpc, RelayContract};
