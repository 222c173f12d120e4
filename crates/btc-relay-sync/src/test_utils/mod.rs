//! Test utilities for the relay client.
//!
//! In-memory stand-ins for the three external systems plus a harness that
//! wires every service over them. Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```ignore
//! use btc_relay_sync::test_utils::{RelayHarness, GENESIS_HEIGHT};
//! use btc_relay_sync::RelaySyncConfig;
//!
//! let harness = RelayHarness::new(RelaySyncConfig::for_testing());
//! harness.bitcoin.mine(3);
//! assert_eq!(harness.bitcoin.tip_height(), GENESIS_HEIGHT + 3);
//! ```

mod bitcoin_node;
mod harness;
mod relay;

pub use bitcoin_node::{MockBitcoinNode, REGTEST_BITS};
pub use harness::{payment_tx, RelayHarness, DEPLOYER, GENESIS_HEIGHT, RELAY_ADDRESS, SUBMITTER};
pub use relay::SimulatedRelay;
