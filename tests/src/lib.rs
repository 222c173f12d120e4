//! # Bitcoin Relay Test Suite
//!
//! End-to-end flows over the simulated relay contract and Bitcoin node.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── sync_flows.rs     # Main-chain sync, restarts, orchestration
//!     ├── reorg_flows.rs    # Short/long forks, stale caches, cancellation
//!     └── witness_flows.rs  # Claim witnesses checked against the relay
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # By category
//! cargo test -p relay-tests integration::reorg_flows
//!
//! # Benchmarks
//! cargo bench -p relay-tests
//! ```

pub mod integration;
