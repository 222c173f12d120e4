//! # Application Layer
//!
//! Services composed from the domain, the algorithms and the ports.

pub mod commitment_index;
pub mod orchestrator;
pub mod relay_engine;
pub mod retry;
pub mod synchronizer;
pub mod verifier;

pub use commitment_index::{CommitmentIndex, LogWindowScanner};
pub use orchestrator::HeaderSyncOrchestrator;
pub use relay_engine::RelaySyncEngine;
pub use retry::with_retry;
pub use synchronizer::RelaySynchronizer;
pub use verifier::{
    bitcoin_suffix, BitcoinCommitmentVerifier, ClaimHandler, HtlcHandler, NoncedOutputHandler,
    OutputHandler, TxIdHandler,
};
