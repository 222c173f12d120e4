//! # Bitcoin Relay Sync
//!
//! Client-side engine for an EVM contract that stores Bitcoin block headers.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! The relay contract only persists `keccak256` commit hashes of stored
//! headers. This crate:
//! - Builds header submissions for the main chain, short forks and long forks
//!   and predicts the stored headers each one commits
//! - Recovers full stored headers from relay events and call traces
//! - Brings the relay up to the Bitcoin tip on demand, handling reorgs
//! - Builds claim witnesses (txid, output, nonced output, hash-lock) that a
//!   consumer contract checks against the relay
//!
//! ## Module Structure
//!
//! ```text
//! btc-relay-sync/
//! ├── domain/          # Events, claims, fork ids, entities, errors, invariants
//! ├── algorithms/      # Calldata codec, trace walking, header replay, merkle proofs
//! ├── ports/           # API traits (inbound) + dependency traits (outbound)
//! ├── application/     # Engine, commitment index, synchronizer, orchestrator, verifier
//! └── config.rs        # RelaySyncConfig, RetryPolicy
//! ```
//!
//! Transactions are returned unsigned; signing and sending belong to the
//! caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use algorithms::{
    build_merkle_proof, compute_merkle_root, decode_submission, encode_submission,
    find_relay_payloads, verify_merkle_proof, HeaderSubmission, RelayPayload,
};
pub use application::{
    BitcoinCommitmentVerifier, CommitmentIndex, HeaderSyncOrchestrator, LogWindowScanner,
    RelaySyncEngine, RelaySynchronizer,
};
pub use config::{RelaySyncConfig, RetryPolicy};
pub use domain::{
    BtcBlockInfo, CallFrame, CallKind, Claim, ClaimData, ClaimKind, EvmLog, ForkId, HeaderRequest,
    HeaderResolution, LatestKnownBlock, LogFilter, MerkleProof, PredictedSubmission, RelayError,
    RelayEvent, RelayLogAndHeight, RelayTx, RelayTxKind, ResolvedHeader, SyncOutcome, TipData,
    TxInclusion, WitnessData, MAX_FORK_ID,
};
pub use ports::{BitcoinRpc, ClaimVerifierApi, EvmChainRpc, HeaderSynchronizer, RelayContract};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
