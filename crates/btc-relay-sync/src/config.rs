//! # Relay Sync Configuration
//!
//! Tunables for event scanning, batching and retries.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff for RPC reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Relay sync configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelaySyncConfig {
    /// Capacity of each of the two stored-header caches.
    pub cache_capacity: usize,

    /// Number of EVM blocks fetched per `eth_getLogs` window.
    pub log_block_window: u64,

    /// Lowest EVM block to scan (the relay deployment block).
    pub start_block: u64,

    /// Maximum call-trace depth inspected when looking for relay calls.
    pub max_trace_depth: usize,

    /// Headers per main-chain submission.
    pub max_headers_per_tx: usize,

    /// Headers per long-fork submission.
    pub max_fork_headers_per_tx: usize,

    /// Largest batch that may be sent as a short fork.
    pub max_short_fork_headers_per_tx: usize,

    /// Retry policy for header lookups.
    pub retry: RetryPolicy,
}

impl Default for RelaySyncConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            log_block_window: 500,
            start_block: 0,
            max_trace_depth: 16,
            max_headers_per_tx: 100,
            max_fork_headers_per_tx: 50,
            max_short_fork_headers_per_tx: 25,
            retry: RetryPolicy::default(),
        }
    }
}

impl RelaySyncConfig {
    /// Create a config for testing (small windows and batches, fast retries).
    pub fn for_testing() -> Self {
        Self {
            cache_capacity: 16,
            log_block_window: 3,
            start_block: 0,
            max_trace_depth: 8,
            max_headers_per_tx: 4,
            max_fork_headers_per_tx: 3,
            max_short_fork_headers_per_tx: 2,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
        }
    }
}
