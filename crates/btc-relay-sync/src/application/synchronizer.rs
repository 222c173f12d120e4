//! # Relay Synchronizer
//!
//! Computes the relay transactions needed to bring the relay to the Bitcoin
//! node's best tip.
//!
//! ## Algorithm
//!
//! 1. Read the relay tip and the newest relay header still on the Bitcoin
//!    best chain. If that header is below the relay tip, the relay is on a
//!    stale branch and the catch-up has to start as a fork.
//! 2. Walk forward through `next_block_hash`, buffering headers and keeping
//!    the predicted stored header of the buffer's end.
//! 3. Main mode flushes every `max_headers_per_tx` headers. Fork mode
//!    flushes every `max_fork_headers_per_tx` headers, or as soon as the
//!    predicted work overtakes the relay tip. A fork that overtakes in its
//!    first batch of at most `max_short_fork_headers_per_tx` headers goes out
//!    as a short fork; otherwise a long fork is opened and extended.
//! 4. Once a fork overtakes it is treated as main for the rest of the run.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use super::commitment_index::CommitmentIndex;
use super::relay_engine::RelaySyncEngine;
use crate::config::RelaySyncConfig;
use crate::domain::{invariant_chain_link, ForkId, PredictedSubmission, RelayError, SyncOutcome};
use crate::ports::{BitcoinRpc, HeaderSynchronizer};
use btc_relay_types::{BtcHeader, StoredHeader, H160, U256};

/// Fork bookkeeping for one run.
struct ForkProgress {
    id: Option<u64>,
    headers_sent: usize,
}

/// Drives [`RelaySyncEngine`] from Bitcoin node data.
pub struct RelaySynchronizer {
    index: Arc<CommitmentIndex>,
    engine: RelaySyncEngine,
    bitcoin: Arc<dyn BitcoinRpc>,
    config: RelaySyncConfig,
}

impl RelaySynchronizer {
    /// Create a synchronizer.
    pub fn new(
        index: Arc<CommitmentIndex>,
        engine: RelaySyncEngine,
        bitcoin: Arc<dyn BitcoinRpc>,
        config: RelaySyncConfig,
    ) -> Self {
        Self {
            index,
            engine,
            bitcoin,
            config,
        }
    }

    fn flush_fork(
        &self,
        signer: H160,
        buffer: &[BtcHeader],
        from: &StoredHeader,
        fork: &mut ForkProgress,
        tip_work: U256,
        overtakes: bool,
    ) -> Result<PredictedSubmission, RelayError> {
        let short = fork.id.is_none()
            && fork.headers_sent == 0
            && overtakes
            && buffer.len() <= self.config.max_short_fork_headers_per_tx;

        let submission = if short {
            self.engine.submit_short_fork(signer, buffer, from, tip_work)?
        } else {
            let submission = self.engine.submit_long_fork(
                signer,
                fork.id,
                buffer,
                from,
                fork.headers_sent,
                tip_work,
            )?;
            if let ForkId::LongFork(id) = submission.submitted_as {
                fork.id = Some(id);
            }
            submission
        };
        fork.headers_sent = submission.total_fork_headers;
        Ok(submission)
    }
}

#[async_trait]
impl HeaderSynchronizer for RelaySynchronizer {
    async fn sync_to_latest_txs(&self, signer: H160) -> Result<SyncOutcome, RelayError> {
        let tip = self
            .index
            .get_tip_data()
            .await?
            .ok_or_else(|| RelayError::NotFound("relay tip".to_string()))?;
        let latest = self
            .index
            .retrieve_latest_known_block_log()
            .await?
            .ok_or_else(|| RelayError::NotFound("relay header on bitcoin main chain".to_string()))?;

        let mut last_stored = latest.stored_header.header;
        let mut predicted = last_stored;
        let mut tip_work = tip.chain_work;
        let mut fork_mode = last_stored.block_height < tip.block_height;
        let mut fork = ForkProgress {
            id: None,
            headers_sent: 0,
        };

        if fork_mode {
            info!(
                "[btc-relay] Relay tip {} at height {} is stale; forking from height {}",
                tip.block_hash, tip.block_height, last_stored.block_height
            );
        }

        let mut outcome = SyncOutcome::default();
        let mut buffer: Vec<BtcHeader> = Vec::new();
        let mut next = latest.bitcoin_header.next_block_hash;

        while let Some(hash) = next {
            let info = self.bitcoin.get_block_header(hash).await?;
            invariant_chain_link(&predicted, &info)?;
            buffer.push(info.header);
            predicted = predicted.compute_next(&info.header);
            next = info.next_block_hash;

            let submission = if fork_mode {
                let overtakes = predicted.chain_work > tip_work;
                if !overtakes && buffer.len() < self.config.max_fork_headers_per_tx {
                    continue;
                }
                self.flush_fork(signer, &buffer, &last_stored, &mut fork, tip_work, overtakes)?
            } else {
                if buffer.len() < self.config.max_headers_per_tx {
                    continue;
                }
                self.engine.submit_main(signer, &buffer, &last_stored)?
            };

            if fork_mode && submission.fork_id == ForkId::Main {
                info!(
                    "[btc-relay] Fork overtakes relay tip at height {}",
                    submission.last_stored_header.block_height
                );
                fork_mode = false;
            }
            if !fork_mode {
                tip_work = submission.last_stored_header.chain_work;
            }
            last_stored = submission.last_stored_header;
            outcome.record(&submission);
            outcome.txs.push(submission.tx);
            buffer.clear();
        }

        if fork_mode {
            error!(
                "[btc-relay] Bitcoin tip reached without the fork overtaking the relay tip"
            );
            return Err(RelayError::ForkNotOvertaking {
                fork_work: predicted.chain_work,
                tip_work,
            });
        }

        if !buffer.is_empty() {
            let submission = self.engine.submit_main(signer, &buffer, &last_stored)?;
            last_stored = submission.last_stored_header;
            outcome.record(&submission);
            outcome.txs.push(submission.tx);
        }

        info!(
            "[btc-relay] Sync prepared {} transactions, relay tip -> height {}",
            outcome.txs.len(),
            last_stored.block_height
        );
        outcome.finish(last_stored);
        Ok(outcome)
    }
}
