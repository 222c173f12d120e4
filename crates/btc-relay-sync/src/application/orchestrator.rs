//! # Header Sync Orchestrator
//!
//! Resolves a set of `(block_hash, height, confirmations)` requests to stored
//! headers, first from what the relay already holds and then, for whatever
//! is left, from the synchronizer's predicted headers.
//!
//! The synchronizer always catches the relay up to the Bitcoin tip, not only
//! to the highest height requested.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::commitment_index::CommitmentIndex;
use super::retry::with_retry;
use crate::config::RetryPolicy;
use crate::domain::{HeaderRequest, HeaderResolution, RelayError, RelayTx};
use crate::ports::HeaderSynchronizer;
use btc_relay_types::{BlockHash, H160};

/// Orchestrates lookups and catch-up synchronization.
pub struct HeaderSyncOrchestrator {
    index: Arc<CommitmentIndex>,
    retry: RetryPolicy,
}

impl HeaderSyncOrchestrator {
    /// Create an orchestrator over `index`.
    pub fn new(index: Arc<CommitmentIndex>, retry: RetryPolicy) -> Self {
        Self { index, retry }
    }

    /// Underlying commitment index.
    pub fn index(&self) -> &Arc<CommitmentIndex> {
        &self.index
    }

    /// Resolve every request or fail as a whole.
    ///
    /// Requests already committed at sufficient height come back as
    /// [`HeaderResolution::Committed`]. The rest require `synchronizer`:
    /// its transactions are appended to `pending_txs` and the requests are
    /// answered from its predicted headers as
    /// [`HeaderResolution::PendingSync`].
    pub async fn resolve(
        &self,
        signer: H160,
        requests: &[HeaderRequest],
        pending_txs: &mut Vec<RelayTx>,
        synchronizer: Option<&dyn HeaderSynchronizer>,
    ) -> Result<HashMap<BlockHash, HeaderResolution>, RelayError> {
        let mut resolved = HashMap::with_capacity(requests.len());
        let mut leaves: Vec<HeaderRequest> = Vec::new();

        for request in requests {
            let index = &self.index;
            let block_hash = request.block_hash;
            let required = request.required_relay_height();
            let found = with_retry(&self.retry, "retrieve_log_and_blockheight", move || {
                index.retrieve_log_and_blockheight(block_hash, Some(required))
            })
            .await?;

            match found {
                Some(log) => {
                    debug!(
                        "[btc-relay] {} committed at relay height {}",
                        request.block_hash, log.relay_height
                    );
                    resolved.insert(request.block_hash, HeaderResolution::Committed(log.header));
                }
                None => leaves.push(*request),
            }
        }

        if leaves.is_empty() {
            return Ok(resolved);
        }

        let Some(synchronizer) = synchronizer else {
            let relay_height = self.index.relay_height().await?;
            let leaf = leaves[0];
            warn!(
                "[btc-relay] {} requests unresolved and no synchronizer supplied",
                leaves.len()
            );
            return Err(RelayError::Unsynchronized {
                block_hash: leaf.block_hash,
                relay_height,
                required_height: leaf.required_relay_height(),
            });
        };

        info!("[btc-relay] Synchronizing relay for {} unresolved requests", leaves.len());
        let outcome = synchronizer.sync_to_latest_txs(signer).await?;
        let target_height = outcome
            .target_committed_header
            .map(|header| header.block_height)
            .unwrap_or_default();

        for leaf in leaves {
            let required = leaf.required_relay_height();
            if target_height < required {
                return Err(RelayError::Unsynchronized {
                    block_hash: leaf.block_hash,
                    relay_height: target_height,
                    required_height: required,
                });
            }

            let predicted = outcome
                .computed_header_map
                .get(&leaf.block_height)
                .filter(|header| header.block_hash == leaf.block_hash);

            let resolution = match predicted {
                Some(header) => HeaderResolution::PendingSync(*header),
                // Committed below the sync start, but the relay was too short.
                None => match self
                    .index
                    .retrieve_log_and_blockheight(leaf.block_hash, None)
                    .await?
                {
                    Some(log) => HeaderResolution::Committed(log.header),
                    None => {
                        return Err(RelayError::NotFound(format!(
                            "block {} not found after synchronization",
                            leaf.block_hash
                        )))
                    }
                },
            };
            resolved.insert(leaf.block_hash, resolution);
        }

        pending_txs.extend(outcome.txs);
        Ok(resolved)
    }
}
