//! # Commitment Index
//!
//! Recovers full [`StoredHeader`](btc_relay_types::StoredHeader)s from a
//! relay that only stores their `keccak256` commit hashes.
//!
//! ## Recovery
//!
//! 1. Look up the commit hash or block hash in the LRU caches
//! 2. On a miss, scan `StoreHeader` / `StoreForkHeader` logs backward in
//!    bounded block windows (newest first)
//! 3. Fetch the call trace of each candidate transaction and find the relay
//!    submission (or the relay constructor) inside it
//! 4. Replay `compute_next` from the payload's leading stored header until
//!    the event's commit hash is reproduced
//!
//! Both caches are content-addressed and only ever gain entries that were
//! absent, so concurrent lookups racing on the same key are harmless. Reads
//! use `peek`, which makes eviction follow insertion order.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::algorithms::{find_relay_payloads, replay_to_target, CommitTarget};
use crate::config::RelaySyncConfig;
use crate::domain::{
    header_topics, EvmLog, LatestKnownBlock, LogFilter, RelayError, RelayEvent, RelayLogAndHeight,
    ResolvedHeader, TipData,
};
use crate::ports::{BitcoinRpc, EvmChainRpc, RelayContract};
use btc_relay_types::{BlockHash, H256};

/// Backward iterator over inclusive `[from, to]` block windows.
///
/// Holds no hidden state besides the next upper bound, so a scan can be
/// resumed from [`position`](Self::position) at any time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogWindowScanner {
    lowest: u64,
    window: u64,
    next_to: Option<u64>,
}

impl LogWindowScanner {
    /// Scan from `highest` down to `lowest`.
    pub fn new(lowest: u64, highest: u64, window: u64) -> Self {
        Self {
            lowest,
            window: window.max(1),
            next_to: (highest >= lowest).then_some(highest),
        }
    }

    /// Next upper bound to be scanned, `None` when done.
    pub fn position(&self) -> Option<u64> {
        self.next_to
    }

    /// Next window, newest first.
    pub fn next_window(&mut self) -> Option<(u64, u64)> {
        let to = self.next_to?;
        let from = to.saturating_sub(self.window - 1).max(self.lowest);
        self.next_to = if from > self.lowest { Some(from - 1) } else { None };
        Some((from, to))
    }
}

/// Cache-backed resolver of relay stored headers.
pub struct CommitmentIndex {
    relay: Arc<dyn RelayContract>,
    evm: Arc<dyn EvmChainRpc>,
    bitcoin: Arc<dyn BitcoinRpc>,
    config: RelaySyncConfig,
    by_commit: Mutex<LruCache<H256, ResolvedHeader>>,
    by_block: Mutex<LruCache<BlockHash, ResolvedHeader>>,
    cancelled: Arc<AtomicBool>,
}

impl CommitmentIndex {
    /// Create an index with empty caches.
    pub fn new(
        relay: Arc<dyn RelayContract>,
        evm: Arc<dyn EvmChainRpc>,
        bitcoin: Arc<dyn BitcoinRpc>,
        config: RelaySyncConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            relay,
            evm,
            bitcoin,
            config,
            by_commit: Mutex::new(LruCache::new(capacity)),
            by_block: Mutex::new(LruCache::new(capacity)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Flag that aborts in-flight scans when set.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Relay contract this index reads.
    pub fn relay(&self) -> &Arc<dyn RelayContract> {
        &self.relay
    }

    /// Configuration in use.
    pub fn config(&self) -> &RelaySyncConfig {
        &self.config
    }

    /// Entries in the (commit, block) caches.
    pub fn cache_len(&self) -> (usize, usize) {
        (self.by_commit.lock().len(), self.by_block.lock().len())
    }

    /// Current relay height.
    pub async fn relay_height(&self) -> Result<u32, RelayError> {
        self.relay.get_blockheight().await
    }

    /// Resolve a stored header by commit hash and/or block hash.
    ///
    /// When both keys are given the result must match both.
    pub async fn get_block(
        &self,
        commit_hash: Option<H256>,
        block_hash: Option<BlockHash>,
    ) -> Result<Option<ResolvedHeader>, RelayError> {
        let target = match (commit_hash, block_hash) {
            (Some(commit), _) => CommitTarget::Commit(commit),
            (None, Some(block)) => CommitTarget::Block(block),
            (None, None) => return Ok(None),
        };
        let consistent = |resolved: &ResolvedHeader| {
            block_hash.is_none_or(|b| resolved.header.block_hash == b)
        };

        if let Some(hit) = self.peek(target) {
            debug!("[btc-relay] Cache hit for {:?}", target);
            return Ok(consistent(&hit).then_some(hit));
        }

        let (topic1, topic2) = match target {
            CommitTarget::Commit(commit) => (Some(commit), None),
            CommitTarget::Block(block) => (None, Some(block.0)),
        };
        let latest = self.evm.get_block_number().await?;
        let mut scanner =
            LogWindowScanner::new(self.config.start_block, latest, self.config.log_block_window);

        while let Some((from, to)) = scanner.next_window() {
            self.check_cancelled()?;
            debug!("[btc-relay] Scanning relay logs {}..={} for {:?}", from, to, target);
            let logs = self.evm.get_logs(&self.filter(from, to, topic1, topic2)).await?;

            for log in logs.iter().rev() {
                self.check_cancelled()?;
                if let Some(resolved) = self.resolve_from_log(log).await? {
                    self.remember(&resolved);
                    return Ok(consistent(&resolved).then_some(resolved));
                }
            }
        }

        debug!("[btc-relay] No relay event found for {:?}", target);
        Ok(None)
    }

    /// Current relay tip, `None` if the relay is empty or the tip commit
    /// cannot be resolved.
    pub async fn get_tip_data(&self) -> Result<Option<TipData>, RelayError> {
        let commit = self.relay.get_tip_commit_hash().await?;
        if commit.is_zero() {
            return Ok(None);
        }
        Ok(self
            .get_block(Some(commit), None)
            .await?
            .map(|resolved| TipData::from(&resolved)))
    }

    /// Resolve `block_hash` and confirm the relay still holds it.
    ///
    /// Returns `None` when the relay is below `required_height`, the block is
    /// unknown, or the relay's height mapping no longer points at the
    /// resolved commit (the block was reorged out). The last check runs for
    /// cache hits too.
    pub async fn retrieve_log_and_blockheight(
        &self,
        block_hash: BlockHash,
        required_height: Option<u32>,
    ) -> Result<Option<RelayLogAndHeight>, RelayError> {
        let relay_height = self.relay.get_blockheight().await?;
        if let Some(required) = required_height {
            if relay_height < required {
                debug!(
                    "[btc-relay] Relay height {} below required {} for {}",
                    relay_height, required, block_hash
                );
                return Ok(None);
            }
        }

        let Some(resolved) = self.get_block(None, Some(block_hash)).await? else {
            return Ok(None);
        };

        let canonical = self.relay.get_commit_hash(resolved.header.block_height).await?;
        if canonical != resolved.commit_hash {
            warn!(
                "[btc-relay] Stale header for {} at height {}: relay holds {:?}",
                block_hash, resolved.header.block_height, canonical
            );
            return Ok(None);
        }

        Ok(Some(RelayLogAndHeight {
            header: resolved,
            relay_height,
        }))
    }

    /// Newest relay header that is on the Bitcoin best chain and is still
    /// the relay's canonical entry for its height.
    pub async fn retrieve_latest_known_block_log(
        &self,
    ) -> Result<Option<LatestKnownBlock>, RelayError> {
        let latest = self.evm.get_block_number().await?;
        let mut scanner =
            LogWindowScanner::new(self.config.start_block, latest, self.config.log_block_window);
        let mut checked: HashSet<BlockHash> = HashSet::new();

        while let Some((from, to)) = scanner.next_window() {
            self.check_cancelled()?;
            debug!("[btc-relay] Scanning relay logs {}..={} for latest known block", from, to);
            let logs = self.evm.get_logs(&self.filter(from, to, None, None)).await?;

            for log in logs.iter().rev() {
                self.check_cancelled()?;
                let event = RelayEvent::decode(log)?;
                let block_hash = event.block_hash();
                if !checked.insert(block_hash) {
                    continue;
                }
                if !self.bitcoin.is_in_main_chain(block_hash).await? {
                    continue;
                }
                let bitcoin_header = self.bitcoin.get_block_header(block_hash).await?;
                let canonical = self.relay.get_commit_hash(bitcoin_header.height).await?;
                if canonical != event.commit_hash() {
                    continue;
                }

                let resolved = match self.peek(CommitTarget::Commit(canonical)) {
                    Some(hit) => hit,
                    None => match self.resolve_from_log(log).await? {
                        Some(resolved) => {
                            self.remember(&resolved);
                            resolved
                        }
                        None => continue,
                    },
                };

                info!(
                    "[btc-relay] Latest known block {} at height {}",
                    block_hash, bitcoin_header.height
                );
                return Ok(Some(LatestKnownBlock {
                    stored_header: resolved,
                    bitcoin_header,
                }));
            }
        }

        Ok(None)
    }

    /// Rebuild the header an event refers to from its transaction trace.
    async fn resolve_from_log(&self, log: &EvmLog) -> Result<Option<ResolvedHeader>, RelayError> {
        let event = RelayEvent::decode(log)?;
        let trace = self.evm.trace_transaction(log.tx_hash).await?;
        let payloads =
            find_relay_payloads(&trace, self.relay.address(), self.config.max_trace_depth);

        match replay_to_target(&payloads, CommitTarget::Commit(event.commit_hash())) {
            Some(resolved) if resolved.header.block_hash == event.block_hash() => {
                Ok(Some(resolved))
            }
            Some(resolved) => {
                warn!(
                    "[btc-relay] Event block hash {} disagrees with replayed {} in tx {:?}",
                    event.block_hash(),
                    resolved.header.block_hash,
                    log.tx_hash
                );
                Ok(None)
            }
            None => {
                warn!(
                    "[btc-relay] Could not replay commit {:?} from tx {:?} ({} payloads)",
                    event.commit_hash(),
                    log.tx_hash,
                    payloads.len()
                );
                Ok(None)
            }
        }
    }

    fn filter(
        &self,
        from_block: u64,
        to_block: u64,
        topic1: Option<H256>,
        topic2: Option<H256>,
    ) -> LogFilter {
        LogFilter {
            address: self.relay.address(),
            from_block,
            to_block,
            topic0: header_topics(),
            topic1,
            topic2,
        }
    }

    fn peek(&self, target: CommitTarget) -> Option<ResolvedHeader> {
        match target {
            CommitTarget::Commit(commit) => self.by_commit.lock().peek(&commit).copied(),
            CommitTarget::Block(block) => self.by_block.lock().peek(&block).copied(),
        }
    }

    fn remember(&self, resolved: &ResolvedHeader) {
        {
            let mut by_commit = self.by_commit.lock();
            if !by_commit.contains(&resolved.commit_hash) {
                by_commit.put(resolved.commit_hash, *resolved);
            }
        }
        let mut by_block = self.by_block.lock();
        if !by_block.contains(&resolved.header.block_hash) {
            by_block.put(resolved.header.block_hash, *resolved);
        }
    }

    fn check_cancelled(&self) -> Result<(), RelayError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(RelayError::Cancelled);
        }
        Ok(())
    }
}
