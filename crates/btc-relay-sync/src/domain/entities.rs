//! # Domain Entities
//!
//! Confirmed versus predicted relay state.
//!
//! A [`ResolvedHeader`] was recovered from on-chain events and is
//! authoritative as long as the relay still maps its height to its commit
//! hash. A [`PredictedSubmission`] is local arithmetic over headers that have
//! not been mined yet. The two are kept as distinct types so one cannot be
//! passed where the other is expected.

use super::value_objects::{BtcBlockInfo, ForkId, RelayTx};
use btc_relay_types::{BlockHash, StoredHeader, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Stored header recovered from relay events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHeader {
    /// Recovered chain-state node.
    pub header: StoredHeader,
    /// Its commit hash, as emitted by the relay.
    pub commit_hash: H256,
}

impl ResolvedHeader {
    /// Wrap a stored header, deriving its commit hash.
    pub fn new(header: StoredHeader) -> Self {
        Self {
            commit_hash: header.commit_hash(),
            header,
        }
    }

    /// Block hash of the wrapped header.
    pub fn block_hash(&self) -> BlockHash {
        self.header.block_hash
    }
}

/// Current relay tip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipData {
    /// Tip height.
    pub block_height: u32,
    /// Tip commit hash.
    pub commit_hash: H256,
    /// Tip block hash.
    pub block_hash: BlockHash,
    /// Cumulative work at the tip.
    pub chain_work: U256,
}

impl From<&ResolvedHeader> for TipData {
    fn from(resolved: &ResolvedHeader) -> Self {
        Self {
            block_height: resolved.header.block_height,
            commit_hash: resolved.commit_hash,
            block_hash: resolved.header.block_hash,
            chain_work: resolved.header.chain_work,
        }
    }
}

/// Result of `retrieve_log_and_blockheight`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayLogAndHeight {
    /// Header, re-validated against the relay's height mapping.
    pub header: ResolvedHeader,
    /// Relay height at the time of the lookup.
    pub relay_height: u32,
}

/// Newest relay header that is also on the Bitcoin best chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatestKnownBlock {
    /// Header as committed in the relay.
    pub stored_header: ResolvedHeader,
    /// Same block as seen by the Bitcoin node.
    pub bitcoin_header: BtcBlockInfo,
}

/// Locally predicted outcome of a header submission. Not chain-authoritative
/// until the transaction is mined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredictedSubmission {
    /// Designation after the fork-promotion rule; advisory only.
    pub fork_id: ForkId,
    /// Designation the calldata targets.
    pub submitted_as: ForkId,
    /// Last header of the batch after the transition.
    pub last_stored_header: StoredHeader,
    /// Starting header followed by one entry per submitted header.
    pub computed_committed_headers: Vec<StoredHeader>,
    /// Fork headers submitted so far including this batch (0 on main).
    pub total_fork_headers: usize,
    /// Unsigned transaction to send.
    pub tx: RelayTx,
}

impl PredictedSubmission {
    /// Whether the submission was promoted to the main chain.
    pub fn promoted(&self) -> bool {
        self.submitted_as.is_fork() && self.fork_id == ForkId::Main
    }
}

/// Per-block outcome of header orchestration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderResolution {
    /// Already committed in the relay at sufficient height.
    Committed(ResolvedHeader),
    /// Will be committed once the synchronizer's transactions are mined.
    PendingSync(StoredHeader),
}

impl HeaderResolution {
    /// Stored header regardless of confirmation state.
    pub fn stored_header(&self) -> &StoredHeader {
        match self {
            HeaderResolution::Committed(resolved) => &resolved.header,
            HeaderResolution::PendingSync(header) => header,
        }
    }

    /// Whether the relay already holds this header.
    pub fn is_committed(&self) -> bool {
        matches!(self, HeaderResolution::Committed(_))
    }
}

/// Result of a synchronizer run.
#[derive(Clone, Debug, Default)]
pub struct SyncOutcome {
    /// Transactions to send, in order.
    pub txs: Vec<RelayTx>,
    /// Relay tip after all `txs` are mined.
    pub target_committed_header: Option<StoredHeader>,
    /// Predicted headers by height.
    pub computed_header_map: BTreeMap<u32, StoredHeader>,
    /// Predicted headers by block hash.
    pub block_header_map: HashMap<BlockHash, StoredHeader>,
    /// Commit hash of `target_committed_header`.
    pub tip_commit_hash: H256,
    /// Block hash of `target_committed_header`.
    pub tip_block_hash: BlockHash,
}

impl SyncOutcome {
    /// Record predicted headers from a submission (skipping the anchor).
    pub fn record(&mut self, submission: &PredictedSubmission) {
        for header in submission.computed_committed_headers.iter().skip(1) {
            self.computed_header_map.insert(header.block_height, *header);
            self.block_header_map.insert(header.block_hash, *header);
        }
    }

    /// Set the final tip.
    pub fn finish(&mut self, tip: StoredHeader) {
        self.tip_commit_hash = tip.commit_hash();
        self.tip_block_hash = tip.block_hash;
        self.target_committed_header = Some(tip);
    }
}
