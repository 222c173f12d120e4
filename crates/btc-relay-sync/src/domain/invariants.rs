//! # Domain Invariants
//!
//! Rules the relay contract enforces and the client must mirror.

use super::errors::RelayError;
use super::value_objects::{BtcBlockInfo, ForkId};
use btc_relay_types::{BtcHeader, StoredHeader, U256};

/// Invariant: a submission carries at least one header.
pub fn invariant_non_empty_batch(headers: &[BtcHeader]) -> Result<(), RelayError> {
    if headers.is_empty() {
        return Err(RelayError::InvalidHeaderChain(
            "header batch is empty".to_string(),
        ));
    }
    Ok(())
}

/// Invariant: a block reported by the Bitcoin node links to the stored
/// header it is about to be replayed on and sits exactly one height above it.
pub fn invariant_chain_link(parent: &StoredHeader, child: &BtcBlockInfo) -> Result<(), RelayError> {
    if child.header.prev_block_hash != parent.block_hash {
        return Err(RelayError::InvalidHeaderChain(format!(
            "block {} does not extend {}",
            child.header.hash(),
            parent.block_hash
        )));
    }
    if child.height != parent.block_height.wrapping_add(1) {
        return Err(RelayError::InvalidHeaderChain(format!(
            "height {} does not follow {}",
            child.height, parent.block_height
        )));
    }
    Ok(())
}

/// Invariant: fork choice. A fork becomes main only with strictly more work
/// than the current tip; the relay applies the same comparison.
pub fn invariant_fork_promotion(submitted_as: ForkId, fork_work: U256, tip_work: U256) -> ForkId {
    if submitted_as.is_fork() && fork_work > tip_work {
        ForkId::Main
    } else {
        submitted_as
    }
}
