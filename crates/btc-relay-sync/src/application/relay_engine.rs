//! # Relay Sync Engine
//!
//! Builds header submissions and predicts their effect.
//!
//! Every submission returns a [`PredictedSubmission`]: the stored headers the
//! relay will commit once the transaction is mined, computed locally with the
//! same transition the contract runs. Callers chain further submissions off
//! `last_stored_header` without waiting for confirmation.

use rand::Rng;
use tracing::info;

use crate::algorithms::encode_submission;
use crate::domain::{
    invariant_fork_promotion, invariant_non_empty_batch, ForkId, PredictedSubmission, RelayError,
    RelayTx, RelayTxKind, MAX_FORK_ID,
};
use btc_relay_types::{BtcHeader, StoredHeader, H160, U256};

/// Submission builder for one relay contract.
#[derive(Clone, Debug)]
pub struct RelaySyncEngine {
    relay_address: H160,
}

impl RelaySyncEngine {
    /// Engine targeting the relay at `relay_address`.
    pub fn new(relay_address: H160) -> Self {
        Self { relay_address }
    }

    /// Relay contract address.
    pub fn relay_address(&self) -> H160 {
        self.relay_address
    }

    /// Extend the main chain from `from` (which must be the relay tip).
    pub fn submit_main(
        &self,
        signer: H160,
        headers: &[BtcHeader],
        from: &StoredHeader,
    ) -> Result<PredictedSubmission, RelayError> {
        self.submit(signer, ForkId::Main, headers, from, 0, None)
    }

    /// Submit a fork that must overtake `tip_work` within this transaction.
    pub fn submit_short_fork(
        &self,
        signer: H160,
        headers: &[BtcHeader],
        from: &StoredHeader,
        tip_work: U256,
    ) -> Result<PredictedSubmission, RelayError> {
        self.submit(signer, ForkId::ShortFork, headers, from, 0, Some(tip_work))
    }

    /// Create (`fork_id = None`) or extend a long fork.
    ///
    /// New fork ids are drawn at random from `1..=2^48-1` with no check
    /// against ids other submitters may be using concurrently.
    pub fn submit_long_fork(
        &self,
        signer: H160,
        fork_id: Option<u64>,
        headers: &[BtcHeader],
        from: &StoredHeader,
        total_fork_headers_so_far: usize,
        tip_work: U256,
    ) -> Result<PredictedSubmission, RelayError> {
        let id = fork_id.unwrap_or_else(new_fork_id);
        self.submit(
            signer,
            ForkId::LongFork(id),
            headers,
            from,
            total_fork_headers_so_far,
            Some(tip_work),
        )
    }

    fn submit(
        &self,
        signer: H160,
        submitted_as: ForkId,
        headers: &[BtcHeader],
        from: &StoredHeader,
        total_fork_headers_so_far: usize,
        tip_work: Option<U256>,
    ) -> Result<PredictedSubmission, RelayError> {
        invariant_non_empty_batch(headers)?;

        let computed_committed_headers = from.compute_chain(headers);
        let last_stored_header = computed_committed_headers[computed_committed_headers.len() - 1];

        let fork_id = match tip_work {
            Some(tip_work) => {
                invariant_fork_promotion(submitted_as, last_stored_header.chain_work, tip_work)
            }
            None => submitted_as,
        };

        let kind = match submitted_as {
            ForkId::Main => RelayTxKind::SubmitMain,
            ForkId::ShortFork => RelayTxKind::SubmitShortFork,
            ForkId::LongFork(id) => RelayTxKind::SubmitLongFork { fork_id: id },
        };
        let data = encode_submission(submitted_as, from, headers)?;

        let total_fork_headers = if submitted_as.is_fork() {
            total_fork_headers_so_far + headers.len()
        } else {
            0
        };

        info!(
            "[btc-relay] Prepared {:?} submission of {} headers: height {} -> {}{}",
            submitted_as,
            headers.len(),
            from.block_height,
            last_stored_header.block_height,
            if fork_id == ForkId::Main && submitted_as.is_fork() {
                " (overtakes tip)"
            } else {
                ""
            }
        );

        Ok(PredictedSubmission {
            fork_id,
            submitted_as,
            last_stored_header,
            computed_committed_headers,
            total_fork_headers,
            tx: RelayTx {
                from: signer,
                to: self.relay_address,
                data,
                kind,
                header_count: headers.len(),
            },
        })
    }
}

fn new_fork_id() -> u64 {
    rand::thread_rng().gen_range(1..=MAX_FORK_ID)
}
