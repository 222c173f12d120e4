//! # Inbound Ports
//!
//! What the relay client offers to transaction-building layers.

use crate::domain::{Claim, ClaimData, RelayError, RelayTx, SyncOutcome, WitnessData};
use async_trait::async_trait;
use btc_relay_types::{H160, H256};

/// Produces the relay transactions needed to reach the Bitcoin tip.
#[async_trait]
pub trait HeaderSynchronizer: Send + Sync {
    /// Build (but do not send) every transaction required to bring the relay
    /// to the Bitcoin node's best tip, together with the predicted headers.
    async fn sync_to_latest_txs(&self, signer: H160) -> Result<SyncOutcome, RelayError>;
}

/// Claim commitment and witness construction - inbound port.
#[async_trait]
pub trait ClaimVerifierApi: Send + Sync {
    /// `keccak256` commitment for claim data.
    fn get_commitment(&self, data: &ClaimData) -> Result<H256, RelayError>;

    /// Full witness for `claim`. Relay transactions the witness depends on
    /// are appended to `pending_txs` and must be mined first.
    async fn get_witness(
        &self,
        signer: H160,
        claim: &Claim,
        witness_data: &WitnessData,
        pending_txs: &mut Vec<RelayTx>,
        synchronizer: Option<&dyn HeaderSynchronizer>,
    ) -> Result<Vec<u8>, RelayError>;
}
