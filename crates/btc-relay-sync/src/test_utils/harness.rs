//! Fully wired relay client over the simulated relay and Bitcoin node.

use std::sync::Arc;

use super::bitcoin_node::MockBitcoinNode;
use super::relay::SimulatedRelay;
use crate::application::{
    BitcoinCommitmentVerifier, CommitmentIndex, HeaderSyncOrchestrator, RelaySyncEngine,
    RelaySynchronizer,
};
use crate::config::RelaySyncConfig;
use crate::domain::{RelayError, RelayTx, SyncOutcome};
use crate::ports::HeaderSynchronizer;
use btc_relay_types::{BtcTransaction, TxInput, TxOutput, Txid, H160, H256};

/// Relay contract address used by the harness.
pub const RELAY_ADDRESS: H160 = H160([0x5e; 20]);
/// Account that deployed the relay.
pub const DEPLOYER: H160 = H160([0xde; 20]);
/// Account submitting headers.
pub const SUBMITTER: H160 = H160([0x5b; 20]);
/// Bitcoin height the relay is deployed at.
pub const GENESIS_HEIGHT: u32 = 100;

/// Node, relay and every service built on them.
pub struct RelayHarness {
    /// Bitcoin node.
    pub bitcoin: Arc<MockBitcoinNode>,
    /// Relay contract and EVM node.
    pub relay: Arc<SimulatedRelay>,
    /// Shared commitment index.
    pub index: Arc<CommitmentIndex>,
    /// Synchronizer over `index`.
    pub synchronizer: RelaySynchronizer,
    /// Orchestrator over `index`.
    pub orchestrator: Arc<HeaderSyncOrchestrator>,
    /// Claim verifier.
    pub verifier: BitcoinCommitmentVerifier,
    /// Configuration every service was built with.
    pub config: RelaySyncConfig,
}

impl RelayHarness {
    /// Relay deployed at [`GENESIS_HEIGHT`] on a node with no further blocks.
    pub fn new(config: RelaySyncConfig) -> Self {
        let bitcoin = Arc::new(MockBitcoinNode::new(GENESIS_HEIGHT));
        let relay = Arc::new(SimulatedRelay::deploy(
            RELAY_ADDRESS,
            DEPLOYER,
            bitcoin.genesis_stored_header(),
        ));
        Self::wire(bitcoin, relay, config)
    }

    fn wire(
        bitcoin: Arc<MockBitcoinNode>,
        relay: Arc<SimulatedRelay>,
        config: RelaySyncConfig,
    ) -> Self {
        let index = Arc::new(CommitmentIndex::new(
            relay.clone(),
            relay.clone(),
            bitcoin.clone(),
            config.clone(),
        ));
        let synchronizer = RelaySynchronizer::new(
            index.clone(),
            RelaySyncEngine::new(RELAY_ADDRESS),
            bitcoin.clone(),
            config.clone(),
        );
        let orchestrator = Arc::new(HeaderSyncOrchestrator::new(
            index.clone(),
            config.retry.clone(),
        ));
        let verifier = BitcoinCommitmentVerifier::new(bitcoin.clone(), orchestrator.clone());
        Self {
            bitcoin,
            relay,
            index,
            synchronizer,
            orchestrator,
            verifier,
            config,
        }
    }

    /// Same node and relay, services rebuilt with empty caches.
    pub fn restarted(&self) -> Self {
        Self::wire(self.bitcoin.clone(), self.relay.clone(), self.config.clone())
    }

    /// Mine every transaction in order.
    pub fn send_all(&self, txs: &[RelayTx]) -> Result<Vec<H256>, RelayError> {
        txs.iter().map(|tx| self.relay.execute(tx)).collect()
    }

    /// The synchronizer as the trait object witness builders take.
    pub fn as_synchronizer(&self) -> Option<&dyn HeaderSynchronizer> {
        Some(&self.synchronizer as &dyn HeaderSynchronizer)
    }

    /// Prepare a sync as [`SUBMITTER`] without sending it.
    pub async fn sync(&self) -> Result<SyncOutcome, RelayError> {
        self.synchronizer.sync_to_latest_txs(SUBMITTER).await
    }

    /// Prepare a sync and mine its transactions.
    pub async fn sync_and_send(&self) -> Result<SyncOutcome, RelayError> {
        let outcome = self.sync().await?;
        self.send_all(&outcome.txs)?;
        Ok(outcome)
    }
}

/// Segwit transaction paying `amount` to `script`, with a lock time and
/// first-input sequence usable as a nonce carrier.
pub fn payment_tx(amount: u64, script: Vec<u8>, lock_time: u32, sequence: u32) -> BtcTransaction {
    BtcTransaction {
        version: 2,
        inputs: vec![TxInput {
            prev_txid: Txid::from_raw([0xab; 32]),
            prev_vout: 0,
            script_sig: Vec::new(),
            sequence,
            witness: vec![vec![0x30; 71], vec![0x02; 33]],
        }],
        outputs: vec![
            TxOutput {
                value: amount,
                script_pubkey: script,
            },
            TxOutput {
                value: 12_345,
                script_pubkey: vec![0x00, 0x14, 0x99, 0x99],
            },
        ],
        lock_time,
    }
}
