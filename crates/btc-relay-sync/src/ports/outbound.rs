//! # Outbound Ports
//!
//! Traits for the three external systems the relay client reads from.
//! Writes go out as unsigned [`RelayTx`](crate::domain::RelayTx) values and
//! are sent by the caller's transaction manager.

use crate::domain::{BtcBlockInfo, CallFrame, EvmLog, LogFilter, MerkleProof, RelayError};
use async_trait::async_trait;
use btc_relay_types::{BlockHash, Txid, H160, H256, U256};

/// Bitcoin node - outbound port.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// Header, height and best-chain successor of a block.
    async fn get_block_header(&self, hash: BlockHash) -> Result<BtcBlockInfo, RelayError>;

    /// Merkle inclusion proof of `txid` in `block_hash`.
    async fn get_merkle_proof(
        &self,
        txid: Txid,
        block_hash: BlockHash,
    ) -> Result<MerkleProof, RelayError>;

    /// Whether the block is on the node's best chain.
    async fn is_in_main_chain(&self, hash: BlockHash) -> Result<bool, RelayError>;
}

/// Relay contract view functions - outbound port.
#[async_trait]
pub trait RelayContract: Send + Sync {
    /// Contract address.
    fn address(&self) -> H160;

    /// `getBlockheight()`
    async fn get_blockheight(&self) -> Result<u32, RelayError>;

    /// `getChainwork()`
    async fn get_chainwork(&self) -> Result<U256, RelayError>;

    /// `getCommitHash(height)`; zero when nothing is stored.
    async fn get_commit_hash(&self, height: u32) -> Result<H256, RelayError>;

    /// `getTipCommitHash()`
    async fn get_tip_commit_hash(&self) -> Result<H256, RelayError>;

    /// `verifyBlockheaderHash(height, commitHash)`; confirmations of the
    /// header, failing if it is not on the relay's main chain.
    async fn verify_blockheader_hash(&self, height: u32, commit_hash: H256)
        -> Result<u32, RelayError>;
}

/// EVM node - outbound port.
#[async_trait]
pub trait EvmChainRpc: Send + Sync {
    /// Latest block number.
    async fn get_block_number(&self) -> Result<u64, RelayError>;

    /// Logs matching `filter`, in chain order.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<EvmLog>, RelayError>;

    /// Call trace of a mined transaction.
    async fn trace_transaction(&self, tx_hash: H256) -> Result<CallFrame, RelayError>;
}
