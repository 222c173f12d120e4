//! In-memory Bitcoin node with a regtest-difficulty best chain.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::algorithms::{build_merkle_proof, compute_merkle_root};
use crate::domain::{BtcBlockInfo, MerkleProof, RelayError};
use crate::ports::BitcoinRpc;
use btc_relay_types::{
    block_work, BlockHash, BtcHeader, BtcTransaction, StoredHeader, TxInput, TxOutput, Txid, H256,
    U256,
};

/// Regtest compact target; every block adds 2 work.
pub const REGTEST_BITS: u32 = 0x207f_ffff;

const GENESIS_TIMESTAMP: u32 = 1_700_000_000;
const BLOCK_INTERVAL: u32 = 600;

#[derive(Clone, Debug)]
struct MockBlock {
    header: BtcHeader,
    height: u32,
    txids: Vec<H256>,
}

struct NodeState {
    blocks: HashMap<BlockHash, MockBlock>,
    best: BTreeMap<u32, BlockHash>,
    salt: u32,
    fail_next: u32,
    merkle_proof_requests: usize,
}

impl NodeState {
    fn tip(&self) -> (u32, BlockHash) {
        self.best
            .iter()
            .next_back()
            .map(|(height, hash)| (*height, *hash))
            .unwrap_or((0, BlockHash::ZERO))
    }

    /// Mine a block on `parent` and make it the best entry at its height.
    fn append(
        &mut self,
        parent: Option<BlockHash>,
        height: u32,
        extra: Vec<BtcTransaction>,
    ) -> BlockHash {
        self.salt += 1;
        let coinbase = coinbase(height, self.salt);
        let mut txids = vec![coinbase.txid().0];
        txids.extend(extra.iter().map(|tx| tx.txid().0));

        let (prev_block_hash, timestamp) = match parent.and_then(|p| self.blocks.get(&p)) {
            Some(block) => (block.header.hash(), block.header.timestamp + BLOCK_INTERVAL),
            None => (BlockHash::ZERO, GENESIS_TIMESTAMP),
        };
        let header = BtcHeader {
            version: 0x2000_0000,
            prev_block_hash,
            merkle_root: compute_merkle_root(&txids),
            timestamp,
            nbits: REGTEST_BITS,
            nonce: self.salt,
        };
        let hash = header.hash();
        self.blocks.insert(
            hash,
            MockBlock {
                header,
                height,
                txids,
            },
        );
        self.best.insert(height, hash);
        hash
    }
}

fn coinbase(height: u32, salt: u32) -> BtcTransaction {
    let mut script_sig = height.to_le_bytes().to_vec();
    script_sig.extend_from_slice(&salt.to_le_bytes());
    BtcTransaction {
        version: 1,
        inputs: vec![TxInput {
            prev_txid: Txid::ZERO,
            prev_vout: u32::MAX,
            script_sig,
            sequence: u32::MAX,
            witness: Vec::new(),
        }],
        outputs: vec![TxOutput {
            value: 50 * 100_000_000,
            script_pubkey: vec![0x51],
        }],
        lock_time: 0,
    }
}

/// Mock Bitcoin node.
///
/// Blocks replaced by [`reorg`](Self::reorg) stay queryable but report zero
/// confirmations and no successor, as bitcoind does for stale blocks.
pub struct MockBitcoinNode {
    genesis_height: u32,
    genesis: BtcHeader,
    state: Mutex<NodeState>,
}

impl MockBitcoinNode {
    /// Node whose chain starts at `genesis_height`.
    pub fn new(genesis_height: u32) -> Self {
        let mut state = NodeState {
            blocks: HashMap::new(),
            best: BTreeMap::new(),
            salt: 0,
            fail_next: 0,
            merkle_proof_requests: 0,
        };
        let hash = state.append(None, genesis_height, Vec::new());
        let genesis = state.blocks[&hash].header;
        Self {
            genesis_height,
            genesis,
            state: Mutex::new(state),
        }
    }

    /// Height of the first block.
    pub fn genesis_height(&self) -> u32 {
        self.genesis_height
    }

    /// Best-chain tip height.
    pub fn tip_height(&self) -> u32 {
        self.state.lock().tip().0
    }

    /// Best-chain tip hash.
    pub fn tip_hash(&self) -> BlockHash {
        self.state.lock().tip().1
    }

    /// Best-chain block at `height`.
    pub fn hash_at(&self, height: u32) -> Option<BlockHash> {
        self.state.lock().best.get(&height).copied()
    }

    /// Header of any known block.
    pub fn header(&self, hash: BlockHash) -> Option<BtcHeader> {
        self.state.lock().blocks.get(&hash).map(|block| block.header)
    }

    /// Stored header a relay would be deployed with for the first block.
    pub fn genesis_stored_header(&self) -> StoredHeader {
        let header = self.genesis;
        StoredHeader::new(
            header,
            block_work(REGTEST_BITS) * U256::from(self.genesis_height + 1),
            self.genesis_height,
            header.timestamp,
            [header.timestamp; 10],
        )
    }

    /// Mine `n` empty blocks on the tip.
    pub fn mine(&self, n: usize) -> Vec<BlockHash> {
        let mut state = self.state.lock();
        (0..n)
            .map(|_| {
                let (height, tip) = state.tip();
                state.append(Some(tip), height + 1, Vec::new())
            })
            .collect()
    }

    /// Mine one block on the tip that includes `tx`. Returns its hash and
    /// height.
    pub fn mine_with_tx(&self, tx: BtcTransaction) -> (BlockHash, u32) {
        let mut state = self.state.lock();
        let (height, tip) = state.tip();
        let hash = state.append(Some(tip), height + 1, vec![tx]);
        (hash, height + 1)
    }

    /// Replace everything above `fork_height` with `n` new blocks.
    pub fn reorg(&self, fork_height: u32, n: usize) -> Vec<BlockHash> {
        let mut state = self.state.lock();
        let _stale = state.best.split_off(&(fork_height + 1));
        (0..n)
            .map(|_| {
                let (height, tip) = state.tip();
                state.append(Some(tip), height + 1, Vec::new())
            })
            .collect()
    }

    /// Make the next `n` RPC calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    /// Number of `get_merkle_proof` calls served so far.
    pub fn merkle_proof_requests(&self) -> usize {
        self.state.lock().merkle_proof_requests
    }

    fn check_fail(&self, state: &mut NodeState) -> Result<(), RelayError> {
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RelayError::RpcTransient("bitcoin node unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BitcoinRpc for MockBitcoinNode {
    async fn get_block_header(&self, hash: BlockHash) -> Result<BtcBlockInfo, RelayError> {
        let mut state = self.state.lock();
        self.check_fail(&mut state)?;
        let block = state
            .blocks
            .get(&hash)
            .ok_or_else(|| RelayError::NotFound(format!("block {hash}")))?;
        let (tip_height, _) = state.tip();
        let on_best = state.best.get(&block.height) == Some(&hash);

        Ok(BtcBlockInfo {
            header: block.header,
            height: block.height,
            next_block_hash: if on_best {
                state.best.get(&(block.height + 1)).copied()
            } else {
                None
            },
            confirmations: if on_best { tip_height - block.height + 1 } else { 0 },
        })
    }

    async fn get_merkle_proof(
        &self,
        txid: Txid,
        block_hash: BlockHash,
    ) -> Result<MerkleProof, RelayError> {
        let mut state = self.state.lock();
        self.check_fail(&mut state)?;
        state.merkle_proof_requests += 1;
        let block = state
            .blocks
            .get(&block_hash)
            .ok_or_else(|| RelayError::NotFound(format!("block {block_hash}")))?;
        let index = block
            .txids
            .iter()
            .position(|id| *id == txid.0)
            .ok_or_else(|| RelayError::NotFound(format!("tx {txid} in block {block_hash}")))?;
        build_merkle_proof(&block.txids, index)
    }

    async fn is_in_main_chain(&self, hash: BlockHash) -> Result<bool, RelayError> {
        let mut state = self.state.lock();
        self.check_fail(&mut state)?;
        Ok(state
            .blocks
            .get(&hash)
            .is_some_and(|block| state.best.get(&block.height) == Some(&hash)))
    }
}
