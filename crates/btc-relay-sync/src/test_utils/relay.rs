//! In-memory relay contract that also plays the EVM node it lives on.
//!
//! Applies submissions the way the contract does: main batches must extend
//! the tip, forks must start on the main chain, and a fork replaces the main
//! chain only once its work is strictly greater. Each executed transaction
//! is mined in its own EVM block, with its logs and call trace recorded.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::algorithms::{decode_submission, encode_constructor_args, selector, HeaderSubmission};
use crate::domain::{
    CallFrame, CallKind, EvmLog, ForkId, LogFilter, RelayError, RelayEvent, RelayTx,
};
use crate::ports::{EvmChainRpc, RelayContract};
use btc_relay_types::{keccak256, StoredHeader, H160, H256, U256};

/// Initcode prefix standing in for the relay bytecode.
const RELAY_BYTECODE: [u8; 5] = [0x60, 0x80, 0x60, 0x40, 0x52];

struct RelayState {
    main: BTreeMap<u32, StoredHeader>,
    forks: HashMap<u64, Vec<StoredHeader>>,
    logs: Vec<EvmLog>,
    traces: HashMap<H256, CallFrame>,
    block_number: u64,
    router: Option<H160>,
    fail_next: u32,
}

impl RelayState {
    fn tip(&self) -> Result<StoredHeader, RelayError> {
        self.main
            .values()
            .next_back()
            .copied()
            .ok_or_else(|| RelayError::Rpc("relay not initialized".into()))
    }

    fn require_on_main(&self, header: &StoredHeader) -> Result<(), RelayError> {
        match self.main.get(&header.block_height) {
            Some(stored) if stored == header => Ok(()),
            _ => Err(revert("fork must start on the main chain")),
        }
    }

    fn apply(
        &mut self,
        submitter: H160,
        submission: &HeaderSubmission,
    ) -> Result<Vec<RelayEvent>, RelayError> {
        if submission.headers.is_empty() {
            return Err(revert("empty header batch"));
        }
        let chain = submission.from.compute_chain(&submission.headers);
        let added = &chain[1..];
        let tip = self.tip()?;

        match submission.fork_id {
            ForkId::Main => {
                if submission.from != tip {
                    return Err(revert("main submission must extend the tip"));
                }
                Ok(added
                    .iter()
                    .map(|header| {
                        self.main.insert(header.block_height, *header);
                        RelayEvent::StoreHeader {
                            commit_hash: header.commit_hash(),
                            block_hash: header.block_hash,
                        }
                    })
                    .collect())
            }
            ForkId::ShortFork => {
                self.require_on_main(&submission.from)?;
                if !chain[chain.len() - 1].has_more_work_than(&tip) {
                    return Err(revert("short fork does not overtake the tip"));
                }
                let mut events = fork_events(added, 0);
                events.push(self.reorg(added, 0, submitter));
                Ok(events)
            }
            ForkId::LongFork(id) => {
                match self.forks.get(&id).and_then(|fork| fork.last()) {
                    Some(last) if *last != submission.from => {
                        return Err(revert("fork submission must extend the fork tip"))
                    }
                    Some(_) => {}
                    None => self.require_on_main(&submission.from)?,
                }
                let mut events = fork_events(added, id);
                let fork = self.forks.entry(id).or_default();
                fork.extend_from_slice(added);

                if fork.last().is_some_and(|last| last.has_more_work_than(&tip)) {
                    let fork = self.forks.remove(&id).unwrap_or_default();
                    events.push(self.reorg(&fork, id, submitter));
                }
                Ok(events)
            }
        }
    }

    fn reorg(&mut self, headers: &[StoredHeader], fork_id: u64, submitter: H160) -> RelayEvent {
        let start_height = headers[0].block_height;
        let _replaced = self.main.split_off(&start_height);
        for header in headers {
            self.main.insert(header.block_height, *header);
        }
        let tip = headers[headers.len() - 1];
        RelayEvent::ChainReorg {
            commit_hash: tip.commit_hash(),
            block_hash: tip.block_hash,
            fork_id,
            submitter,
            start_height,
        }
    }

    /// Mine `frame` in a new EVM block together with its events.
    fn mine(&mut self, address: H160, frame: CallFrame, events: Vec<RelayEvent>) -> H256 {
        self.block_number += 1;
        let mut preimage = self.block_number.to_be_bytes().to_vec();
        preimage.extend_from_slice(&frame.input);
        let tx_hash = keccak256(&preimage);

        for (log_index, event) in events.into_iter().enumerate() {
            let (topics, data) = event.encode();
            self.logs.push(EvmLog {
                address,
                topics,
                data,
                block_number: self.block_number,
                tx_hash,
                log_index: log_index as u64,
            });
        }
        self.traces.insert(tx_hash, frame);
        tx_hash
    }
}

fn revert(reason: &str) -> RelayError {
    RelayError::Rpc(format!("execution reverted: {reason}"))
}

fn fork_events(headers: &[StoredHeader], fork_id: u64) -> Vec<RelayEvent> {
    headers
        .iter()
        .map(|header| RelayEvent::StoreForkHeader {
            commit_hash: header.commit_hash(),
            block_hash: header.block_hash,
            fork_id,
        })
        .collect()
}

/// Simulated relay contract.
pub struct SimulatedRelay {
    address: H160,
    state: Mutex<RelayState>,
}

impl SimulatedRelay {
    /// Deploy at `address` with `genesis` as the first stored header. The
    /// deployment is mined in EVM block 1.
    pub fn deploy(address: H160, deployer: H160, genesis: StoredHeader) -> Self {
        let mut state = RelayState {
            main: BTreeMap::from([(genesis.block_height, genesis)]),
            forks: HashMap::new(),
            logs: Vec::new(),
            traces: HashMap::new(),
            block_number: 0,
            router: None,
            fail_next: 0,
        };

        let mut initcode = RELAY_BYTECODE.to_vec();
        initcode.extend_from_slice(&encode_constructor_args(&genesis));
        let create = CallFrame {
            kind: CallKind::Create,
            from: deployer,
            to: Some(address),
            input: initcode,
            reverted: false,
            calls: Vec::new(),
        };
        let event = RelayEvent::StoreHeader {
            commit_hash: genesis.commit_hash(),
            block_hash: genesis.block_hash,
        };
        state.mine(address, create, vec![event]);

        Self {
            address,
            state: Mutex::new(state),
        }
    }

    /// Route later submissions through a router contract at `router`.
    pub fn set_router(&self, router: Option<H160>) {
        self.state.lock().router = router;
    }

    /// Make the next `n` reads fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    /// Mine `tx`. Reverts leave the relay untouched.
    pub fn execute(&self, tx: &RelayTx) -> Result<H256, RelayError> {
        if tx.to != self.address {
            return Err(RelayError::Rpc(format!("transaction sent to {:?}", tx.to)));
        }
        let submission =
            decode_submission(&tx.data).ok_or_else(|| revert("unknown relay function"))?;

        let mut state = self.state.lock();
        let events = state.apply(tx.from, &submission)?;

        let frame = match state.router {
            Some(router) => {
                let mut outer_input = vec![0xde, 0xad, 0xbe, 0xef];
                outer_input.extend_from_slice(&tx.data);
                let mut outer = CallFrame::call(tx.from, router, outer_input);
                outer.calls = vec![
                    CallFrame {
                        kind: CallKind::StaticCall,
                        ..CallFrame::call(
                            router,
                            self.address,
                            selector("getBlockheight()").to_vec(),
                        )
                    },
                    CallFrame::call(router, self.address, tx.data.clone()),
                ];
                outer
            }
            None => CallFrame::call(tx.from, self.address, tx.data.clone()),
        };
        Ok(state.mine(self.address, frame, events))
    }

    /// Current main-chain tip.
    pub fn tip(&self) -> Option<StoredHeader> {
        self.state.lock().tip().ok()
    }

    /// Main-chain stored header at `height`.
    pub fn main_header(&self, height: u32) -> Option<StoredHeader> {
        self.state.lock().main.get(&height).copied()
    }

    /// Every log emitted so far, decoded.
    pub fn events(&self) -> Vec<RelayEvent> {
        self.state
            .lock()
            .logs
            .iter()
            .filter_map(|log| RelayEvent::decode(log).ok())
            .collect()
    }

    fn check_fail(&self) -> Result<(), RelayError> {
        let mut state = self.state.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RelayError::RpcTransient("evm node unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayContract for SimulatedRelay {
    fn address(&self) -> H160 {
        self.address
    }

    async fn get_blockheight(&self) -> Result<u32, RelayError> {
        self.check_fail()?;
        Ok(self.state.lock().tip()?.block_height)
    }

    async fn get_chainwork(&self) -> Result<U256, RelayError> {
        self.check_fail()?;
        Ok(self.state.lock().tip()?.chain_work)
    }

    async fn get_commit_hash(&self, height: u32) -> Result<H256, RelayError> {
        self.check_fail()?;
        Ok(self
            .state
            .lock()
            .main
            .get(&height)
            .map(StoredHeader::commit_hash)
            .unwrap_or_default())
    }

    async fn get_tip_commit_hash(&self) -> Result<H256, RelayError> {
        self.check_fail()?;
        Ok(self.state.lock().tip()?.commit_hash())
    }

    async fn verify_blockheader_hash(
        &self,
        height: u32,
        commit_hash: H256,
    ) -> Result<u32, RelayError> {
        self.check_fail()?;
        let state = self.state.lock();
        let tip = state.tip()?;
        match state.main.get(&height) {
            Some(stored) if stored.commit_hash() == commit_hash => {
                Ok(tip.block_height - height + 1)
            }
            _ => Err(revert("block header not on main chain")),
        }
    }
}

#[async_trait]
impl EvmChainRpc for SimulatedRelay {
    async fn get_block_number(&self) -> Result<u64, RelayError> {
        self.check_fail()?;
        Ok(self.state.lock().block_number)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<EvmLog>, RelayError> {
        self.check_fail()?;
        Ok(self
            .state
            .lock()
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }

    async fn trace_transaction(&self, tx_hash: H256) -> Result<CallFrame, RelayError> {
        self.check_fail()?;
        self.state
            .lock()
            .traces
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(format!("trace for {tx_hash:?}")))
    }
}
