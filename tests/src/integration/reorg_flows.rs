//! # Reorg Flows
//!
//! Bitcoin reorganizations seen by the relay client.
//!
//! | Scenario                    | Expected                                  |
//! |-----------------------------|-------------------------------------------|
//! | Fork overtakes in one batch | Short-fork tx, relay follows              |
//! | Fork needs several batches  | Long-fork txs under one id, relay follows |
//! | Fork never overtakes        | `ForkNotOvertaking`                       |
//! | Cached header reorged out   | Lookup rejects it                         |

#[cfg(test)]
mod tests {
    use super::super::init_tracing;
    use btc_relay_sync::test_utils::{RelayHarness, GENESIS_HEIGHT, SUBMITTER};
    use btc_relay_sync::{
        HeaderRequest, RelayContract, RelayError, RelayEvent, RelaySyncConfig, RelayTxKind,
    };
    use std::sync::atomic::Ordering;

    fn synced(blocks: usize) -> RelayHarness {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        h.bitcoin.mine(blocks);
        h
    }

    #[tokio::test]
    async fn test_short_fork_overtakes() {
        init_tracing();
        let h = synced(6);
        h.sync_and_send().await.unwrap();

        h.bitcoin.reorg(GENESIS_HEIGHT + 5, 2);
        let outcome = h.sync_and_send().await.unwrap();
        assert_eq!(outcome.txs.len(), 1);
        assert_eq!(outcome.txs[0].kind, RelayTxKind::SubmitShortFork);
        assert_eq!(h.relay.tip().unwrap().block_hash, h.bitcoin.tip_hash());

        let reorg = h
            .relay
            .events()
            .into_iter()
            .rev()
            .find(|event| matches!(event, RelayEvent::ChainReorg { .. }));
        assert!(matches!(
            reorg,
            Some(RelayEvent::ChainReorg { fork_id: 0, start_height, submitter, .. })
                if start_height == GENESIS_HEIGHT + 6 && submitter == SUBMITTER
        ));
    }

    #[tokio::test]
    async fn test_long_fork_overtakes_across_batches() {
        init_tracing();
        let h = synced(6);
        h.sync_and_send().await.unwrap();

        // Fork from 101 needs seven headers to overtake 106.
        h.bitcoin.reorg(GENESIS_HEIGHT + 1, 7);
        let outcome = h.sync().await.unwrap();

        let fork_ids: Vec<u64> = outcome
            .txs
            .iter()
            .filter_map(|tx| match tx.kind {
                RelayTxKind::SubmitLongFork { fork_id } => Some(fork_id),
                _ => None,
            })
            .collect();
        assert_eq!(fork_ids.len(), 2);
        assert_eq!(fork_ids[0], fork_ids[1]);
        assert_eq!(outcome.txs.last().unwrap().kind, RelayTxKind::SubmitMain);

        h.send_all(&outcome.txs).unwrap();
        assert_eq!(h.relay.get_blockheight().await.unwrap(), GENESIS_HEIGHT + 8);
        assert_eq!(h.relay.tip().unwrap().block_hash, h.bitcoin.tip_hash());
        assert!(h.sync().await.unwrap().txs.is_empty());
    }

    #[tokio::test]
    async fn test_fork_with_equal_work_is_rejected() {
        init_tracing();
        let h = synced(4);
        h.sync_and_send().await.unwrap();

        h.bitcoin.reorg(GENESIS_HEIGHT + 2, 2);
        let err = h.sync().await.unwrap_err();
        match err {
            RelayError::ForkNotOvertaking {
                fork_work,
                tip_work,
            } => assert_eq!(fork_work, tip_work),
            other => panic!("expected ForkNotOvertaking, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reorged_block_no_longer_resolves() {
        init_tracing();
        let h = synced(4);
        h.sync_and_send().await.unwrap();

        let stale = HeaderRequest {
            block_hash: h.bitcoin.hash_at(GENESIS_HEIGHT + 3).unwrap(),
            block_height: GENESIS_HEIGHT + 3,
            required_confirmations: 1,
        };
        let mut pending = Vec::new();
        let first = h
            .orchestrator
            .resolve(SUBMITTER, &[stale], &mut pending, None)
            .await
            .unwrap();
        assert!(first[&stale.block_hash].is_committed());

        h.bitcoin.reorg(GENESIS_HEIGHT + 2, 3);
        h.sync_and_send().await.unwrap();

        let err = h
            .orchestrator
            .resolve(SUBMITTER, &[stale], &mut pending, h.as_synchronizer())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound(_)));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_scan_stops_sync() {
        init_tracing();
        let h = synced(3);
        h.index.cancellation_flag().store(true, Ordering::Relaxed);
        let err = h.sync().await.unwrap_err();
        assert!(matches!(err, RelayError::Cancelled));

        h.index.cancellation_flag().store(false, Ordering::Relaxed);
        assert_eq!(h.sync().await.unwrap().txs.len(), 1);
    }
}
