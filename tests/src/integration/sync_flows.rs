//! # Sync Flows
//!
//! Header submission and recovery on an unforked chain.
//!
//! 1. Engine predictions match what the relay commits
//! 2. A restarted client recovers the tip from events and traces alone
//! 3. Orchestration answers committed requests directly and syncs the rest

#[cfg(test)]
mod tests {
    use super::super::init_tracing;
    use btc_relay_sync::test_utils::{RelayHarness, GENESIS_HEIGHT, RELAY_ADDRESS, SUBMITTER};
    use btc_relay_sync::{
        HeaderRequest, HeaderResolution, RelayContract, RelayError, RelaySyncConfig,
        RelaySyncEngine,
    };
    use btc_relay_types::H160;

    // =========================================================================
    // ENGINE PREDICTIONS
    // =========================================================================

    #[tokio::test]
    async fn test_three_headers_predict_four_entries() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let hashes = h.bitcoin.mine(3);
        let headers: Vec<_> = hashes.iter().filter_map(|hash| h.bitcoin.header(*hash)).collect();

        let genesis = h.bitcoin.genesis_stored_header();
        let predicted = RelaySyncEngine::new(RELAY_ADDRESS)
            .submit_main(SUBMITTER, &headers, &genesis)
            .unwrap();
        assert_eq!(predicted.computed_committed_headers.len(), 4);
        assert_eq!(predicted.computed_committed_headers[0], genesis);

        h.send_all(&[predicted.tx.clone()]).unwrap();
        for stored in &predicted.computed_committed_headers {
            assert_eq!(h.relay.main_header(stored.block_height), Some(*stored));
        }
        assert_eq!(
            h.relay.get_chainwork().await.unwrap(),
            predicted.last_stored_header.chain_work
        );
        assert_eq!(
            h.relay
                .verify_blockheader_hash(
                    GENESIS_HEIGHT + 1,
                    predicted.computed_committed_headers[1].commit_hash()
                )
                .await
                .unwrap(),
            3
        );
    }

    // =========================================================================
    // RECOVERY
    // =========================================================================

    #[tokio::test]
    async fn test_restarted_client_recovers_tip() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        h.bitcoin.mine(9);
        let outcome = h.sync_and_send().await.unwrap();

        let fresh = h.restarted();
        assert_eq!(fresh.index.cache_len(), (0, 0));
        let tip = fresh.index.get_tip_data().await.unwrap().unwrap();
        assert_eq!(tip.block_height, GENESIS_HEIGHT + 9);
        assert_eq!(tip.commit_hash, outcome.tip_commit_hash);
        assert_eq!(tip.block_hash, h.bitcoin.tip_hash());
    }

    #[tokio::test]
    async fn test_sync_through_router_contract() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        h.relay.set_router(Some(H160::repeat_byte(0x42)));
        h.bitcoin.mine(5);
        h.sync_and_send().await.unwrap();

        // Second round has to recover the tip from nested frames.
        h.bitcoin.mine(2);
        let fresh = h.restarted();
        let outcome = fresh.sync_and_send().await.unwrap();
        assert_eq!(outcome.txs.len(), 1);
        assert_eq!(h.relay.tip().unwrap().block_hash, h.bitcoin.tip_hash());
    }

    // =========================================================================
    // ORCHESTRATION
    // =========================================================================

    #[tokio::test]
    async fn test_two_requests_one_committed_one_pending() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        h.bitcoin.mine(2);
        h.sync_and_send().await.unwrap();
        h.bitcoin.mine(4);

        let committed = HeaderRequest {
            block_hash: h.bitcoin.hash_at(GENESIS_HEIGHT + 1).unwrap(),
            block_height: GENESIS_HEIGHT + 1,
            required_confirmations: 2,
        };
        let pending_req = HeaderRequest {
            block_hash: h.bitcoin.hash_at(GENESIS_HEIGHT + 4).unwrap(),
            block_height: GENESIS_HEIGHT + 4,
            required_confirmations: 1,
        };

        let mut pending = Vec::new();
        let err = h
            .orchestrator
            .resolve(SUBMITTER, &[committed, pending_req], &mut pending, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Unsynchronized { relay_height, .. } if relay_height == GENESIS_HEIGHT + 2
        ));
        assert!(pending.is_empty());

        let resolved = h
            .orchestrator
            .resolve(SUBMITTER, &[committed, pending_req], &mut pending, h.as_synchronizer())
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved[&committed.block_hash].is_committed());
        assert!(matches!(
            resolved[&pending_req.block_hash],
            HeaderResolution::PendingSync(header) if header.block_height == GENESIS_HEIGHT + 4
        ));
        assert_eq!(pending.len(), 1);

        h.send_all(&pending).unwrap();
        let mut none = Vec::new();
        let resolved = h
            .orchestrator
            .resolve(SUBMITTER, &[pending_req], &mut none, None)
            .await
            .unwrap();
        assert!(resolved[&pending_req.block_hash].is_committed());
    }
}
