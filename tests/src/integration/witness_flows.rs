//! # Witness Flows
//!
//! Claim witnesses built by the verifier and checked the way a consumer
//! contract would: commitment preimage first, then the stored header
//! against the relay, then the merkle proof.

#[cfg(test)]
mod tests {
    use super::super::init_tracing;
    use btc_relay_sync::domain::extract_nonce;
    use btc_relay_sync::test_utils::{payment_tx, RelayHarness, GENESIS_HEIGHT, SUBMITTER};
    use btc_relay_sync::{
        verify_merkle_proof, Claim, ClaimData, ClaimKind, ClaimVerifierApi, MerkleProof,
        RelayContract, RelayError, RelaySyncConfig, TxInclusion, WitnessData,
    };
    use btc_relay_types::{
        keccak256, BtcTransaction, OpReturnCommitment, StoredHeader, TxOutput, H160, H256,
        STORED_HEADER_SIZE,
    };

    const SCRIPT: [u8; 6] = [0x00, 0x14, 0xde, 0xad, 0xbe, 0xef];
    const PREIMAGE_LEN: usize = 56;
    const CONFIRMATIONS: u32 = 6;

    /// Split a Bitcoin-kind witness into header and proof parts.
    fn parse_witness(witness: &[u8]) -> (StoredHeader, MerkleProof, usize) {
        let header_end = PREIMAGE_LEN + STORED_HEADER_SIZE;
        let stored = StoredHeader::deserialize(&witness[PREIMAGE_LEN..header_end]).unwrap();

        let position = u32::from_be_bytes(witness[header_end..header_end + 4].try_into().unwrap());
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&witness[header_end + 28..header_end + 36]);
        let count = u64::from_be_bytes(count_bytes) as usize;
        let siblings_start = header_end + 36;
        let siblings = (0..count)
            .map(|i| {
                let start = siblings_start + 32 * i;
                H256::from_slice(&witness[start..start + 32])
            })
            .collect();
        (
            stored,
            MerkleProof { position, siblings },
            siblings_start + 32 * count,
        )
    }

    #[tokio::test]
    async fn test_output_witness_verifies_against_relay() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(125_000, SCRIPT.to_vec(), 0, u32::MAX);
        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());
        h.bitcoin.mine(CONFIRMATIONS as usize - 1);

        let data = ClaimData::Output {
            amount: 125_000,
            script: SCRIPT.to_vec(),
            confirmations: CONFIRMATIONS,
        };
        let claim = Claim {
            kind: ClaimKind::Output,
            commitment: h.verifier.get_commitment(&data).unwrap(),
        };
        let witness_data = WitnessData::Output {
            raw_tx: tx.serialize(),
            vout: 0,
            inclusion: TxInclusion {
                block_hash,
                block_height,
            },
            confirmations: CONFIRMATIONS,
        };

        let mut pending = Vec::new();
        let witness = h
            .verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, h.as_synchronizer())
            .await
            .unwrap();
        assert!(!pending.is_empty());
        h.send_all(&pending).unwrap();

        assert_eq!(keccak256(&witness[..PREIMAGE_LEN]), claim.commitment);
        let (stored, proof, proof_end) = parse_witness(&witness);
        let confirmations = h
            .relay
            .verify_blockheader_hash(stored.block_height, stored.commit_hash())
            .await
            .unwrap();
        assert!(confirmations >= CONFIRMATIONS);
        assert!(verify_merkle_proof(&tx.txid().0, &proof, &stored.header.merkle_root));

        let vout = u32::from_be_bytes(witness[proof_end..proof_end + 4].try_into().unwrap());
        assert_eq!(vout, 0);
        let stripped = &witness[proof_end + 36..];
        assert_eq!(BtcTransaction::parse(stripped).unwrap().txid(), tx.txid());
        assert!(stripped.len() < tx.serialize().len());
    }

    #[tokio::test]
    async fn test_wrong_amount_fails_before_proof_fetch() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(125_000, SCRIPT.to_vec(), 0, u32::MAX);
        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());

        let claim = Claim {
            kind: ClaimKind::Output,
            commitment: h
                .verifier
                .get_commitment(&ClaimData::Output {
                    amount: 124_999,
                    script: SCRIPT.to_vec(),
                    confirmations: 1,
                })
                .unwrap(),
        };
        let witness_data = WitnessData::Output {
            raw_tx: tx.serialize(),
            vout: 0,
            inclusion: TxInclusion {
                block_hash,
                block_height,
            },
            confirmations: 1,
        };
        let mut pending = Vec::new();
        let err = h
            .verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, h.as_synchronizer())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidCommitment(_)));
        assert_eq!(h.bitcoin.merkle_proof_requests(), 0);
        assert_eq!(h.relay.get_blockheight().await.unwrap(), GENESIS_HEIGHT);
    }

    #[tokio::test]
    async fn test_nonced_output_from_lock_time() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(9_000, SCRIPT.to_vec(), 500_000_010, 0xFF00_0007);
        assert_eq!(extract_nonce(&tx).unwrap(), 0xA00_0007);

        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());
        h.bitcoin.mine(1);
        h.sync_and_send().await.unwrap();

        let claim = Claim {
            kind: ClaimKind::NoncedOutput,
            commitment: h
                .verifier
                .get_commitment(&ClaimData::NoncedOutput {
                    nonce: 0xA00_0007,
                    amount: 9_000,
                    script: SCRIPT.to_vec(),
                    confirmations: 2,
                })
                .unwrap(),
        };
        let witness_data = WitnessData::NoncedOutput {
            raw_tx: tx.serialize(),
            vout: 0,
            inclusion: TxInclusion {
                block_hash,
                block_height,
            },
            confirmations: 2,
        };
        let mut pending = Vec::new();
        let witness = h
            .verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, None)
            .await
            .unwrap();
        assert!(pending.is_empty());
        assert_eq!(keccak256(&witness[..PREIMAGE_LEN]), claim.commitment);
    }

    #[tokio::test]
    async fn test_op_return_commitment_in_witness_tx() {
        init_tracing();
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let commitment = OpReturnCommitment {
            recipient: H160::repeat_byte(0x0a),
            amount0: 1_000,
            amount1: Some(2_000),
            execution_hash: Some(H256::repeat_byte(0x0e)),
        };
        let mut tx = payment_tx(50_000, SCRIPT.to_vec(), 0, u32::MAX);
        tx.outputs.push(TxOutput {
            value: 0,
            script_pubkey: commitment.to_script(),
        });
        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());

        let data = ClaimData::TxId {
            txid: tx.txid(),
            confirmations: 1,
        };
        let claim = Claim {
            kind: ClaimKind::TxId,
            commitment: h.verifier.get_commitment(&data).unwrap(),
        };
        let witness_data = WitnessData::TxId {
            txid: tx.txid(),
            inclusion: TxInclusion {
                block_hash,
                block_height,
            },
            confirmations: 1,
        };
        let mut pending = Vec::new();
        h.verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, h.as_synchronizer())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let carried = tx.outputs.last().unwrap();
        assert_eq!(
            OpReturnCommitment::from_script(&carried.script_pubkey).unwrap(),
            commitment
        );
    }
}
