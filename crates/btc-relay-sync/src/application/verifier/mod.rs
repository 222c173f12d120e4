//! # Bitcoin Commitment Verifier
//!
//! Builds witnesses that a consumer contract checks against a claim's
//! commitment and the relay's stored headers.
//!
//! ## Witness layout
//!
//! ```text
//! commitment preimage
//! ‖ stored header (160B)
//! ‖ merkle proof: position(4B BE) ‖ count(32B BE) ‖ siblings
//! ‖ [output kinds] vout(4B BE) ‖ tx_len(32B BE) ‖ tx without witness data
//! ```
//!
//! Hash-lock claims skip all of this; their witness is the 32-byte secret.
//!
//! ## Order of checks
//!
//! 1. The commitment is recomputed from the witness data and compared with
//!    the claim before any I/O.
//! 2. The merkle proof is fetched from the Bitcoin node.
//! 3. The inclusion block is resolved through the orchestrator.
//! 4. The proof is checked against the resolved header's merkle root.
//!
//! `pending_txs` is only extended when a witness is returned.

pub mod handlers;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::orchestrator::HeaderSyncOrchestrator;
use crate::algorithms::verify_merkle_proof;
use crate::domain::{Claim, ClaimData, ClaimKind, HeaderRequest, RelayError, RelayTx, WitnessData};
use crate::ports::{BitcoinRpc, ClaimVerifierApi, HeaderSynchronizer};
use btc_relay_types::{BtcTransaction, Txid, H160, H256};

pub use handlers::{
    bitcoin_suffix, ClaimHandler, HtlcHandler, NoncedOutputHandler, OutputHandler, TxIdHandler,
};

/// Claim verifier for one relay contract.
pub struct BitcoinCommitmentVerifier {
    relay_address: H160,
    handlers: HashMap<ClaimKind, Box<dyn ClaimHandler>>,
    bitcoin: Arc<dyn BitcoinRpc>,
    orchestrator: Arc<HeaderSyncOrchestrator>,
}

impl BitcoinCommitmentVerifier {
    /// Verifier with all four claim handlers registered.
    pub fn new(
        bitcoin: Arc<dyn BitcoinRpc>,
        orchestrator: Arc<HeaderSyncOrchestrator>,
    ) -> Self {
        let relay_address = orchestrator.index().relay().address();
        let handlers: [Box<dyn ClaimHandler>; 4] = [
            Box::new(TxIdHandler::new(relay_address)),
            Box::new(OutputHandler::new(relay_address)),
            Box::new(NoncedOutputHandler::new(relay_address)),
            Box::new(HtlcHandler),
        ];
        Self {
            relay_address,
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.kind(), handler))
                .collect(),
            bitcoin,
            orchestrator,
        }
    }

    /// Relay the commitments are bound to.
    pub fn relay_address(&self) -> H160 {
        self.relay_address
    }

    fn handler(&self, kind: ClaimKind) -> Result<&dyn ClaimHandler, RelayError> {
        self.handlers
            .get(&kind)
            .map(|handler| handler.as_ref())
            .ok_or_else(|| RelayError::InvalidClaim(format!("no handler for {kind:?}")))
    }
}

/// Transaction part of an output witness.
struct TxSection {
    vout: u32,
    stripped: Vec<u8>,
}

fn proven_tx(witness: &WitnessData) -> Result<(Txid, Option<TxSection>), RelayError> {
    match witness {
        WitnessData::TxId { txid, .. } => Ok((*txid, None)),
        WitnessData::Output { raw_tx, vout, .. }
        | WitnessData::NoncedOutput { raw_tx, vout, .. } => {
            let tx = BtcTransaction::parse(raw_tx)?;
            let section = TxSection {
                vout: *vout,
                stripped: tx.serialize_no_witness(),
            };
            Ok((tx.txid(), Some(section)))
        }
        WitnessData::Htlc { .. } => Err(RelayError::InvalidClaim(
            "hash-lock witness has no transaction".into(),
        )),
    }
}

#[async_trait]
impl ClaimVerifierApi for BitcoinCommitmentVerifier {
    fn get_commitment(&self, data: &ClaimData) -> Result<H256, RelayError> {
        self.handler(data.kind())?.get_commitment(data)
    }

    async fn get_witness(
        &self,
        signer: H160,
        claim: &Claim,
        witness_data: &WitnessData,
        pending_txs: &mut Vec<RelayTx>,
        synchronizer: Option<&dyn HeaderSynchronizer>,
    ) -> Result<Vec<u8>, RelayError> {
        if witness_data.kind() != claim.kind {
            return Err(RelayError::InvalidClaim(format!(
                "{:?} witness data for a {:?} claim",
                witness_data.kind(),
                claim.kind
            )));
        }

        let handler = self.handler(claim.kind)?;
        let proven = handler.claim_data_from_witness(witness_data)?;
        let preimage = handler.serialize_commitment(&proven)?;
        let commitment = handler.get_commitment(&proven)?;
        if commitment != claim.commitment {
            warn!(
                "[btc-relay] {:?} witness data commits to {:?}, claim expects {:?}",
                claim.kind, commitment, claim.commitment
            );
            return Err(RelayError::InvalidCommitment(format!(
                "witness data commits to {commitment:?}, claim expects {:?}",
                claim.commitment
            )));
        }

        if !claim.kind.needs_bitcoin_proof() {
            return match witness_data {
                WitnessData::Htlc { secret } => Ok(secret.to_vec()),
                _ => Err(RelayError::InvalidClaim(format!(
                    "{:?} witness data carries no secret",
                    claim.kind
                ))),
            };
        }

        let (inclusion, confirmations) = witness_data
            .inclusion()
            .ok_or_else(|| RelayError::InvalidClaim("witness data has no inclusion".into()))?;
        let (txid, tx_section) = proven_tx(witness_data)?;

        let proof = self
            .bitcoin
            .get_merkle_proof(txid, inclusion.block_hash)
            .await?;

        let request = HeaderRequest {
            block_hash: inclusion.block_hash,
            block_height: inclusion.block_height,
            required_confirmations: confirmations,
        };
        let mut sync_txs = Vec::new();
        let resolved = self
            .orchestrator
            .resolve(signer, &[request], &mut sync_txs, synchronizer)
            .await?;
        let resolution = resolved.get(&inclusion.block_hash).ok_or_else(|| {
            RelayError::NotFound(format!("block {} not resolved", inclusion.block_hash))
        })?;
        let stored = resolution.stored_header();

        if !verify_merkle_proof(&txid.0, &proof, &stored.header.merkle_root) {
            return Err(RelayError::InvalidCommitment(format!(
                "merkle proof for {txid} does not match block {}",
                inclusion.block_hash
            )));
        }

        let mut witness = preimage;
        witness.extend_from_slice(&stored.serialize());
        witness.extend_from_slice(&proof.serialize());
        if claim.kind.carries_transaction() {
            let section = tx_section.ok_or_else(|| {
                RelayError::InvalidClaim(format!(
                    "{:?} witness data has no transaction",
                    claim.kind
                ))
            })?;
            witness.extend_from_slice(&section.vout.to_be_bytes());
            let mut len = [0u8; 32];
            len[24..].copy_from_slice(&(section.stripped.len() as u64).to_be_bytes());
            witness.extend_from_slice(&len);
            witness.extend_from_slice(&section.stripped);
        }

        if resolution.is_committed() {
            debug!("[btc-relay] Witness for {txid} uses committed header");
        } else {
            info!(
                "[btc-relay] Witness for {txid} depends on {} relay transactions",
                sync_txs.len()
            );
        }
        pending_txs.extend(sync_txs);
        Ok(witness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelaySyncConfig;
    use crate::domain::TxInclusion;
    use crate::test_utils::{payment_tx, RelayHarness, GENESIS_HEIGHT, SUBMITTER};
    use btc_relay_types::{keccak256, StoredHeader, STORED_HEADER_SIZE};
    use sha2::{Digest, Sha256};

    const SCRIPT: [u8; 4] = [0x00, 0x14, 0xca, 0xfe];

    fn output_claim(h: &RelayHarness, amount: u64, confirmations: u32) -> Claim {
        let data = ClaimData::Output {
            amount,
            script: SCRIPT.to_vec(),
            confirmations,
        };
        Claim {
            kind: ClaimKind::Output,
            commitment: h.verifier.get_commitment(&data).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_output_witness_after_sync() {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(50_000, SCRIPT.to_vec(), 0, u32::MAX);
        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());
        h.bitcoin.mine(5);

        let claim = output_claim(&h, 50_000, 6);
        let witness_data = WitnessData::Output {
            raw_tx: tx.serialize(),
            vout: 0,
            inclusion: TxInclusion {
                block_hash,
                block_height,
            },
            confirmations: 6,
        };
        let mut pending = Vec::new();
        let witness = h
            .verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, h.as_synchronizer())
            .await
            .unwrap();

        assert_eq!(pending.len(), 2);
        assert_eq!(keccak256(&witness[..56]), claim.commitment);

        let stored = StoredHeader::deserialize(&witness[56..56 + STORED_HEADER_SIZE]).unwrap();
        assert_eq!(stored.block_hash, block_hash);
        assert_eq!(stored.block_height, GENESIS_HEIGHT + 1);

        let stripped = tx.serialize_no_witness();
        let proof_end = 56 + STORED_HEADER_SIZE + 4 + 32 + 32;
        assert_eq!(&witness[proof_end..proof_end + 4], &[0, 0, 0, 0]);
        assert_eq!(&witness[witness.len() - stripped.len()..], stripped.as_slice());
        assert_eq!(witness.len(), proof_end + 4 + 32 + stripped.len());
    }

    #[tokio::test]
    async fn test_mismatched_amount_fails_before_io() {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(50_000, SCRIPT.to_vec(), 0, u32::MAX);
        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());

        let claim = output_claim(&h, 50_001, 1);
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
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_txid_witness_from_committed_header() {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(1_000, SCRIPT.to_vec(), 0, u32::MAX);
        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());
        h.bitcoin.mine(2);
        h.sync_and_send().await.unwrap();

        let data = ClaimData::TxId {
            txid: tx.txid(),
            confirmations: 3,
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
            confirmations: 3,
        };
        let mut pending = Vec::new();
        let witness = h
            .verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, None)
            .await
            .unwrap();

        assert!(pending.is_empty());
        assert_eq!(witness.len(), 56 + STORED_HEADER_SIZE + 4 + 32 + 32);
    }

    #[tokio::test]
    async fn test_unsynchronized_without_synchronizer() {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(1_000, SCRIPT.to_vec(), 0, u32::MAX);
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
        let err = h
            .verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Unsynchronized { .. }));
    }

    #[tokio::test]
    async fn test_nonced_output_commitment() {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let tx = payment_tx(7_500, SCRIPT.to_vec(), 500_000_010, 7);
        let (block_hash, block_height) = h.bitcoin.mine_with_tx(tx.clone());

        let data = ClaimData::NoncedOutput {
            nonce: 0xA00_0007,
            amount: 7_500,
            script: SCRIPT.to_vec(),
            confirmations: 1,
        };
        let claim = Claim {
            kind: ClaimKind::NoncedOutput,
            commitment: h.verifier.get_commitment(&data).unwrap(),
        };
        let witness_data = WitnessData::NoncedOutput {
            raw_tx: tx.serialize(),
            vout: 0,
            inclusion: TxInclusion {
                block_hash,
                block_height,
            },
            confirmations: 1,
        };
        let mut pending = Vec::new();
        let witness = h
            .verifier
            .get_witness(SUBMITTER, &claim, &witness_data, &mut pending, h.as_synchronizer())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(keccak256(&witness[..56]), claim.commitment);
    }

    #[tokio::test]
    async fn test_htlc_witness_is_secret() {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let secret = [0x11u8; 32];
        let claim = Claim {
            kind: ClaimKind::Htlc,
            commitment: H256::from_slice(&Sha256::digest(secret)),
        };
        let mut pending = Vec::new();
        let witness = h
            .verifier
            .get_witness(SUBMITTER, &claim, &WitnessData::Htlc { secret }, &mut pending, None)
            .await
            .unwrap();
        assert_eq!(witness, secret.to_vec());

        let wrong = WitnessData::Htlc { secret: [0x12; 32] };
        let err = h
            .verifier
            .get_witness(SUBMITTER, &claim, &wrong, &mut pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidCommitment(_)));
    }

    #[tokio::test]
    async fn test_kind_mismatch_rejected() {
        let h = RelayHarness::new(RelaySyncConfig::for_testing());
        let claim = Claim {
            kind: ClaimKind::TxId,
            commitment: H256::zero(),
        };
        let mut pending = Vec::new();
        let err = h
            .verifier
            .get_witness(
                SUBMITTER,
                &claim,
                &WitnessData::Htlc { secret: [0; 32] },
                &mut pending,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidClaim(_)));
        assert_eq!(h.verifier.relay_address(), crate::test_utils::RELAY_ADDRESS);
    }
}
