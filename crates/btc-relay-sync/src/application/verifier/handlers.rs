//! # Claim Handlers
//!
//! One handler per claim kind. A handler knows how to serialize its
//! commitment preimage and how to derive claim data from witness data; the
//! verifier does all I/O.
//!
//! Bitcoin kinds end their preimage with a 24-byte suffix binding the claim
//! to one relay and one confirmation depth:
//!
//! ```text
//! confirmations(4B BE) ‖ relay_address(20B)
//! ```

use crate::domain::{extract_nonce, ClaimData, ClaimKind, RelayError, WitnessData};
use btc_relay_types::{keccak256, BtcTransaction, TxOutput, H160, H256};
use sha2::{Digest, Sha256};

/// Claim-kind specific commitment logic.
pub trait ClaimHandler: Send + Sync {
    /// Kind served by this handler.
    fn kind(&self) -> ClaimKind;

    /// Commitment preimage.
    fn serialize_commitment(&self, data: &ClaimData) -> Result<Vec<u8>, RelayError>;

    /// `keccak256` of the preimage.
    fn get_commitment(&self, data: &ClaimData) -> Result<H256, RelayError> {
        Ok(keccak256(&self.serialize_commitment(data)?))
    }

    /// Claim data the witness data actually proves.
    fn claim_data_from_witness(&self, witness: &WitnessData) -> Result<ClaimData, RelayError>;
}

/// Relay/confirmation binding appended to Bitcoin commitments.
pub fn bitcoin_suffix(confirmations: u32, relay_address: H160) -> [u8; 24] {
    let mut out = [0u8; 24];
    out[..4].copy_from_slice(&confirmations.to_be_bytes());
    out[4..].copy_from_slice(relay_address.as_bytes());
    out
}

fn wrong_kind(expected: ClaimKind, got: ClaimKind) -> RelayError {
    RelayError::InvalidClaim(format!("{expected:?} handler given {got:?} data"))
}

fn output_at(raw_tx: &[u8], vout: u32) -> Result<(BtcTransaction, TxOutput), RelayError> {
    let tx = BtcTransaction::parse(raw_tx)?;
    let output = tx
        .outputs
        .get(vout as usize)
        .cloned()
        .ok_or_else(|| {
            RelayError::InvalidClaim(format!(
                "vout {vout} out of range ({} outputs)",
                tx.outputs.len()
            ))
        })?;
    Ok((tx, output))
}

/// Txid claims.
pub struct TxIdHandler {
    relay_address: H160,
}

impl TxIdHandler {
    /// Handler bound to `relay_address`.
    pub fn new(relay_address: H160) -> Self {
        Self { relay_address }
    }
}

impl ClaimHandler for TxIdHandler {
    fn kind(&self) -> ClaimKind {
        ClaimKind::TxId
    }

    fn serialize_commitment(&self, data: &ClaimData) -> Result<Vec<u8>, RelayError> {
        let ClaimData::TxId {
            txid,
            confirmations,
        } = data
        else {
            return Err(wrong_kind(self.kind(), data.kind()));
        };
        let mut out = Vec::with_capacity(56);
        out.extend_from_slice(txid.as_bytes());
        out.extend_from_slice(&bitcoin_suffix(*confirmations, self.relay_address));
        Ok(out)
    }

    fn claim_data_from_witness(&self, witness: &WitnessData) -> Result<ClaimData, RelayError> {
        match witness {
            WitnessData::TxId {
                txid,
                confirmations,
                ..
            } => Ok(ClaimData::TxId {
                txid: *txid,
                confirmations: *confirmations,
            }),
            other => Err(wrong_kind(self.kind(), other.kind())),
        }
    }
}

/// Output claims: an amount paid to a script.
pub struct OutputHandler {
    relay_address: H160,
}

impl OutputHandler {
    /// Handler bound to `relay_address`.
    pub fn new(relay_address: H160) -> Self {
        Self { relay_address }
    }
}

impl ClaimHandler for OutputHandler {
    fn kind(&self) -> ClaimKind {
        ClaimKind::Output
    }

    fn serialize_commitment(&self, data: &ClaimData) -> Result<Vec<u8>, RelayError> {
        let ClaimData::Output {
            amount,
            script,
            confirmations,
        } = data
        else {
            return Err(wrong_kind(self.kind(), data.kind()));
        };
        let mut inner = Vec::with_capacity(8 + script.len());
        inner.extend_from_slice(&amount.to_le_bytes());
        inner.extend_from_slice(script);

        let mut out = Vec::with_capacity(56);
        out.extend_from_slice(keccak256(&inner).as_bytes());
        out.extend_from_slice(&bitcoin_suffix(*confirmations, self.relay_address));
        Ok(out)
    }

    fn claim_data_from_witness(&self, witness: &WitnessData) -> Result<ClaimData, RelayError> {
        let WitnessData::Output {
            raw_tx,
            vout,
            confirmations,
            ..
        } = witness
        else {
            return Err(wrong_kind(self.kind(), witness.kind()));
        };
        let (_, output) = output_at(raw_tx, *vout)?;
        Ok(ClaimData::Output {
            amount: output.value,
            script: output.script_pubkey,
            confirmations: *confirmations,
        })
    }
}

/// Nonced output claims: an output plus a nonce carried by the funding
/// transaction's lock time and first input sequence.
pub struct NoncedOutputHandler {
    relay_address: H160,
}

impl NoncedOutputHandler {
    /// Handler bound to `relay_address`.
    pub fn new(relay_address: H160) -> Self {
        Self { relay_address }
    }
}

impl ClaimHandler for NoncedOutputHandler {
    fn kind(&self) -> ClaimKind {
        ClaimKind::NoncedOutput
    }

    fn serialize_commitment(&self, data: &ClaimData) -> Result<Vec<u8>, RelayError> {
        let ClaimData::NoncedOutput {
            nonce,
            amount,
            script,
            confirmations,
        } = data
        else {
            return Err(wrong_kind(self.kind(), data.kind()));
        };
        let mut inner = Vec::with_capacity(16 + script.len());
        inner.extend_from_slice(&nonce.to_be_bytes());
        inner.extend_from_slice(&amount.to_le_bytes());
        inner.extend_from_slice(script);

        let mut out = Vec::with_capacity(56);
        out.extend_from_slice(keccak256(&inner).as_bytes());
        out.extend_from_slice(&bitcoin_suffix(*confirmations, self.relay_address));
        Ok(out)
    }

    fn claim_data_from_witness(&self, witness: &WitnessData) -> Result<ClaimData, RelayError> {
        let WitnessData::NoncedOutput {
            raw_tx,
            vout,
            confirmations,
            ..
        } = witness
        else {
            return Err(wrong_kind(self.kind(), witness.kind()));
        };
        let (tx, output) = output_at(raw_tx, *vout)?;
        Ok(ClaimData::NoncedOutput {
            nonce: extract_nonce(&tx)?,
            amount: output.value,
            script: output.script_pubkey,
            confirmations: *confirmations,
        })
    }
}

/// Hash-lock claims. Not bound to the relay.
#[derive(Default)]
pub struct HtlcHandler;

impl ClaimHandler for HtlcHandler {
    fn kind(&self) -> ClaimKind {
        ClaimKind::Htlc
    }

    fn serialize_commitment(&self, data: &ClaimData) -> Result<Vec<u8>, RelayError> {
        match data {
            ClaimData::Htlc { payment_hash } => Ok(payment_hash.as_bytes().to_vec()),
            other => Err(wrong_kind(self.kind(), other.kind())),
        }
    }

    /// The payment hash itself; the hash-lock contract checks
    /// `sha256(secret)` against it directly.
    fn get_commitment(&self, data: &ClaimData) -> Result<H256, RelayError> {
        match data {
            ClaimData::Htlc { payment_hash } => Ok(*payment_hash),
            other => Err(wrong_kind(self.kind(), other.kind())),
        }
    }

    fn claim_data_from_witness(&self, witness: &WitnessData) -> Result<ClaimData, RelayError> {
        match witness {
            WitnessData::Htlc { secret } => Ok(ClaimData::Htlc {
                payment_hash: H256::from_slice(&Sha256::digest(secret)),
            }),
            other => Err(wrong_kind(self.kind(), other.kind())),
        }
    }
}
