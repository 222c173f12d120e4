//! # OP_RETURN Commitments
//!
//! Vault withdrawals carry their destination on the Bitcoin side as a single
//! OP_RETURN output. The payload has four accepted shapes:
//!
//! | Length | Fields                                              |
//! |--------|-----------------------------------------------------|
//! | 28     | recipient(20) ‖ amount0(8)                          |
//! | 36     | recipient(20) ‖ amount0(8) ‖ amount1(8)             |
//! | 60     | recipient(20) ‖ amount0(8) ‖ execution_hash(32)     |
//! | 68     | recipient(20) ‖ amount0(8) ‖ amount1(8) ‖ hash(32)  |
//!
//! Amounts are little-endian.

use crate::errors::EncodingError;
use primitive_types::{H160, H256};
use serde::{Deserialize, Serialize};

const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;

/// Decoded OP_RETURN payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpReturnCommitment {
    /// EVM recipient.
    pub recipient: H160,
    /// First token amount.
    pub amount0: u64,
    /// Second token amount, if present.
    pub amount1: Option<u64>,
    /// Hash of an execution action bound to the withdrawal, if present.
    pub execution_hash: Option<H256>,
}

impl OpReturnCommitment {
    /// Encode the raw payload (without the OP_RETURN opcode).
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(68);
        out.extend_from_slice(self.recipient.as_bytes());
        out.extend_from_slice(&self.amount0.to_le_bytes());
        if let Some(amount1) = self.amount1 {
            out.extend_from_slice(&amount1.to_le_bytes());
        }
        if let Some(hash) = self.execution_hash {
            out.extend_from_slice(hash.as_bytes());
        }
        out
    }

    /// Decode a raw payload.
    ///
    /// # Errors
    /// - `InvalidLength` for any length other than 28, 36, 60 or 68
    pub fn from_payload(payload: &[u8]) -> Result<Self, EncodingError> {
        let (has_amount1, has_hash) = match payload.len() {
            28 => (false, false),
            36 => (true, false),
            60 => (false, true),
            68 => (true, true),
            got => {
                return Err(EncodingError::InvalidLength {
                    context: "OP_RETURN payload",
                    got,
                })
            }
        };

        let recipient = H160::from_slice(&payload[..20]);
        let amount0 = read_u64_le(&payload[20..28]);
        let mut at = 28;
        let amount1 = if has_amount1 {
            at += 8;
            Some(read_u64_le(&payload[28..36]))
        } else {
            None
        };
        let execution_hash = has_hash.then(|| H256::from_slice(&payload[at..at + 32]));

        Ok(Self {
            recipient,
            amount0,
            amount1,
            execution_hash,
        })
    }

    /// Full output script: `OP_RETURN <push payload>`.
    pub fn to_script(&self) -> Vec<u8> {
        let payload = self.to_payload();
        let mut script = Vec::with_capacity(payload.len() + 2);
        script.push(OP_RETURN);
        // Every accepted payload fits a direct push (<= 75 bytes).
        script.push(payload.len() as u8);
        script.extend_from_slice(&payload);
        script
    }

    /// Decode from an output script.
    ///
    /// # Errors
    /// - `Malformed` if the script is not a single-push OP_RETURN
    /// - `InvalidLength` if the pushed payload has an unaccepted length
    pub fn from_script(script: &[u8]) -> Result<Self, EncodingError> {
        let malformed = |reason: &str| EncodingError::Malformed {
            context: "OP_RETURN script",
            reason: reason.to_string(),
        };

        let (&opcode, rest) = script.split_first().ok_or_else(|| malformed("empty script"))?;
        if opcode != OP_RETURN {
            return Err(malformed("missing OP_RETURN"));
        }

        let (&push, rest) = rest.split_first().ok_or_else(|| malformed("missing push"))?;
        let (len, data) = match push {
            1..=75 => (push as usize, rest),
            OP_PUSHDATA1 => {
                let (&len, data) = rest
                    .split_first()
                    .ok_or_else(|| malformed("missing PUSHDATA1 length"))?;
                (len as usize, data)
            }
            _ => return Err(malformed("unsupported push opcode")),
        };

        if data.len() != len {
            return Err(malformed("push length does not match script"));
        }
        Self::from_payload(data)
    }
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commitment(amount1: Option<u64>, hash: Option<H256>) -> OpReturnCommitment {
        OpReturnCommitment {
            recipient: H160::repeat_byte(0xab),
            amount0: 1_000,
            amount1,
            execution_hash: hash,
        }
    }

    #[test]
    fn test_payload_lengths() {
        let hash = Some(H256::repeat_byte(0x42));
        assert_eq!(commitment(None, None).to_payload().len(), 28);
        assert_eq!(commitment(Some(5), None).to_payload().len(), 36);
        assert_eq!(commitment(None, hash).to_payload().len(), 60);
        assert_eq!(commitment(Some(5), hash).to_payload().len(), 68);
    }

    #[test]
    fn test_script_roundtrip_all_shapes() {
        let hash = Some(H256::repeat_byte(0x42));
        for c in [
            commitment(None, None),
            commitment(Some(5), None),
            commitment(None, hash),
            commitment(Some(5), hash),
        ] {
            let script = c.to_script();
            assert_eq!(script[0], 0x6a);
            assert_eq!(OpReturnCommitment::from_script(&script).unwrap(), c);
        }
    }

    #[test]
    fn test_amounts_are_little_endian() {
        let payload = commitment(None, None).to_payload();
        assert_eq!(&payload[20..28], &1_000u64.to_le_bytes());
    }

    #[test]
    fn test_pushdata1_accepted() {
        let payload = commitment(Some(9), None).to_payload();
        let mut script = vec![0x6a, 0x4c, payload.len() as u8];
        script.extend_from_slice(&payload);
        assert_eq!(
            OpReturnCommitment::from_script(&script).unwrap().amount1,
            Some(9)
        );
    }

    #[test]
    fn test_rejects_bad_payload_length() {
        let err = OpReturnCommitment::from_payload(&[0u8; 29]).unwrap_err();
        assert!(matches!(err, EncodingError::InvalidLength { got: 29, .. }));
    }

    #[test]
    fn test_rejects_non_op_return() {
        let mut script = commitment(None, None).to_script();
        script[0] = 0x51;
        assert!(matches!(
            OpReturnCommitment::from_script(&script),
            Err(EncodingError::Malformed { .. })
        ));
    }
}
