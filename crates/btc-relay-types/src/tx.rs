//! # Bitcoin Transaction Codec
//!
//! Only what claim commitments need: outputs (amount + script), the first
//! input's sequence, the lock time and the txid. Script contents are never
//! interpreted.
//!
//! ## Wire Format
//!
//! | Field          | Size                         |
//! |----------------|------------------------------|
//! | version        | 4 bytes (LE)                 |
//! | marker, flag   | 2 bytes, segwit only (00 01) |
//! | input count    | CompactSize                  |
//! | inputs         | variable                     |
//! | output count   | CompactSize                  |
//! | outputs        | variable                     |
//! | witnesses      | segwit only, one per input   |
//! | lock_time      | 4 bytes (LE)                 |

use crate::errors::EncodingError;
use crate::hash::{sha256d, Txid};
use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// Transaction input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Txid of the spent output, raw byte order.
    pub prev_txid: Txid,
    /// Index of the spent output.
    pub prev_vout: u32,
    /// Unlocking script.
    pub script_sig: Vec<u8>,
    /// nSequence.
    pub sequence: u32,
    /// Witness stack; empty for legacy inputs.
    pub witness: Vec<Vec<u8>>,
}

/// Transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in satoshis.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
}

/// A parsed Bitcoin transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcTransaction {
    /// Transaction version.
    pub version: i32,
    /// Inputs.
    pub inputs: Vec<TxInput>,
    /// Outputs.
    pub outputs: Vec<TxOutput>,
    /// nLockTime.
    pub lock_time: u32,
}

impl BtcTransaction {
    /// Parse a transaction in either legacy or segwit encoding.
    ///
    /// # Errors
    /// - `UnexpectedEof` if the data is truncated
    /// - `Malformed` for trailing bytes or an unknown segwit flag
    pub fn parse(bytes: &[u8]) -> Result<Self, EncodingError> {
        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32_le("version")? as i32;

        let mut segwit = false;
        if reader.peek() == Some(0x00) {
            reader.read_u8("segwit marker")?;
            let flag = reader.read_u8("segwit flag")?;
            if flag != 0x01 {
                return Err(EncodingError::Malformed {
                    context: "transaction",
                    reason: format!("unknown segwit flag {flag:#04x}"),
                });
            }
            segwit = true;
        }

        let input_count = reader.read_compact_size("input count")?;
        let mut inputs = Vec::with_capacity(bounded_capacity(input_count));
        for _ in 0..input_count {
            let prev_txid = Txid(H256::from_slice(reader.read_bytes(32, "input txid")?));
            let prev_vout = reader.read_u32_le("input vout")?;
            let script_len = reader.read_compact_size("script_sig length")?;
            let script_sig = reader.read_bytes(script_len as usize, "script_sig")?.to_vec();
            let sequence = reader.read_u32_le("sequence")?;
            inputs.push(TxInput {
                prev_txid,
                prev_vout,
                script_sig,
                sequence,
                witness: Vec::new(),
            });
        }

        let output_count = reader.read_compact_size("output count")?;
        let mut outputs = Vec::with_capacity(bounded_capacity(output_count));
        for _ in 0..output_count {
            let value = reader.read_u64_le("output value")?;
            let script_len = reader.read_compact_size("script_pubkey length")?;
            let script_pubkey = reader
                .read_bytes(script_len as usize, "script_pubkey")?
                .to_vec();
            outputs.push(TxOutput {
                value,
                script_pubkey,
            });
        }

        if segwit {
            for input in inputs.iter_mut() {
                let items = reader.read_compact_size("witness item count")?;
                for _ in 0..items {
                    let len = reader.read_compact_size("witness item length")?;
                    input
                        .witness
                        .push(reader.read_bytes(len as usize, "witness item")?.to_vec());
                }
            }
        }

        let lock_time = reader.read_u32_le("lock_time")?;

        if reader.remaining() != 0 {
            return Err(EncodingError::Malformed {
                context: "transaction",
                reason: format!("{} trailing bytes", reader.remaining()),
            });
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Whether any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Legacy encoding without witness data; this is what the txid covers
    /// and what relay witnesses embed.
    pub fn serialize_no_witness(&self) -> Vec<u8> {
        self.encode(false)
    }

    /// Full encoding, including witness data when present.
    pub fn serialize(&self) -> Vec<u8> {
        self.encode(self.has_witness())
    }

    /// Transaction id, raw byte order.
    pub fn txid(&self) -> Txid {
        Txid(sha256d(&self.serialize_no_witness()))
    }

    fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.version as u32).to_le_bytes());
        if with_witness {
            out.extend_from_slice(&[0x00, 0x01]);
        }

        write_compact_size(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(input.prev_txid.as_bytes());
            out.extend_from_slice(&input.prev_vout.to_le_bytes());
            write_compact_size(&mut out, input.script_sig.len() as u64);
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut out, output.script_pubkey.len() as u64);
            out.extend_from_slice(&output.script_pubkey);
        }

        if with_witness {
            for input in &self.inputs {
                write_compact_size(&mut out, input.witness.len() as u64);
                for item in &input.witness {
                    write_compact_size(&mut out, item.len() as u64);
                    out.extend_from_slice(item);
                }
            }
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }
}

/// Cap pre-allocation so a hostile count cannot exhaust memory before the
/// reader runs out of bytes.
fn bounded_capacity(count: u64) -> usize {
    count.min(1024) as usize
}

/// Append a Bitcoin CompactSize integer.
pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], EncodingError> {
        if self.remaining() < n {
            return Err(EncodingError::UnexpectedEof { context });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self, context: &'static str) -> Result<u8, EncodingError> {
        Ok(self.read_bytes(1, context)?[0])
    }

    fn read_u32_le(&mut self, context: &'static str) -> Result<u32, EncodingError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_bytes(4, context)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&mut self, context: &'static str) -> Result<u64, EncodingError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8, context)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_compact_size(&mut self, context: &'static str) -> Result<u64, EncodingError> {
        match self.read_u8(context)? {
            0xfd => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(self.read_bytes(2, context)?);
                Ok(u16::from_le_bytes(buf) as u64)
            }
            0xfe => Ok(self.read_u32_le(context)? as u64),
            0xff => self.read_u64_le(context),
            n => Ok(n as u64),
        }
    }
}
