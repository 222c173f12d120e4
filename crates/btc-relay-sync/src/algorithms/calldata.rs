//! # Relay Calldata
//!
//! ABI encoding of the three header submission functions and of the relay
//! constructor arguments, plus the inverse decoders used when replaying
//! call traces.
//!
//! Every submission carries the same payload:
//!
//! ```text
//! stored_header(160) ‖ compact(h_1)(48) ‖ ... ‖ compact(h_n)(48)
//! ```

use btc_relay_types::{
    BtcHeader, EncodingError, StoredHeader, COMPACT_HEADER_SIZE, STORED_HEADER_SIZE, U256,
};
use sha3::{Digest, Keccak256};

use crate::domain::{ForkId, RelayError, MAX_FORK_ID};

/// `submitMainBlockheaders(bytes)`
pub const SUBMIT_MAIN_SIGNATURE: &str = "submitMainBlockheaders(bytes)";
/// `submitShortForkBlockheaders(bytes)`
pub const SUBMIT_SHORT_FORK_SIGNATURE: &str = "submitShortForkBlockheaders(bytes)";
/// `submitForkBlockheaders(uint256,bytes)`
pub const SUBMIT_FORK_SIGNATURE: &str = "submitForkBlockheaders(uint256,bytes)";

const WORD: usize = 32;

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// A header batch decoded from calldata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderSubmission {
    /// Designation the call targeted.
    pub fork_id: ForkId,
    /// Leading, already-committed stored header.
    pub from: StoredHeader,
    /// Compact headers (parent hashes zeroed).
    pub headers: Vec<BtcHeader>,
}

/// Build the submission payload.
pub fn encode_header_payload(from: &StoredHeader, headers: &[BtcHeader]) -> Vec<u8> {
    let mut out = Vec::with_capacity(STORED_HEADER_SIZE + headers.len() * COMPACT_HEADER_SIZE);
    out.extend_from_slice(&from.serialize());
    for header in headers {
        out.extend_from_slice(&header.serialize_compact());
    }
    out
}

/// Split a submission payload.
///
/// # Errors
/// - `InvalidLength` unless the payload is 160 bytes plus a multiple of 48
pub fn decode_header_payload(
    payload: &[u8],
) -> Result<(StoredHeader, Vec<BtcHeader>), EncodingError> {
    if payload.len() < STORED_HEADER_SIZE
        || (payload.len() - STORED_HEADER_SIZE) % COMPACT_HEADER_SIZE != 0
    {
        return Err(EncodingError::InvalidLength {
            context: "header submission payload",
            got: payload.len(),
        });
    }
    let from = StoredHeader::deserialize(&payload[..STORED_HEADER_SIZE])?;
    let headers = payload[STORED_HEADER_SIZE..]
        .chunks(COMPACT_HEADER_SIZE)
        .map(BtcHeader::deserialize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((from, headers))
}

/// Calldata for a submission with the given designation.
///
/// # Errors
/// - `InvalidClaim` for a long fork id of zero or wider than 48 bits
pub fn encode_submission(
    fork_id: ForkId,
    from: &StoredHeader,
    headers: &[BtcHeader],
) -> Result<Vec<u8>, RelayError> {
    let payload = encode_header_payload(from, headers);
    let mut out = Vec::with_capacity(4 + 3 * WORD + payload.len() + WORD);
    match fork_id {
        ForkId::Main => {
            out.extend_from_slice(&selector(SUBMIT_MAIN_SIGNATURE));
            out.extend_from_slice(&u256_word(U256::from(WORD)));
        }
        ForkId::ShortFork => {
            out.extend_from_slice(&selector(SUBMIT_SHORT_FORK_SIGNATURE));
            out.extend_from_slice(&u256_word(U256::from(WORD)));
        }
        ForkId::LongFork(id) => {
            if id == 0 || id > MAX_FORK_ID {
                return Err(RelayError::InvalidClaim(format!("fork id {id} out of range")));
            }
            out.extend_from_slice(&selector(SUBMIT_FORK_SIGNATURE));
            out.extend_from_slice(&u256_word(U256::from(id)));
            out.extend_from_slice(&u256_word(U256::from(2 * WORD)));
        }
    }
    append_bytes(&mut out, &payload);
    Ok(out)
}

/// Decode submission calldata. Returns `None` for calls to other functions
/// or calldata that is not a well-formed submission.
pub fn decode_submission(input: &[u8]) -> Option<HeaderSubmission> {
    if input.len() < 4 {
        return None;
    }
    let (sel, args) = input.split_at(4);

    let (fork_id, payload) = if sel == selector(SUBMIT_MAIN_SIGNATURE) {
        (ForkId::Main, read_bytes_arg(args, 0)?)
    } else if sel == selector(SUBMIT_SHORT_FORK_SIGNATURE) {
        (ForkId::ShortFork, read_bytes_arg(args, 0)?)
    } else if sel == selector(SUBMIT_FORK_SIGNATURE) {
        let id = read_word(args, 0)?;
        if id.is_zero() || id > U256::from(MAX_FORK_ID) {
            return None;
        }
        (ForkId::LongFork(id.low_u64()), read_bytes_arg(args, 1)?)
    } else {
        return None;
    };

    let (from, headers) = decode_header_payload(payload).ok()?;
    Some(HeaderSubmission {
        fork_id,
        from,
        headers,
    })
}

/// ABI-encoded constructor arguments: `(bytes genesis_stored_header)`.
pub fn encode_constructor_args(genesis: &StoredHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 * WORD + STORED_HEADER_SIZE);
    out.extend_from_slice(&u256_word(U256::from(WORD)));
    append_bytes(&mut out, &genesis.serialize());
    out
}

/// Recover the genesis stored header from relay initcode.
///
/// The constructor arguments sit at the very end of the initcode, so the
/// tail must be `0x20 ‖ 160 ‖ stored_header(160)`.
pub fn decode_constructor_args(initcode: &[u8]) -> Option<StoredHeader> {
    let tail_len = 2 * WORD + STORED_HEADER_SIZE;
    if initcode.len() < tail_len {
        return None;
    }
    let tail = &initcode[initcode.len() - tail_len..];
    if read_word(tail, 0)? != U256::from(WORD)
        || read_word(tail, 1)? != U256::from(STORED_HEADER_SIZE)
    {
        return None;
    }
    StoredHeader::deserialize(&tail[2 * WORD..]).ok()
}

/// Encode a `U256` as a 32-byte big-endian word.
pub fn u256_word(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn append_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&u256_word(U256::from(data.len())));
    out.extend_from_slice(data);
    let pad = (WORD - data.len() % WORD) % WORD;
    out.resize(out.len() + pad, 0);
}

fn read_word(args: &[u8], index: usize) -> Option<U256> {
    let start = index.checked_mul(WORD)?;
    let word = args.get(start..start.checked_add(WORD)?)?;
    Some(U256::from_big_endian(word))
}

/// Resolve a dynamic `bytes` argument whose head is at word `index`.
fn read_bytes_arg(args: &[u8], index: usize) -> Option<&[u8]> {
    let offset = read_word(args, index)?;
    if offset > U256::from(args.len()) {
        return None;
    }
    let offset = offset.low_u64() as usize;
    let len = read_word(args.get(offset..)?, 0)?;
    if len > U256::from(args.len()) {
        return None;
    }
    let start = offset + WORD;
    args.get(start..start.checked_add(len.low_u64() as usize)?)
}
