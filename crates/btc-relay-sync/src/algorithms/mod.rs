//! # Algorithms Module
//!
//! Pure relay algorithms: calldata codecs, trace walking, header replay and
//! merkle proofs.

pub mod call_trace;
pub mod calldata;
pub mod header_replay;
pub mod merkle_verifier;

pub use call_trace::{find_relay_payloads, RelayPayload};
pub use calldata::{
    decode_constructor_args, decode_header_payload, decode_submission, encode_constructor_args,
    encode_header_payload, encode_submission, selector, HeaderSubmission,
};
pub use header_replay::{replay_payload, replay_to_target, CommitTarget};
pub use merkle_verifier::{
    build_merkle_proof, compute_merkle_root, compute_root_from_proof, verify_merkle_proof,
};
