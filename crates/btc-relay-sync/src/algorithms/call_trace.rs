//! # Call Trace Walking
//!
//! Finds the relay payloads inside a transaction trace. Relay writes are
//! often made through routers or multicall contracts, so the submission can
//! be any frame of the tree, and the relay's own deployment carries the
//! genesis stored header in its initcode.
//!
//! Traversal is iterative and depth-bounded; reverted frames are skipped
//! together with their subtrees since nothing they did was committed.

use super::calldata::{decode_constructor_args, decode_submission, HeaderSubmission};
use crate::domain::{CallFrame, CallKind};
use btc_relay_types::{StoredHeader, H160};

/// Relay payload recovered from a trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayPayload {
    /// Header batch submitted to the relay.
    Submission(HeaderSubmission),
    /// Genesis stored header from the relay constructor.
    Genesis(StoredHeader),
}

/// Collect relay payloads in execution order (pre-order DFS).
pub fn find_relay_payloads(root: &CallFrame, relay: H160, max_depth: usize) -> Vec<RelayPayload> {
    let mut found = Vec::new();
    let mut stack: Vec<(&CallFrame, usize)> = vec![(root, 0)];

    while let Some((frame, depth)) = stack.pop() {
        if frame.reverted {
            continue;
        }

        if frame.to == Some(relay) {
            let payload = match frame.kind {
                CallKind::Create => {
                    decode_constructor_args(&frame.input).map(RelayPayload::Genesis)
                }
                CallKind::Call => decode_submission(&frame.input).map(RelayPayload::Submission),
                // Static calls cannot write and delegate calls run foreign code.
                CallKind::StaticCall | CallKind::DelegateCall => None,
            };
            if let Some(payload) = payload {
                found.push(payload);
            }
        }

        if depth >= max_depth {
            if !frame.calls.is_empty() {
                tracing::debug!(
                    "[btc-relay] Trace depth limit {} reached, skipping {} subcalls",
                    max_depth,
                    frame.calls.len()
                );
            }
            continue;
        }
        for child in frame.calls.iter().rev() {
            stack.push((child, depth + 1));
        }
    }

    found
}
