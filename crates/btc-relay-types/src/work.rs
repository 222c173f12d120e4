//! # Consensus Work
//!
//! Compact ("nBits") target expansion and per-block proof-of-work, matching
//! the arithmetic the relay contract performs on-chain.

use primitive_types::U256;

/// Expand a compact target.
///
/// Returns `None` for negative or overflowing encodings, which can never be
/// valid targets.
pub fn compact_to_target(nbits: u32) -> Option<U256> {
    let size = nbits >> 24;
    let mut word = nbits & 0x007f_ffff;

    if word != 0 && nbits & 0x0080_0000 != 0 {
        return None;
    }

    if word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32)) {
        return None;
    }

    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        U256::from(word)
    } else {
        U256::from(word) << (8 * (size - 3) as usize)
    };
    Some(target)
}

/// Work contributed by a single block: `2^256 / (target + 1)`.
///
/// Computed as `(!target / (target + 1)) + 1` so it fits in 256 bits.
/// Invalid or zero targets contribute no work.
pub fn block_work(nbits: u32) -> U256 {
    let target = match compact_to_target(nbits) {
        Some(target) if !target.is_zero() => target,
        _ => return U256::zero(),
    };
    let one = U256::one();
    (!target / (target + one)) + one
}
