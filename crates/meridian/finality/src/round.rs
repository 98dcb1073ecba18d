//! Round boundary arithmetic.
//!
//! A round is the aligned block interval `[checkpoint, checkpoint +
//! CHECKPOINT_INTERVAL)`. These maps are the only place round boundaries are
//! defined.

use meridian_chain::constants::CHECKPOINT_INTERVAL;

/// First block number of the round containing `n`.
pub const fn checkpoint(n: u32) -> u32 {
    n / CHECKPOINT_INTERVAL * CHECKPOINT_INTERVAL
}

/// Whether `n` opens a round.
pub const fn is_checkpoint(n: u32) -> bool {
    checkpoint(n) == n
}

/// Last block number of the round containing `n`; the round's quality is
/// persisted once the chain covers this block.
pub const fn store_point(n: u32) -> u32 {
    checkpoint(n) + CHECKPOINT_INTERVAL - 1
}
