//! Chain-wide consensus constants.

/// Number of blocks in one finality round. Every round starts at a multiple
/// of this interval; the round's quality is persisted at its last block.
pub const CHECKPOINT_INTERVAL: u32 = 32;

/// Upper bound on the active proposer set. The on-chain parameter is clamped
/// to `(0, INITIAL_MAX_BLOCK_PROPOSERS]`, with zero mapping to this value.
pub const INITIAL_MAX_BLOCK_PROPOSERS: u64 = 101;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_is_power_of_two() {
        assert!(CHECKPOINT_INTERVAL.is_power_of_two());
    }
}
