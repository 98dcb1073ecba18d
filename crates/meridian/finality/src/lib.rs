//! BFT finality engine for the Meridian proof-of-authority chain.
//!
//! The chain grows by longest-chain proof-of-authority; this crate grafts a
//! two-phase justified/committed progression on top of it. Blocks are grouped
//! into fixed-size *rounds*; each header carries a COM or WIT vote, and once
//! a 2/3+1 quorum of distinct proposers has voted inside a round the round is
//! *justified*, raising the branch's *quality*. A COM quorum reached within
//! the round itself *commits* it, which advances a durable finalized
//! checkpoint that no competing branch can ever displace.
//!
//! The engine consumes the block repository and state store through the
//! narrow traits in [`meridian_chain`] and persists only the finalized
//! pointer and one quality value per round. Everything else is recomputed on
//! demand and cached.
//!
//! # Engine operations
//!
//! - [`FinalityEngine::finalized`] — current finalized checkpoint.
//! - [`FinalityEngine::accepts`] — gate keeping new blocks on the finalized
//!   branch.
//! - [`FinalityEngine::select`] — arbitration between candidate best blocks.
//! - [`FinalityEngine::commit_block`] — per-imported-block bookkeeping and
//!   finalized advancement.
//! - [`FinalityEngine::get_vote`] — the vote the local packer must embed,
//!   with equivocation protection.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod casts;
mod engine;
mod justifier;
mod prio;
pub mod round;
pub mod storage;

pub use engine::FinalityEngine;
pub use justifier::BftState;
pub use storage::{KvStore, MemoryStore, StoreError};

use meridian_chain::{BlockId, ChainError};
use thiserror::Error;

/// Errors surfaced by the finality engine.
#[derive(Debug, Error)]
pub enum FinalityError {
    /// No checkpoint on the branch has reached the requested quality.
    #[error("no checkpoint with quality {target} on branch {tip}")]
    CheckpointNotFound {
        /// Quality that was searched for.
        target: u32,
        /// Branch that was searched.
        tip: BlockId,
    },

    /// A quality value the algorithm depends on was never stored.
    #[error("quality for block {0} is not stored")]
    QualityNotFound(BlockId),

    /// A stored quality contradicts the monotone search invariant. This is
    /// never recovered; it indicates a pathological fork or corrupt storage.
    #[error("checkpoint {id} holds quality {found}, expected {expected}")]
    QualityMismatch {
        /// Store point whose quality was read.
        id: BlockId,
        /// Quality the search required.
        expected: u32,
        /// Quality actually stored.
        found: u32,
    },

    /// A persisted value failed to decode.
    #[error("corrupted value under key {key}")]
    CorruptedValue {
        /// Printable form of the offending key.
        key: String,
    },

    /// Block repository or state store failure, propagated unchanged.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Key-value backend failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}
