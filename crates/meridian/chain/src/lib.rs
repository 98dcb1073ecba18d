//! Block primitives and chain access traits for the Meridian network.
//!
//! This crate defines the narrow world the consensus layer sees: block
//! identifiers and headers, the chain-wide constants, the fork schedule, and
//! the capability traits ([`ChainReader`], [`StateReader`]) behind which the
//! block repository and state store live. An in-memory implementation
//! ([`mem::MemoryChain`]) backs the consensus test suites.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod block;
pub mod config;
pub mod constants;
pub mod mem;
pub mod provider;

pub use block::{BlockId, Header, Vote};
pub use config::ForkConfig;
pub use provider::{ChainReader, StateReader};

use alloy_primitives::B256;
use thiserror::Error;

/// Errors from the block repository and state access.
#[derive(Debug, Error)]
pub enum ChainError {
    /// No header is stored under the given id.
    #[error("header {0} not found")]
    HeaderNotFound(BlockId),

    /// The branch does not reach the requested block number.
    #[error("no block at number {number} on branch {tip}")]
    BlockNotOnBranch {
        /// Head of the branch that was walked.
        tip: BlockId,
        /// Number that was asked for.
        number: u32,
    },

    /// State for the given root cannot be opened.
    #[error("state unavailable for root {0}")]
    StateUnavailable(B256),
}
