//! Capability traits over the block repository and state store.
//!
//! Consensus components take these as generic bounds so tests can inject
//! in-memory fakes in place of the real storage stack.

use crate::{BlockId, ChainError, Header};
use alloy_primitives::B256;

/// Read access to the append-only block repository.
///
/// A *branch* is identified by its tip id; all lookups that take a
/// `branch_tip` resolve along the parent chain of that tip, so competing
/// branches answer independently.
pub trait ChainReader: Send + Sync {
    /// Id of the genesis block.
    fn genesis_id(&self) -> BlockId;

    /// Header of the current best block.
    fn best_header(&self) -> Result<Header, ChainError>;

    /// Header stored under the given id.
    fn header(&self, id: BlockId) -> Result<Header, ChainError>;

    /// Id of the block at `number` on the branch ending at `branch_tip`.
    fn id_at_number(&self, branch_tip: BlockId, number: u32) -> Result<BlockId, ChainError>;

    /// Whether `ancestor` lies on the branch ending at `branch_tip`.
    fn has_ancestor(&self, branch_tip: BlockId, ancestor: BlockId) -> Result<bool, ChainError>;
}

/// Read access to chain state parameters.
pub trait StateReader: Send + Sync {
    /// Active max-block-proposers parameter at the given state root.
    fn max_block_proposers(&self, state_root: B256) -> Result<u64, ChainError>;
}
