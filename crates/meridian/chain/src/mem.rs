//! In-memory chain, used as the repository fake in consensus tests and by
//! local tooling that needs a chain without a database.

use crate::{BlockId, ChainError, ChainReader, Header, StateReader, Vote};
use alloy_primitives::{Address, B256};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Append-only in-memory block repository with branch support.
///
/// Blocks are indexed by id; branch-relative lookups walk parent links, so
/// any number of competing branches can coexist. The best tip is whatever
/// [`MemoryChain::set_best`] last selected.
#[derive(Debug)]
pub struct MemoryChain {
    blocks: RwLock<HashMap<BlockId, Header>>,
    best: RwLock<BlockId>,
    genesis: BlockId,
}

impl MemoryChain {
    /// Creates a chain holding only the genesis block.
    pub fn new() -> Self {
        let genesis = Header::new(BlockId(B256::ZERO), 0, Address::ZERO, None, B256::ZERO, 0);
        let genesis_id = genesis.id();
        let mut blocks = HashMap::new();
        blocks.insert(genesis_id, genesis);
        Self {
            blocks: RwLock::new(blocks),
            best: RwLock::new(genesis_id),
            genesis: genesis_id,
        }
    }

    /// Appends a child of `parent`, scoring it one above the parent.
    pub fn append(
        &self,
        parent: BlockId,
        signer: Address,
        vote: Option<Vote>,
    ) -> Result<BlockId, ChainError> {
        let score = self.header(parent)?.total_score() + 1;
        self.append_scored(parent, signer, vote, score)
    }

    /// Appends a child of `parent` with an explicit total score.
    pub fn append_scored(
        &self,
        parent: BlockId,
        signer: Address,
        vote: Option<Vote>,
        total_score: u64,
    ) -> Result<BlockId, ChainError> {
        let number = self.header(parent)?.number() + 1;
        let header = Header::new(parent, number, signer, vote, B256::ZERO, total_score);
        let id = header.id();
        self.blocks.write().insert(id, header);
        Ok(id)
    }

    /// Selects the best tip.
    pub fn set_best(&self, id: BlockId) {
        *self.best.write() = id;
    }
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainReader for MemoryChain {
    fn genesis_id(&self) -> BlockId {
        self.genesis
    }

    fn best_header(&self) -> Result<Header, ChainError> {
        let best = *self.best.read();
        self.header(best)
    }

    fn header(&self, id: BlockId) -> Result<Header, ChainError> {
        self.blocks
            .read()
            .get(&id)
            .cloned()
            .ok_or(ChainError::HeaderNotFound(id))
    }

    fn id_at_number(&self, branch_tip: BlockId, number: u32) -> Result<BlockId, ChainError> {
        if number > branch_tip.number() {
            return Err(ChainError::BlockNotOnBranch {
                tip: branch_tip,
                number,
            });
        }
        let blocks = self.blocks.read();
        let mut current = branch_tip;
        while current.number() > number {
            let header = blocks
                .get(&current)
                .ok_or(ChainError::HeaderNotFound(current))?;
            current = header.parent_id();
        }
        Ok(current)
    }

    fn has_ancestor(&self, branch_tip: BlockId, ancestor: BlockId) -> Result<bool, ChainError> {
        if ancestor.number() > branch_tip.number() {
            return Ok(false);
        }
        Ok(self.id_at_number(branch_tip, ancestor.number())? == ancestor)
    }
}

/// State reader answering the proposer-count query with a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct FixedState(pub u64);

impl StateReader for FixedState {
    fn max_block_proposers(&self, _state_root: B256) -> Result<u64, ChainError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(i: u8) -> Address {
        Address::repeat_byte(i)
    }

    #[test]
    fn test_append_tracks_numbers() {
        let chain = MemoryChain::new();
        let b1 = chain.append(chain.genesis_id(), signer(1), None).unwrap();
        let b2 = chain.append(b1, signer(2), Some(Vote::Com)).unwrap();

        assert_eq!(b1.number(), 1);
        assert_eq!(b2.number(), 2);
        assert_eq!(chain.header(b2).unwrap().parent_id(), b1);
        assert_eq!(chain.header(b2).unwrap().total_score(), 2);
    }

    #[test]
    fn test_id_at_number_walks_the_right_branch() {
        let chain = MemoryChain::new();
        let trunk = chain.append(chain.genesis_id(), signer(1), None).unwrap();
        let a = chain.append(trunk, signer(2), None).unwrap();
        let b = chain.append(trunk, signer(3), None).unwrap();

        assert_ne!(a, b);
        assert_eq!(chain.id_at_number(a, 2).unwrap(), a);
        assert_eq!(chain.id_at_number(b, 2).unwrap(), b);
        assert_eq!(chain.id_at_number(a, 1).unwrap(), trunk);
        assert_eq!(chain.id_at_number(b, 1).unwrap(), trunk);
    }

    #[test]
    fn test_id_at_number_rejects_future_numbers() {
        let chain = MemoryChain::new();
        let b1 = chain.append(chain.genesis_id(), signer(1), None).unwrap();
        assert!(matches!(
            chain.id_at_number(b1, 5),
            Err(ChainError::BlockNotOnBranch { number: 5, .. })
        ));
    }

    #[test]
    fn test_has_ancestor() {
        let chain = MemoryChain::new();
        let trunk = chain.append(chain.genesis_id(), signer(1), None).unwrap();
        let a = chain.append(trunk, signer(2), None).unwrap();
        let b = chain.append(trunk, signer(3), None).unwrap();

        assert!(chain.has_ancestor(a, trunk).unwrap());
        assert!(chain.has_ancestor(a, chain.genesis_id()).unwrap());
        assert!(!chain.has_ancestor(a, b).unwrap());
        // an ancestor above the tip can never be on the branch
        assert!(!chain.has_ancestor(trunk, a).unwrap());
    }

    #[test]
    fn test_best_follows_selection() {
        let chain = MemoryChain::new();
        let b1 = chain.append(chain.genesis_id(), signer(1), None).unwrap();
        assert_eq!(chain.best_header().unwrap().id(), chain.genesis_id());
        chain.set_best(b1);
        assert_eq!(chain.best_header().unwrap().id(), b1);
    }
}
