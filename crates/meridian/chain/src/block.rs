//! Block identifiers, headers and the per-block finality vote.

use alloy_primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a block.
///
/// The first 4 bytes carry the block number big-endian, so the number of any
/// referenced block is recoverable without touching the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub B256);

impl BlockId {
    /// Block number encoded in the id.
    pub fn number(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl From<B256> for BlockId {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Finality vote carried in each block header from the activation block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    /// Witness: the proposer observed the round but does not endorse it.
    Wit,
    /// Commit: the proposer endorses the round's checkpoint.
    Com,
}

impl Vote {
    fn wire_byte(vote: Option<Vote>) -> u8 {
        match vote {
            None => 0,
            Some(Vote::Wit) => 1,
            Some(Vote::Com) => 2,
        }
    }
}

/// A block header, reduced to the fields consensus reads.
///
/// The id is derived from the header contents with the block number spliced
/// into the first 4 bytes; it is computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    parent_id: BlockId,
    number: u32,
    signer: Address,
    vote: Option<Vote>,
    state_root: B256,
    total_score: u64,
    id: BlockId,
}

impl Header {
    /// Builds a header and derives its id.
    pub fn new(
        parent_id: BlockId,
        number: u32,
        signer: Address,
        vote: Option<Vote>,
        state_root: B256,
        total_score: u64,
    ) -> Self {
        let mut data = Vec::with_capacity(97);
        data.extend_from_slice(parent_id.0.as_slice());
        data.extend_from_slice(&number.to_be_bytes());
        data.extend_from_slice(signer.as_slice());
        data.push(Vote::wire_byte(vote));
        data.extend_from_slice(state_root.as_slice());
        data.extend_from_slice(&total_score.to_be_bytes());

        let mut hash = keccak256(&data);
        hash[..4].copy_from_slice(&number.to_be_bytes());

        Self {
            parent_id,
            number,
            signer,
            vote,
            state_root,
            total_score,
            id: BlockId(hash),
        }
    }

    /// Id of this block.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Id of the parent block.
    pub fn parent_id(&self) -> BlockId {
        self.parent_id
    }

    /// Block number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Address of the proposer that signed the block.
    pub fn signer(&self) -> Address {
        self.signer
    }

    /// Finality vote, absent on blocks sealed before activation.
    pub fn vote(&self) -> Option<Vote> {
        self.vote
    }

    /// Root of the state this block executes into.
    pub fn state_root(&self) -> B256 {
        self.state_root
    }

    /// Cumulative proposer score of the branch up to this block.
    pub fn total_score(&self) -> u64 {
        self.total_score
    }

    /// Total ordering used to break ties between competing best blocks:
    /// the higher total score wins, equal scores fall back to the
    /// numerically smaller id.
    pub fn better_than(&self, other: &Header) -> bool {
        if self.total_score != other.total_score {
            return self.total_score > other.total_score;
        }
        self.id.0 < other.id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_encodes_number() {
        let header = Header::new(
            BlockId(B256::ZERO),
            0x0102_0304,
            Address::repeat_byte(1),
            Some(Vote::Com),
            B256::ZERO,
            7,
        );
        assert_eq!(header.id().number(), 0x0102_0304);
        assert_eq!(header.id().0[..4], [1, 2, 3, 4]);
    }

    #[test]
    fn test_id_is_deterministic() {
        let build = || {
            Header::new(
                BlockId(B256::repeat_byte(9)),
                42,
                Address::repeat_byte(2),
                Some(Vote::Wit),
                B256::repeat_byte(3),
                100,
            )
        };
        assert_eq!(build().id(), build().id());
    }

    #[test]
    fn test_vote_changes_id() {
        let with_vote = |vote| {
            Header::new(
                BlockId(B256::ZERO),
                5,
                Address::repeat_byte(1),
                vote,
                B256::ZERO,
                5,
            )
        };
        assert_ne!(with_vote(Some(Vote::Com)).id(), with_vote(Some(Vote::Wit)).id());
        assert_ne!(with_vote(Some(Vote::Wit)).id(), with_vote(None).id());
    }

    #[test]
    fn test_better_than_prefers_score_then_id() {
        let low = Header::new(
            BlockId(B256::ZERO),
            10,
            Address::repeat_byte(1),
            None,
            B256::ZERO,
            10,
        );
        let high = Header::new(
            BlockId(B256::ZERO),
            10,
            Address::repeat_byte(2),
            None,
            B256::ZERO,
            11,
        );
        assert!(high.better_than(&low));
        assert!(!low.better_than(&high));

        let a = Header::new(
            BlockId(B256::ZERO),
            10,
            Address::repeat_byte(3),
            None,
            B256::ZERO,
            10,
        );
        // equal scores: exactly one side wins, decided by id order
        assert_ne!(a.better_than(&low), low.better_than(&a));
        assert_eq!(a.better_than(&low), a.id().0 < low.id().0);
    }
}
