//! Per-round vote tally.

use alloy_primitives::Address;
use meridian_chain::{BlockId, Vote};
use std::collections::{HashMap, HashSet};

/// Derived finality state of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BftState {
    /// Count of justified rounds on the branch since activation.
    pub quality: u32,
    /// Whether the block's round has reached the vote quorum.
    pub justified: bool,
    /// First block of the round at which the COM quorum was reached, if the
    /// quorum formed within the round itself.
    pub committed_at: Option<BlockId>,
}

/// Vote tally for a single round of blocks.
///
/// Quorums count distinct signer addresses: a proposer sealing several
/// blocks in the round contributes one vote, and a proposer seen with both
/// WIT and COM counts once overall and once toward the COM quorum.
#[derive(Debug)]
pub(crate) struct Justifier {
    /// First block number of the round.
    pub(crate) checkpoint: u32,
    /// Distinct signers required for both quorums: 2/3 of the proposer set,
    /// rounded up, plus one.
    pub(crate) threshold: u64,
    prev_quality: u32,
    seen: HashSet<BlockId>,
    votes: HashMap<Address, Vote>,
    com_votes: u64,
    committed_at: Option<BlockId>,
}

impl Justifier {
    pub(crate) fn new(checkpoint: u32, max_block_proposers: u64, prev_quality: u32) -> Self {
        Self {
            checkpoint,
            threshold: (2 * max_block_proposers).div_ceil(3) + 1,
            prev_quality,
            seen: HashSet::new(),
            votes: HashMap::new(),
            com_votes: 0,
            committed_at: None,
        }
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.committed_at.is_some()
    }

    /// Tallies one block of the round. Blocks already seen are ignored.
    pub(crate) fn add_block(&mut self, id: BlockId, signer: Address, vote: Vote) {
        if !self.seen.insert(id) {
            return;
        }

        match self.votes.get(&signer) {
            None => {
                self.votes.insert(signer, vote);
                if vote == Vote::Com {
                    self.com_votes += 1;
                }
            }
            Some(Vote::Wit) if vote == Vote::Com => {
                // the signer witnessed earlier in the round; the COM supersedes
                self.votes.insert(signer, Vote::Com);
                self.com_votes += 1;
            }
            Some(_) => {}
        }

        if self.committed_at.is_none()
            && self.com_votes >= self.threshold
            && self.votes.len() as u64 >= self.threshold
        {
            self.committed_at = Some(id);
        }
    }

    /// Collapses the tally into the state of the round's newest block.
    ///
    /// The result depends only on the set of voters, never on the order the
    /// blocks were tallied in.
    pub(crate) fn summarize(&self) -> BftState {
        let justified = self.votes.len() as u64 >= self.threshold;
        BftState {
            quality: if justified {
                self.prev_quality + 1
            } else {
                self.prev_quality
            },
            justified,
            committed_at: self.committed_at,
        }
    }
}
