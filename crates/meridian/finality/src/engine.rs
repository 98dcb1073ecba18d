//! The finality engine.
//!
//! One engine instance is shared by the block-import serializer (the only
//! caller of [`FinalityEngine::commit_block`]), the packer (the only caller
//! of [`FinalityEngine::get_vote`], serialized with import on the consensus
//! loop) and any number of reader threads using the remaining operations.

use std::num::NonZeroUsize;
use std::sync::Arc;

use alloy_primitives::Address;
use arc_swap::ArcSwap;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, info};

use meridian_chain::{
    constants::{CHECKPOINT_INTERVAL, INITIAL_MAX_BLOCK_PROPOSERS},
    BlockId, ChainReader, ForkConfig, Header, StateReader, Vote,
};

use crate::{
    casts::Casts,
    justifier::{BftState, Justifier},
    prio::PrioCache,
    round::{checkpoint, is_checkpoint, store_point},
    storage::{load_finalized, load_quality, save_finalized, save_quality, KvStore},
    FinalityError,
};

const STATE_CACHE_SIZE: usize = 1024;
const QUALITY_CACHE_SIZE: usize = 1024;
const MBP_CACHE_SIZE: usize = 8;
const JUSTIFIER_CACHE_SIZE: usize = 16;

/// Tracks the votes carried by blocks and advances the finalized checkpoint.
///
/// The engine persists exactly two things through its [`KvStore`]: the
/// finalized pointer and one quality value per round. Everything else is
/// derived from headers on demand; the caches only amortise the derivation.
pub struct FinalityEngine<C, S, K> {
    chain: Arc<C>,
    state: Arc<S>,
    data: K,
    fork: ForkConfig,
    master: Address,
    finalized: ArcSwap<BlockId>,
    casts: Mutex<Option<Casts>>,
    state_cache: Mutex<LruCache<BlockId, BftState>>,
    quality_cache: Mutex<LruCache<BlockId, u32>>,
    mbp_cache: Mutex<LruCache<BlockId, u64>>,
    justifiers: Mutex<PrioCache>,
}

impl<C, S, K> FinalityEngine<C, S, K>
where
    C: ChainReader,
    S: StateReader,
    K: KvStore,
{
    /// Creates an engine, restoring the finalized pointer from storage or
    /// starting from genesis.
    pub fn new(
        chain: Arc<C>,
        state: Arc<S>,
        data: K,
        fork: ForkConfig,
        master: Address,
    ) -> Result<Self, FinalityError> {
        let finalized = load_finalized(&data)?.unwrap_or_else(|| chain.genesis_id());

        Ok(Self {
            chain,
            state,
            data,
            fork,
            master,
            finalized: ArcSwap::from_pointee(finalized),
            casts: Mutex::new(None),
            state_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(STATE_CACHE_SIZE).expect("cache size is nonzero"),
            )),
            quality_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUALITY_CACHE_SIZE).expect("cache size is nonzero"),
            )),
            mbp_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(MBP_CACHE_SIZE).expect("cache size is nonzero"),
            )),
            justifiers: Mutex::new(PrioCache::new(JUSTIFIER_CACHE_SIZE)),
        })
    }

    /// Current finalized checkpoint. Lock-free.
    pub fn finalized(&self) -> BlockId {
        **self.finalized.load()
    }

    /// Whether a child of `parent_id` would stay on the finalized branch.
    pub fn accepts(&self, parent_id: BlockId) -> Result<bool, FinalityError> {
        let finalized = self.finalized();
        if finalized.number() != 0 && !self.chain.has_ancestor(parent_id, finalized)? {
            return Ok(false);
        }
        Ok(true)
    }

    /// Arbitrates between a candidate best block and the current best;
    /// true means the candidate wins.
    pub fn select(&self, header: &Header) -> Result<bool, FinalityError> {
        let candidate = self.compute_state(header)?;
        let best = self.chain.best_header()?;
        let current = self.compute_state(&best)?;

        if candidate.quality != current.quality {
            return Ok(candidate.quality > current.quality);
        }
        Ok(header.better_than(&best))
    }

    /// Folds an imported block into the engine.
    ///
    /// Persists the round quality at store points, advances the finalized
    /// pointer when the block commits its round, and, when the block was
    /// packed locally, records the COM in the casts ledger. The quality
    /// write happens before the finalized write, which happens before the
    /// in-memory pointer moves; a failed finalized write therefore leaves
    /// the pointer where it was and the call can simply be retried.
    pub fn commit_block(&self, header: &Header, is_packing: bool) -> Result<(), FinalityError> {
        let state = self.compute_state(header)?;
        let number = header.number();

        if store_point(number) == number {
            save_quality(&self.data, header.id(), state.quality)?;
            self.quality_cache.lock().put(header.id(), state.quality);
            debug!(
                target: "meridian::finality",
                id = %header.id(),
                quality = state.quality,
                "round quality stored"
            );
        }

        if state.committed_at == Some(header.id()) && state.quality > 1 {
            let id =
                self.find_checkpoint_by_quality(state.quality - 1, self.finalized(), header.id())?;
            save_finalized(&self.data, id)?;
            self.finalized.store(Arc::new(id));
            info!(
                target: "meridian::finality",
                finalized = %id,
                number = id.number(),
                "finalized checkpoint advanced"
            );
        }

        if is_packing {
            let checkpoint_id = self.chain.id_at_number(header.id(), checkpoint(number))?;
            self.casts
                .lock()
                .get_or_insert_with(Casts::default)
                .mark(checkpoint_id, state.quality);
        }

        Ok(())
    }

    /// Vote the local packer must embed in the child of `parent_id`.
    ///
    /// COM, unless committing would conflict with a COM this node already
    /// packed for a checkpoint off the current branch at the same or
    /// adjacent quality; then WIT.
    pub fn get_vote(&self, parent_id: BlockId) -> Result<Vote, FinalityError> {
        let mut guard = self.casts.lock();
        let casts = match &mut *guard {
            Some(casts) => casts,
            vacant => vacant.get_or_insert(self.rebuild_casts()?),
        };

        let parent = self.chain.header(parent_id)?;
        let state = self.compute_state(&parent)?;
        if state.quality == 0 {
            return Ok(Vote::Com);
        }

        let finalized = self.finalized();
        let quality = state.quality;

        // most recent justified checkpoint of the parent's branch
        let recent_jc = if state.justified {
            self.chain
                .id_at_number(parent_id, checkpoint(parent.number()))?
        } else {
            self.find_checkpoint_by_quality(quality, finalized, parent_id)?
        };

        for cast in casts.slice(finalized) {
            let (upper, lower) = if cast.checkpoint.number() > recent_jc.number() {
                (cast.checkpoint, recent_jc)
            } else {
                (recent_jc, cast.checkpoint)
            };

            if !self.chain.has_ancestor(upper, lower)? && cast.quality >= quality - 1 {
                debug!(
                    target: "meridian::finality",
                    cast = %cast.checkpoint,
                    cast_quality = cast.quality,
                    recent_jc = %recent_jc,
                    "past COM conflicts with this branch, voting WIT"
                );
                return Ok(Vote::Wit);
            }
        }

        Ok(Vote::Com)
    }

    /// Derives the BFT state of `header`, reusing the parent's live round
    /// tally when one is cached.
    fn compute_state(&self, header: &Header) -> Result<BftState, FinalityError> {
        if let Some(state) = self.state_cache.lock().get(&header.id()).cloned() {
            return Ok(state);
        }

        if header.number() == 0 || header.number() < self.fork.finality {
            let state = BftState::default();
            self.state_cache.lock().put(header.id(), state.clone());
            return Ok(state);
        }

        // the parent's tally is stale for its own id either way
        let removed = self.justifiers.lock().remove(header.parent_id());

        let (mut justifier, end) = match removed {
            Some(justifier) if !is_checkpoint(header.number()) => {
                (justifier, header.number() - 1)
            }
            _ => {
                let justifier = self.new_justifier(header.parent_id())?;
                let end = justifier.checkpoint;
                (justifier, end)
            }
        };

        let mut current = header.clone();
        loop {
            if justifier.is_committed() {
                break;
            }
            let Some(vote) = current.vote() else {
                break;
            };
            justifier.add_block(current.id(), current.signer(), vote);
            if current.number() <= end {
                break;
            }
            current = self.chain.header(current.parent_id())?;
        }

        let state = justifier.summarize();
        self.state_cache.lock().put(header.id(), state.clone());
        self.justifiers
            .lock()
            .insert(header.id(), justifier, header.number());
        Ok(state)
    }

    /// Builds a fresh tally for the round a child of `parent_id` falls in.
    fn new_justifier(&self, parent_id: BlockId) -> Result<Justifier, FinalityError> {
        let number = parent_id.number() + 1;
        let round_checkpoint = checkpoint(number);

        let parent = self.chain.header(parent_id)?;
        let mbp = self.max_block_proposers(&parent)?;

        let prev_quality = if round_checkpoint == self.fork.finality || round_checkpoint == 0 {
            0
        } else {
            // quality as of the previous round's last block
            let prev_store = self.chain.id_at_number(parent_id, round_checkpoint - 1)?;
            match self.stored_quality(prev_store)? {
                Some(quality) => quality,
                None => {
                    let header = self.chain.header(prev_store)?;
                    self.compute_state(&header)?.quality
                }
            }
        };

        Ok(Justifier::new(round_checkpoint, mbp, prev_quality))
    }

    /// Locates the first checkpoint on the branch ending at `tip` whose
    /// stored quality reached `target`, scanning forward from `finalized`.
    ///
    /// Quality is monotone and grows by at most one per round along a
    /// branch, so the first store point reaching `target` must hold exactly
    /// `target`; anything else is a corruption-grade error.
    fn find_checkpoint_by_quality(
        &self,
        target: u32,
        finalized: BlockId,
        tip: BlockId,
    ) -> Result<BlockId, FinalityError> {
        let mut search_start = finalized.number();
        if search_start == 0 {
            search_start = checkpoint(self.fork.finality);
        }

        let candidates = (tip.number() + 1).saturating_sub(search_start) / CHECKPOINT_INTERVAL;

        let store_id_at = |index: u32| -> Result<BlockId, FinalityError> {
            let number = store_point(search_start + index * CHECKPOINT_INTERVAL);
            Ok(self.chain.id_at_number(tip, number)?)
        };

        let (mut low, mut high) = (0, candidates);
        while low < high {
            let mid = low + (high - low) / 2;
            if self.quality_of(store_id_at(mid)?)? >= target {
                high = mid;
            } else {
                low = mid + 1;
            }
        }

        if low == candidates {
            return Err(FinalityError::CheckpointNotFound { target, tip });
        }

        let store_id = store_id_at(low)?;
        let found = self.quality_of(store_id)?;
        if found != target {
            return Err(FinalityError::QualityMismatch {
                id: store_id,
                expected: target,
                found,
            });
        }

        Ok(self
            .chain
            .id_at_number(tip, search_start + low * CHECKPOINT_INTERVAL)?)
    }

    /// Rebuilds the ledger of packed COM votes by scanning the best chain
    /// down to the finalized block.
    fn rebuild_casts(&self) -> Result<Casts, FinalityError> {
        let mut casts = Casts::default();
        let finalized = self.finalized();
        let mut header = self.chain.best_header()?;

        loop {
            let number = header.number();
            if number == 0 || number <= finalized.number() || number < self.fork.finality {
                break;
            }
            if header.signer() == self.master && header.vote() == Some(Vote::Com) {
                let checkpoint_id = self.chain.id_at_number(header.id(), checkpoint(number))?;
                // walking downward, the first block seen in a round carries
                // the round's freshest quality
                if !casts.contains(checkpoint_id) {
                    let quality = self.compute_state(&header)?.quality;
                    casts.mark(checkpoint_id, quality);
                }
            }
            header = self.chain.header(header.parent_id())?;
        }

        Ok(casts)
    }

    fn stored_quality(&self, id: BlockId) -> Result<Option<u32>, FinalityError> {
        if let Some(quality) = self.quality_cache.lock().get(&id).copied() {
            return Ok(Some(quality));
        }
        let loaded = load_quality(&self.data, id)?;
        if let Some(quality) = loaded {
            self.quality_cache.lock().put(id, quality);
        }
        Ok(loaded)
    }

    fn quality_of(&self, id: BlockId) -> Result<u32, FinalityError> {
        self.stored_quality(id)?
            .ok_or(FinalityError::QualityNotFound(id))
    }

    fn max_block_proposers(&self, header: &Header) -> Result<u64, FinalityError> {
        if let Some(mbp) = self.mbp_cache.lock().get(&header.id()).copied() {
            return Ok(mbp);
        }

        let mut mbp = self.state.max_block_proposers(header.state_root())?;
        if mbp == 0 || mbp > INITIAL_MAX_BLOCK_PROPOSERS {
            mbp = INITIAL_MAX_BLOCK_PROPOSERS;
        }

        self.mbp_cache.lock().put(header.id(), mbp);
        Ok(mbp)
    }
}
