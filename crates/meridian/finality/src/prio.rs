//! Priority cache holding the live justifier of each branch head.

use crate::justifier::Justifier;
use meridian_chain::BlockId;
use std::collections::HashMap;

/// Bounded map from branch-head id to its round tally, evicting the entry
/// with the lowest priority (block number) when full. Heads of active forks
/// stay cached, so extending any of them costs one tally step instead of a
/// whole-round walk.
#[derive(Debug)]
pub(crate) struct PrioCache {
    capacity: usize,
    entries: HashMap<BlockId, (Justifier, u32)>,
}

impl PrioCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    /// Takes the entry for `id` out of the cache.
    pub(crate) fn remove(&mut self, id: BlockId) -> Option<Justifier> {
        self.entries.remove(&id).map(|(justifier, _)| justifier)
    }

    /// Inserts an entry, evicting the lowest-priority one if at capacity.
    pub(crate) fn insert(&mut self, id: BlockId, justifier: Justifier, priority: u32) {
        if !self.entries.contains_key(&id) && self.entries.len() >= self.capacity {
            let evict = self
                .entries
                .iter()
                .min_by_key(|(entry_id, (_, prio))| (*prio, **entry_id))
                .map(|(entry_id, _)| *entry_id);
            if let Some(evict) = evict {
                self.entries.remove(&evict);
            }
        }
        self.entries.insert(id, (justifier, priority));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn id(i: u8) -> BlockId {
        BlockId(B256::repeat_byte(i))
    }

    fn justifier() -> Justifier {
        Justifier::new(0, 3, 0)
    }

    #[test]
    fn test_remove_takes_entry() {
        let mut cache = PrioCache::new(4);
        cache.insert(id(1), justifier(), 1);

        assert!(cache.remove(id(1)).is_some());
        assert!(cache.remove(id(1)).is_none());
    }

    #[test]
    fn test_full_cache_evicts_lowest_priority() {
        let mut cache = PrioCache::new(2);
        cache.insert(id(1), justifier(), 10);
        cache.insert(id(2), justifier(), 20);
        cache.insert(id(3), justifier(), 30);

        assert!(cache.remove(id(1)).is_none());
        assert!(cache.remove(id(2)).is_some());
        assert!(cache.remove(id(3)).is_some());
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let mut cache = PrioCache::new(2);
        cache.insert(id(1), justifier(), 10);
        cache.insert(id(2), justifier(), 20);
        // replacing an existing key keeps the other entry
        cache.insert(id(2), justifier(), 25);

        assert!(cache.remove(id(1)).is_some());
        assert!(cache.remove(id(2)).is_some());
    }
}
