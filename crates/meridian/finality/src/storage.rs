//! Persistence layer: the key-value contract and the two key families the
//! engine writes — the finalized pointer and one quality value per round.

use crate::FinalityError;
use alloy_primitives::B256;
use dashmap::DashMap;
use meridian_chain::BlockId;
use thiserror::Error;

/// Key of the persisted finalized pointer.
pub(crate) const FINALIZED_KEY: &[u8] = b"finalized";

const QUALITY_PREFIX: &[u8] = b"q/";

/// Errors surfaced by a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to serve the request.
    #[error("store backend: {0}")]
    Backend(String),
}

/// Minimal durable key-value contract the engine persists through.
///
/// Any store with atomic point reads and writes qualifies; absence of a key
/// is not an error.
pub trait KvStore: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }
}

/// Concurrent in-memory [`KvStore`], used by tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

pub(crate) fn quality_key(id: BlockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(QUALITY_PREFIX.len() + 32);
    key.extend_from_slice(QUALITY_PREFIX);
    key.extend_from_slice(id.0.as_slice());
    key
}

pub(crate) fn load_quality<K: KvStore>(
    store: &K,
    id: BlockId,
) -> Result<Option<u32>, FinalityError> {
    match store.get(&quality_key(id))? {
        None => Ok(None),
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_slice().try_into().map_err(|_| {
                FinalityError::CorruptedValue {
                    key: format!("q/{id}"),
                }
            })?;
            Ok(Some(u32::from_be_bytes(bytes)))
        }
    }
}

pub(crate) fn save_quality<K: KvStore>(
    store: &K,
    id: BlockId,
    quality: u32,
) -> Result<(), StoreError> {
    store.put(&quality_key(id), &quality.to_be_bytes())
}

pub(crate) fn load_finalized<K: KvStore>(store: &K) -> Result<Option<BlockId>, FinalityError> {
    match store.get(FINALIZED_KEY)? {
        None => Ok(None),
        Some(raw) if raw.len() == 32 => Ok(Some(BlockId(B256::from_slice(&raw)))),
        Some(_) => Err(FinalityError::CorruptedValue {
            key: "finalized".into(),
        }),
    }
}

pub(crate) fn save_finalized<K: KvStore>(store: &K, id: BlockId) -> Result<(), StoreError> {
    store.put(FINALIZED_KEY, id.0.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn id(i: u8) -> BlockId {
        BlockId(B256::repeat_byte(i))
    }

    #[test]
    fn test_quality_round_trip() {
        let store = MemoryStore::new();
        save_quality(&store, id(1), 42).unwrap();

        assert_eq!(load_quality(&store, id(1)).unwrap(), Some(42));
        assert_eq!(load_quality(&store, id(2)).unwrap(), None);
    }

    #[test]
    fn test_quality_overwrite_is_idempotent() {
        let store = MemoryStore::new();
        save_quality(&store, id(1), 7).unwrap();
        save_quality(&store, id(1), 7).unwrap();
        assert_eq!(load_quality(&store, id(1)).unwrap(), Some(7));
    }

    #[test]
    fn test_truncated_quality_is_corruption() {
        let store = MemoryStore::new();
        store.put(&quality_key(id(1)), &[0, 1]).unwrap();
        assert!(matches!(
            load_quality(&store, id(1)),
            Err(FinalityError::CorruptedValue { .. })
        ));
    }

    #[test]
    fn test_finalized_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(load_finalized(&store).unwrap(), None);

        save_finalized(&store, id(9)).unwrap();
        assert_eq!(load_finalized(&store).unwrap(), Some(id(9)));
    }

    #[test]
    fn test_short_finalized_value_is_corruption() {
        let store = MemoryStore::new();
        store.put(FINALIZED_KEY, &[1, 2, 3]).unwrap();
        assert!(matches!(
            load_finalized(&store),
            Err(FinalityError::CorruptedValue { .. })
        ));
    }
}
