//! Two-tier data manager.
//!
//! The memory tier is the contract callers rely on: a save is visible to the
//! next load immediately. The durable tier is advisory and written behind.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tierkit_core::{StorageConfig, StorageError, StorageLocation, StoredPayload, TierResult};

use crate::directory::DirectoryResolver;
use crate::durable::FileStore;
use crate::memory::{MemoryStats, MemoryTier};
use crate::write_behind::{DurableWriter, InlineWriter, QueuedWriter, WriteJob};

/// Read-through storage over a memory tier and a durable file tier.
///
/// Only the memory tier sits behind the lock. Durable reads happen after the
/// lock is released and durable writes are handed to the writer, so slow disk
/// I/O never blocks other memory lookups.
///
/// # Example
///
/// ```ignore
/// let manager = DataManager::with_queued_writer(&StorageConfig::default(), Arc::new(EnvDirectories))?;
///
/// manager.save(StoredPayload::transient(bytes), "https://example.com/a.json");
/// let bytes = manager.load("https://example.com/a.json", StorageLocation::Transient)?;
/// ```
pub struct DataManager {
    memory: Mutex<MemoryTier>,
    store: FileStore,
    writer: Arc<dyn DurableWriter>,
}

impl DataManager {
    /// Create a manager with an explicit durable writer.
    pub fn new(config: &StorageConfig, store: FileStore, writer: Arc<dyn DurableWriter>) -> Self {
        Self {
            memory: Mutex::new(MemoryTier::new(config.memory_cost_limit)),
            store,
            writer,
        }
    }

    /// Create a manager whose durable writes run on a background queue.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_queued_writer(
        config: &StorageConfig,
        resolver: Arc<dyn DirectoryResolver>,
    ) -> TierResult<Self> {
        config.validate()?;
        let store = FileStore::new(resolver);
        let writer = QueuedWriter::spawn(store.clone())?;
        Ok(Self::new(config, store, Arc::new(writer)))
    }

    /// Create a manager whose durable writes complete inside `save`.
    pub fn with_inline_writer(config: &StorageConfig, resolver: Arc<dyn DirectoryResolver>) -> Self {
        let store = FileStore::new(resolver);
        let writer = InlineWriter::new(store.clone());
        Self::new(config, store, Arc::new(writer))
    }

    /// Load the bytes stored for `key` at `location`.
    ///
    /// Checks memory first, then reads the durable file synchronously. Never
    /// touches the network. A durable hit is not promoted into memory.
    pub fn load(&self, key: &str, location: StorageLocation) -> Result<Bytes, StorageError> {
        if let Some(data) = self.memory().get(location, key) {
            tracing::trace!(%key, %location, "Memory tier hit");
            return Ok(data);
        }

        let result = self.store.read(key, location);
        match &result {
            Ok(data) => tracing::trace!(%key, %location, bytes = data.len(), "Durable tier hit"),
            Err(e) => tracing::trace!(%key, %location, error = %e, "Storage miss"),
        }
        result
    }

    /// Save `payload` under `key`.
    ///
    /// The memory tier is updated before this returns; the durable write is
    /// handed to the writer and may land later, or not at all.
    pub fn save(&self, payload: StoredPayload, key: &str) {
        let evicted = self
            .memory()
            .insert(payload.location, key, payload.data.clone());
        if evicted > 0 {
            tracing::debug!(%key, evicted, "Memory tier evicted entries to stay within budget");
        }

        self.writer.submit(WriteJob {
            key: key.to_string(),
            payload,
        });
    }

    /// Remove `key` from both tiers.
    pub fn remove(&self, key: &str, location: StorageLocation) -> Result<(), StorageError> {
        self.memory().remove(location, key);
        self.store.remove(key, location)
    }

    /// Drop every memory tier entry. Durable files are kept.
    pub fn clear_memory(&self) {
        self.memory().clear();
    }

    /// Wait until all durable writes submitted so far have finished.
    pub async fn settle(&self) {
        self.writer.settle().await;
    }

    /// Memory tier statistics.
    pub fn stats(&self) -> MemoryStats {
        self.memory().stats()
    }

    /// The durable store backing this manager.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    // A poisoned lock still holds a consistent tier: every mutation
    // completes before any call that could panic.
    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("memory", &self.stats())
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::FixedDirectories;

    const T: StorageLocation = StorageLocation::Transient;
    const P: StorageLocation = StorageLocation::Persistent;

    fn inline_manager(dir: &tempfile::TempDir) -> DataManager {
        DataManager::with_inline_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::under(dir.path())),
        )
    }

    #[test]
    fn test_save_then_load_hits_memory() {
        let manager = DataManager::with_inline_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::unresolved()),
        );

        manager.save(StoredPayload::transient(b"hello".to_vec()), "k");
        assert_eq!(manager.load("k", T).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(manager.stats().hits, 1);
    }

    #[test]
    fn test_load_missing_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = inline_manager(&dir);
        assert_eq!(
            manager.load("missing", P),
            Err(StorageError::FileNotFound {
                key: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_load_unresolved_no_file_path() {
        let manager = DataManager::with_inline_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::unresolved()),
        );
        assert_eq!(
            manager.load("missing", T),
            Err(StorageError::NoFilePath { location: T })
        );
    }

    #[test]
    fn test_durable_tier_survives_memory_clear() {
        let dir = tempfile::tempdir().unwrap();
        let manager = inline_manager(&dir);

        manager.save(StoredPayload::persistent(b"document".to_vec()), "doc");
        manager.clear_memory();

        assert_eq!(manager.load("doc", P).unwrap(), Bytes::from_static(b"document"));
        assert_eq!(manager.stats().misses, 1);
    }

    #[test]
    fn test_long_key_survives_memory_clear() {
        let dir = tempfile::tempdir().unwrap();
        let manager = inline_manager(&dir);
        let key = "a".repeat(300);

        manager.save(StoredPayload::transient(b"long".to_vec()), &key);
        manager.clear_memory();

        assert_eq!(manager.load(&key, T).unwrap(), Bytes::from_static(b"long"));
    }

    #[test]
    fn test_durable_hit_is_not_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let manager = inline_manager(&dir);

        manager.save(StoredPayload::transient(b"v".to_vec()), "k");
        manager.clear_memory();
        manager.load("k", T).unwrap();
        manager.load("k", T).unwrap();

        assert_eq!(manager.stats().hits, 0);
        assert_eq!(manager.stats().entry_count, 0);
    }

    #[test]
    fn test_second_manager_reads_durable_tier() {
        let dir = tempfile::tempdir().unwrap();
        inline_manager(&dir).save(StoredPayload::transient(b"shared".to_vec()), "k");

        let other = inline_manager(&dir);
        assert_eq!(other.load("k", T).unwrap(), Bytes::from_static(b"shared"));
    }

    #[test]
    fn test_memory_reflects_save_order() {
        let manager = DataManager::with_inline_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::unresolved()),
        );
        manager.save(StoredPayload::transient(b"first".to_vec()), "k");
        manager.save(StoredPayload::transient(b"second".to_vec()), "k");
        assert_eq!(manager.load("k", T).unwrap(), Bytes::from_static(b"second"));
    }

    #[test]
    fn test_remove_clears_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let manager = inline_manager(&dir);

        manager.save(StoredPayload::transient(b"gone".to_vec()), "k");
        manager.remove("k", T).unwrap();

        assert!(matches!(
            manager.load("k", T),
            Err(StorageError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_eviction_falls_back_to_durable_tier() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DataManager::with_inline_writer(
            &StorageConfig::new().with_memory_cost_limit(8),
            Arc::new(FixedDirectories::under(dir.path())),
        );

        manager.save(StoredPayload::transient(b"aaaaaa".to_vec()), "a");
        manager.save(StoredPayload::transient(b"bbbbbb".to_vec()), "b");

        assert_eq!(manager.stats().evictions, 1);
        assert_eq!(manager.load("a", T).unwrap(), Bytes::from_static(b"aaaaaa"));
    }

    #[tokio::test]
    async fn test_queued_manager_settles_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DataManager::with_queued_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::under(dir.path())),
        )
        .unwrap();

        manager.save(StoredPayload::persistent(b"later".to_vec()), "k");
        manager.settle().await;

        assert_eq!(
            manager.store().read("k", P).unwrap(),
            Bytes::from_static(b"later")
        );
    }

    #[test]
    fn test_queued_manager_outside_runtime() {
        let result = DataManager::with_queued_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::unresolved()),
        );
        assert!(matches!(
            result,
            Err(tierkit_core::TierError::Storage(StorageError::RuntimeUnavailable))
        ));
    }
}
