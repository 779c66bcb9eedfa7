//! Read-through content pipeline.
//!
//! This module implements the core orchestration: storage lookup, decode,
//! fetch fallback, decode, write-behind persistence.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tierkit_core::{
    decode, decode_retaining, RawResponse, StorageLocation, StoredPayload, TierResult,
};
use tierkit_fetch::{FetchSpec, Fetcher};
use tierkit_storage::DataManager;

/// Where a pipeline result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Decoded from the storage tier; no network call was made.
    Storage,
    /// Fetched from the network and handed to the storage tier.
    Network,
}

/// A typed pipeline result plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Fetched<T> {
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == Source::Storage
    }
}

/// Content-addressable read-through cache with a single network fallback.
///
/// Concurrent calls for the same missing key each fetch independently; there
/// is no de-duplication of in-flight requests.
///
/// # Example
///
/// ```ignore
/// let pipeline = ContentPipeline::new(storage, Arc::new(ApiClient::new(domain)?));
///
/// let profile: Profile = pipeline
///     .fetch_typed("profile-7", StorageLocation::Persistent, &FetchSpec::get("/profiles/7"))
///     .await?;
/// ```
pub struct ContentPipeline {
    storage: Arc<DataManager>,
    fetcher: Arc<dyn Fetcher>,
}

impl ContentPipeline {
    pub fn new(storage: Arc<DataManager>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { storage, fetcher }
    }

    /// The storage tier this pipeline reads and populates.
    pub fn storage(&self) -> &Arc<DataManager> {
        &self.storage
    }

    /// Return the value stored under `key`, fetching it with `spec` on a miss.
    ///
    /// A stored entry that fails to decode as `T` is treated exactly like a
    /// missing entry. On a fetch, the pre-decode bytes are saved under the
    /// same key and location only if they decode; the save is not awaited.
    pub async fn fetch_typed<T: DeserializeOwned>(
        &self,
        key: &str,
        location: StorageLocation,
        spec: &FetchSpec,
    ) -> TierResult<T> {
        self.fetch_with_source(key, location, spec)
            .await
            .map(Fetched::into_value)
    }

    /// Like [`fetch_typed`](Self::fetch_typed), also reporting where the value came from.
    pub async fn fetch_with_source<T: DeserializeOwned>(
        &self,
        key: &str,
        location: StorageLocation,
        spec: &FetchSpec,
    ) -> TierResult<Fetched<T>> {
        match self.storage.load(key, location) {
            Ok(bytes) => match decode::<T>(RawResponse::RawData(bytes)) {
                Ok(value) => {
                    tracing::debug!(%key, %location, "Serving from storage");
                    return Ok(Fetched {
                        value,
                        source: Source::Storage,
                    });
                }
                // Undecodable entries fall through to a fetch like a miss.
                Err(e) => tracing::debug!(
                    %key,
                    %location,
                    error = %e,
                    "Stored entry failed to decode, fetching"
                ),
            },
            Err(e) => tracing::debug!(%key, %location, reason = %e, "Storage miss, fetching"),
        }

        let raw = self.fetcher.request(spec).await?;
        tracing::trace!(%key, kind = raw.kind(), "Fetched response");

        let decoded = decode_retaining::<T>(raw)?;
        self.storage
            .save(StoredPayload::new(decoded.bytes, location), key);

        Ok(Fetched {
            value: decoded.value,
            source: Source::Network,
        })
    }
}

impl std::fmt::Debug for ContentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentPipeline")
            .field("storage", &self.storage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tierkit_core::{FetchError, StorageConfig, TierError};
    use tierkit_storage::FixedDirectories;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Point {
        x: i64,
    }

    struct CountingFetcher {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn request(&self, _spec: &FetchSpec) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let value: serde_json::Value =
                serde_json::from_str(self.body).map_err(|e| FetchError::InvalidJson {
                    reason: e.to_string(),
                })?;
            RawResponse::from_value(value).ok_or(FetchError::InvalidFormat)
        }
    }

    fn memory_only_storage() -> Arc<DataManager> {
        Arc::new(DataManager::with_inline_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::unresolved()),
        ))
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let storage = memory_only_storage();
        storage.save(StoredPayload::transient(br#"{"x": 5}"#.to_vec()), "k");

        let fetcher = Arc::new(CountingFetcher::new(r#"{"x": 1}"#));
        let pipeline = ContentPipeline::new(storage, fetcher.clone());

        let fetched: Fetched<Point> = pipeline
            .fetch_with_source("k", StorageLocation::Transient, &FetchSpec::get("/p"))
            .await
            .unwrap();
        assert_eq!(fetched.value, Point { x: 5 });
        assert!(fetched.was_cache_hit());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_populates() {
        let storage = memory_only_storage();
        let fetcher = Arc::new(CountingFetcher::new(r#"{"x": 1}"#));
        let pipeline = ContentPipeline::new(storage.clone(), fetcher.clone());

        let point: Point = pipeline
            .fetch_typed("k", StorageLocation::Transient, &FetchSpec::get("/p"))
            .await
            .unwrap();
        assert_eq!(point, Point { x: 1 });

        let stored = storage.load("k", StorageLocation::Transient).unwrap();
        let again: Point = serde_json::from_slice(&stored).unwrap();
        assert_eq!(again, point);
    }

    #[tokio::test]
    async fn test_undecodable_entry_refetches() {
        let storage = memory_only_storage();
        storage.save(StoredPayload::transient(b"not json".to_vec()), "k");

        let fetcher = Arc::new(CountingFetcher::new(r#"{"x": 9}"#));
        let pipeline = ContentPipeline::new(storage.clone(), fetcher.clone());

        let fetched: Fetched<Point> = pipeline
            .fetch_with_source("k", StorageLocation::Transient, &FetchSpec::get("/p"))
            .await
            .unwrap();
        assert_eq!(fetched.source, Source::Network);
        assert_eq!(fetched.value, Point { x: 9 });
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_post_fetch_decode_failure_caches_nothing() {
        let storage = memory_only_storage();
        let fetcher = Arc::new(CountingFetcher::new(r#"{"y": 1}"#));
        let pipeline = ContentPipeline::new(storage.clone(), fetcher);

        let result = pipeline
            .fetch_typed::<Point>("k", StorageLocation::Transient, &FetchSpec::get("/p"))
            .await;
        assert_eq!(
            result,
            Err(TierError::Decode(tierkit_core::DecodeError::Parsing))
        );
        assert!(storage.load("k", StorageLocation::Transient).is_err());
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let storage = memory_only_storage();
        let fetcher = Arc::new(CountingFetcher::new("42"));
        let pipeline = ContentPipeline::new(storage.clone(), fetcher);

        let result = pipeline
            .fetch_typed::<Point>("k", StorageLocation::Transient, &FetchSpec::get("/p"))
            .await;
        assert_eq!(result, Err(TierError::Fetch(FetchError::InvalidFormat)));
        assert!(storage.load("k", StorageLocation::Transient).is_err());
    }
}
