//! tierkit Test Utilities
//!
//! Centralized test infrastructure for the tierkit workspace:
//! - Mock fetchers with call counters
//! - Proptest generators for keys, locations and JSON payloads
//! - Test fixtures for temporary storage directories and managers
//! - A one-shot HTTP responder for exercising the real client
//! - Custom assertions for tierkit error variants

// Re-export core types for convenience
pub use tierkit_core::{
    CachePolicy, DecodeError, DomainInfo, FetchError, RawResponse, StorageConfig, StorageError,
    StorageLocation, StoredPayload, TierError, TierResult,
};
pub use tierkit_fetch::{FetchSpec, Fetcher, HttpMethod, Resource, ResourceFetcher};
pub use tierkit_storage::{DataManager, FixedDirectories};

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`, defaults to `warn`. Safe to call from every test.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK FETCHERS
// ============================================================================

/// Scripted [`Fetcher`] that counts its calls.
///
/// Every call returns a clone of the same outcome, optionally after a delay.
#[derive(Debug)]
pub struct MockFetcher {
    outcome: Result<RawResponse, FetchError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_spec: Mutex<Option<FetchSpec>>,
}

impl MockFetcher {
    /// Respond with `outcome` on every call.
    pub fn new(outcome: Result<RawResponse, FetchError>) -> Self {
        Self {
            outcome,
            delay: None,
            calls: AtomicUsize::new(0),
            last_spec: Mutex::new(None),
        }
    }

    /// Respond with `value` classified the way the HTTP client classifies bodies.
    pub fn json(value: serde_json::Value) -> Self {
        Self::new(RawResponse::from_value(value).ok_or(FetchError::InvalidFormat))
    }

    /// Fail every call with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self::new(Err(error))
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The spec of the most recent request.
    pub fn last_spec(&self) -> Option<FetchSpec> {
        self.last_spec
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn request(&self, spec: &FetchSpec) -> Result<RawResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap_or_else(|e| e.into_inner()) = Some(spec.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

/// Scripted [`ResourceFetcher`] that counts its calls.
#[derive(Debug)]
pub struct MockResourceFetcher {
    outcome: Result<Bytes, FetchError>,
    final_url: Option<String>,
    calls: AtomicUsize,
}

impl MockResourceFetcher {
    /// Serve `data` for every URL; the final URL equals the requested one.
    pub fn serving(data: impl Into<Bytes>) -> Self {
        Self {
            outcome: Ok(data.into()),
            final_url: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self {
            outcome: Err(error),
            final_url: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Report `url` as the final URL, as if the request was redirected.
    pub fn redirecting_to(mut self, url: impl Into<String>) -> Self {
        self.final_url = Some(url.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for MockResourceFetcher {
    async fn fetch_resource(&self, url: &str) -> Result<Resource, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let data = self.outcome.clone()?;
        Ok(Resource {
            data,
            url: self.final_url.clone().unwrap_or_else(|| url.to_string()),
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tierkit inputs.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    /// Either storage location.
    pub fn arb_location() -> impl Strategy<Value = StorageLocation> {
        prop_oneof![
            Just(StorageLocation::Transient),
            Just(StorageLocation::Persistent),
        ]
    }

    /// Keys that are safe file names.
    pub fn arb_safe_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,31}"
    }

    /// URL-shaped keys, which need hashing before they touch the filesystem.
    pub fn arb_url_key() -> impl Strategy<Value = String> {
        "https://[a-z]{1,12}\\.(com|org|net)/[a-z0-9/]{0,24}(\\?[a-z]=[0-9]{1,3})?"
    }

    /// Any key a caller might plausibly use.
    pub fn arb_key() -> impl Strategy<Value = String> {
        prop_oneof![arb_safe_key(), arb_url_key()]
    }

    /// Scalar JSON values.
    pub fn arb_json_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
        ]
    }

    /// Arbitrary JSON values nested up to a few levels.
    pub fn arb_json_value() -> impl Strategy<Value = Value> {
        arb_json_scalar().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|entries| Value::Object(entries.into_iter().collect())),
            ]
        })
    }

    /// JSON objects, the shape most endpoints return.
    pub fn arb_json_object() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-z]{1,8}", arb_json_value(), 0..6)
            .prop_map(|entries| entries.into_iter().collect())
    }

    /// Payloads for either location.
    pub fn arb_payload() -> impl Strategy<Value = StoredPayload> {
        (prop::collection::vec(any::<u8>(), 0..512), arb_location())
            .prop_map(|(data, location)| StoredPayload::new(data, location))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// A temporary root with `transient/` and `persistent/` subdirectories.
    ///
    /// The directories are removed when this is dropped.
    pub struct TempStorage {
        dir: TempDir,
    }

    impl TempStorage {
        pub fn new() -> Self {
            Self {
                dir: tempfile::tempdir().expect("failed to create temp dir"),
            }
        }

        pub fn path(&self) -> &std::path::Path {
            self.dir.path()
        }

        pub fn directories(&self) -> Arc<FixedDirectories> {
            Arc::new(FixedDirectories::under(self.dir.path()))
        }

        /// A manager whose durable writes finish inside `save`.
        pub fn inline_manager(&self) -> Arc<DataManager> {
            Arc::new(DataManager::with_inline_writer(
                &StorageConfig::default(),
                self.directories(),
            ))
        }

        /// A manager with a background write queue. Requires a Tokio runtime.
        pub fn queued_manager(&self) -> Arc<DataManager> {
            self.queued_manager_with(&StorageConfig::default())
        }

        pub fn queued_manager_with(&self, config: &StorageConfig) -> Arc<DataManager> {
            Arc::new(
                DataManager::with_queued_writer(config, self.directories())
                    .expect("queued writer requires a Tokio runtime"),
            )
        }
    }

    impl Default for TempStorage {
        fn default() -> Self {
            Self::new()
        }
    }

    /// A manager with no resolvable directories: memory tier only.
    pub fn memory_only_manager() -> Arc<DataManager> {
        Arc::new(DataManager::with_inline_writer(
            &StorageConfig::default(),
            Arc::new(FixedDirectories::unresolved()),
        ))
    }

    /// A plain HTTP domain on loopback, as served by [`crate::http::serve_once`].
    pub fn loopback_domain(port: u16) -> DomainInfo {
        DomainInfo::new("http", "127.0.0.1")
            .with_port(port)
            .with_timeout(Duration::from_secs(5))
    }
}

// ============================================================================
// ONE-SHOT HTTP RESPONDER
// ============================================================================

pub mod http {
    //! Minimal HTTP/1.1 responder for exercising the real client end to end.

    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// A request as seen by the responder.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct CapturedRequest {
        /// e.g. `GET /v1/items?page=2 HTTP/1.1`
        pub request_line: String,
        /// Header lines, names lowercased.
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl CapturedRequest {
        pub fn method(&self) -> &str {
            self.request_line.split(' ').next().unwrap_or("")
        }

        /// Path plus query string.
        pub fn target(&self) -> &str {
            self.request_line.split(' ').nth(1).unwrap_or("")
        }

        pub fn header(&self, name: &str) -> Option<&str> {
            let name = name.to_ascii_lowercase();
            self.headers
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Accept exactly one connection on loopback, reply with `status` and `body`.
    ///
    /// The handle resolves to the request the client sent.
    pub async fn serve_once(
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> (SocketAddr, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind loopback listener");
        let addr = listener.local_addr().expect("listener has no local address");
        let body = body.into();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept failed");
            let raw = read_request(&mut socket).await;

            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason_phrase(status),
                body.len()
            );
            socket.write_all(head.as_bytes()).await.expect("write failed");
            socket.write_all(&body).await.expect("write failed");
            let _ = socket.shutdown().await;

            parse_request(&raw)
        });

        (addr, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.expect("read failed");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = header_end(&buf) {
                let expected = content_length(&buf[..end]);
                if buf.len() >= end + expected {
                    break;
                }
            }
        }
        buf
    }

    fn header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
    }

    fn content_length(head: &[u8]) -> usize {
        String::from_utf8_lossy(head)
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }

    fn parse_request(raw: &[u8]) -> CapturedRequest {
        let end = header_end(raw).unwrap_or(raw.len());
        let head = String::from_utf8_lossy(&raw[..end]);
        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or("").to_string();
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();

        CapturedRequest {
            request_line,
            headers,
            body: raw[end..].to_vec(),
        }
    }

    fn reason_phrase(status: u16) -> &'static str {
        match status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for tierkit error variants.

    use super::*;

    /// Assert that a TierResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &TierResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a TierResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &TierResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a TierResult is a Fetch error.
    #[track_caller]
    pub fn assert_fetch_error<T: std::fmt::Debug>(result: &TierResult<T>) {
        match result {
            Err(TierError::Fetch(_)) => {}
            other => panic!("Expected Fetch error, got: {:?}", other),
        }
    }

    /// Assert that a TierResult is a Decode error.
    #[track_caller]
    pub fn assert_decode_error<T: std::fmt::Debug>(result: &TierResult<T>) {
        match result {
            Err(TierError::Decode(_)) => {}
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    /// Assert that a storage load missed.
    #[track_caller]
    pub fn assert_missing<T: std::fmt::Debug>(result: &Result<T, StorageError>) {
        match result {
            Err(StorageError::FileNotFound { .. }) | Err(StorageError::NoFilePath { .. }) => {}
            other => panic!("Expected a storage miss, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_mock_fetcher_counts_and_records() {
        let fetcher = MockFetcher::json(serde_json::json!({"x": 1}));
        let spec = FetchSpec::get("/x").with_parameter("a", "b");

        let raw = fetcher.request(&spec).await.unwrap();
        assert_eq!(raw.kind(), "json_dic");
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fetcher.last_spec(), Some(spec));
    }

    #[tokio::test]
    async fn test_mock_fetcher_scalar_is_invalid_format() {
        let fetcher = MockFetcher::json(serde_json::json!(42));
        assert_eq!(
            fetcher.request(&FetchSpec::get("/")).await,
            Err(FetchError::InvalidFormat)
        );
    }

    #[tokio::test]
    async fn test_mock_resource_fetcher_final_url() {
        let fetcher = MockResourceFetcher::serving(vec![1u8, 2, 3]);
        let resource = fetcher.fetch_resource("https://a.example/x.png").await.unwrap();
        assert_eq!(resource.url, "https://a.example/x.png");

        let fetcher = fetcher.redirecting_to("https://cdn.example/x.png");
        let resource = fetcher.fetch_resource("https://a.example/x.png").await.unwrap();
        assert_eq!(resource.url, "https://cdn.example/x.png");
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_assertion_missing() {
        let result: Result<(), StorageError> = Err(StorageError::FileNotFound {
            key: "k".to_string(),
        });
        assertions::assert_missing(&result);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_safe_keys_are_single_components(key in generators::arb_safe_key()) {
            prop_assert!(!key.contains('/'));
            prop_assert!(key != "." && key != "..");
        }

        #[test]
        fn prop_json_object_serializes(object in generators::arb_json_object()) {
            prop_assert!(serde_json::to_vec(&object).is_ok());
        }
    }
}
