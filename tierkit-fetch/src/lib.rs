//! tierkit Fetch - HTTP Request and Response Classification
//!
//! Builds a request from a path/method/parameters triple against a configured
//! domain, executes it once, and classifies the body as a JSON object, a JSON
//! array, or a failure. The [`Fetcher`] and [`ResourceFetcher`] traits are the
//! seams the pipeline depends on, so tests can substitute counting stubs.

use async_trait::async_trait;
use bytes::Bytes;
use tierkit_core::{FetchError, RawResponse};

pub mod classify;
pub mod client;
pub mod path;

pub use classify::classify_body;
pub use client::ApiClient;
pub use path::{ApiPath, FetchSpec, HttpMethod};

// ============================================================================
// FETCH TRAITS
// ============================================================================

/// Executes a request and classifies its response.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue exactly one request for `spec`.
    async fn request(&self, spec: &FetchSpec) -> Result<RawResponse, FetchError>;
}

/// A whole resource downloaded from an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub data: Bytes,
    /// URL the response was served from, after redirects.
    pub url: String,
}

/// Downloads resources by absolute URL.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch_resource(&self, url: &str) -> Result<Resource, FetchError>;
}
