//! tierkit Pipeline - Read-Through Content Loading
//!
//! Ties the storage tier, the fetch tier and the decode layer together:
//! look up a key, decode it, and on a miss fetch, decode and persist in the
//! background. Also provides an image loader on top of the same storage.

pub mod image;
pub mod pipeline;

pub use image::{ImageData, ImageLoader};
pub use pipeline::{ContentPipeline, Fetched, Source};

// Re-exported so callers can build a pipeline from this crate alone.
pub use tierkit_core::{
    CachePolicy, DomainInfo, StorageConfig, StorageLocation, TierError, TierResult,
};
pub use tierkit_fetch::{ApiClient, ApiPath, FetchSpec, HttpMethod};
pub use tierkit_storage::{DataManager, EnvDirectories, FixedDirectories};
