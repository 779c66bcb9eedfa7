//! tierkit Core - Data Types, Errors and Decode Layer
//!
//! Pure data structures shared by the storage, fetch and pipeline crates.
//! The only behavior here is the decode layer, which is side-effect free.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod config;
pub mod decode;
pub mod error;

pub use config::{CachePolicy, DomainInfo, StorageConfig, DEFAULT_MEMORY_COST_LIMIT};
pub use decode::{decode, decode_retaining, Decoded};
pub use error::{ConfigError, DecodeError, FetchError, StorageError, TierError, TierResult};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Opaque key identifying a stored payload, typically a canonical URL string.
pub type CacheKey = String;

/// Generic JSON object as produced by a permissive parse.
pub type JsonObject = Map<String, Value>;

// ============================================================================
// STORAGE TYPES
// ============================================================================

/// Logical location of a durable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageLocation {
    /// May be purged by the environment under pressure.
    Transient,
    /// Durable until explicitly removed.
    Persistent,
}

impl StorageLocation {
    /// All locations, in a stable order.
    pub const ALL: [StorageLocation; 2] = [StorageLocation::Transient, StorageLocation::Persistent];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Transient => "transient",
            StorageLocation::Persistent => "persistent",
        }
    }
}

impl std::fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw bytes together with the location they are written under.
///
/// A payload is consumed by a single save call and replaces any previous
/// payload for the same key wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub data: Bytes,
    pub location: StorageLocation,
}

impl StoredPayload {
    pub fn new(data: impl Into<Bytes>, location: StorageLocation) -> Self {
        Self {
            data: data.into(),
            location,
        }
    }

    /// Payload destined for the transient (cache) location.
    pub fn transient(data: impl Into<Bytes>) -> Self {
        Self::new(data, StorageLocation::Transient)
    }

    /// Payload destined for the persistent (document) location.
    pub fn persistent(data: impl Into<Bytes>) -> Self {
        Self::new(data, StorageLocation::Persistent)
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// A network or storage payload before decoding.
///
/// Produced once per successful fetch (or cache read) and consumed once by
/// the decode layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// Opaque bytes, decoded directly.
    RawData(Bytes),
    /// A JSON object (string-keyed map of arbitrary JSON values).
    JsonDic(JsonObject),
    /// A JSON array (ordered list of arbitrary JSON values).
    JsonArray(Vec<Value>),
}

impl RawResponse {
    /// Wrap a generic JSON value, returning `None` for scalars and null.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(RawResponse::JsonDic(map)),
            Value::Array(items) => Some(RawResponse::JsonArray(items)),
            _ => None,
        }
    }

    /// Short variant name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RawResponse::RawData(_) => "raw_data",
            RawResponse::JsonDic(_) => "json_dic",
            RawResponse::JsonArray(_) => "json_array",
        }
    }

    /// Decode into `T`. See [`decode`].
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T, DecodeError> {
        decode(self)
    }
}

impl From<Bytes> for RawResponse {
    fn from(data: Bytes) -> Self {
        RawResponse::RawData(data)
    }
}

impl From<Vec<u8>> for RawResponse {
    fn from(data: Vec<u8>) -> Self {
        RawResponse::RawData(Bytes::from(data))
    }
}
