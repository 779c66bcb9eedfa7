//! Image loading through the storage tier.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tierkit_core::{decode, DecodeError, RawResponse, StorageLocation, StoredPayload, TierResult};
use tierkit_fetch::ResourceFetcher;
use tierkit_storage::DataManager;

/// Base64 encoding for raw bytes inside a JSON record.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// Downloaded image bytes and the URL they were served from.
///
/// Stored as a JSON record with `data` base64-encoded, so a cached entry
/// decodes back into the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
    /// Final URL after redirects.
    pub url: String,
}

impl ImageData {
    pub fn to_json_bytes(&self) -> Result<Bytes, DecodeError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|_| DecodeError::Parsing)
    }
}

/// Loads images by URL, caching them in the transient location.
pub struct ImageLoader {
    storage: Arc<DataManager>,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl ImageLoader {
    pub fn new(storage: Arc<DataManager>, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self { storage, fetcher }
    }

    /// Return the image for `url`, downloading it on a miss.
    ///
    /// The record is stored under the requested URL even when the download
    /// was redirected.
    pub async fn load_image(&self, url: &str) -> TierResult<ImageData> {
        match self.storage.load(url, StorageLocation::Transient) {
            Ok(bytes) => match decode::<ImageData>(RawResponse::RawData(bytes)) {
                Ok(image) => {
                    tracing::debug!(%url, "Serving image from storage");
                    return Ok(image);
                }
                Err(e) => tracing::debug!(%url, error = %e, "Stored image failed to decode, downloading"),
            },
            Err(e) => tracing::debug!(%url, reason = %e, "Image miss, downloading"),
        }

        let resource = self.fetcher.fetch_resource(url).await?;
        let image = ImageData {
            data: resource.data,
            url: resource.url,
        };

        let record = image.to_json_bytes()?;
        self.storage.save(StoredPayload::transient(record), url);

        Ok(image)
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("storage", &self.storage)
            .finish()
    }
}
