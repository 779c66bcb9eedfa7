//! Response body classification.

use bytes::Bytes;
use serde_json::Value;
use tierkit_core::{FetchError, RawResponse};

/// Classify a response body into a [`RawResponse`].
///
/// - no body or an empty body: `BadResponse`
/// - JSON object: `JsonDic`
/// - JSON array: `JsonArray`
/// - any other JSON value (string, number, bool, null): `InvalidFormat`
/// - not JSON at all: `InvalidJson`
pub fn classify_body(body: Option<Bytes>) -> Result<RawResponse, FetchError> {
    let body = match body {
        Some(body) if !body.is_empty() => body,
        _ => {
            return Err(FetchError::BadResponse {
                reason: "response had no body".to_string(),
            })
        }
    };

    let value: Value = serde_json::from_slice(&body).map_err(|e| FetchError::InvalidJson {
        reason: e.to_string(),
    })?;

    RawResponse::from_value(value).ok_or(FetchError::InvalidFormat)
}
