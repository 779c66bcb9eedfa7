//! Decode layer: classified payloads to strongly typed values.
//!
//! The direct-bytes path surfaces the deserializer's own message. The JSON
//! container paths go through a re-serialization step and collapse every
//! failure into [`DecodeError::Parsing`].

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{DecodeError, RawResponse};

/// A decoded value together with the bytes it was decoded from.
///
/// For `RawData` the bytes are the original payload; for the JSON variants
/// they are the re-serialized container.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub bytes: Bytes,
}

/// Decode a raw response into `T`.
pub fn decode<T: DeserializeOwned>(raw: RawResponse) -> Result<T, DecodeError> {
    decode_retaining(raw).map(|decoded| decoded.value)
}

/// Decode a raw response into `T`, keeping the pre-decode bytes.
pub fn decode_retaining<T: DeserializeOwned>(raw: RawResponse) -> Result<Decoded<T>, DecodeError> {
    match raw {
        RawResponse::RawData(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| DecodeError::Deserialize(e.to_string()))?;
            Ok(Decoded { value, bytes })
        }
        RawResponse::JsonDic(map) => reserialize(Value::Object(map)),
        RawResponse::JsonArray(items) => reserialize(Value::Array(items)),
    }
}

fn reserialize<T: DeserializeOwned>(value: Value) -> Result<Decoded<T>, DecodeError> {
    let bytes = serde_json::to_vec(&value).map_err(|_| DecodeError::Parsing)?;
    let value = serde_json::from_slice(&bytes).map_err(|_| DecodeError::Parsing)?;
    Ok(Decoded {
        value,
        bytes: Bytes::from(bytes),
    })
}
