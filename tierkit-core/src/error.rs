//! Error types for tierkit operations

use crate::StorageLocation;
use thiserror::Error;

/// Storage tier errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("No directory could be resolved for {location:?} storage")]
    NoFilePath { location: StorageLocation },

    #[error("File not found for key {key}")]
    FileNotFound { key: String },

    #[error("Durable write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Write-behind queue requires a Tokio runtime")]
    RuntimeUnavailable,
}

/// Fetch tier errors, including response classification failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("Bad response: {reason}")]
    BadResponse { reason: String },

    #[error("Response body is JSON but neither an object nor an array")]
    InvalidFormat,

    #[error("Response body is not valid JSON: {reason}")]
    InvalidJson { reason: String },
}

/// Decode layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Raised only on the direct-bytes path; carries the deserializer message verbatim.
    #[error("{0}")]
    Deserialize(String),

    /// Raised on the re-serialization path; the underlying cause is discarded.
    #[error("Parsing error")]
    Parsing,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all tierkit errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for tierkit operations.
pub type TierResult<T> = Result<T, TierError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_no_file_path() {
        let err = StorageError::NoFilePath {
            location: StorageLocation::Persistent,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("No directory"));
        assert!(msg.contains("Persistent"));
    }

    #[test]
    fn test_storage_error_display_file_not_found() {
        let err = StorageError::FileNotFound {
            key: "https://example.com/a.png".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("File not found"));
        assert!(msg.contains("https://example.com/a.png"));
    }

    #[test]
    fn test_fetch_error_display_invalid_json() {
        let err = FetchError::InvalidJson {
            reason: "expected value at line 1 column 1".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("not valid JSON"));
        assert!(msg.contains("line 1 column 1"));
    }

    #[test]
    fn test_decode_error_deserialize_is_verbatim() {
        let err = DecodeError::Deserialize("missing field `x` at line 1 column 2".to_string());
        assert_eq!(format!("{}", err), "missing field `x` at line 1 column 2");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "host".to_string(),
            value: "".to_string(),
            reason: "host must not be empty".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("host"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn test_tier_error_from_variants() {
        let storage = TierError::from(StorageError::RuntimeUnavailable);
        assert!(matches!(storage, TierError::Storage(_)));

        let fetch = TierError::from(FetchError::InvalidFormat);
        assert!(matches!(fetch, TierError::Fetch(_)));

        let decode = TierError::from(DecodeError::Parsing);
        assert!(matches!(decode, TierError::Decode(_)));

        let config = TierError::from(ConfigError::MissingRequired {
            field: "host".to_string(),
        });
        assert!(matches!(config, TierError::Config(_)));
    }
}
