//! Filesystem-backed durable tier.
//!
//! Each value is one file directly under the directory resolved for its
//! location. There is no index file and keys cannot be enumerated.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tierkit_core::{StorageError, StorageLocation, StoredPayload};

use crate::directory::DirectoryResolver;

/// Prefix for file names derived from a key digest.
const HASHED_PREFIX: &str = "k-";

/// Longest key used verbatim as a file name. Common filesystems cap names at
/// 255 bytes.
const MAX_VERBATIM_LEN: usize = 200;

/// Durable key/value store over a [`DirectoryResolver`].
#[derive(Clone)]
pub struct FileStore {
    resolver: Arc<dyn DirectoryResolver>,
}

impl FileStore {
    pub fn new(resolver: Arc<dyn DirectoryResolver>) -> Self {
        Self { resolver }
    }

    /// File name used for `key`.
    ///
    /// Keys that are a single safe path component are used verbatim. Anything
    /// else (separators, `.`/`..`, empty, NUL, longer than 200 bytes) is
    /// stored under `k-<sha256 hex>` so it cannot escape the location
    /// directory or exceed the file name limit.
    pub fn file_name(key: &str) -> String {
        let safe = !key.is_empty()
            && key.len() <= MAX_VERBATIM_LEN
            && key != "."
            && key != ".."
            && !key.starts_with(HASHED_PREFIX)
            && !key.contains(['/', '\\', '\0']);

        if safe {
            key.to_string()
        } else {
            let digest = Sha256::digest(key.as_bytes());
            format!("{}{}", HASHED_PREFIX, hex::encode(digest))
        }
    }

    /// Resolve the directory for `location`.
    pub fn directory(&self, location: StorageLocation) -> Result<PathBuf, StorageError> {
        self.resolver
            .directory(location)
            .ok_or(StorageError::NoFilePath { location })
    }

    /// Full path of the file backing `key` at `location`.
    pub fn path_for(&self, key: &str, location: StorageLocation) -> Result<PathBuf, StorageError> {
        Ok(self.directory(location)?.join(Self::file_name(key)))
    }

    /// Synchronously read the bytes stored for `key`.
    ///
    /// Any read failure is reported as `FileNotFound`.
    pub fn read(&self, key: &str, location: StorageLocation) -> Result<Bytes, StorageError> {
        let path = self.path_for(key, location)?;
        std::fs::read(&path)
            .map(Bytes::from)
            .map_err(|_| StorageError::FileNotFound {
                key: key.to_string(),
            })
    }

    /// Synchronously write `payload` for `key`, creating the directory if needed.
    pub fn write(&self, key: &str, payload: &StoredPayload) -> Result<(), StorageError> {
        let directory = self.directory(payload.location)?;

        // create_dir_all succeeds if another writer created it first
        std::fs::create_dir_all(&directory).map_err(|e| StorageError::WriteFailed {
            key: key.to_string(),
            reason: format!("create {}: {}", directory.display(), e),
        })?;

        let path = directory.join(Self::file_name(key));
        std::fs::write(&path, &payload.data).map_err(|e| StorageError::WriteFailed {
            key: key.to_string(),
            reason: format!("write {}: {}", path.display(), e),
        })
    }

    /// Delete the file stored for `key`. A missing file is not an error.
    pub fn remove(&self, key: &str, location: StorageLocation) -> Result<(), StorageError> {
        let path = self.path_for(key, location)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: format!("remove {}: {}", path.display(), e),
            }),
        }
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("transient", &self.resolver.directory(StorageLocation::Transient))
            .field("persistent", &self.resolver.directory(StorageLocation::Persistent))
            .finish()
    }
}
