//! Directory resolution for the durable tier.
//!
//! The host environment supplies one directory per [`StorageLocation`]. A
//! resolver may return `None`, which the storage tier reports as
//! `StorageError::NoFilePath`.

use std::path::{Path, PathBuf};

use tierkit_core::StorageLocation;

/// Maps a storage location to the directory backing it.
pub trait DirectoryResolver: Send + Sync {
    /// Resolve the directory for `location`, or `None` if unavailable.
    fn directory(&self, location: StorageLocation) -> Option<PathBuf>;
}

/// Explicitly configured directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedDirectories {
    pub transient: Option<PathBuf>,
    pub persistent: Option<PathBuf>,
}

impl FixedDirectories {
    pub fn new(transient: impl Into<PathBuf>, persistent: impl Into<PathBuf>) -> Self {
        Self {
            transient: Some(transient.into()),
            persistent: Some(persistent.into()),
        }
    }

    /// `root/transient` and `root/persistent`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(root.join("transient"), root.join("persistent"))
    }

    /// A resolver that resolves nothing.
    pub fn unresolved() -> Self {
        Self::default()
    }
}

impl DirectoryResolver for FixedDirectories {
    fn directory(&self, location: StorageLocation) -> Option<PathBuf> {
        match location {
            StorageLocation::Transient => self.transient.clone(),
            StorageLocation::Persistent => self.persistent.clone(),
        }
    }
}

/// Directories taken from the process environment on every lookup.
///
/// `TIERKIT_TRANSIENT_DIR` and `TIERKIT_PERSISTENT_DIR` win when set.
/// Otherwise the platform cache directory backs `Transient` and the platform
/// data directory backs `Persistent`, each with a `tierkit` subdirectory.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvDirectories;

impl EnvDirectories {
    pub const TRANSIENT_VAR: &'static str = "TIERKIT_TRANSIENT_DIR";
    pub const PERSISTENT_VAR: &'static str = "TIERKIT_PERSISTENT_DIR";

    fn non_empty_var(name: &str) -> Option<PathBuf> {
        std::env::var_os(name)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}

impl DirectoryResolver for EnvDirectories {
    fn directory(&self, location: StorageLocation) -> Option<PathBuf> {
        let (explicit, platform) = match location {
            StorageLocation::Transient => (Self::TRANSIENT_VAR, dirs::cache_dir()),
            StorageLocation::Persistent => (Self::PERSISTENT_VAR, dirs::data_dir()),
        };

        Self::non_empty_var(explicit).or_else(|| platform.map(|base| base.join("tierkit")))
    }
}
