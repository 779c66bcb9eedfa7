//! tierkit Storage - Memory and Durable Tiers
//!
//! A synchronous, byte-budgeted memory tier in front of a filesystem tier
//! with two logical locations (transient and persistent). Saves update
//! memory immediately and persist to disk behind the caller's back.

pub mod directory;
pub mod durable;
pub mod manager;
pub mod memory;
pub mod write_behind;

pub use directory::{DirectoryResolver, EnvDirectories, FixedDirectories};
pub use durable::FileStore;
pub use manager::DataManager;
pub use memory::{MemoryStats, MemoryTier};
pub use write_behind::{DurableWriter, InlineWriter, QueuedWriter, WriteJob};
