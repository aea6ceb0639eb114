//! Storage facade consumed by the ring. Grounded on the shape of
//! `store::backend::StorageBackend` and the operation list of
//! `storage/define.go`; out of scope beyond this interface — no caching
//! policy, no disk-layout details are specified here.

mod memory;
mod sled_store;

pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

use serde::{Deserialize, Serialize};

use crate::error::ChordError;

/// A single stored value, keyed by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub key: String,
    pub value: Vec<u8>,
}

pub type FileList = Vec<File>;

/// The local (or backup) file map a node consumes. Implementations must be
/// internally thread-safe: the ring never wraps calls in an external lock.
pub trait Storage: Send + Sync {
    fn get_files_name(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Result<Vec<u8>, ChordError>;

    /// Create or overwrite.
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), ChordError>;

    /// Overwrite an existing key; error if absent.
    fn update(&self, key: &str, value: Vec<u8>) -> Result<(), ChordError>;

    /// Error if absent.
    fn delete(&self, key: &str) -> Result<(), ChordError>;

    fn put_files(&self, files: FileList) -> Result<(), ChordError>;

    fn get_all_files(&self) -> Result<FileList, ChordError>;

    /// Non-destructive filter over keys.
    fn get_files_by_filter(&self, filter: &dyn Fn(&str) -> bool) -> Result<FileList, ChordError>;

    /// Returns matches and removes them. On a per-file I/O failure the key
    /// is still dropped from the index and the file is skipped; the
    /// returned list is authoritative for what was actually extracted.
    fn extract_files_by_filter(&self, filter: &dyn Fn(&str) -> bool) -> Result<FileList, ChordError>;

    fn clear(&self) -> Result<(), ChordError>;
}
