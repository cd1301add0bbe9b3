//! Storage traits and error types
//!
//! This module defines the trait interface for the dataset index and the
//! associated error types.

use crate::storage::DatasetEntry;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Dataset id already present: {0}")]
    DuplicateId(String),

    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Corrupt JSON in {path}: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for dataset index backends
///
/// Every call reads the current durable state; every mutating call rewrites
/// it atomically before returning. Nothing is cached between calls.
pub trait DatasetIndex: Send {
    /// Returns every entry in insertion order
    fn get_all(&self) -> StorageResult<Vec<DatasetEntry>>;

    /// Returns the entry with the given id, if present
    fn get(&self, id: &str) -> StorageResult<Option<DatasetEntry>>;

    /// Returns up to 10 entries ranked by keyword score
    ///
    /// # Arguments
    ///
    /// * `keywords` - Lowercase keywords with stop words already removed
    ///
    /// # Returns
    ///
    /// Entries with a non-zero score, highest first; equal scores keep index order
    fn search(&self, keywords: &[String]) -> StorageResult<Vec<DatasetEntry>>;

    /// Appends a new entry
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Entry appended and persisted
    /// * `Err(StorageError::DuplicateId)` - An entry with the same id exists
    fn add(&mut self, entry: DatasetEntry) -> StorageResult<()>;

    /// Overwrites the entry with the same id, keeping its position
    ///
    /// Fails with `NotFound` if no entry has that id.
    fn replace(&mut self, entry: DatasetEntry) -> StorageResult<()>;

    /// Changes the local path of an entry in place
    ///
    /// # Arguments
    ///
    /// * `old_id` - Id of the entry to update
    /// * `new_path` - New location of the dataset directory
    fn update_path(&mut self, old_id: &str, new_path: &Path) -> StorageResult<()>;

    /// Removes an entry and returns it
    ///
    /// Fails with `NotFound` if no entry has that id.
    fn delete(&mut self, id: &str) -> StorageResult<DatasetEntry>;

    /// Returns entries whose local path is `path` or lies beneath it
    fn find_by_path(&self, path: &Path) -> StorageResult<Vec<DatasetEntry>>;

    /// Returns entries whose name contains `fragment`, case-insensitively
    fn find_by_name(&self, fragment: &str) -> StorageResult<Vec<DatasetEntry>>;
}
