//! Storage module for persisting crawl results
//!
//! This module handles the file-backed state shared by every command:
//! - The dataset index (`{"datasets": [...]}`) and its keyword search
//! - The crawl history of visited URLs carried across sessions
//! - Atomic write-new-then-replace JSON persistence

mod atomic;
mod history;
mod index;
mod traits;

pub use atomic::{read_json_or_default, write_json_atomic};
pub use history::CrawlHistory;
pub use index::{score_entry, JsonIndexStore, MAX_SEARCH_RESULTS};
pub use traits::{DatasetIndex, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// A downloaded file and its size on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub size: u64,
}

/// A dataset catalogued in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Unique, derived from the dataset directory (see [`dataset_id`])
    pub id: String,
    pub name: String,
    pub source_url: String,
    pub local_path: PathBuf,
    #[serde(default)]
    pub description: String,
    /// Facts stated on the source page, passed through as given
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub crawl_time: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl DatasetEntry {
    /// Total bytes across all downloaded files
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Derives the stable dataset id for a dataset directory
///
/// The path is written with `/` separators, lowercased, and spaces become `_`,
/// so re-crawling into the same directory yields the same id.
pub fn dataset_id(local_path: &Path) -> String {
    local_path
        .to_string_lossy()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_lowercase()
        .replace(' ', "_")
}

/// Resolves a path to an absolute form with `.`, `..` and symlinks removed
///
/// A path that does not exist is resolved through its deepest existing
/// ancestor, with the remaining components folded on top of it. Relative
/// paths with no existing ancestor are joined to the working directory.
pub fn canonical_path(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        let Ok(base) = std::fs::canonicalize(ancestor) else {
            continue;
        };
        let rest = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
        return push_lexically(base, rest);
    }

    match std::env::current_dir() {
        Ok(cwd) if !path.is_absolute() => push_lexically(cwd, path),
        _ => push_lexically(PathBuf::new(), path),
    }
}

/// Appends `rest` to `base`, folding `.` and `..` without touching the disk
fn push_lexically(mut base: PathBuf, rest: &Path) -> PathBuf {
    for component in rest.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                base.pop();
            }
            other => base.push(other.as_os_str()),
        }
    }
    base
}
