use crate::storage::atomic::{read_json_or_default, write_json_atomic};
use crate::storage::StorageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Normalized URLs visited across all crawl sessions
///
/// Append-only: sessions merge their visited sets in and nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlHistory {
    #[serde(default)]
    pub visited_urls: BTreeSet<String>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CrawlHistory {
    /// Loads the history, or an empty one if the file does not exist
    pub fn load(path: &Path) -> StorageResult<Self> {
        read_json_or_default(path)
    }

    /// Adds URLs to the history
    pub fn merge<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.visited_urls.extend(urls);
    }

    /// Stamps `last_updated` and writes the history atomically
    pub fn save(&mut self, path: &Path) -> StorageResult<()> {
        self.last_updated = Some(Utc::now());
        write_json_atomic(path, self)
    }
}
