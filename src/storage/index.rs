use crate::storage::atomic::{read_json_or_default, write_json_atomic};
use crate::storage::traits::{DatasetIndex, StorageError, StorageResult};
use crate::storage::{canonical_path, DatasetEntry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum number of entries `search` returns
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Score for a keyword found in the dataset name
const NAME_MATCH_SCORE: u32 = 10;

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    datasets: Vec<DatasetEntry>,
}

/// JSON-file implementation of the dataset index
///
/// The whole file is read on every call and rewritten atomically on every
/// mutation. A missing file is an empty index; a corrupt one is an error.
#[derive(Debug, Clone)]
pub struct JsonIndexStore {
    path: PathBuf,
}

impl JsonIndexStore {
    /// Creates a store backed by `path`; the file need not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<Vec<DatasetEntry>> {
        let file: IndexFile = read_json_or_default(&self.path)?;
        Ok(file.datasets)
    }

    fn save(&self, datasets: Vec<DatasetEntry>) -> StorageResult<()> {
        write_json_atomic(&self.path, &IndexFile { datasets })
    }

    fn position(datasets: &[DatasetEntry], id: &str) -> StorageResult<usize> {
        datasets
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}

impl DatasetIndex for JsonIndexStore {
    fn get_all(&self) -> StorageResult<Vec<DatasetEntry>> {
        self.load()
    }

    fn get(&self, id: &str) -> StorageResult<Option<DatasetEntry>> {
        Ok(self.load()?.into_iter().find(|d| d.id == id))
    }

    fn search(&self, keywords: &[String]) -> StorageResult<Vec<DatasetEntry>> {
        Ok(rank_entries(self.load()?, keywords))
    }

    fn add(&mut self, entry: DatasetEntry) -> StorageResult<()> {
        let mut datasets = self.load()?;
        if datasets.iter().any(|d| d.id == entry.id) {
            return Err(StorageError::DuplicateId(entry.id));
        }

        tracing::debug!("Adding dataset {} to index", entry.id);
        datasets.push(entry);
        self.save(datasets)
    }

    fn replace(&mut self, entry: DatasetEntry) -> StorageResult<()> {
        let mut datasets = self.load()?;
        let pos = Self::position(&datasets, &entry.id)?;

        tracing::debug!("Replacing dataset {} in index", entry.id);
        datasets[pos] = entry;
        self.save(datasets)
    }

    fn update_path(&mut self, old_id: &str, new_path: &Path) -> StorageResult<()> {
        let mut datasets = self.load()?;
        let pos = Self::position(&datasets, old_id)?;

        datasets[pos].local_path = new_path.to_path_buf();
        self.save(datasets)
    }

    fn delete(&mut self, id: &str) -> StorageResult<DatasetEntry> {
        let mut datasets = self.load()?;
        let pos = Self::position(&datasets, id)?;

        let removed = datasets.remove(pos);
        self.save(datasets)?;
        Ok(removed)
    }

    fn find_by_path(&self, path: &Path) -> StorageResult<Vec<DatasetEntry>> {
        let root = canonical_path(path);
        Ok(self
            .load()?
            .into_iter()
            .filter(|d| canonical_path(&d.local_path).starts_with(&root))
            .collect())
    }

    fn find_by_name(&self, fragment: &str) -> StorageResult<Vec<DatasetEntry>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .load()?
            .into_iter()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .collect())
    }
}

/// Scores one entry against a keyword list
///
/// 10 if any keyword is a substring of the name, plus 1 for each keyword found
/// in the description, 1 for each keyword found in some tag, and 1 for each
/// keyword found in the serialized properties. All matching is case-insensitive.
pub fn score_entry(entry: &DatasetEntry, keywords: &[String]) -> u32 {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    if keywords.is_empty() {
        return 0;
    }

    let name = entry.name.to_lowercase();
    let description = entry.description.to_lowercase();
    let tags: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();
    let properties = serde_json::Value::Object(entry.properties.clone())
        .to_string()
        .to_lowercase();

    let mut score = 0;

    if keywords.iter().any(|k| name.contains(k.as_str())) {
        score += NAME_MATCH_SCORE;
    }

    for keyword in &keywords {
        if description.contains(keyword.as_str()) {
            score += 1;
        }
        if tags.iter().any(|t| t.contains(keyword.as_str())) {
            score += 1;
        }
        if properties.contains(keyword.as_str()) {
            score += 1;
        }
    }

    score
}

/// Drops zero-score entries, stable-sorts by descending score and keeps the top results
fn rank_entries(entries: Vec<DatasetEntry>, keywords: &[String]) -> Vec<DatasetEntry> {
    let mut scored: Vec<(u32, DatasetEntry)> = entries
        .into_iter()
        .map(|entry| (score_entry(&entry, keywords), entry))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(MAX_SEARCH_RESULTS)
        .map(|(_, entry)| entry)
        .collect()
}
