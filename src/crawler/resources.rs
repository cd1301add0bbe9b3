//! Resource materialization: downloads, `meta.json` sidecar, index entry

use crate::crawler::PageFetcher;
use crate::gateway::ResourceDescriptor;
use crate::storage::{dataset_id, write_json_atomic, DatasetEntry, FileRecord, StorageError};
use crate::url::{extract_host, file_name_from_url};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Name of the per-resource sidecar file
pub const SIDECAR_FILE: &str = "meta.json";

/// Errors that fail a whole resource
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("No files downloaded for {name}")]
    NothingDownloaded { name: String },

    #[error("Failed to write sidecar for {name}: {source}")]
    Sidecar { name: String, source: StorageError },
}

/// A resource whose files are on disk
#[derive(Debug, Clone)]
pub struct MaterializedResource {
    pub entry: DatasetEntry,

    /// Download URLs that failed, with the reason
    pub failed_downloads: Vec<(String, String)>,
}

#[derive(Serialize)]
struct Sidecar<'a> {
    #[serde(flatten)]
    resource: &'a ResourceDescriptor,
    source_url: &'a str,
    crawl_time: DateTime<Utc>,
    files: &'a [FileRecord],
}

/// Replaces every character other than alphanumerics, `-` and `_` with `_`
pub fn safe_dir_name(name: &str) -> String {
    let safe: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.is_empty() {
        "dataset".to_string()
    } else {
        safe
    }
}

/// Downloads a resource's files and records them
///
/// Files go to `<save_path>/<safe name>/<last url segment>`. A download that
/// fails is reported in `failed_downloads` and the rest continue; the
/// resource fails only when no file at all was downloaded.
///
/// # Arguments
///
/// * `fetcher` - Performs the downloads
/// * `resource` - Validated descriptor from page analysis
/// * `source_url` - Page the resource was found on
/// * `save_path` - Session save directory
pub async fn materialize_resource(
    fetcher: &dyn PageFetcher,
    resource: &ResourceDescriptor,
    source_url: &str,
    save_path: &Path,
) -> Result<MaterializedResource, ResourceError> {
    let dataset_dir = save_path.join(safe_dir_name(&resource.name));

    tokio::fs::create_dir_all(&dataset_dir)
        .await
        .map_err(|source| ResourceError::CreateDir {
            path: dataset_dir.display().to_string(),
            source,
        })?;

    let mut files = Vec::new();
    let mut failed_downloads = Vec::new();
    let mut used_names = HashSet::new();

    for url in &resource.download_urls {
        let file_name = unique_file_name(file_name_from_url(url), &mut used_names);
        let dest = dataset_dir.join(&file_name);

        match fetcher.download(url, &dest).await {
            Ok(size) => {
                info!("Downloaded {} ({} bytes)", file_name, size);
                files.push(FileRecord {
                    name: file_name,
                    size,
                });
            }
            Err(e) => {
                warn!("Download failed for {}: {}", url, e);
                failed_downloads.push((url.clone(), e.to_string()));
            }
        }
    }

    if files.is_empty() {
        return Err(ResourceError::NothingDownloaded {
            name: resource.name.clone(),
        });
    }

    let crawl_time = Utc::now();

    write_json_atomic(
        &dataset_dir.join(SIDECAR_FILE),
        &Sidecar {
            resource,
            source_url,
            crawl_time,
            files: &files,
        },
    )
    .map_err(|source| ResourceError::Sidecar {
        name: resource.name.clone(),
        source,
    })?;

    Ok(MaterializedResource {
        entry: build_entry(resource, source_url, dataset_dir, crawl_time, files),
        failed_downloads,
    })
}

fn build_entry(
    resource: &ResourceDescriptor,
    source_url: &str,
    local_path: PathBuf,
    crawl_time: DateTime<Utc>,
    files: Vec<FileRecord>,
) -> DatasetEntry {
    let tags: BTreeSet<String> = extract_host(source_url).into_iter().collect();

    DatasetEntry {
        id: dataset_id(&local_path),
        name: resource.name.clone(),
        source_url: source_url.to_string(),
        local_path,
        description: resource.description.clone(),
        properties: resource.properties.clone(),
        tags,
        crawl_time,
        files,
    }
}

/// Prefixes a counter when two URLs of one resource share a file name
fn unique_file_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }

    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", n, name);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
