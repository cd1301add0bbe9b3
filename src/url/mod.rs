//! URL handling module for crawl-agent
//!
//! This module provides URL normalization (the visited-set identity key), host
//! extraction, the data-file extension allowlist used to tell download links from
//! pages, and the derivation of default save locations.

mod normalize;

use std::path::{Path, PathBuf};
use url::Url;

pub use normalize::{normalize_parsed, normalize_url};

/// Path suffixes that mark a link as a direct data-file reference
pub const DOWNLOAD_EXTENSIONS: &[&str] = &[
    ".gz", ".zip", ".tar", ".bz2", ".xz", ".7z", ".csv", ".tsv", ".txt", ".json", ".xml",
    ".parquet", ".feather", ".hdf5", ".h5", ".mat", ".npz", ".npy", ".pkl", ".pickle",
];

/// Returns the lowercase host of a URL string, if it has one
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Returns true if the URL is an absolute http(s) URL whose path ends with an
/// allowlisted data-file extension
///
/// # Examples
///
/// ```
/// use crawl_agent::url::is_download_url;
///
/// assert!(is_download_url("https://example.com/files/graph.txt.gz"));
/// assert!(!is_download_url("https://example.com/datasets/graph.html"));
/// ```
pub fn is_download_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    let path = parsed.path().to_lowercase();
    DOWNLOAD_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Returns true if `text` mentions something that looks like a data file name
pub fn mentions_data_file(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',')
        .map(|token| token.trim_end_matches(['.', ';', ':']))
        .any(|token| {
            DOWNLOAD_EXTENSIONS
                .iter()
                .any(|ext| token.len() > ext.len() && token.ends_with(ext))
        })
}

/// Derives the save directory used when the instruction names none:
/// `<datasets_dir>/<host with '.' replaced by '_'>`
pub fn default_save_path(datasets_dir: &Path, root_url: &str) -> PathBuf {
    let host = Url::parse(root_url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|h| match u.port() {
                Some(port) => format!("{}_{}", h, port),
                None => h.to_string(),
            })
        })
        .unwrap_or_else(|| "unknown".to_string());

    datasets_dir.join(host.to_lowercase().replace('.', "_"))
}

/// Returns the file name a download URL is saved under (last path segment,
/// `data` when the path has none)
pub fn file_name_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| "data".to_string())
}
