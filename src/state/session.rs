use crate::crawler::{Frontier, FrontierEntry};
use crate::gateway::ResourceDescriptor;
use crate::url::normalize_url;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the signal handler and the
/// orchestrator loop
///
/// The orchestrator only looks at the flag between frontier entries, never
/// mid-fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Depth-bounded traversal state for one crawl invocation
///
/// The session exclusively owns its visited set and frontier. Visited entries
/// are normalized URLs, so every equivalent form of a page maps to one entry.
#[derive(Debug)]
pub struct CrawlSession {
    /// Root URL the frontier was seeded with
    pub root_url: String,

    /// Deepest traversal depth that may be fetched
    pub max_depth: u32,

    /// Free-text relevance criteria handed to page analysis
    pub criteria: String,

    /// Directory resources are saved beneath
    pub save_path: PathBuf,

    visited: BTreeSet<String>,
    frontier: Frontier,
    discovered_resources: Vec<ResourceDescriptor>,
    aborted: bool,
}

impl CrawlSession {
    /// Creates a session with the root URL queued at depth 0
    pub fn new(root_url: String, max_depth: u32, criteria: String, save_path: PathBuf) -> Self {
        let mut frontier = Frontier::new();
        frontier.push(FrontierEntry {
            url: root_url.clone(),
            depth: 0,
        });

        Self {
            root_url,
            max_depth,
            criteria,
            save_path,
            visited: BTreeSet::new(),
            frontier,
            discovered_resources: Vec::new(),
            aborted: false,
        }
    }

    /// Merges previously visited URLs (from crawl history) into the visited set
    pub fn merge_visited<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.visited.extend(urls);
    }

    /// Returns true if the URL's normalized form is already visited
    ///
    /// URLs that fail to normalize count as visited so they are never fetched.
    pub fn is_visited(&self, url: &str) -> bool {
        match normalize_url(url) {
            Ok(key) => self.visited.contains(&key),
            Err(_) => true,
        }
    }

    /// Marks a URL visited
    ///
    /// # Returns
    ///
    /// * `Some(key)` - The normalized key, newly inserted
    /// * `None` - The URL was already visited or cannot be normalized
    pub fn mark_visited(&mut self, url: &str) -> Option<String> {
        let key = normalize_url(url).ok()?;
        if self.visited.insert(key.clone()) {
            Some(key)
        } else {
            None
        }
    }

    /// Queues a follow-link at `depth`
    ///
    /// Returns false when the link is deeper than `max_depth`, already visited
    /// or already pending.
    pub fn enqueue(&mut self, url: String, depth: u32) -> bool {
        if depth > self.max_depth || self.is_visited(&url) {
            return false;
        }
        self.frontier.push(FrontierEntry { url, depth })
    }

    /// Pops the next frontier entry
    pub fn next_entry(&mut self) -> Option<FrontierEntry> {
        self.frontier.pop()
    }

    /// Number of entries still waiting in the frontier
    pub fn pending(&self) -> usize {
        self.frontier.len()
    }

    pub fn record_resource(&mut self, resource: ResourceDescriptor) {
        self.discovered_resources.push(resource);
    }

    pub fn discovered_resources(&self) -> &[ResourceDescriptor] {
        &self.discovered_resources
    }

    pub fn visited(&self) -> &BTreeSet<String> {
        &self.visited
    }

    /// Marks the session as ended by cancellation
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}
