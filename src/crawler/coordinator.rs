//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Seeding a session from the parsed instruction and prior crawl history
//! - Walking the frontier under the depth bound and the visited set
//! - Extraction, truncation and page analysis for every fetched page
//! - Downloading resources and committing them to the dataset index
//! - Persisting history on completion and on interruption

use crate::config::Config;
use crate::crawler::resources::materialize_resource;
use crate::crawler::{extract_page, FrontierEntry, HttpFetcher, PageFetcher, TEXT_BUDGET};
use crate::gateway::{ChatClient, CrawlIntent, DecisionGateway, IntentDefaults};
use crate::state::{CancelFlag, CrawlPhase, CrawlSession};
use crate::storage::{
    CrawlHistory, DatasetEntry, DatasetIndex, FileRecord, JsonIndexStore, StorageError,
};
use crate::AgentError;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Settings the coordinator takes from configuration
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Drop page links to other hosts (download links are always kept)
    pub same_domain_only: bool,

    /// Depth used when the instruction does not give one
    pub default_max_depth: u32,

    /// Parent of derived default save paths
    pub datasets_dir: PathBuf,

    /// Crawl history file
    pub history_path: PathBuf,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            same_domain_only: config.crawler.same_domain_only,
            default_max_depth: config.crawler.default_max_depth,
            datasets_dir: config.storage.datasets_dir.clone(),
            history_path: config.storage.history_path.clone(),
        }
    }
}

/// Outcome of one crawl invocation
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub root_url: String,
    pub save_path: PathBuf,
    pub max_depth: u32,

    /// Pages fetched (or attempted) in this session
    pub pages_visited: usize,

    /// Resources accepted by page analysis
    pub resources_found: usize,

    /// Resources with at least one file on disk
    pub resources_downloaded: usize,

    pub datasets_added: usize,
    pub datasets_updated: usize,

    /// Per-page and per-resource failures, in the order they happened
    pub errors: Vec<String>,

    /// True when cancellation ended the traversal early
    pub interrupted: bool,

    pub duration: Duration,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    fetcher: Box<dyn PageFetcher>,
    gateway: DecisionGateway,
    index: Box<dyn DatasetIndex>,
    options: CrawlOptions,
    cancel: CancelFlag,
    phase: CrawlPhase,
}

impl Coordinator {
    /// Creates a coordinator from its collaborators
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Performs page fetches and file downloads
    /// * `gateway` - Consulted for intent parsing and page analysis
    /// * `index` - Receives the datasets found
    /// * `options` - Crawl settings
    /// * `cancel` - Checked between frontier entries
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        gateway: DecisionGateway,
        index: Box<dyn DatasetIndex>,
        options: CrawlOptions,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            fetcher,
            gateway,
            index,
            options,
            cancel,
            phase: CrawlPhase::Idle,
        }
    }

    /// Creates a coordinator with the HTTP fetcher and JSON index from configuration
    pub fn from_config(
        config: &Config,
        chat: Box<dyn ChatClient>,
        cancel: CancelFlag,
    ) -> Result<Self, AgentError> {
        let fetcher = HttpFetcher::new(&config.network)?;
        let index = JsonIndexStore::new(config.storage.index_path.clone());

        Ok(Self::new(
            Box::new(fetcher),
            DecisionGateway::new(chat),
            Box::new(index),
            CrawlOptions::from_config(config),
            cancel,
        ))
    }

    /// Current phase of the state machine
    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), AgentError> {
        self.phase = self.phase.transition(next)?;
        info!("Crawl phase: {}", self.phase);
        Ok(())
    }

    /// Runs a crawl from a free-text instruction
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - The crawl finished or was interrupted; either way
    ///   results and history were persisted
    /// * `Err(AgentError)` - Seeding failed (intent could not be parsed, history
    ///   unreadable); nothing was fetched
    pub async fn run(&mut self, instruction: &str) -> Result<CrawlSummary, AgentError> {
        self.phase = CrawlPhase::Idle;
        self.transition(CrawlPhase::Seeding)?;

        let defaults = IntentDefaults {
            datasets_dir: &self.options.datasets_dir,
            max_depth: self.options.default_max_depth,
        };
        let intent = self.gateway.parse_intent(instruction, &defaults).await?;

        info!(
            "Parsed intent: url={}, max_depth={}, criteria={:?}, save_path={}",
            intent.url,
            intent.max_depth,
            intent.criteria,
            intent.save_path.display()
        );

        self.crawl(intent).await
    }

    /// Runs a crawl from already parsed parameters
    pub async fn run_intent(&mut self, intent: CrawlIntent) -> Result<CrawlSummary, AgentError> {
        self.phase = CrawlPhase::Idle;
        self.transition(CrawlPhase::Seeding)?;
        self.crawl(intent).await
    }

    async fn crawl(&mut self, intent: CrawlIntent) -> Result<CrawlSummary, AgentError> {
        let start_time = Instant::now();

        let history = CrawlHistory::load(&self.options.history_path)?;
        info!(
            "Loaded crawl history with {} visited URLs",
            history.visited_urls.len()
        );

        let mut session = CrawlSession::new(
            intent.url,
            intent.max_depth,
            intent.criteria,
            intent.save_path,
        );
        session.merge_visited(history.visited_urls.iter().cloned());

        let mut summary = CrawlSummary {
            root_url: session.root_url.clone(),
            save_path: session.save_path.clone(),
            max_depth: session.max_depth,
            ..CrawlSummary::default()
        };

        self.transition(CrawlPhase::Traversing)?;
        let entries = self.traverse(&mut session, &mut summary).await;
        summary.resources_found = session.discovered_resources().len();

        if session.is_aborted() {
            self.transition(CrawlPhase::Interrupted)?;
            summary.interrupted = true;
        }

        self.transition(CrawlPhase::Finalizing)?;
        self.finalize(&session, history, entries, &mut summary);

        self.transition(CrawlPhase::Done)?;
        summary.duration = start_time.elapsed();

        info!(
            "Crawl finished: {} pages, {} resources found, {} downloaded, {} errors",
            summary.pages_visited,
            summary.resources_found,
            summary.resources_downloaded,
            summary.errors.len()
        );

        Ok(summary)
    }

    /// Processes frontier entries until the frontier is empty or cancellation
    /// is observed; returns the entries materialized along the way
    async fn traverse(
        &mut self,
        session: &mut CrawlSession,
        summary: &mut CrawlSummary,
    ) -> Vec<DatasetEntry> {
        let mut entries = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                warn!(
                    "Cancellation requested, stopping with {} entries left in the frontier",
                    session.pending()
                );
                session.abort();
                break;
            }

            let Some(entry) = session.next_entry() else {
                info!("Frontier is empty, traversal complete");
                break;
            };

            if entry.depth > session.max_depth {
                debug!("Skipping {} at depth {} (beyond limit)", entry.url, entry.depth);
                continue;
            }

            // marked before fetching so a page is processed at most once
            if session.mark_visited(&entry.url).is_none() {
                debug!("Skipping already visited {}", entry.url);
                continue;
            }

            summary.pages_visited += 1;
            info!(
                "[{}] depth {}: {} ({} pending)",
                summary.pages_visited,
                entry.depth,
                entry.url,
                session.pending()
            );

            self.process_page(session, &entry, summary, &mut entries)
                .await;
        }

        entries
    }

    /// Fetch, extract, truncate, analyze, download, enqueue
    ///
    /// Failures are recorded in the summary; none of them stop the session.
    async fn process_page(
        &self,
        session: &mut CrawlSession,
        entry: &FrontierEntry,
        summary: &mut CrawlSummary,
        entries: &mut Vec<DatasetEntry>,
    ) {
        let html = match self.fetcher.fetch(&entry.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Fetch failed for {}: {}", entry.url, e);
                summary.errors.push(format!("fetch {}: {}", entry.url, e));
                return;
            }
        };

        let base_url = match Url::parse(&entry.url) {
            Ok(url) => url,
            Err(e) => {
                summary.errors.push(format!("url {}: {}", entry.url, e));
                return;
            }
        };

        let extraction = extract_page(&html, &base_url, self.options.same_domain_only);
        if !extraction.usable {
            warn!("Unusable markup at {}", entry.url);
            summary
                .errors
                .push(format!("extract {}: markup could not be parsed", entry.url));
            return;
        }

        let content = extraction.content.truncate(TEXT_BUDGET);
        debug!(
            "Extracted {} chars (truncated: {}) and {} links from {}",
            content.clean_text.chars().count(),
            content.truncated,
            content.links.len(),
            entry.url
        );

        let analysis = match self
            .gateway
            .analyze_page(&content.clean_text, &content.links, &session.criteria)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Page analysis failed for {}: {}", entry.url, e);
                summary.errors.push(format!("analyze {}: {}", entry.url, e));
                return;
            }
        };

        for resource in analysis.resources {
            match materialize_resource(
                self.fetcher.as_ref(),
                &resource,
                &entry.url,
                &session.save_path,
            )
            .await
            {
                Ok(done) => {
                    summary.resources_downloaded += 1;
                    for (url, reason) in done.failed_downloads {
                        summary.errors.push(format!("download {}: {}", url, reason));
                    }
                    entries.push(done.entry);
                }
                Err(e) => {
                    warn!("Resource {} failed: {}", resource.name, e);
                    summary.errors.push(format!("resource {}: {}", resource.name, e));
                }
            }
            session.record_resource(resource);
        }

        if entry.depth >= session.max_depth {
            if !analysis.follow_links.is_empty() {
                debug!(
                    "Not following {} links from {} (depth limit)",
                    analysis.follow_links.len(),
                    entry.url
                );
            }
            return;
        }

        let mut queued = 0;
        for link in analysis.follow_links {
            if session.enqueue(link, entry.depth + 1) {
                queued += 1;
            }
        }
        debug!("Queued {} follow links from {}", queued, entry.url);
    }

    /// Commits entries to the index and persists the merged history
    ///
    /// Runs on normal completion and after interruption alike.
    fn finalize(
        &mut self,
        session: &CrawlSession,
        mut history: CrawlHistory,
        entries: Vec<DatasetEntry>,
        summary: &mut CrawlSummary,
    ) {
        for entry in merge_same_ids(entries) {
            let id = entry.id.clone();
            let outcome = match self.index.add(entry.clone()) {
                Ok(()) => {
                    summary.datasets_added += 1;
                    Ok(())
                }
                // re-crawl of the same save path
                Err(StorageError::DuplicateId(_)) => self.index.replace(entry).map(|()| {
                    summary.datasets_updated += 1;
                }),
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                error!("Failed to commit dataset {}: {}", id, e);
                summary.errors.push(format!("index {}: {}", id, e));
            }
        }

        history.merge(session.visited().iter().cloned());
        match history.save(&self.options.history_path) {
            Ok(()) => info!(
                "Saved crawl history ({} visited URLs)",
                history.visited_urls.len()
            ),
            Err(e) => {
                error!("Failed to save crawl history: {}", e);
                summary.errors.push(format!("history: {}", e));
            }
        }
    }
}

/// Collapses entries that share an id (one directory written from several
/// pages); the latest metadata wins and file lists are unioned by name
fn merge_same_ids(entries: Vec<DatasetEntry>) -> Vec<DatasetEntry> {
    let mut merged: Vec<DatasetEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match merged.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                let mut files: Vec<FileRecord> = existing
                    .files
                    .iter()
                    .filter(|f| !entry.files.iter().any(|n| n.name == f.name))
                    .cloned()
                    .collect();
                files.extend(entry.files.iter().cloned());
                *existing = DatasetEntry { files, ..entry };
            }
            None => merged.push(entry),
        }
    }

    merged
}
