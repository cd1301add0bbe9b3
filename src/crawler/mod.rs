//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and request throttling
//! - Content extraction and budgeted truncation
//! - Frontier management
//! - Resource downloads
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod resources;
mod scheduler;
mod truncate;

pub use coordinator::{Coordinator, CrawlOptions, CrawlSummary};
pub use extractor::{extract_page, Extraction, PageContent};
pub use fetcher::{build_http_client, FetchError, HttpFetcher, PageFetcher};
pub use resources::{
    materialize_resource, safe_dir_name, MaterializedResource, ResourceError, SIDECAR_FILE,
};
pub use scheduler::{Frontier, FrontierEntry, Throttle};
pub use truncate::truncate_text;

use crate::config::Config;
use crate::gateway::ChatClient;
use crate::state::CancelFlag;
use crate::AgentError;

/// Character budget for page text sent to page analysis
pub const TEXT_BUDGET: usize = 8000;

/// Maximum number of links offered to page analysis
pub const MAX_LINKS: usize = 50;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP fetcher and open the dataset index
/// 2. Parse the instruction into crawl parameters
/// 3. Traverse pages under the depth bound
/// 4. Download matching resources
/// 5. Commit datasets and persist crawl history
///
/// # Arguments
///
/// * `config` - The agent configuration
/// * `chat` - Chat client backing the decision gateway
/// * `instruction` - The user's free-text crawl instruction
/// * `cancel` - Cancellation flag, set by the interrupt handler
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Crawl completed or was interrupted after finalizing
/// * `Err(AgentError)` - Crawl could not start
pub async fn crawl(
    config: &Config,
    chat: Box<dyn ChatClient>,
    instruction: &str,
    cancel: CancelFlag,
) -> Result<CrawlSummary, AgentError> {
    let mut coordinator = Coordinator::from_config(config, chat, cancel)?;
    coordinator.run(instruction).await
}
