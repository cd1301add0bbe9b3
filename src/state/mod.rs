//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: orchestrator state machine (idle, seeding, traversing, interrupted, finalizing, done)
//! - `CrawlSession`: visited set, frontier and discovered resources of one crawl
//! - `CancelFlag`: cooperative cancellation shared with the signal handler

mod phase;
mod session;

// Re-export main types
pub use phase::CrawlPhase;
pub use session::{CancelFlag, CrawlSession};
