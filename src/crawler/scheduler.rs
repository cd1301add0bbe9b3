//! Scheduler for managing the crawl frontier and rate limiting
//!
//! This module handles:
//! - The FIFO worklist of `(url, depth)` entries awaiting traversal
//! - Suppressing duplicate pending entries by normalized URL
//! - The minimum interval between consecutive outbound requests

use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A URL queued for traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// The URL as discovered (not normalized)
    pub url: String,

    /// Traversal depth; the root is depth 0
    pub depth: u32,
}

/// FIFO frontier
///
/// Entries are processed in insertion order, which makes the traversal
/// breadth-first by depth. A URL whose normalized form is already pending is
/// not queued twice.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    pending: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an entry
    ///
    /// # Returns
    ///
    /// * `true` - The entry was queued
    /// * `false` - The URL cannot be normalized or is already pending
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        let Ok(key) = normalize_url(&entry.url) else {
            return false;
        };

        if !self.pending.insert(key) {
            return false;
        }

        self.queue.push_back(entry);
        true
    }

    /// Removes and returns the oldest entry
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        if let Ok(key) = normalize_url(&entry.url) {
            self.pending.remove(&key);
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Enforces a minimum interval between consecutive outbound requests
///
/// This is a rate limit, not a concurrency primitive: callers are sequential
/// and simply wait until the interval since the previous request has passed.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// Waits until a request may be sent, then records it as sent
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let next_allowed = previous + self.interval;
            if Instant::now() < next_allowed {
                tokio::time::sleep_until(next_allowed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, depth: u32) -> FrontierEntry {
        FrontierEntry {
            url: url.to_string(),
            depth,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new();
        frontier.push(entry("https://example.com/a", 0));
        frontier.push(entry("https://example.com/b", 1));
        frontier.push(entry("https://example.com/c", 1));

        let order: Vec<String> = std::iter::from_fn(|| frontier.pop())
            .map(|e| e.url)
            .collect();
        assert_eq!(
            order,
            vec![
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/c"
            ]
        );
    }

    #[test]
    fn test_duplicate_pending_rejected() {
        let mut frontier = Frontier::new();
        assert!(frontier.push(entry("https://example.com/a", 1)));
        assert!(!frontier.push(entry("https://example.com/a/#x", 2)));
        assert_eq!(frontier.len(), 1);

        frontier.pop();
        assert!(frontier.is_empty());
        // no longer pending, so it may be queued again
        assert!(frontier.push(entry("https://example.com/a", 2)));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut frontier = Frontier::new();
        assert!(!frontier.push(entry("not a url", 0)));
        assert!(frontier.is_empty());
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let throttle = Throttle::new(Duration::from_millis(50));
        let start = Instant::now();

        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_first_request_not_delayed() {
        let throttle = Throttle::new(Duration::from_secs(5));
        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
