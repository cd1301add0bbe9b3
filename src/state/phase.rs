/// Crawl phase definitions for the orchestrator state machine
///
/// A crawl moves `Idle -> Seeding -> Traversing -> Finalizing -> Done`, with a
/// side exit `Traversing -> Interrupted -> Finalizing` on cancellation.
use crate::AgentError;
use std::fmt;

/// Represents the phase a crawl invocation is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing has happened yet
    Idle,

    /// Intent is being parsed and the session/history initialized
    Seeding,

    /// Frontier entries are being processed
    Traversing,

    /// Cancellation was observed between frontier entries
    Interrupted,

    /// Entries are committed to the index and history persisted
    Finalizing,

    /// Terminal
    Done,
}

impl CrawlPhase {
    /// Returns true if `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Seeding)
                | (Self::Seeding, Self::Traversing)
                | (Self::Traversing, Self::Finalizing)
                | (Self::Traversing, Self::Interrupted)
                | (Self::Interrupted, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
        )
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlPhase)` - The new phase
    /// * `Err(AgentError::InvalidTransition)` - `next` is not reachable from here
    pub fn transition(self, next: CrawlPhase) -> Result<CrawlPhase, AgentError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AgentError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the lowercase name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Traversing => "traversing",
            Self::Interrupted => "interrupted",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }

    /// Returns all phases in lifecycle order
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Seeding,
            Self::Traversing,
            Self::Interrupted,
            Self::Finalizing,
            Self::Done,
        ]
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
