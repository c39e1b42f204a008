//! Traversal status of a URL known to the frontier

use std::fmt;

/// Position of a URL in the queued -> in-flight -> visited lifecycle
///
/// Transitions only move forward; a URL never returns to `Queued` within a
/// run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    /// Waiting in the frontier queue
    Queued,

    /// Handed to a worker, not yet finished
    InFlight,

    /// Finished (fetched, failed, or claimed as a recipe leaf)
    Visited,
}

impl EntryStatus {
    /// Returns true if moving from `self` to `to` is allowed
    pub fn can_transition_to(&self, to: EntryStatus) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::InFlight) | (Self::InFlight, Self::Visited)
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::InFlight => "in-flight",
            Self::Visited => "visited",
        };
        f.write_str(s)
    }
}
