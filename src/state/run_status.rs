/// Run status definitions shared by crawl and upload runs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a crawl or upload run
///
/// `Idle -> Running -> {Done | Stopped | Error}`. A new run always starts
/// from a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run has been started yet
    #[default]
    Idle,

    /// A run is in progress
    Running,

    /// The run was cancelled (external stop or budget exhausted)
    Stopped,

    /// The run finished on its own
    Done,

    /// The run could not start because of a configuration problem
    Error,
}

impl RunStatus {
    /// Returns true if the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Done | Self::Error)
    }

    /// String form used in persisted snapshots and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of run a snapshot describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Crawl,
    Upload,
}

impl ProgressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crawl => f.write_str("Crawl"),
            Self::Upload => f.write_str("Upload"),
        }
    }
}
