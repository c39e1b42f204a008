//! Fixed-shape progress snapshots and the board that publishes them
//!
//! Snapshots are plain values. Writers build a complete new snapshot and
//! replace the stored one in a single step, so a reader never sees fields
//! from two different updates.

use crate::state::{ProgressKind, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Observable state of a crawl run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    pub status: RunStatus,
    pub pages: u64,
    pub recipes_found: u64,
    pub last_url: Option<String>,
    pub site_id: Option<i64>,
    pub site_name: Option<String>,
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CrawlSnapshot {
    /// Snapshot for a run that is starting now
    pub fn running(site_id: i64, site_name: &str) -> Self {
        Self {
            status: RunStatus::Running,
            site_id: Some(site_id),
            site_name: Some(site_name.to_string()),
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Snapshot for a run that failed before doing any work
    pub fn failed(message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            status: RunStatus::Error,
            message: Some(message.into()),
            started_at: Some(now),
            ended_at: Some(now),
            ..Self::default()
        }
    }

    /// Copy of this snapshot moved into a terminal status
    pub fn finished(&self, status: RunStatus) -> Self {
        Self {
            status,
            ended_at: Some(Utc::now()),
            ..self.clone()
        }
    }
}

/// Observable state of an upload run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSnapshot {
    pub status: RunStatus,
    /// Pending records when the run started
    pub total: u64,
    /// Records attempted so far
    pub done: u64,
    pub uploaded: u64,
    pub failed: u64,
    pub last_url: Option<String>,
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl UploadSnapshot {
    pub fn running() -> Self {
        Self {
            status: RunStatus::Running,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            status: RunStatus::Error,
            message: Some(message.into()),
            started_at: Some(now),
            ended_at: Some(now),
            ..Self::default()
        }
    }

    pub fn finished(&self, status: RunStatus) -> Self {
        Self {
            status,
            ended_at: Some(Utc::now()),
            ..self.clone()
        }
    }
}

/// A snapshot of either run kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Crawl(CrawlSnapshot),
    Upload(UploadSnapshot),
}

impl Snapshot {
    pub fn kind(&self) -> ProgressKind {
        match self {
            Self::Crawl(_) => ProgressKind::Crawl,
            Self::Upload(_) => ProgressKind::Upload,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            Self::Crawl(s) => s.status,
            Self::Upload(s) => s.status,
        }
    }
}

/// Progress sink shared between runs and external viewers
#[derive(Debug, Default)]
pub struct ProgressBoard {
    crawl: RwLock<CrawlSnapshot>,
    upload: RwLock<UploadSnapshot>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored snapshot of the snapshot's kind
    pub fn publish(&self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Crawl(s) => self.publish_crawl(s),
            Snapshot::Upload(s) => self.publish_upload(s),
        }
    }

    /// Reads the latest snapshot of the given kind
    pub fn read(&self, kind: ProgressKind) -> Snapshot {
        match kind {
            ProgressKind::Crawl => Snapshot::Crawl(self.crawl()),
            ProgressKind::Upload => Snapshot::Upload(self.upload()),
        }
    }

    pub fn publish_crawl(&self, snapshot: CrawlSnapshot) {
        let mut slot = self.crawl.write().unwrap_or_else(|e| e.into_inner());
        *slot = snapshot;
    }

    pub fn publish_upload(&self, snapshot: UploadSnapshot) {
        let mut slot = self.upload.write().unwrap_or_else(|e| e.into_inner());
        *slot = snapshot;
    }

    pub fn crawl(&self) -> CrawlSnapshot {
        self.crawl
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn upload(&self) -> UploadSnapshot {
        self.upload
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Serializes the latest snapshot of the given kind for external viewers
    pub fn to_json(&self, kind: ProgressKind) -> serde_json::Result<String> {
        serde_json::to_string(&self.read(kind))
    }
}
