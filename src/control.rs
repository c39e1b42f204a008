//! Control surface: starts, stops and observes crawl and upload runs
//!
//! At most one run of each kind exists at a time. A run counts as active
//! until every one of its workers has stopped, so a new run can never
//! overlap a cancelled one that is still draining.

use crate::config::{Config, SiteProfile, UploadConfig};
use crate::crawler::{self, PrescanReport};
use crate::state::{CrawlSnapshot, ProgressBoard, ProgressKind, UploadSnapshot};
use crate::storage::{self, SharedStorage};
use crate::upload;
use crate::HarvestError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Handle to a spawned run
#[derive(Debug)]
struct RunSlot {
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

impl RunSlot {
    fn is_active(&self) -> bool {
        // A dropped sender means the task is gone, even if it panicked
        !*self.finished.borrow() && self.finished.has_changed().is_ok()
    }
}

/// Owns the shared store and progress board, and the runs using them
#[derive(Debug)]
pub struct Harvester {
    storage: SharedStorage,
    progress: Arc<ProgressBoard>,
    upload: UploadConfig,
    crawl_run: Mutex<Option<RunSlot>>,
    upload_run: Mutex<Option<RunSlot>>,
}

impl Harvester {
    pub fn new(storage: SharedStorage, upload: UploadConfig) -> Self {
        Self {
            storage,
            progress: Arc::new(ProgressBoard::new()),
            upload,
            crawl_run: Mutex::new(None),
            upload_run: Mutex::new(None),
        }
    }

    /// Opens the configured database and builds a harvester around it
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let storage = storage::open_shared(Path::new(&config.storage.database_path))?;
        Ok(Self::new(storage, config.upload.clone()))
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Board holding the latest snapshot of each run kind
    pub fn progress(&self) -> Arc<ProgressBoard> {
        Arc::clone(&self.progress)
    }

    fn slot(&self, kind: ProgressKind) -> std::sync::MutexGuard<'_, Option<RunSlot>> {
        let slot = match kind {
            ProgressKind::Crawl => &self.crawl_run,
            ProgressKind::Upload => &self.upload_run,
        };
        slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true while a run of the given kind has workers alive
    pub fn is_running(&self, kind: ProgressKind) -> bool {
        self.slot(kind).as_ref().is_some_and(RunSlot::is_active)
    }

    /// Starts a crawl of the given profile in the background
    ///
    /// The profile is copied into the run. With `None` the run is still
    /// started and ends immediately in `error`, which is what viewers see.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`HarvestError::AlreadyRunning`] if a crawl is active.
    pub fn start_crawl(&self, site: Option<SiteProfile>) -> Result<(), HarvestError> {
        let storage = self.storage.clone();
        let progress = self.progress();
        self.start(ProgressKind::Crawl, move |cancel| async move {
            crawler::run_crawl(site, storage, progress, cancel).await;
        })
    }

    /// Starts an upload of all pending recipes in the background
    ///
    /// # Errors
    ///
    /// [`HarvestError::AlreadyRunning`] if an upload is active.
    pub fn start_upload(&self) -> Result<(), HarvestError> {
        let config = self.upload.clone();
        let storage = self.storage.clone();
        let progress = self.progress();
        self.start(ProgressKind::Upload, move |cancel| async move {
            upload::run_upload(config, storage, progress, cancel).await;
        })
    }

    fn start<F, Fut>(&self, kind: ProgressKind, run: F) -> Result<(), HarvestError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot(kind);
        if slot.as_ref().is_some_and(RunSlot::is_active) {
            return Err(HarvestError::AlreadyRunning { kind });
        }

        let cancel = CancellationToken::new();
        let (done_tx, finished) = watch::channel(false);
        let task = run(cancel.clone());
        tokio::spawn(async move {
            task.await;
            let _ = done_tx.send(true);
        });

        tracing::debug!("{} run started", kind);
        *slot = Some(RunSlot { cancel, finished });
        Ok(())
    }

    /// Requests the active crawl to stop; no-op when none is active
    pub fn stop_crawl(&self) {
        self.stop(ProgressKind::Crawl);
    }

    /// Requests the active upload to stop; no-op when none is active
    pub fn stop_upload(&self) {
        self.stop(ProgressKind::Upload);
    }

    fn stop(&self, kind: ProgressKind) {
        if let Some(run) = self.slot(kind).as_ref() {
            if run.is_active() {
                tracing::info!("Stopping {} run", kind);
                run.cancel.cancel();
            }
        }
    }

    async fn wait(&self, kind: ProgressKind) {
        let receiver = self.slot(kind).as_ref().map(|run| run.finished.clone());
        if let Some(mut finished) = receiver {
            // Err means the run task is gone, which also ends the wait
            let _ = finished.wait_for(|done| *done).await;
        }
    }

    /// Waits for the current crawl (if any) to end and returns the latest
    /// crawl snapshot
    pub async fn wait_crawl(&self) -> CrawlSnapshot {
        self.wait(ProgressKind::Crawl).await;
        self.progress.crawl()
    }

    /// Waits for the current upload (if any) to end and returns the latest
    /// upload snapshot
    pub async fn wait_upload(&self) -> UploadSnapshot {
        self.wait(ProgressKind::Upload).await;
        self.progress.upload()
    }

    /// Guesses profile values for a new site
    pub async fn prescan(&self, start_url: &str) -> Result<PrescanReport, HarvestError> {
        crawler::prescan(start_url).await
    }

    /// Checks the configured import API credentials
    pub async fn check_upload(&self) -> Result<String, HarvestError> {
        upload::probe_api(&self.upload).await
    }
}
