//! Crawler coordinator - main crawl orchestration logic
//!
//! A run owns an immutable copy of its site profile, a frontier, a fetcher,
//! a classifier, and counters. Worker tasks share all of it through one
//! `Arc<RunContext>`:
//! - Pages are taken from the frontier FIFO and their same-host links added
//! - Recipe candidates are claimed once, fetched, classified, and stored
//! - Page and recipe budgets cancel the run when exhausted
//! - The terminal status is published only after every worker has stopped

use crate::config::{validate_site, SiteProfile};
use crate::crawler::classifier::RecipeClassifier;
use crate::crawler::fetcher::{FetchOptions, FetchResult, Fetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::parse_html;
use crate::state::{CrawlSnapshot, ProgressBoard, ProgressKind, RunStatus};
use crate::storage::{self, LogLevel, RecipeStore, SharedStorage};
use crate::url::{is_recipe_candidate, normalize_url};
use crate::HarvestError;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Counters of a run, always published together as one snapshot
#[derive(Debug)]
struct Tally {
    snapshot: CrawlSnapshot,
    /// Page slots handed out; may run ahead of `snapshot.pages` while fetches
    /// are in flight
    pages_reserved: u64,
}

/// State shared by every worker of one crawl run
struct RunContext {
    site: SiteProfile,
    start: Url,
    frontier: Frontier,
    fetcher: Fetcher,
    classifier: RecipeClassifier,
    limiter: Semaphore,
    storage: SharedStorage,
    progress: Arc<ProgressBoard>,
    cancel: CancellationToken,
    tally: Mutex<Tally>,
}

impl RunContext {
    fn tally(&self) -> std::sync::MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, level: LogLevel, message: &str, url: Option<&str>) {
        storage::log_event(&self.storage, level, message, url, Some(self.site.id));
    }

    /// Reserves one page fetch against the budgets
    ///
    /// Returns false when either budget is exhausted; the caller must not
    /// fetch.
    fn reserve_page(&self) -> bool {
        let mut tally = self.tally();
        if let Some(budget) = self.site.page_budget() {
            if tally.pages_reserved >= budget {
                return false;
            }
        }
        if let Some(budget) = self.site.recipe_budget() {
            if tally.snapshot.recipes_found >= budget {
                return false;
            }
        }
        tally.pages_reserved += 1;
        true
    }

    fn recipe_budget_reached(&self) -> bool {
        self.site
            .recipe_budget()
            .is_some_and(|budget| self.tally().snapshot.recipes_found >= budget)
    }

    /// Counts a fetched page and publishes the new snapshot
    fn record_page(&self, url: &Url) {
        let mut tally = self.tally();
        tally.snapshot.pages += 1;
        tally.snapshot.last_url = Some(url.to_string());
        self.progress.publish_crawl(tally.snapshot.clone());
    }

    /// Counts a recipe hit; returns true if the recipe budget is now reached
    fn record_recipe(&self, url: &Url) -> bool {
        let mut tally = self.tally();
        tally.snapshot.recipes_found += 1;
        tally.snapshot.last_url = Some(url.to_string());
        self.progress.publish_crawl(tally.snapshot.clone());

        self.site
            .recipe_budget()
            .is_some_and(|budget| tally.snapshot.recipes_found >= budget)
    }

    fn snapshot(&self) -> CrawlSnapshot {
        self.tally().snapshot.clone()
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    ctx: Arc<RunContext>,
}

impl Coordinator {
    /// Prepares a run for the given profile
    ///
    /// # Errors
    ///
    /// Fails if the start URL is not a valid HTTP(S) URL or the HTTP client
    /// cannot be built.
    pub fn new(
        site: SiteProfile,
        storage: SharedStorage,
        progress: Arc<ProgressBoard>,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        validate_site(&site)?;
        let start = normalize_url(&site.start_url)?;
        let fetcher = Fetcher::new(FetchOptions::for_site(&site)?)?;
        let classifier = RecipeClassifier::new(site.selectors());
        let limiter = Semaphore::new(site.max_concurrency.max(1) as usize);
        let frontier = Frontier::new(&start);

        let tally = Tally {
            snapshot: CrawlSnapshot::running(site.id, &site.name),
            pages_reserved: 0,
        };

        Ok(Self {
            ctx: Arc::new(RunContext {
                site,
                start,
                frontier,
                fetcher,
                classifier,
                limiter,
                storage,
                progress,
                cancel,
                tally: Mutex::new(tally),
            }),
        })
    }

    /// Runs the crawl to completion
    ///
    /// The run ends `done` when the frontier drains and `stopped` when it was
    /// cancelled, by the operator or by an exhausted budget. The returned
    /// snapshot is the one published last.
    pub async fn run(self) -> CrawlSnapshot {
        let ctx = self.ctx;

        ctx.progress.publish_crawl(ctx.snapshot());
        ctx.log(
            LogLevel::Info,
            &format!("Crawl started for site '{}'", ctx.site.name),
            Some(ctx.start.as_str()),
        );

        let mut workers = JoinSet::new();
        for _ in 0..ctx.site.max_concurrency.max(1) {
            let ctx = Arc::clone(&ctx);
            workers.spawn(async move { worker(ctx).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker failed: {}", e);
            }
        }

        let status = if ctx.cancel.is_cancelled() {
            RunStatus::Stopped
        } else {
            RunStatus::Done
        };

        let final_snapshot = ctx.tally().snapshot.finished(status);
        ctx.progress.publish_crawl(final_snapshot.clone());
        persist_snapshot(&ctx.storage, &final_snapshot);
        ctx.log(
            LogLevel::Info,
            &format!(
                "Crawl {}: {} pages, {} recipes",
                status, final_snapshot.pages, final_snapshot.recipes_found
            ),
            None,
        );

        final_snapshot
    }
}

/// Runs a complete crawl for an optional profile
///
/// This is the entry point used by the controller. A missing profile or an
/// unusable start URL ends the run immediately with status `error`.
pub async fn run_crawl(
    site: Option<SiteProfile>,
    storage: SharedStorage,
    progress: Arc<ProgressBoard>,
    cancel: CancellationToken,
) -> CrawlSnapshot {
    let Some(site) = site else {
        let message = HarvestError::NoActiveSite.to_string();
        return fail_run(&storage, &progress, None, &message);
    };

    let site_id = site.id;
    match Coordinator::new(site, storage.clone(), Arc::clone(&progress), cancel) {
        Ok(coordinator) => coordinator.run().await,
        Err(e) => fail_run(
            &storage,
            &progress,
            Some(site_id),
            &format!("Crawl could not start: {}", e),
        ),
    }
}

fn fail_run(
    storage: &SharedStorage,
    progress: &ProgressBoard,
    site_id: Option<i64>,
    message: &str,
) -> CrawlSnapshot {
    let mut snapshot = CrawlSnapshot::failed(message);
    snapshot.site_id = site_id;
    progress.publish_crawl(snapshot.clone());
    storage::log_event(storage, LogLevel::Error, message, None, site_id);
    persist_snapshot(storage, &snapshot);
    snapshot
}

fn persist_snapshot(storage: &SharedStorage, snapshot: &CrawlSnapshot) {
    let saved = serde_json::to_string(snapshot)
        .map_err(HarvestError::from)
        .and_then(|json| {
            storage::lock(storage)
                .save_progress(ProgressKind::Crawl, &json)
                .map_err(HarvestError::from)
        });
    if let Err(e) = saved {
        tracing::warn!("Failed to persist crawl snapshot: {}", e);
    }
}

/// Pulls pages until the frontier drains or the run is cancelled
async fn worker(ctx: Arc<RunContext>) {
    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => None,
            url = ctx.frontier.next(&ctx.cancel) => url,
        };

        let Some(url) = next else {
            break;
        };

        process_page(&ctx, &url).await;
        ctx.frontier.mark_visited(&url);
    }
}

/// Fetches one traversal page and handles its links
async fn process_page(ctx: &RunContext, url: &Url) {
    if !ctx.reserve_page() {
        tracing::info!("Budget exhausted, stopping crawl");
        ctx.cancel.cancel();
        return;
    }

    let result = {
        let _permit = match ctx.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        ctx.fetcher.fetch(url.as_str()).await
    };
    ctx.record_page(url);

    if let Some(reason) = result.failure_reason() {
        ctx.log(
            LogLevel::Warn,
            &format!("Page unavailable: {}", reason),
            Some(url.as_str()),
        );
        return;
    }
    let FetchResult::Success { final_url, body } = result else {
        return;
    };

    let links = parse_html(&body, &final_url).links;
    let pattern = ctx.site.pattern();

    for link in links {
        if ctx.cancel.is_cancelled() {
            break;
        }
        if is_recipe_candidate(&link, pattern) {
            if ctx.frontier.claim_leaf(&link) {
                process_candidate(ctx, &link).await;
            }
        } else {
            ctx.frontier.enqueue(&link);
        }
    }
}

/// Fetches and classifies one recipe candidate
///
/// Candidates are leaves: whatever the verdict, their links are not
/// followed.
async fn process_candidate(ctx: &RunContext, url: &Url) {
    if ctx.recipe_budget_reached() {
        ctx.cancel.cancel();
        return;
    }

    let result = {
        let _permit = match ctx.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        ctx.fetcher.fetch(url.as_str()).await
    };

    if let Some(reason) = result.failure_reason() {
        ctx.log(
            LogLevel::Warn,
            &format!("Recipe candidate unavailable: {}", reason),
            Some(url.as_str()),
        );
        return;
    }
    let Some(html) = result.into_html() else {
        return;
    };

    let verdict = ctx.classifier.classify_page(&html);
    if !verdict.is_recipe {
        tracing::debug!("Not a recipe: {}", url);
        return;
    }

    let stored = storage::lock(&ctx.storage).insert_if_absent(
        url.as_str(),
        ctx.site.id,
        verdict.title.as_deref(),
    );
    match stored {
        Ok(true) => tracing::info!("Recipe found: {}", url),
        Ok(false) => tracing::debug!("Recipe already stored: {}", url),
        Err(e) => {
            ctx.log(
                LogLevel::Error,
                &format!("Failed to store recipe: {}", e),
                Some(url.as_str()),
            );
            return;
        }
    }

    if ctx.record_recipe(url) {
        tracing::info!("Recipe budget reached, stopping crawl");
        ctx.cancel.cancel();
    }
}
