//! Crawl frontier: the set of URLs known to a run and the FIFO queue of
//! pages waiting to be fetched
//!
//! Entries live in an arena indexed by normalized URL. Each URL moves through
//! `Queued -> InFlight -> Visited` at most once per run, which makes
//! "fetched at most once" a property of the data structure rather than of
//! the workers.

use crate::state::EntryStatus;
use crate::url::{host_key, normalize_url};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upper bound on how long an idle worker sleeps before re-checking the queue
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A URL known to the frontier
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: Url,
    pub status: EntryStatus,
}

/// Answer to a non-blocking dequeue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextUrl {
    /// A page is ready; it is now in flight
    Ready(Url),

    /// Nothing queued, but in-flight pages may still add links
    Pending,

    /// Nothing queued and nothing in flight: traversal is complete
    Drained,
}

#[derive(Debug, Default)]
struct FrontierInner {
    entries: Vec<FrontierEntry>,
    index: HashMap<String, usize>,
    queue: VecDeque<usize>,
    in_flight: usize,
}

impl FrontierInner {
    fn register(&mut self, url: Url, status: EntryStatus) -> Option<usize> {
        if self.index.contains_key(url.as_str()) {
            return None;
        }
        let id = self.entries.len();
        self.index.insert(url.as_str().to_string(), id);
        self.entries.push(FrontierEntry { url, status });
        Some(id)
    }
}

/// Shared frontier for one crawl run
#[derive(Debug)]
pub struct Frontier {
    host: Option<String>,
    inner: Mutex<FrontierInner>,
    notify: Notify,
    poll_interval: Duration,
}

impl Frontier {
    /// Creates a frontier holding only the start URL
    ///
    /// Only URLs on the start URL's host are ever admitted.
    pub fn new(start: &Url) -> Self {
        let frontier = Self {
            host: host_key(start),
            inner: Mutex::new(FrontierInner::default()),
            notify: Notify::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        frontier.enqueue(start);
        frontier
    }

    /// Overrides the idle re-check interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn admit(&self, url: &Url) -> Option<Url> {
        let url = normalize_url(url.as_str()).ok()?;
        match (&self.host, host_key(&url)) {
            (Some(host), Some(candidate)) if *host == candidate => Some(url),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a page to the back of the queue
    ///
    /// Returns false if the URL was already known in any state, lives on
    /// another host, or cannot be normalized.
    pub fn enqueue(&self, url: &Url) -> bool {
        let Some(url) = self.admit(url) else {
            return false;
        };

        let added = {
            let mut inner = self.lock();
            match inner.register(url, EntryStatus::Queued) {
                Some(id) => {
                    inner.queue.push_back(id);
                    true
                }
                None => false,
            }
        };

        if added {
            self.notify.notify_waiters();
        }
        added
    }

    /// Registers a recipe candidate that is checked but never traversed
    ///
    /// The URL is recorded directly as visited. Returns true only for the
    /// first claim of a URL in this run, so exactly one worker processes it.
    pub fn claim_leaf(&self, url: &Url) -> bool {
        let Some(url) = self.admit(url) else {
            return false;
        };
        self.lock().register(url, EntryStatus::Visited).is_some()
    }

    /// Takes the next queued page without waiting
    pub fn try_next(&self) -> NextUrl {
        let mut inner = self.lock();
        match inner.queue.pop_front() {
            Some(id) => {
                inner.entries[id].status = EntryStatus::InFlight;
                inner.in_flight += 1;
                NextUrl::Ready(inner.entries[id].url.clone())
            }
            None if inner.in_flight == 0 => NextUrl::Drained,
            None => NextUrl::Pending,
        }
    }

    /// Waits for the next queued page
    ///
    /// Returns `None` once the frontier is drained or the run is cancelled.
    /// Idle callers wake on new links, on finished pages, and at least every
    /// poll interval.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<Url> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_next() {
                NextUrl::Ready(url) => return Some(url),
                NextUrl::Drained => return None,
                NextUrl::Pending => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Marks an in-flight page as finished
    pub fn mark_visited(&self, url: &Url) {
        {
            let mut inner = self.lock();
            let Some(&id) = inner.index.get(url.as_str()) else {
                return;
            };
            if !inner.entries[id]
                .status
                .can_transition_to(EntryStatus::Visited)
            {
                return;
            }
            inner.entries[id].status = EntryStatus::Visited;
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Current status of a URL, `None` if unknown
    pub fn status_of(&self, url: &Url) -> Option<EntryStatus> {
        let inner = self.lock();
        inner
            .index
            .get(url.as_str())
            .map(|&id| inner.entries[id].status)
    }

    /// Number of pages waiting in the queue
    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of pages handed out and not yet finished
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of URLs known to the run in any state
    pub fn known_len(&self) -> usize {
        self.lock().entries.len()
    }
}
