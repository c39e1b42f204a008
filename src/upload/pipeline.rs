//! Sequential, rate-limited upload of pending recipes
//!
//! Records are sent one at a time, oldest discovery first. A record is
//! marked uploaded only after the import API accepts it; every other outcome
//! leaves it pending for a later run.

use crate::config::UploadConfig;
use crate::state::{ProgressBoard, ProgressKind, RunStatus, UploadSnapshot};
use crate::storage::{self, LogLevel, RecipeRecord, RecipeStore, SharedStorage};
use crate::upload::endpoint::{import_endpoint, probe_urls};
use crate::HarvestError;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timeout for each credential probe request
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ImportRequest<'a> {
    url: &'a str,
}

/// Outcome of one upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The API answered 200, 201 or 202
    Accepted(u16),

    /// The API answered with any other status
    Rejected(u16),

    /// The request never got a response
    Failed(String),
}

impl UploadOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

fn is_accepted_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201 | 202)
}

/// A configured connection to the import API
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    client: Client,
    endpoint: String,
    api_key: String,
    rate_limit: Duration,
}

impl UploadPipeline {
    /// Builds a pipeline from configuration
    ///
    /// # Errors
    ///
    /// [`HarvestError::UploadNotConfigured`] when the API base or key is
    /// missing or blank.
    pub fn from_config(config: &UploadConfig) -> Result<Self, HarvestError> {
        let (base, key) = credentials(config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint: import_endpoint(base),
            api_key: key.to_string(),
            rate_limit: config.rate_limit()?,
        })
    }

    /// The resolved import endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one recipe URL to the import endpoint
    pub async fn upload_one(&self, url: &str) -> UploadOutcome {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ImportRequest { url })
            .send()
            .await;

        match response {
            Ok(response) if is_accepted_status(response.status()) => {
                UploadOutcome::Accepted(response.status().as_u16())
            }
            Ok(response) => UploadOutcome::Rejected(response.status().as_u16()),
            Err(e) => UploadOutcome::Failed(e.to_string()),
        }
    }

    /// Uploads every pending record
    ///
    /// Cancellation is checked before each record and during the pause
    /// between records; a record already sent is always finished and
    /// recorded.
    pub async fn run(
        &self,
        storage: &SharedStorage,
        progress: &ProgressBoard,
        cancel: &CancellationToken,
    ) -> UploadSnapshot {
        let listed = storage::lock(storage).list_pending();
        let pending = match listed {
            Ok(pending) => pending,
            Err(e) => {
                return fail_run(storage, progress, &format!("Failed to list pending recipes: {}", e))
            }
        };

        let mut snapshot = UploadSnapshot::running();
        snapshot.total = pending.len() as u64;
        progress.publish_upload(snapshot.clone());
        storage::log_event(
            storage,
            LogLevel::Info,
            &format!("Upload started: {} pending recipes", pending.len()),
            Some(&self.endpoint),
            None,
        );

        let mut interrupted = false;
        for (i, record) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            snapshot.last_url = Some(record.url.clone());
            progress.publish_upload(snapshot.clone());

            if self.upload_record(storage, record).await {
                snapshot.uploaded += 1;
            } else {
                snapshot.failed += 1;
            }
            snapshot.done += 1;
            progress.publish_upload(snapshot.clone());

            if i + 1 < pending.len() && !self.rate_limit.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.rate_limit) => {}
                }
            }
        }

        // A stop arriving after the last record does not turn a full pass
        // into a stopped one.
        let status = if interrupted {
            RunStatus::Stopped
        } else {
            RunStatus::Done
        };
        let final_snapshot = snapshot.finished(status);
        progress.publish_upload(final_snapshot.clone());
        persist_snapshot(storage, &final_snapshot);
        storage::log_event(
            storage,
            LogLevel::Info,
            &format!(
                "Upload {}: {} uploaded, {} failed, {} remaining",
                status,
                final_snapshot.uploaded,
                final_snapshot.failed,
                final_snapshot.total - final_snapshot.done
            ),
            None,
            None,
        );

        final_snapshot
    }

    /// Uploads one record and records the result; returns true on success
    async fn upload_record(&self, storage: &SharedStorage, record: &RecipeRecord) -> bool {
        let outcome = self.upload_one(&record.url).await;

        match outcome {
            UploadOutcome::Accepted(_) => {
                let marked = storage::lock(storage).mark_uploaded(record.id, Utc::now());
                match marked {
                    Ok(()) => true,
                    Err(e) => {
                        storage::log_event(
                            storage,
                            LogLevel::Error,
                            &format!("Uploaded but could not mark record: {}", e),
                            Some(&record.url),
                            record.site_id,
                        );
                        false
                    }
                }
            }
            UploadOutcome::Rejected(status) => {
                storage::log_event(
                    storage,
                    LogLevel::Warn,
                    &format!("Import rejected with HTTP {}", status),
                    Some(&record.url),
                    record.site_id,
                );
                false
            }
            UploadOutcome::Failed(error) => {
                storage::log_event(
                    storage,
                    LogLevel::Warn,
                    &format!("Import request failed: {}", error),
                    Some(&record.url),
                    record.site_id,
                );
                false
            }
        }
    }
}

/// Runs a complete upload
///
/// Missing credentials end the run immediately with status `error` and no
/// request is made.
pub async fn run_upload(
    config: UploadConfig,
    storage: SharedStorage,
    progress: Arc<ProgressBoard>,
    cancel: CancellationToken,
) -> UploadSnapshot {
    match UploadPipeline::from_config(&config) {
        Ok(pipeline) => pipeline.run(&storage, &progress, &cancel).await,
        Err(e) => fail_run(&storage, &progress, &e.to_string()),
    }
}

/// Checks that the API base and key are usable
///
/// Tries a few read-only endpoints in turn and succeeds on the first one
/// answering 200 or 204.
///
/// # Errors
///
/// [`HarvestError::UploadNotConfigured`] for missing credentials,
/// [`HarvestError::ApiCheck`] with the last failure when no endpoint
/// answered successfully.
pub async fn probe_api(config: &UploadConfig) -> Result<String, HarvestError> {
    let (base, key) = credentials(config)?;
    let client = Client::builder().timeout(PROBE_TIMEOUT).build()?;

    let mut last_error = String::from("no endpoint tried");
    for url in probe_urls(base) {
        match client.get(&url).bearer_auth(key).send().await {
            Ok(response)
                if matches!(
                    response.status(),
                    StatusCode::OK | StatusCode::NO_CONTENT
                ) =>
            {
                tracing::info!("API check succeeded at {}", url);
                return Ok(format!("API reachable at {}", url));
            }
            Ok(response) => {
                last_error = format!("{} -> HTTP {}", url, response.status().as_u16());
            }
            Err(e) => {
                last_error = format!("{} -> {}", url, e);
            }
        }
        tracing::debug!("API check failed: {}", last_error);
    }

    Err(HarvestError::ApiCheck(last_error))
}

fn credentials(config: &UploadConfig) -> Result<(&str, &str), HarvestError> {
    match (config.base(), config.key()) {
        (Some(base), Some(key)) => Ok((base, key)),
        (None, _) => Err(HarvestError::UploadNotConfigured(
            "missing api-base".to_string(),
        )),
        (_, None) => Err(HarvestError::UploadNotConfigured(
            "missing api-key".to_string(),
        )),
    }
}

fn fail_run(storage: &SharedStorage, progress: &ProgressBoard, message: &str) -> UploadSnapshot {
    let snapshot = UploadSnapshot::failed(message);
    progress.publish_upload(snapshot.clone());
    storage::log_event(storage, LogLevel::Error, message, None, None);
    persist_snapshot(storage, &snapshot);
    snapshot
}

fn persist_snapshot(storage: &SharedStorage, snapshot: &UploadSnapshot) {
    let saved = serde_json::to_string(snapshot)
        .map_err(HarvestError::from)
        .and_then(|json| {
            storage::lock(storage)
                .save_progress(ProgressKind::Upload, &json)
                .map_err(HarvestError::from)
        });
    if let Err(e) = saved {
        tracing::warn!("Failed to persist upload snapshot: {}", e);
    }
}
