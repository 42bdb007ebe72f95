//! Download orchestrator implementation.
//!
//! A run for one museum:
//! - Recovery: items left `in_progress` by an interrupted run are requeued
//! - Discovery: listing pages are fetched lazily whenever no work is due
//! - Processing: claimed batches run with bounded concurrency
//! - Quiescence: the run ends when nothing is pending, or on a stop request

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifact::{ImageStore, ImageStoreError};
use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};
use crate::catalog::{ArtworkCatalog, CatalogError};
use crate::metrics::{ITEMS_COMPLETED, ITEMS_FAILED, ITEM_DURATION, RETRIES_SCHEDULED};
use crate::museum::{MuseumClient, MuseumError, MuseumRegistry};
use crate::progress::{
    DiscoveryState, DownloadItem, ItemStatus, ProgressStore, StatusSummary,
};
use crate::retry::{classify, AbortReason, AttemptCounts, ErrorKind, RetryDecision};

use super::config::OrchestratorConfig;
use super::shutdown::StopHandle;
use super::types::{FailedItemReport, OrchestratorError, RunOptions, RunSummary};

/// What happened to one claimed item.
enum ItemOutcome {
    Completed,
    Retrying,
    Failed(FailedItemReport),
    /// Left `in_progress` because the run is ending.
    Skipped,
}

/// Image bytes written during a run, against an optional cap.
struct ByteBudget {
    limit: Option<u64>,
    used: AtomicU64,
    refused: AtomicBool,
}

impl ByteBudget {
    fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
            refused: AtomicBool::new(false),
        }
    }

    /// Claim room for an image. Refuses when the run would pass its cap.
    fn reserve(&self, bytes: u64) -> bool {
        let fits = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let total = used.saturating_add(bytes);
                match self.limit {
                    Some(limit) if total > limit => None,
                    _ => Some(total),
                }
            })
            .is_ok();
        if !fits {
            self.refused.store(true, Ordering::SeqCst);
        }
        fits
    }

    fn release(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::SeqCst);
    }

    fn is_spent(&self) -> bool {
        self.refused.load(Ordering::SeqCst)
            || self
                .limit
                .is_some_and(|limit| self.used.load(Ordering::SeqCst) >= limit)
    }

    fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }
}

/// Listing progress within a run.
struct Discovery {
    state: DiscoveryState,
    counts: AttemptCounts,
    active: bool,
}

#[derive(Default)]
struct RunTally {
    completed: usize,
    failed: usize,
    retried: usize,
    discovered: usize,
    failures: Vec<FailedItemReport>,
}

/// The download orchestrator - drives items from discovery to completion.
pub struct DownloadOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn ProgressStore>,
    catalog: Arc<dyn ArtworkCatalog>,
    images: Arc<dyn ImageStore>,
    registry: MuseumRegistry,
    stop: StopHandle,
    // Runs share one store; keep them from interleaving.
    run_lock: Mutex<()>,
}

impl DownloadOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn ProgressStore>,
        catalog: Arc<dyn ArtworkCatalog>,
        images: Arc<dyn ImageStore>,
        registry: MuseumRegistry,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
            images,
            registry,
            stop: StopHandle::new(),
            run_lock: Mutex::new(()),
        }
    }

    /// Use an externally owned stop handle (e.g. one wired to Ctrl-C).
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that stops the current and any later run.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn registry(&self) -> &MuseumRegistry {
        &self.registry
    }

    /// Run one museum until it is quiescent, capped, or stopped.
    pub async fn run_museum(
        &self,
        museum: MuseumTag,
        options: &RunOptions,
    ) -> Result<RunSummary, OrchestratorError> {
        let client = self
            .registry
            .get(museum)
            .ok_or(OrchestratorError::UnknownMuseum(museum))?;
        let _guard = self.run_lock.lock().await;

        let run_id = Uuid::new_v4().to_string();
        info!(museum = %museum, run_id = %run_id, "Starting download run");

        let recovered = self.store.recover_in_progress(museum)?;
        if recovered > 0 {
            info!(museum = %museum, recovered, "Requeued items from an interrupted run");
        }

        let mut tally = RunTally::default();
        tally.discovered += self.enqueue_explicit(museum, &options.identifiers)?;

        let mut discovery = self.start_discovery(museum, options)?;
        let budget = ByteBudget::new(options.max_bytes);
        let stopped = self
            .process_until_quiescent(client.as_ref(), options, &mut discovery, &budget, &mut tally)
            .await?;

        let counts = self.store.summary(museum)?;
        info!(
            museum = %museum,
            run_id = %run_id,
            completed = tally.completed,
            failed = tally.failed,
            retried = tally.retried,
            bytes_written = budget.used(),
            stopped,
            "Download run finished ({})",
            counts
        );
        for failure in &tally.failures {
            warn!(
                identifier = %failure.identifier,
                kind = %failure.kind,
                "Failed: {}",
                failure.reason
            );
        }

        Ok(RunSummary {
            museum,
            run_id,
            counts,
            completed_this_run: tally.completed,
            failed_this_run: tally.failed,
            retried_this_run: tally.retried,
            discovered_this_run: tally.discovered,
            bytes_written_this_run: budget.used(),
            failures: tally.failures,
            stopped,
        })
    }

    /// Run every registered museum in tag order.
    pub async fn run_all(&self, options: &RunOptions) -> Result<Vec<RunSummary>, OrchestratorError> {
        let mut summaries = Vec::new();
        for museum in self.registry.tags() {
            if self.stop.is_stopped() {
                info!("Stop requested, skipping remaining museums");
                break;
            }
            summaries.push(self.run_museum(museum, options).await?);
        }
        Ok(summaries)
    }

    /// Give every failed item of a museum a fresh retry budget, then run.
    pub async fn retry_failed(
        &self,
        museum: MuseumTag,
        options: &RunOptions,
    ) -> Result<RunSummary, OrchestratorError> {
        if !self.registry.contains(museum) {
            return Err(OrchestratorError::UnknownMuseum(museum));
        }
        let reset = self.store.reset_failed(museum)?;
        info!(museum = %museum, reset, "Reset failed items to pending");
        self.run_museum(museum, options).await
    }

    /// Counts by status for a museum.
    pub fn status(&self, museum: MuseumTag) -> Result<StatusSummary, OrchestratorError> {
        Ok(self.store.summary(museum)?)
    }

    /// Items currently in `failed`, with their last errors.
    pub fn failed_items(&self, museum: MuseumTag) -> Result<Vec<DownloadItem>, OrchestratorError> {
        Ok(self.store.failed_items(museum)?)
    }

    /// Queue an artwork for download again.
    ///
    /// Completed items are reset; unknown identifiers are enqueued.
    /// Failed or in-progress items are refused with `InvalidTransition`;
    /// failed items go back through [`retry_failed`](Self::retry_failed).
    pub fn refetch(&self, identifier: &ArtworkIdentifier) -> Result<(), OrchestratorError> {
        match self.store.get(identifier)? {
            None => {
                self.store.upsert_pending(identifier)?;
                info!(identifier = %identifier, "Enqueued for download");
            }
            Some(_) => {
                self.store.reset_for_refetch(identifier)?;
                info!(identifier = %identifier, "Reset for refetch");
            }
        }
        Ok(())
    }

    /// Forget an artwork entirely: image file, catalog entry and progress row.
    ///
    /// Returns `false` if the store did not know the identifier.
    pub async fn purge(&self, identifier: &ArtworkIdentifier) -> Result<bool, OrchestratorError> {
        let item = self.store.get(identifier)?;
        if let Some(path) = item.as_ref().and_then(|i| i.artifact_path.as_deref()) {
            if self.images.remove(Path::new(path)).await? {
                debug!(identifier = %identifier, path, "Removed image");
            }
        }
        match self.catalog.remove(identifier) {
            Ok(()) | Err(CatalogError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let purged = self.store.purge(identifier)?;
        if purged {
            info!(identifier = %identifier, "Purged");
        }
        Ok(purged)
    }

    fn enqueue_explicit(
        &self,
        museum: MuseumTag,
        identifiers: &[ArtworkIdentifier],
    ) -> Result<usize, OrchestratorError> {
        let (ours, others): (Vec<_>, Vec<_>) = identifiers
            .iter()
            .cloned()
            .partition(|id| id.museum == museum);
        for id in &others {
            debug!(museum = %museum, identifier = %id, "Ignoring identifier for another museum");
        }
        if ours.is_empty() {
            return Ok(0);
        }
        let added = self.store.upsert_pending_batch(&ours)?;
        info!(museum = %museum, requested = ours.len(), added, "Enqueued explicit identifiers");
        Ok(added)
    }

    fn start_discovery(
        &self,
        museum: MuseumTag,
        options: &RunOptions,
    ) -> Result<Discovery, OrchestratorError> {
        if options.skip_discovery {
            return Ok(Discovery {
                state: DiscoveryState::default(),
                counts: AttemptCounts::default(),
                active: false,
            });
        }

        let state = if options.rediscover {
            let fresh = DiscoveryState::default();
            self.store.save_discovery_state(museum, &fresh)?;
            info!(museum = %museum, "Restarting candidate listing");
            fresh
        } else {
            self.store.discovery_state(museum)?
        };

        if state.exhausted {
            debug!(museum = %museum, "Candidate listing already exhausted");
        } else if let Some(cursor) = &state.cursor {
            info!(museum = %museum, cursor = %cursor, "Resuming candidate listing");
        }

        let active = !state.exhausted;
        Ok(Discovery {
            state,
            counts: AttemptCounts::default(),
            active,
        })
    }

    /// Main claim loop. Returns whether the run was stopped.
    async fn process_until_quiescent(
        &self,
        client: &dyn MuseumClient,
        options: &RunOptions,
        discovery: &mut Discovery,
        budget: &ByteBudget,
        tally: &mut RunTally,
    ) -> Result<bool, OrchestratorError> {
        let museum = client.tag();

        loop {
            if self.stop.is_stopped() {
                info!(museum = %museum, "Stop requested, ending run");
                return Ok(true);
            }

            if budget.is_spent() {
                // Items refused by the budget are still claimed.
                let requeued = self.store.recover_in_progress(museum)?;
                info!(
                    museum = %museum,
                    bytes_written = budget.used(),
                    max_bytes = ?options.max_bytes,
                    requeued,
                    "Reached storage cap"
                );
                return Ok(false);
            }

            let mut limit = self.config.batch_size;
            if let Some(max) = options.max_items {
                if tally.completed >= max {
                    info!(museum = %museum, max_items = max, "Reached download cap");
                    return Ok(false);
                }
                limit = limit.min(max - tally.completed);
            }

            let batch = self.store.claim_next_batch(museum, limit, Utc::now())?;
            if batch.is_empty() {
                if discovery.active {
                    tally.discovered += self.discover_page(client, discovery).await?;
                    continue;
                }
                match self.store.next_due_at(museum)? {
                    None => {
                        debug!(museum = %museum, "No pending items left");
                        return Ok(false);
                    }
                    Some(due) => {
                        let wait = (due - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                        debug!(museum = %museum, wait_ms = wait.as_millis() as u64, "Waiting for retries to become due");
                        if wait.is_zero() {
                            tokio::task::yield_now().await;
                        } else {
                            self.sleep_unless_stopped(wait).await;
                        }
                        continue;
                    }
                }
            }

            debug!(museum = %museum, claimed = batch.len(), "Claimed batch");
            let outcomes: Vec<Result<ItemOutcome, OrchestratorError>> = stream::iter(batch)
                .map(|item| self.process_item(client, item, budget))
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome? {
                    ItemOutcome::Completed => tally.completed += 1,
                    ItemOutcome::Retrying => tally.retried += 1,
                    ItemOutcome::Failed(report) => {
                        tally.failed += 1;
                        tally.failures.push(report);
                    }
                    ItemOutcome::Skipped => {}
                }
            }
        }
    }

    /// Fetch one listing page and enqueue its candidates.
    ///
    /// Transient listing errors wait and leave discovery active so the page is
    /// retried; anything else ends discovery for this run.
    async fn discover_page(
        &self,
        client: &dyn MuseumClient,
        discovery: &mut Discovery,
    ) -> Result<usize, OrchestratorError> {
        let museum = client.tag();

        match client.list_candidates(discovery.state.cursor.as_deref()).await {
            Ok(page) => {
                discovery.counts = AttemptCounts::default();
                let added = self.store.upsert_pending_batch(&page.identifiers)?;
                debug!(
                    museum = %museum,
                    cursor = ?discovery.state.cursor,
                    listed = page.identifiers.len(),
                    added,
                    "Listed candidates"
                );

                match page.next_cursor {
                    Some(next) => discovery.state.cursor = Some(next),
                    None => {
                        discovery.state.cursor = None;
                        discovery.state.exhausted = true;
                        discovery.active = false;
                        info!(museum = %museum, "Candidate listing exhausted");
                    }
                }
                self.store.save_discovery_state(museum, &discovery.state)?;
                Ok(added)
            }
            Err(e) => {
                let decision = classify(&e, discovery.counts, &self.config.retry);
                match decision {
                    RetryDecision::Abort(reason) => {
                        warn!(
                            museum = %museum,
                            error = %e,
                            "Listing failed ({}), continuing with known items",
                            reason
                        );
                        discovery.active = false;
                    }
                    _ => {
                        if e.kind() == ErrorKind::RateLimited {
                            discovery.counts.rate_limited += 1;
                        } else {
                            discovery.counts.failures += 1;
                        }
                        let delay = decision.delay().unwrap_or(Duration::ZERO);
                        warn!(
                            museum = %museum,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Listing failed, retrying page"
                        );
                        self.sleep_unless_stopped(delay).await;
                    }
                }
                Ok(0)
            }
        }
    }

    async fn process_item(
        &self,
        client: &dyn MuseumClient,
        item: DownloadItem,
        budget: &ByteBudget,
    ) -> Result<ItemOutcome, OrchestratorError> {
        if self.stop.is_stopped() || budget.is_spent() {
            return Ok(ItemOutcome::Skipped);
        }

        let started = Instant::now();
        let identifier = &item.identifier;

        let (record, bytes) = match Self::fetch_artwork(client, identifier).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let counts = AttemptCounts {
                    failures: item.attempt_count,
                    rate_limited: item.rate_limit_hits,
                };
                let decision = classify(&e, counts, &self.config.retry);
                return self.settle_failure(&item, e.kind(), e.to_string(), decision, started);
            }
        };

        let size = bytes.len() as u64;
        if !budget.reserve(size) {
            debug!(identifier = %identifier, bytes = size, "Image would exceed storage cap");
            return Ok(ItemOutcome::Skipped);
        }

        let path = match self.images.write(&record, &bytes).await {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                budget.release(size);
                return self.settle_write_failure(&item, e, started);
            }
        };
        self.catalog.upsert(&record, Some(path.as_str()))?;
        self.store.record_success(identifier, &path, &record)?;

        let label = identifier.museum.as_str();
        ITEMS_COMPLETED.with_label_values(&[label]).inc();
        ITEM_DURATION
            .with_label_values(&[label, "complete"])
            .observe(started.elapsed().as_secs_f64());
        info!(identifier = %identifier, path = %path, "Downloaded {}", record.title);
        Ok(ItemOutcome::Completed)
    }

    /// Image writes the item itself caused end the item; the rest end the run.
    fn settle_write_failure(
        &self,
        item: &DownloadItem,
        error: ImageStoreError,
        started: Instant,
    ) -> Result<ItemOutcome, OrchestratorError> {
        if !error.is_item_error() {
            return Err(error.into());
        }
        let decision = RetryDecision::Abort(AbortReason::Unrecoverable(error.reason().to_string()));
        self.settle_failure(
            item,
            ErrorKind::ParseOrValidation,
            error.to_string(),
            decision,
            started,
        )
    }

    /// Persist a classified failure and report what became of the item.
    fn settle_failure(
        &self,
        item: &DownloadItem,
        kind: ErrorKind,
        message: String,
        decision: RetryDecision,
        started: Instant,
    ) -> Result<ItemOutcome, OrchestratorError> {
        let identifier = &item.identifier;
        let label = identifier.museum.as_str();
        let status = self
            .store
            .record_failure(identifier, kind, &message, &decision)?;

        match (&decision, status) {
            (RetryDecision::Abort(reason), ItemStatus::Failed) => {
                ITEMS_FAILED.with_label_values(&[label, kind.as_str()]).inc();
                ITEM_DURATION
                    .with_label_values(&[label, "failed"])
                    .observe(started.elapsed().as_secs_f64());
                if matches!(reason, AbortReason::MaxRetriesExceeded) {
                    error!(identifier = %identifier, error = %message, "Giving up: {}", reason);
                } else {
                    warn!(identifier = %identifier, error = %message, "Giving up: {}", reason);
                }
                Ok(ItemOutcome::Failed(FailedItemReport {
                    identifier: identifier.clone(),
                    kind,
                    reason: reason.to_string(),
                    message,
                }))
            }
            _ => {
                RETRIES_SCHEDULED.with_label_values(&[label]).inc();
                ITEM_DURATION
                    .with_label_values(&[label, "retry"])
                    .observe(started.elapsed().as_secs_f64());
                warn!(
                    identifier = %identifier,
                    kind = %kind,
                    delay_ms = decision.delay().unwrap_or_default().as_millis() as u64,
                    "Retry scheduled: {}",
                    message
                );
                Ok(ItemOutcome::Retrying)
            }
        }
    }

    /// Metadata, mapping, rights/image checks, image bytes.
    async fn fetch_artwork(
        client: &dyn MuseumClient,
        identifier: &ArtworkIdentifier,
    ) -> Result<(CanonicalArtworkRecord, Vec<u8>), MuseumError> {
        let raw = client.fetch_metadata(identifier).await?;
        let record = client.normalize(&raw)?;
        if !record.is_public_domain {
            return Err(MuseumError::NotPublicDomain(identifier.to_string()));
        }
        if record.image_reference.is_none() {
            return Err(MuseumError::NoImage(identifier.to_string()));
        }
        let bytes = client.fetch_image(identifier, &record).await?;
        Ok((record, bytes))
    }

    /// Sleep for `delay`. Returns `false` if a stop interrupted the sleep.
    async fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.stop.wait() => false,
        }
    }
}
