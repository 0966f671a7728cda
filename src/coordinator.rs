//! One radar run: poll every source, gate, dedup, notify, persist.
//!
//! # Flow
//!
//! 1. Load the [`SeenStore`] snapshot (missing ⇒ empty, unreadable ⇒ abort).
//! 2. Spawn one task per adapter, at most `concurrency` polling at once. Each
//!    poll is wrapped in an error boundary, so a failing source contributes
//!    nothing and touches nothing else. Tasks keep running while this task
//!    is busy notifying, so a slow send never eats into a source's timeout.
//! 3. As each adapter completes, this task alone walks its records: keyword
//!    gate on the title (for sources gated by policy), `(source, id)`
//!    check-and-insert, notification.
//! 4. Persist the last-alert marker if anything new was found, then the
//!    seen snapshot, also when the run was cancelled midway.
//!
//! There is no loop: an external scheduler invokes the binary periodically.

use crate::error::StateError;
use crate::keywords::{Gate, KeywordPolicy};
use crate::models::{Record, SourceTag};
use crate::notify::Notifier;
use crate::sources::{FetchOutcome, SourceAdapter, poll};
use crate::store::{SeenStore, write_last_alert};
use crate::utils::truncate_for_log;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Where run state lives.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub seen: PathBuf,
    pub last_alert: PathBuf,
}

/// Terminal state of one adapter in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Succeeded { records: usize },
    Failed(String),
}

/// What a run did. Sources still in flight at cancellation are absent from
/// `sources`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub new_records: usize,
    /// Records rejected by the keyword gate.
    pub filtered: usize,
    /// Records already in the seen set (from earlier runs or this one).
    pub duplicates: usize,
    pub sources: BTreeMap<SourceTag, SourceState>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn failed_sources(&self) -> usize {
        self.sources
            .values()
            .filter(|s| matches!(s, SourceState::Failed(_)))
            .count()
    }
}

pub struct Coordinator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    policy: Arc<KeywordPolicy>,
    notifier: Arc<dyn Notifier>,
    paths: StatePaths,
    concurrency: usize,
}

impl Coordinator {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        policy: KeywordPolicy,
        notifier: Arc<dyn Notifier>,
        paths: StatePaths,
    ) -> Self {
        Self {
            adapters,
            policy: Arc::new(policy),
            notifier,
            paths,
            concurrency: 4,
        }
    }

    /// Maximum adapters polled at once (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Perform one full pass over all sources.
    ///
    /// # Errors
    ///
    /// Only state I/O fails a run; source and notification failures are
    /// logged and absorbed.
    #[instrument(level = "info", skip_all, fields(sources = self.adapters.len()))]
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RunSummary, StateError> {
        let mut seen = SeenStore::load(&self.paths.seen).await?;
        if seen.is_empty() {
            info!("Seen set is empty; every match counts as new");
        }
        let mut summary = RunSummary::default();

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut polls = JoinSet::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let policy = Arc::clone(&self.policy);
            let permits = Arc::clone(&permits);
            polls.spawn(async move {
                // The semaphore is never closed; holding the result holds the permit.
                let _permit = permits.acquire_owned().await;
                let outcome = poll(adapter.as_ref(), &policy).await;
                (adapter.tag(), adapter.gate(), outcome)
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Run cancelled; persisting partial state");
                    summary.cancelled = true;
                    break;
                }
                joined = polls.join_next() => {
                    match joined {
                        Some(Ok((tag, gate, FetchOutcome::Succeeded(records)))) => {
                            summary.sources.insert(tag, SourceState::Succeeded { records: records.len() });
                            self.absorb(records, gate, &mut seen, &mut summary, cancel).await;
                        }
                        Some(Ok((tag, _, FetchOutcome::Failed(reason)))) => {
                            summary.sources.insert(tag, SourceState::Failed(reason));
                        }
                        Some(Err(e)) => error!(error = %e, "Source task did not complete"),
                        None => break,
                    }
                }
            }
        }
        polls.abort_all();

        if summary.new_records > 0 {
            write_last_alert(&self.paths.last_alert, Utc::now()).await?;
        }
        seen.persist(&self.paths.seen).await?;

        info!(
            new = summary.new_records,
            filtered = summary.filtered,
            duplicates = summary.duplicates,
            failed_sources = summary.failed_sources(),
            cancelled = summary.cancelled,
            "Run complete"
        );
        Ok(summary)
    }

    /// Gate, dedup and notify one adapter's records.
    ///
    /// A record is inserted into the seen set before it is notified, so a
    /// failed or cancelled delivery never makes it reappear; insertion and
    /// notification happen on this single task, so an identity is notified
    /// at most once.
    async fn absorb(
        &self,
        records: Vec<Record>,
        gate: Gate,
        seen: &mut SeenStore,
        summary: &mut RunSummary,
        cancel: &CancellationToken,
    ) {
        for record in records {
            // Unprocessed records stay unseen and are picked up next run.
            if cancel.is_cancelled() {
                break;
            }
            if gate == Gate::Policy && !self.policy.matches(&record.title) {
                summary.filtered += 1;
                debug!(source = %record.source, title = %truncate_for_log(&record.title, 60), "Not buyer intent");
                continue;
            }
            let identity = record.identity();
            if seen.contains(&identity) {
                summary.duplicates += 1;
                continue;
            }
            seen.add(identity);
            summary.new_records += 1;
            info!(
                source = %record.source,
                title = %truncate_for_log(&record.title, 60),
                pattern = self.policy.first_match(&record.title).unwrap_or("-"),
                ?gate,
                "NEW"
            );
            let message = record.message();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(source = %record.source, "Cancelled while notifying");
                    break;
                }
                _ = self.notifier.notify(&message) => {}
            }
        }
    }
}
