//! The reconciliation loop
//!
//! One call to [`Reconciler::invoke`] is one invocation:
//!
//! 1. Read the continuation token and running totals from the payload
//!    (a token-less payload starts a fresh pass with zeroed totals).
//! 2. Fetch one page of pending records.
//! 3. Enrich the page in sub-batches, flushing each sub-batch before
//!    starting the next and pausing a random interval in between.
//! 4. Stop early once the wall-clock budget is spent, resuming after the
//!    last flushed record.
//! 5. Decide whether more work remains, optionally reinvoking itself.
//!
//! Errors that escape a stage abort the invocation and are reported as a
//! 500 response carrying the totals and the best-known resume point.

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::continuation::{decide, ContinuationPolicy, Decision};
use super::enrich::{EnrichOutcome, Enricher};
use super::invoker::{NoopInvoker, SelfInvoker};
use super::payload::{InvocationPayload, InvocationResponse, ResponseBody, RunningTotals};
use crate::config::CheckerConfig;
use crate::error::ReconcileError;
use crate::knowledge::{KnowledgeSource, NameVariantTitles, TitleCandidates, UnderscoreTitles};
use crate::model::PersonRecord;
use crate::notify::DeathNotifier;
use crate::store::{ContinuationToken, StoreAdapter};

/// Anything that turns a payload into a response
#[async_trait]
pub trait InvocationHandler: Send + Sync {
    async fn handle(&self, payload: InvocationPayload) -> InvocationResponse;
}

/// Sizes and limits the loop runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub fetch_limit: usize,
    pub sub_batch_size: usize,
    pub max_store_batch_size: usize,
    pub pacing: (Duration, Duration),
    pub continuation: ContinuationPolicy,
}

impl From<&CheckerConfig> for LoopSettings {
    fn from(config: &CheckerConfig) -> Self {
        Self {
            fetch_limit: config.fetch_limit(),
            sub_batch_size: config.sub_batch_size,
            max_store_batch_size: config.max_store_batch_size,
            pacing: (
                Duration::from_millis(config.pacing_min_ms),
                Duration::from_millis(config.pacing_max_ms),
            ),
            continuation: ContinuationPolicy {
                auto_continue: config.auto_continue,
                max_auto_invocations: config.max_auto_invocations,
                time_budget: config.time_budget(),
            },
        }
    }
}

/// Counters and resume point of the invocation in flight
#[derive(Debug, Default)]
struct Progress {
    counts: RunningTotals,
    /// Where a retry of this invocation should resume
    resume: Option<ContinuationToken>,
}

pub struct Reconciler {
    store: StoreAdapter,
    enricher: Enricher,
    notifier: DeathNotifier,
    invoker: Arc<dyn SelfInvoker>,
    settings: LoopSettings,
    today: Option<NaiveDate>,
}

impl Reconciler {
    pub fn new(
        store: StoreAdapter,
        knowledge: Arc<dyn KnowledgeSource>,
        notifier: DeathNotifier,
        config: &CheckerConfig,
    ) -> Self {
        let titles: Arc<dyn TitleCandidates> = if config.knowledge.name_variants {
            Arc::new(NameVariantTitles)
        } else {
            Arc::new(UnderscoreTitles)
        };
        Self {
            store,
            enricher: Enricher::new(knowledge, titles),
            notifier,
            invoker: Arc::new(NoopInvoker),
            settings: LoopSettings::from(config),
            today: None,
        }
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn SelfInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Pin the date ages are computed against
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub async fn invoke(&self, payload: InvocationPayload) -> InvocationResponse {
        let started = Instant::now();
        let mut progress = Progress::default();

        // Token-less invocations start a fresh pass
        let (prior, previous_invocations) = if payload.is_fresh() {
            (RunningTotals::default(), 0)
        } else {
            (payload.totals(), payload.invocation_count)
        };

        let outcome = self.run(&payload, started, &mut progress).await;
        let elapsed = started.elapsed();
        let mut totals = prior;
        totals.add(progress.counts);

        match outcome {
            Ok(cursor) => {
                let decision = decide(
                    cursor,
                    previous_invocations,
                    elapsed,
                    &self.settings.continuation,
                );
                let body = self.body(&progress, totals, elapsed, &decision);
                info!(
                    processed = body.processed,
                    updated = body.updated,
                    failed = body.failed,
                    has_more = body.has_more_records,
                    invocation = body.invocation_count,
                    duration_secs = body.duration,
                    "Invocation complete"
                );

                if let Decision::Continue {
                    token,
                    invocation_count,
                    reason,
                    reinvoke,
                } = &decision
                {
                    debug!(?reason, reinvoke, "Stopping with records left");
                    if *reinvoke {
                        let next = InvocationPayload::resume(token, *invocation_count, totals);
                        match self.invoker.reinvoke(next).await {
                            Ok(()) => info!(invocation = invocation_count + 1, "Scheduled self-reinvocation"),
                            Err(e) => warn!(error = %e, "Self-reinvocation failed"),
                        }
                    }
                }

                InvocationResponse {
                    status_code: InvocationResponse::OK,
                    body,
                }
            }
            Err(e) => {
                error!(error = %e, processed = progress.counts.processed, "Invocation failed");
                InvocationResponse {
                    status_code: InvocationResponse::FAILED,
                    body: ResponseBody {
                        processed: progress.counts.processed,
                        updated: progress.counts.updated,
                        failed: progress.counts.failed,
                        duration: elapsed.as_secs_f64(),
                        has_more_records: progress.resume.is_some(),
                        pagination_token: progress.resume.clone(),
                        invocation_count: previous_invocations.saturating_add(1),
                        running_total_processed: totals.processed,
                        running_total_updated: totals.updated,
                        running_total_failed: totals.failed,
                        error: Some(e.to_string()),
                    },
                }
            }
        }
    }

    fn body(
        &self,
        progress: &Progress,
        totals: RunningTotals,
        elapsed: Duration,
        decision: &Decision,
    ) -> ResponseBody {
        let pagination_token = match decision {
            Decision::Continue { token, .. } => Some(token.clone()),
            Decision::Done { .. } => None,
        };
        ResponseBody {
            processed: progress.counts.processed,
            updated: progress.counts.updated,
            failed: progress.counts.failed,
            duration: elapsed.as_secs_f64(),
            has_more_records: decision.has_more(),
            pagination_token,
            invocation_count: decision.invocation_count(),
            running_total_processed: totals.processed,
            running_total_updated: totals.updated,
            running_total_failed: totals.failed,
            error: None,
        }
    }

    /// Fetch, enrich and flush one page; returns the resume cursor
    async fn run(
        &self,
        payload: &InvocationPayload,
        started: Instant,
        progress: &mut Progress,
    ) -> Result<Option<ContinuationToken>, ReconcileError> {
        let token = payload.token()?;
        progress.resume = token.clone();

        let page = self
            .store
            .scan_pending(self.settings.fetch_limit, token.as_ref())
            .await?;
        if page.records.is_empty() {
            info!("No pending records");
            return Ok(None);
        }
        info!(records = page.records.len(), "Fetched pending records");

        let today = self
            .today
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        let budget = self.settings.continuation.time_budget;

        for (index, chunk) in page
            .records
            .chunks(self.settings.sub_batch_size.max(1))
            .enumerate()
        {
            if index > 0 {
                if started.elapsed() >= budget {
                    warn!(
                        elapsed_secs = started.elapsed().as_secs(),
                        "Time budget exhausted, stopping early"
                    );
                    return Ok(progress.resume.clone());
                }
                sleep(self.pacing_delay()).await;
            }

            self.process_sub_batch(chunk, today, progress).await;
            if let Some(last) = chunk.last() {
                progress.resume = Some(StoreAdapter::cursor_after(last));
            }
        }

        Ok(page.next_cursor)
    }

    async fn process_sub_batch(
        &self,
        records: &[PersonRecord],
        today: NaiveDate,
        progress: &mut Progress,
    ) {
        let mut changed = Vec::new();
        let mut deaths = Vec::new();

        for record in records {
            progress.counts.processed += 1;
            match self.enricher.enrich(record, today).await {
                EnrichOutcome::Changed {
                    record,
                    death_discovered,
                } => {
                    if let Some(date) = death_discovered {
                        deaths.push((record.id.clone(), record.name.clone(), date));
                    }
                    changed.push(record);
                }
                EnrichOutcome::Unchanged | EnrichOutcome::Unresolved => {}
            }
        }

        if changed.is_empty() {
            debug!(records = records.len(), "Sub-batch produced no writes");
            return;
        }

        let report = self
            .store
            .batch_put(&changed, self.settings.max_store_batch_size)
            .await;
        progress.counts.updated += report.succeeded as u64;
        progress.counts.failed += report.failed as u64;
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Flushed sub-batch"
        );

        let failed: HashSet<&str> = report.failed_ids.iter().map(String::as_str).collect();
        for (id, name, date) in deaths {
            if failed.contains(id.as_str()) {
                warn!(person_id = %id, "Death not notified, write failed");
                continue;
            }
            self.notifier.on_death_discovered(&name, date).await;
        }
    }

    fn pacing_delay(&self) -> Duration {
        let (min, max) = self.settings.pacing;
        if max <= min {
            return min;
        }
        let ms = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(ms as u64)
    }
}

#[async_trait]
impl InvocationHandler for Reconciler {
    async fn handle(&self, payload: InvocationPayload) -> InvocationResponse {
        self.invoke(payload).await
    }
}
