//! Batch orchestrator
//!
//! Drives one batch run through two phases:
//! 1. Matching: chunked directory fetch, blocking, scoring, classification
//! 2. Assessment: one external assessment per MATCHED result, under a
//!    concurrency bound and a job-wide dispatch spacing
//!
//! Results are kept in input order throughout. Per-record failures become
//! `reason`/explanation text; only configuration errors abort a run, and
//! they do so before any record is processed.

pub mod phase_matching;
pub mod progress;
pub mod rate_limiter;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use shellmatch_common::{EventBus, MatchEvent, MatchPhase};

use crate::assessment::adapter::{apply_assessment, mark_unavailable};
use crate::assessment::{Assessment, AssessmentAdapter, AssessmentError, AssessmentRequest, AssessmentService};
use crate::config::BatchConfig;
use crate::directory::AccountDirectory;
use crate::error::MatchError;
use crate::models::{BatchRequest, BatchResponse, MatchResult};

pub use phase_matching::{build_input, InputSlot, MatchingContext};
pub use progress::{BatchProgress, PhaseProgress, ProgressSnapshot};
pub use rate_limiter::RateLimiter;

/// One batch run
///
/// Owned by the orchestrator invocation that runs it; the registry only
/// holds a [`JobHandle`].
pub struct BatchJob {
    pub id: Uuid,
    pub config: BatchConfig,
    pub progress: Arc<BatchProgress>,
    pub cancel: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl BatchJob {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            progress: Arc::new(BatchProgress::new()),
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            progress: Arc::clone(&self.progress),
            cancel: self.cancel.clone(),
            started_at: self.started_at,
        }
    }
}

/// Shared view of a running job: progress reads and cancellation
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: Uuid,
    pub progress: Arc<BatchProgress>,
    pub cancel: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl JobHandle {
    /// Request cooperative cancellation; returns false if already requested
    pub fn cancel(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Batch pipeline entry point
#[derive(Clone)]
pub struct MatchOrchestrator {
    directory: Arc<dyn AccountDirectory>,
    assessment: Arc<dyn AssessmentService>,
    event_bus: EventBus,
}

impl MatchOrchestrator {
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        assessment: Arc<dyn AssessmentService>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            directory,
            assessment,
            event_bus,
        }
    }

    pub fn directory_name(&self) -> &'static str {
        self.directory.name()
    }

    pub fn assessment_name(&self) -> &'static str {
        self.assessment.name()
    }

    /// Merge the request override onto `base` and create the job
    ///
    /// This is the only place a run can fail as a whole.
    pub fn prepare(&self, base: &BatchConfig, request: &BatchRequest) -> Result<BatchJob, MatchError> {
        let config = base.with_override(request.config.as_ref())?;
        Ok(BatchJob::new(config))
    }

    /// Prepare and run in one step
    pub async fn run_batch(&self, base: &BatchConfig, request: BatchRequest) -> Result<BatchResponse, MatchError> {
        let job = self.prepare(base, &request)?;
        Ok(self.run(&job, request).await)
    }

    /// Run both phases; always yields one result per de-duplicated input id
    pub async fn run(&self, job: &BatchJob, request: BatchRequest) -> BatchResponse {
        let start_time = Instant::now();
        let config = &job.config;

        let input = build_input(
            &request.customer_ids,
            &request.invalid_customer_ids,
            &config.account_id_prefix,
        );

        info!(
            job_id = %job.id,
            customers = input.len(),
            shells = request.shell_ids.len(),
            ai_concurrency = config.ai_concurrency,
            ai_call_spacing_ms = config.ai_call_spacing_ms,
            "Starting batch"
        );
        self.event_bus.emit_lossy(MatchEvent::BatchStarted {
            job_id: job.id,
            total_customers: input.len(),
            total_shells: request.shell_ids.len(),
            timestamp: Utc::now(),
        });

        // Phase 1
        let outcome =
            phase_matching::run_matching_phase(job, self.directory.as_ref(), &self.event_bus, &request, &input).await;
        let mut results = outcome.results;

        info!(
            job_id = %job.id,
            matched = results.iter().filter(|r| r.is_matched()).count(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Phase 1 complete"
        );

        // Phase 2
        self.run_assessment_phase(job, &mut results).await;

        let cancelled = job.cancel.is_cancelled();
        let response = BatchResponse::assemble(job.id, results, outcome.shells, cancelled, start_time.elapsed());

        if cancelled {
            let assessment = job.progress.phase(MatchPhase::Assessment);
            warn!(
                job_id = %job.id,
                assessments_completed = assessment.completed,
                assessments_total = assessment.total,
                "Batch cancelled"
            );
            self.event_bus.emit_lossy(MatchEvent::BatchCancelled {
                job_id: job.id,
                assessments_completed: assessment.completed,
                assessments_total: assessment.total,
                timestamp: Utc::now(),
            });
        } else {
            let summary = &response.summary;
            info!(
                job_id = %job.id,
                total = summary.total_customer_accounts,
                matched = summary.matched_pairs,
                unmatched = summary.unmatched_customers,
                flagged = summary.flagged_customer_accounts,
                invalid = summary.invalid_customer_accounts,
                execution_time = %summary.execution_time,
                "Batch complete"
            );
            self.event_bus.emit_lossy(MatchEvent::BatchCompleted {
                job_id: job.id,
                total_customers: summary.total_customer_accounts,
                matched: summary.matched_pairs,
                unmatched: summary.unmatched_customers,
                flagged: summary.flagged_customer_accounts,
                invalid: summary.invalid_customer_accounts,
                elapsed_ms: summary.execution_time_ms,
                timestamp: Utc::now(),
            });
        }

        response
    }

    /// Assess every MATCHED result in place
    ///
    /// Each worker owns exactly one index of `slots`, so completion order
    /// never affects output order.
    async fn run_assessment_phase(&self, job: &BatchJob, results: &mut [MatchResult]) {
        let pending: Vec<(usize, AssessmentRequest)> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_matched())
            .filter_map(|(i, r)| AssessmentRequest::from_result(r).map(|req| (i, req)))
            .collect();

        let total = pending.len();
        job.progress.set_total(MatchPhase::Assessment, total);
        if total == 0 {
            return;
        }

        info!(
            job_id = %job.id,
            pairs = total,
            service = self.assessment.name(),
            "Phase 2: assessing matched pairs"
        );

        let rate_limiter = Arc::new(RateLimiter::new(job.config.ai_call_spacing()));
        let adapter = AssessmentAdapter::new(
            Arc::clone(&self.assessment),
            rate_limiter,
            job.config.ai_call_timeout(),
        )
        .with_cancellation(job.cancel.clone());

        let mut slots: Vec<Option<Result<Assessment, AssessmentError>>> = (0..results.len()).map(|_| None).collect();

        let outcomes: Vec<_> = stream::iter(pending)
            .map(|(index, request)| {
                let adapter = &adapter;
                let progress = &job.progress;
                let event_bus = &self.event_bus;
                let job_id = job.id;
                let cancel = &job.cancel;
                async move {
                    // No new dispatch once cancelled
                    if cancel.is_cancelled() {
                        return (index, Err(AssessmentError::Cancelled));
                    }

                    let outcome = adapter.assess(&request).await;
                    if !matches!(outcome, Err(AssessmentError::Cancelled)) {
                        let completed = progress.complete_one(MatchPhase::Assessment);
                        event_bus.emit_lossy(MatchEvent::PhaseProgress {
                            job_id,
                            phase: MatchPhase::Assessment,
                            completed,
                            total,
                            timestamp: Utc::now(),
                        });
                    }
                    (index, outcome)
                }
            })
            .buffer_unordered(job.config.ai_concurrency)
            .collect()
            .await;

        for (index, outcome) in outcomes {
            slots[index] = Some(outcome);
        }

        let mut unavailable = 0usize;
        for (result, slot) in results.iter_mut().zip(slots) {
            match slot {
                Some(Ok(assessment)) => apply_assessment(result, assessment),
                Some(Err(e)) => {
                    if !matches!(e, AssessmentError::Cancelled | AssessmentError::Disabled) {
                        warn!(
                            job_id = %job.id,
                            customer_id = %result.customer_id,
                            error = %e,
                            "Assessment unavailable, keeping provisional confidence"
                        );
                    }
                    unavailable += 1;
                    mark_unavailable(result, e.reason());
                }
                None => {}
            }
        }

        info!(
            job_id = %job.id,
            assessed = total - unavailable,
            unavailable,
            "Phase 2 complete"
        );
    }
}
