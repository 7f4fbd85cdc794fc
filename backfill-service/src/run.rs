//! One end-to-end backfill run: reconcile leftovers, then synthesize and
//! submit each chunk in order, stopping at the first failure.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::{
    backfill::{revert_pending_backfills, BackfillApi, BackfillError, Orchestrator},
    chunk::Chunk,
    config::JobConfig,
    generate::{synthesize, EventsPerDay},
    validate::validate_events,
};

#[derive(Debug, Default)]
pub struct RunReport {
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub events_ingested: usize,
    /// Expected total from [`EventEstimate`], used for event progress.
    pub events_estimated: f64,
    pub backfill_ids: Vec<String>,
    /// Wall time spent in the chunk loop so far.
    pub elapsed: Duration,
    pub failure: Option<RunFailure>,
}

#[derive(Debug)]
pub struct RunFailure {
    /// 1-based; 0 when the run failed before the first chunk.
    pub chunk: usize,
    pub error: BackfillError,
}

impl RunReport {
    fn new(job: &JobConfig, chunks_total: usize) -> Self {
        Self {
            chunks_total,
            events_estimated: EventEstimate::for_job(job).expected,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn chunks_pct(&self) -> f64 {
        if self.chunks_total == 0 {
            return 0.0;
        }
        self.chunks_completed as f64 / self.chunks_total as f64 * 100.0
    }

    pub fn events_pct(&self) -> f64 {
        if self.events_estimated <= 0.0 {
            return 0.0;
        }
        self.events_ingested as f64 / self.events_estimated * 100.0
    }

    /// Remaining wall time, extrapolated from the average chunk so far.
    pub fn estimated_remaining(&self) -> Duration {
        let left = self.chunks_total.saturating_sub(self.chunks_completed);
        if self.chunks_completed == 0 || left == 0 {
            return Duration::ZERO;
        }
        let per_chunk = self.elapsed / u32::try_from(self.chunks_completed).unwrap_or(u32::MAX);
        per_chunk * u32::try_from(left).unwrap_or(u32::MAX)
    }

    fn log_progress(&self) {
        tracing::info!(
            chunks_pct = self.chunks_pct(),
            events_pct = self.events_pct(),
            elapsed_secs = self.elapsed.as_secs_f64(),
            remaining_secs = self.estimated_remaining().as_secs_f64(),
            "progress"
        );
    }

    pub fn log_summary(&self) {
        tracing::info!(
            chunks_completed = self.chunks_completed,
            chunks_total = self.chunks_total,
            events_ingested = self.events_ingested,
            backfill_ids = ?self.backfill_ids,
            total_secs = self.elapsed.as_secs_f64(),
            "backfill summary"
        );
        match &self.failure {
            None => tracing::info!("backfill completed successfully"),
            Some(f) => tracing::error!(
                chunk = f.chunk,
                events_processed = self.events_ingested,
                error = %f.error,
                "backfill failed after processing {} events",
                self.events_ingested
            ),
        }
    }
}

/// Event volume implied by the per-day count over every calendar day in the
/// range. `expected` uses the midpoint of a `{min, max}` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventEstimate {
    pub days: u64,
    pub min: u64,
    pub max: u64,
    pub expected: f64,
}

impl EventEstimate {
    pub fn for_job(job: &JobConfig) -> Self {
        let days = u64::try_from((job.end.date() - job.start.date()).whole_days() + 1).unwrap_or(0);
        let (lo, hi) = match job.events_per_day {
            EventsPerDay::Exact(n) => (n, n),
            EventsPerDay::Range { min, max } => (min, max.max(min)),
        };
        let (lo, hi) = (u64::from(lo), u64::from(hi));

        Self {
            days,
            min: days * lo,
            max: days * hi,
            expected: days as f64 * (lo + hi) as f64 / 2.0,
        }
    }
}

pub fn log_banner(job: &JobConfig) {
    tracing::info!(
        job_id = job.job_id.as_deref().unwrap_or("-"),
        event_name = %job.event_name,
        customer = %job.external_customer_id,
        start = %job.start,
        end = %job.end,
        events_per_day = %job.events_per_day.describe(),
        distribution = %job.distribution.describe(),
        replace_existing_events = job.replace_existing_events,
        batch_size = job.batch_size,
        "starting backfill"
    );
    for (name, spec) in &job.properties {
        tracing::info!(property = %name, spec = %spec.describe(), "event property");
    }
}

fn log_estimate(job: &JobConfig, chunks_total: usize) {
    let estimate = EventEstimate::for_job(job);
    tracing::info!(
        chunks_total,
        max_days_per_chunk = job.settings.max_days_per_chunk,
        days = estimate.days,
        estimated_events = estimate.expected,
        min_events = estimate.min,
        max_events = estimate.max,
        "estimated event volume"
    );
}

/// Revert leftovers, then process every chunk. Never returns early without a
/// report; callers decide the exit status from [`RunReport::is_success`].
pub async fn run<A, R>(api: &A, job: &JobConfig, rng: &mut R) -> RunReport
where
    A: BackfillApi + ?Sized,
    R: Rng + ?Sized,
{
    log_banner(job);

    let chunks = job.chunks();
    let mut report = RunReport::new(job, chunks.len());

    if let Err(error) = revert_pending_backfills(api, &job.reconcile_poll()).await {
        report.failure = Some(RunFailure { chunk: 0, error });
        return report;
    }

    log_estimate(job, chunks.len());
    let started = Instant::now();
    let orchestrator = Orchestrator::new(api, job);
    for (i, chunk) in chunks.iter().enumerate() {
        let chunk_no = i + 1;
        let chunk_started = Instant::now();
        tracing::info!(
            chunk = chunk_no,
            chunks_total = report.chunks_total,
            start = %chunk.start,
            end = %chunk.end,
            "processing chunk"
        );

        let result = match prepare_chunk(job, chunk, rng) {
            Ok(events) => orchestrator.process_chunk(chunk, &events).await,
            Err(e) => Err(e),
        };
        report.elapsed = started.elapsed();

        match result {
            Ok(outcome) => {
                report.chunks_completed += 1;
                report.events_ingested += outcome.events_ingested;
                report.backfill_ids.extend(outcome.backfill_id);
                tracing::info!(
                    chunk = chunk_no,
                    duration_secs = chunk_started.elapsed().as_secs_f64(),
                    "chunk processed"
                );
                report.log_progress();
            }
            Err(error) => {
                metrics::counter!("backfill_chunks_failed_total").increment(1);
                report.failure = Some(RunFailure { chunk: chunk_no, error });
                break;
            }
        }
    }

    report.elapsed = started.elapsed();
    report
}

/// Generate and locally check every chunk without contacting the provider.
pub fn dry_run<R: Rng + ?Sized>(job: &JobConfig, rng: &mut R) -> RunReport {
    log_banner(job);

    let chunks = job.chunks();
    let mut report = RunReport::new(job, chunks.len());
    log_estimate(job, chunks.len());

    let started = Instant::now();
    for (i, chunk) in chunks.iter().enumerate() {
        match prepare_chunk(job, chunk, rng) {
            Ok(events) => {
                tracing::info!(chunk = i + 1, events = events.len(), "dry run: chunk generated");
                report.chunks_completed += 1;
                report.events_ingested += events.len();
            }
            Err(error) => {
                report.failure = Some(RunFailure { chunk: i + 1, error });
                break;
            }
        }
    }

    report.elapsed = started.elapsed();
    report
}

fn prepare_chunk<R: Rng + ?Sized>(
    job: &JobConfig,
    chunk: &Chunk,
    rng: &mut R,
) -> Result<Vec<orb_client::domain::Event>, BackfillError> {
    let events = synthesize(job, chunk, rng);
    if let Some(sample) = events.first() {
        tracing::info!(
            timestamp = %sample.timestamp,
            customer = %sample.external_customer_id,
            event_name = %sample.event_name,
            idempotency_key = %sample.idempotency_key,
            properties = ?sample.properties,
            "sample event"
        );
    }
    validate_events(&events, chunk)?;
    Ok(events)
}
