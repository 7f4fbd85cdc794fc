use std::cell::Cell;

use orb_client::domain::{BackfillStatus, CloseStatus, CreateBackfill, Event};

use crate::{
    chunk::Chunk,
    config::JobConfig,
    retry::{poll_until, PollTimeout},
};

use super::{BackfillApi, BackfillError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// `None` when the chunk had no events and no backfill was opened.
    pub backfill_id: Option<String>,
    pub events_ingested: usize,
}

/// Drives one backfill per chunk: open, ingest in batches, close, then wait
/// for the provider to reflect it.
pub struct Orchestrator<'a, A: BackfillApi + ?Sized> {
    api: &'a A,
    job: &'a JobConfig,
}

impl<'a, A: BackfillApi + ?Sized> Orchestrator<'a, A> {
    pub fn new(api: &'a A, job: &'a JobConfig) -> Self {
        Self { api, job }
    }

    pub async fn process_chunk(&self, chunk: &Chunk, events: &[Event]) -> Result<ChunkOutcome, BackfillError> {
        if events.is_empty() {
            tracing::info!("no events to ingest for this chunk");
            return Ok(ChunkOutcome::default());
        }

        let backfill_id = self.open(chunk).await?;
        self.ingest_all(&backfill_id, events).await?;

        tracing::info!(backfill_id = %backfill_id, "all batches processed, closing backfill");
        self.api
            .close_backfill(&backfill_id, None)
            .await
            .map_err(|source| BackfillError::Close {
                backfill_id: backfill_id.clone(),
                source,
            })?;

        self.wait_until_reflected(&backfill_id).await?;
        tracing::info!(backfill_id = %backfill_id, events = events.len(), "backfill reflected");

        Ok(ChunkOutcome {
            backfill_id: Some(backfill_id),
            events_ingested: events.len(),
        })
    }

    async fn open(&self, chunk: &Chunk) -> Result<String, BackfillError> {
        let (timeframe_start, timeframe_end) = chunk.timeframe();
        let request = CreateBackfill {
            timeframe_start,
            timeframe_end,
            external_customer_id: self.job.external_customer_id.clone(),
            replace_existing_events: self.job.replace_existing_events,
        };

        tracing::info!(
            timeframe_start = %timeframe_start,
            timeframe_end = %timeframe_end,
            customer = %request.external_customer_id,
            "creating backfill"
        );
        let backfill = self.api.create_backfill(&request).await.map_err(BackfillError::Open)?;
        tracing::info!(backfill_id = %backfill.id, "opened backfill");

        Ok(backfill.id)
    }

    /// Submit every batch; the first rejected or failed batch closes the
    /// backfill as failed and stops the chunk.
    async fn ingest_all(&self, backfill_id: &str, events: &[Event]) -> Result<(), BackfillError> {
        let batch_size = self.job.batch_size.max(1);
        let total_batches = events.len().div_ceil(batch_size);
        let pause = self.job.batch_pause();

        for (i, batch) in events.chunks(batch_size).enumerate() {
            let batch_no = i + 1;
            if i > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            tracing::info!(batch = batch_no, total_batches, events = batch.len(), "processing batch");
            match self.api.ingest(batch, backfill_id).await {
                Ok(result) if result.is_clean() => {
                    metrics::counter!("backfill_batches_ingested_total").increment(1);
                }
                Ok(result) => {
                    tracing::error!(
                        backfill_id,
                        batch = batch_no,
                        rejected = result.validation_failed.len(),
                        failures = ?result.validation_failed,
                        "batch failed validation"
                    );
                    metrics::counter!("backfill_validation_failures_total")
                        .increment(result.validation_failed.len() as u64);
                    self.abandon(backfill_id).await;
                    return Err(BackfillError::ValidationFailed {
                        backfill_id: backfill_id.to_string(),
                        batch: batch_no,
                        rejected: result.validation_failed.len(),
                    });
                }
                Err(source) => {
                    tracing::error!(backfill_id, batch = batch_no, error = %source, "error ingesting batch");
                    self.abandon(backfill_id).await;
                    return Err(BackfillError::Ingest {
                        backfill_id: backfill_id.to_string(),
                        batch: batch_no,
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    /// Best-effort close as failed; the caller already has the real error.
    async fn abandon(&self, backfill_id: &str) {
        if let Err(e) = self.api.close_backfill(backfill_id, Some(CloseStatus::Failed)).await {
            tracing::warn!(backfill_id, error = %e, "failed to close backfill as failed");
        }
    }

    async fn wait_until_reflected(&self, backfill_id: &str) -> Result<(), BackfillError> {
        let policy = self.job.status_poll();
        let last_seen: Cell<Option<BackfillStatus>> = Cell::new(None);
        let last_seen = &last_seen;
        let api = self.api;

        let terminal = poll_until(&policy, |_| async move {
            let status = api.fetch_backfill(backfill_id).await?.status;
            if last_seen.replace(Some(status)) != Some(status) {
                tracing::info!(backfill_id, status = %status, "backfill status");
            }
            Ok::<_, orb_client::OrbError>(match status {
                BackfillStatus::Reflected | BackfillStatus::Failed | BackfillStatus::Reverted => Some(status),
                _ => None,
            })
        })
        .await
        .map_err(|PollTimeout { attempts }| BackfillError::Timeout {
            backfill_id: backfill_id.to_string(),
            attempts,
        })?;

        match terminal {
            BackfillStatus::Reflected => Ok(()),
            status => Err(BackfillError::Terminal {
                backfill_id: backfill_id.to_string(),
                status,
            }),
        }
    }
}
