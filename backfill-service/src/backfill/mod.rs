pub mod api;
pub mod orchestrator;
pub mod reconcile;

use orb_client::{domain::BackfillStatus, OrbError};

pub use api::BackfillApi;
pub use orchestrator::{ChunkOutcome, Orchestrator};
pub use reconcile::revert_pending_backfills;

#[derive(thiserror::Error, Debug)]
pub enum BackfillError {
    #[error("failed to open backfill: {0}")]
    Open(#[source] OrbError),
    #[error("backfill {backfill_id} rejected {rejected} events in batch {batch}")]
    ValidationFailed {
        backfill_id: String,
        batch: usize,
        rejected: usize,
    },
    #[error("failed to ingest batch {batch} into backfill {backfill_id}: {source}")]
    Ingest {
        backfill_id: String,
        batch: usize,
        #[source]
        source: OrbError,
    },
    #[error("failed to close backfill {backfill_id}: {source}")]
    Close {
        backfill_id: String,
        #[source]
        source: OrbError,
    },
    #[error("backfill {backfill_id} ended with status {status}")]
    Terminal {
        backfill_id: String,
        status: BackfillStatus,
    },
    #[error("timed out waiting for backfill {backfill_id} to be reflected after {attempts} status checks")]
    Timeout { backfill_id: String, attempts: u32 },
    #[error("failed to list backfills: {0}")]
    List(#[source] OrbError),
    #[error("backfills still pending after {attempts} checks")]
    ReconcileTimeout { attempts: u32 },
    #[error("event {idempotency_key} is invalid: {reason}")]
    InvalidEvent {
        idempotency_key: String,
        reason: String,
    },
}
