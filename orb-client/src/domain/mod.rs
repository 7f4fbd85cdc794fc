pub mod backfill;
pub mod event;

pub use backfill::{Backfill, BackfillStatus, CloseStatus, CreateBackfill, Page, PaginationMetadata};
pub use event::{Event, IngestResponse, ValidationFailure};
