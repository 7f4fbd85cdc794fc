use orb_client::domain::Event;

use crate::{backfill::BackfillError, chunk::Chunk};

/// Pure validation of a synthesized event against the chunk it will be
/// ingested into.
///
/// Rules:
/// - event name and customer id must be non-empty.
/// - timestamp must lie inside the chunk's inclusive window.
pub fn validate_event(event: &Event, chunk: &Chunk) -> Result<(), BackfillError> {
    let reject = |reason: String| BackfillError::InvalidEvent {
        idempotency_key: event.idempotency_key.clone(),
        reason,
    };

    if event.event_name.trim().is_empty() {
        return Err(reject("event_name must be non-empty".to_string()));
    }
    if event.external_customer_id.trim().is_empty() {
        return Err(reject("external_customer_id must be non-empty".to_string()));
    }
    if !chunk.contains(event.timestamp) {
        return Err(reject(format!(
            "timestamp {} outside backfill window {} to {}",
            event.timestamp, chunk.start, chunk.end
        )));
    }

    Ok(())
}

pub fn validate_events(events: &[Event], chunk: &Chunk) -> Result<(), BackfillError> {
    for event in events {
        if let Err(e) = validate_event(event, chunk) {
            metrics::counter!("validation_events_rejected_total").increment(1);
            return Err(e);
        }
    }
    Ok(())
}
