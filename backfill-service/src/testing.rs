//! Scripted in-memory stand-in for the provider API, plus job fixtures.

use std::{collections::VecDeque, sync::Mutex};

use orb_client::{
    domain::{Backfill, BackfillStatus, CloseStatus, CreateBackfill, Event, IngestResponse},
    OrbError,
};
use time::OffsetDateTime;

use crate::{
    backfill::BackfillApi,
    config::{JobConfig, Settings, DEFAULT_BATCH_SIZE, DEFAULT_CUSTOMER_ID},
    generate::{Distribution, EventsPerDay, PropertySpecs},
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    List,
    Create {
        start: OffsetDateTime,
        end: OffsetDateTime,
        customer: String,
        replace: bool,
    },
    Ingest { backfill_id: String, events: usize },
    Close {
        backfill_id: String,
        status: Option<CloseStatus>,
    },
    Fetch(String),
    Revert(String),
}

#[derive(Default)]
struct State {
    backfills: Vec<Backfill>,
    calls: Vec<Call>,
    ingested: Vec<Event>,
    ingest_script: VecDeque<Result<IngestResponse, OrbError>>,
    fetch_script: VecDeque<Result<BackfillStatus, OrbError>>,
    create_error: Option<OrbError>,
    list_error: Option<OrbError>,
    refuse_reverts: bool,
    next_id: u32,
}

/// Unscripted calls succeed: ingests are clean and fetches report `reflected`.
/// A backfill put into `pending_revert` finishes reverting after the next list.
#[derive(Default)]
pub(crate) struct MockApi {
    state: Mutex<State>,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_backfills(backfills: Vec<Backfill>) -> Self {
        let api = Self::default();
        api.lock().backfills = backfills;
        api
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn script_ingest(&self, result: Result<IngestResponse, OrbError>) {
        self.lock().ingest_script.push_back(result);
    }

    pub(crate) fn script_fetch(&self, result: Result<BackfillStatus, OrbError>) {
        self.lock().fetch_script.push_back(result);
    }

    pub(crate) fn fail_create(&self, err: OrbError) {
        self.lock().create_error = Some(err);
    }

    pub(crate) fn fail_list(&self, err: OrbError) {
        self.lock().list_error = Some(err);
    }

    pub(crate) fn refuse_reverts(&self) {
        self.lock().refuse_reverts = true;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn ingested(&self) -> Vec<Event> {
        self.lock().ingested.clone()
    }

    pub(crate) fn status_of(&self, id: &str) -> Option<BackfillStatus> {
        self.lock().backfills.iter().find(|b| b.id == id).map(|b| b.status)
    }

    fn set_status(state: &mut State, id: &str, status: BackfillStatus) -> Backfill {
        match state.backfills.iter_mut().find(|b| b.id == id) {
            Some(b) => {
                b.status = status;
                b.clone()
            }
            None => backfill(id, status),
        }
    }
}

#[async_trait::async_trait]
impl BackfillApi for MockApi {
    async fn list_backfills(&self) -> Result<Vec<Backfill>, OrbError> {
        let mut state = self.lock();
        state.calls.push(Call::List);
        if let Some(err) = state.list_error.take() {
            return Err(err);
        }
        let snapshot = state.backfills.clone();
        for b in state.backfills.iter_mut() {
            if b.status == BackfillStatus::PendingRevert {
                b.status = BackfillStatus::Reverted;
            }
        }
        Ok(snapshot)
    }

    async fn create_backfill(&self, request: &CreateBackfill) -> Result<Backfill, OrbError> {
        let mut state = self.lock();
        state.calls.push(Call::Create {
            start: request.timeframe_start,
            end: request.timeframe_end,
            customer: request.external_customer_id.clone(),
            replace: request.replace_existing_events,
        });
        if let Some(err) = state.create_error.take() {
            return Err(err);
        }

        state.next_id += 1;
        let created = Backfill {
            timeframe_start: Some(request.timeframe_start),
            timeframe_end: Some(request.timeframe_end),
            replace_existing_events: Some(request.replace_existing_events),
            ..backfill(&format!("bf_{}", state.next_id), BackfillStatus::Pending)
        };
        state.backfills.push(created.clone());
        Ok(created)
    }

    async fn ingest(&self, events: &[Event], backfill_id: &str) -> Result<IngestResponse, OrbError> {
        let mut state = self.lock();
        state.calls.push(Call::Ingest {
            backfill_id: backfill_id.to_string(),
            events: events.len(),
        });
        let result = state
            .ingest_script
            .pop_front()
            .unwrap_or_else(|| Ok(IngestResponse::default()));
        if matches!(&result, Ok(r) if r.is_clean()) {
            state.ingested.extend_from_slice(events);
        }
        result
    }

    async fn close_backfill(
        &self,
        backfill_id: &str,
        status: Option<CloseStatus>,
    ) -> Result<Backfill, OrbError> {
        let mut state = self.lock();
        state.calls.push(Call::Close {
            backfill_id: backfill_id.to_string(),
            status,
        });
        let next = match status {
            Some(CloseStatus::Failed) => BackfillStatus::Failed,
            None => BackfillStatus::Pending,
        };
        Ok(Self::set_status(&mut state, backfill_id, next))
    }

    async fn fetch_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError> {
        let mut state = self.lock();
        state.calls.push(Call::Fetch(backfill_id.to_string()));
        let status = state
            .fetch_script
            .pop_front()
            .unwrap_or(Ok(BackfillStatus::Reflected))?;
        Ok(Self::set_status(&mut state, backfill_id, status))
    }

    async fn revert_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError> {
        let mut state = self.lock();
        state.calls.push(Call::Revert(backfill_id.to_string()));
        if state.refuse_reverts {
            return Err(api_error(400));
        }
        Ok(Self::set_status(&mut state, backfill_id, BackfillStatus::PendingRevert))
    }
}

pub(crate) fn backfill(id: &str, status: BackfillStatus) -> Backfill {
    Backfill {
        id: id.to_string(),
        status,
        created_at: None,
        timeframe_start: None,
        timeframe_end: None,
        customer_id: None,
        events_ingested: None,
        replace_existing_events: None,
    }
}

pub(crate) fn api_error(status: u16) -> OrbError {
    OrbError::Api {
        status,
        body: "scripted failure".to_string(),
    }
}

pub(crate) fn job_config(
    start: OffsetDateTime,
    end: OffsetDateTime,
    events_per_day: EventsPerDay,
    distribution: Distribution,
) -> JobConfig {
    JobConfig {
        job_id: None,
        event_name: "api_call".to_string(),
        external_customer_id: DEFAULT_CUSTOMER_ID.to_string(),
        start,
        end,
        events_per_day,
        distribution,
        properties: PropertySpecs::new(),
        replace_existing_events: true,
        batch_size: DEFAULT_BATCH_SIZE,
        settings: Settings::default(),
    }
}
