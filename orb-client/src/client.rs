//! HTTP client for the billing provider's backfill and ingestion endpoints.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::domain::{
    backfill::CloseRequest, event::IngestRequest, Backfill, CloseStatus, CreateBackfill, Event,
    IngestResponse, Page,
};

pub const DEFAULT_BASE_URL: &str = "https://api.withorb.com/v1";

const LIST_PAGE_LIMIT: u32 = 100;

#[derive(thiserror::Error, Debug)]
pub enum OrbError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

pub struct OrbClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OrbClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, OrbError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, OrbError> {
        let response = req.bearer_auth(&self.api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrbError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| OrbError::Decode(e.to_string()))
    }

    /// List every backfill visible to this API key, following pagination cursors.
    pub async fn list_backfills(&self) -> Result<Vec<Backfill>, OrbError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.url("/events/backfills"))
                .query(&[("limit", LIST_PAGE_LIMIT.to_string())]);
            if let Some(c) = &cursor {
                req = req.query(&[("cursor", c)]);
            }

            let page: Page<Backfill> = self.send(req).await?;
            all.extend(page.data);

            match page.pagination_metadata.next_cursor {
                Some(next) if page.pagination_metadata.has_more => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = all.len(), "listed backfills");
        Ok(all)
    }

    pub async fn create_backfill(&self, request: &CreateBackfill) -> Result<Backfill, OrbError> {
        let req = self.http.post(self.url("/events/backfills")).json(request);
        self.send(req).await
    }

    pub async fn fetch_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError> {
        let req = self.http.get(self.url(&format!("/events/backfills/{backfill_id}")));
        self.send(req).await
    }

    /// Close a backfill. Without a status the provider starts reflecting the
    /// ingested events; `CloseStatus::Failed` abandons them.
    pub async fn close_backfill(
        &self,
        backfill_id: &str,
        status: Option<CloseStatus>,
    ) -> Result<Backfill, OrbError> {
        let mut req = self
            .http
            .post(self.url(&format!("/events/backfills/{backfill_id}/close")));
        if let Some(status) = status {
            req = req.json(&CloseRequest { status });
        }
        self.send(req).await
    }

    pub async fn revert_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError> {
        let req = self
            .http
            .post(self.url(&format!("/events/backfills/{backfill_id}/revert")));
        self.send(req).await
    }

    /// Submit a batch of events into an open backfill.
    pub async fn ingest(&self, events: &[Event], backfill_id: &str) -> Result<IngestResponse, OrbError> {
        let req = self
            .http
            .post(self.url("/ingest"))
            .query(&[("backfill_id", backfill_id)])
            .json(&IngestRequest { events });
        self.send(req).await
    }
}
