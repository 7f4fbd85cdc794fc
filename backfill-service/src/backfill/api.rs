use orb_client::{
    domain::{Backfill, CloseStatus, CreateBackfill, Event, IngestResponse},
    OrbClient, OrbError,
};

/// The slice of the provider API the backfill workflow drives.
#[async_trait::async_trait]
pub trait BackfillApi: Send + Sync {
    async fn list_backfills(&self) -> Result<Vec<Backfill>, OrbError>;

    async fn create_backfill(&self, request: &CreateBackfill) -> Result<Backfill, OrbError>;

    async fn ingest(&self, events: &[Event], backfill_id: &str) -> Result<IngestResponse, OrbError>;

    async fn close_backfill(
        &self,
        backfill_id: &str,
        status: Option<CloseStatus>,
    ) -> Result<Backfill, OrbError>;

    async fn fetch_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError>;

    async fn revert_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError>;
}

#[async_trait::async_trait]
impl BackfillApi for OrbClient {
    async fn list_backfills(&self) -> Result<Vec<Backfill>, OrbError> {
        OrbClient::list_backfills(self).await
    }

    async fn create_backfill(&self, request: &CreateBackfill) -> Result<Backfill, OrbError> {
        OrbClient::create_backfill(self, request).await
    }

    async fn ingest(&self, events: &[Event], backfill_id: &str) -> Result<IngestResponse, OrbError> {
        OrbClient::ingest(self, events, backfill_id).await
    }

    async fn close_backfill(
        &self,
        backfill_id: &str,
        status: Option<CloseStatus>,
    ) -> Result<Backfill, OrbError> {
        OrbClient::close_backfill(self, backfill_id, status).await
    }

    async fn fetch_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError> {
        OrbClient::fetch_backfill(self, backfill_id).await
    }

    async fn revert_backfill(&self, backfill_id: &str) -> Result<Backfill, OrbError> {
        OrbClient::revert_backfill(self, backfill_id).await
    }
}
