use async_trait::async_trait;
use otlink_sdk::{ConnectionRecord, StatusUpdate};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Persistence seam owned by the CRUD layer.
///
/// The scheduler only lists OT-class records and writes probe outcomes
/// back; record creation and editing happen elsewhere.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn list_ot_connections(&self) -> Result<Vec<ConnectionRecord>, StoreError>;

    async fn update_connection_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<(), StoreError>;
}
