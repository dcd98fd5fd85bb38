use crate::database::gateway::{GatewayError, TenantGateway};
use crate::database::manager::DatabaseError;
use crate::database::models::record::TenantScopedRecord;
use crate::database::query::SortDirection;

/// Sample repository for [`TenantScopedRecord`], one per request
pub struct TenantScopedRecordRepository {
    gateway: TenantGateway,
}

impl TenantScopedRecordRepository {
    pub fn new(gateway: TenantGateway) -> Self {
        Self { gateway }
    }

    /// Persist a new record under the request's tenant and return it as stored
    pub async fn add(&mut self, record: TenantScopedRecord) -> Result<TenantScopedRecord, GatewayError> {
        self.gateway.add(record);
        let mut saved = self.gateway.save_changes().await?;
        saved
            .pop()
            .ok_or_else(|| DatabaseError::QueryError("record was not saved".to_string()).into())
    }

    /// All of the tenant's records, newest first
    pub async fn list(&self) -> Result<Vec<TenantScopedRecord>, GatewayError> {
        if !self.gateway.context().has_tenant() {
            return Err(GatewayError::MissingTenant);
        }
        self.gateway.select(|q| q.order(SortDirection::Desc)).await
    }
}
