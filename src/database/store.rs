use async_trait::async_trait;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::record::TenantScopedRecord;
use crate::database::query::{SqlParam, TenantQuery, RECORDS_TABLE};

/// A single row change, already checked by the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert(TenantScopedRecord),
    Update(TenantScopedRecord),
    Delete { tenant_id: Uuid, id: Uuid },
}

impl Change {
    pub fn id(&self) -> Uuid {
        match self {
            Change::Insert(record) | Change::Update(record) => record.id,
            Change::Delete { id, .. } => *id,
        }
    }
}

/// Persistence backend behind the tenant gateway
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Apply all changes atomically. Updates and deletes that match no row of
    /// their tenant fail the whole batch.
    async fn apply(&self, changes: Vec<Change>) -> Result<u64, DatabaseError>;

    async fn select(&self, query: &TenantQuery) -> Result<Vec<TenantScopedRecord>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

pub struct PgRecordStore {
    manager: DatabaseManager,
}

impl PgRecordStore {
    pub fn new(manager: DatabaseManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn apply(&self, changes: Vec<Change>) -> Result<u64, DatabaseError> {
        let mut tx = self.manager.pool().begin().await?;
        let mut affected = 0;

        for change in &changes {
            let result = match change {
                Change::Insert(record) => {
                    let sql = format!(
                        "INSERT INTO \"{}\" (\"id\", \"tenant_id\", \"value\", \"created_at\") VALUES ($1, $2, $3, $4)",
                        RECORDS_TABLE
                    );
                    sqlx::query(&sql)
                        .bind(record.id)
                        .bind(record.tenant_id)
                        .bind(record.value.as_deref())
                        .bind(record.created_at)
                        .execute(&mut *tx)
                        .await?
                }
                // tenant_id is part of the key, never of the SET list
                Change::Update(record) => {
                    let sql = format!(
                        "UPDATE \"{}\" SET \"value\" = $3 WHERE \"id\" = $1 AND \"tenant_id\" = $2",
                        RECORDS_TABLE
                    );
                    sqlx::query(&sql)
                        .bind(record.id)
                        .bind(record.tenant_id)
                        .bind(record.value.as_deref())
                        .execute(&mut *tx)
                        .await?
                }
                Change::Delete { tenant_id, id } => {
                    let sql = format!(
                        "DELETE FROM \"{}\" WHERE \"id\" = $1 AND \"tenant_id\" = $2",
                        RECORDS_TABLE
                    );
                    sqlx::query(&sql)
                        .bind(*id)
                        .bind(*tenant_id)
                        .execute(&mut *tx)
                        .await?
                }
            };

            if result.rows_affected() == 0 {
                // dropping tx rolls back
                return Err(DatabaseError::NotFound(format!("Record {} not found", change.id())));
            }
            affected += result.rows_affected();
        }

        tx.commit().await?;
        tracing::debug!("Applied {} change(s), {} row(s) affected", changes.len(), affected);
        Ok(affected)
    }

    async fn select(&self, query: &TenantQuery) -> Result<Vec<TenantScopedRecord>, DatabaseError> {
        let sql_result = query.to_sql();
        let mut q = sqlx::query_as::<_, TenantScopedRecord>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = match p {
                SqlParam::Uuid(id) => q.bind(*id),
                SqlParam::BigInt(n) => q.bind(*n),
            };
        }
        let rows = q.fetch_all(self.manager.pool()).await?;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.manager.health_check().await
    }
}

/// Stand-in used when no database is configured outside development. Every
/// call fails, so the API stays up in a degraded state.
pub struct UnavailableStore {
    reason: &'static str,
}

impl UnavailableStore {
    pub fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

#[async_trait]
impl RecordStore for UnavailableStore {
    async fn apply(&self, _changes: Vec<Change>) -> Result<u64, DatabaseError> {
        Err(DatabaseError::ConfigMissing(self.reason))
    }

    async fn select(&self, _query: &TenantQuery) -> Result<Vec<TenantScopedRecord>, DatabaseError> {
        Err(DatabaseError::ConfigMissing(self.reason))
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Err(DatabaseError::ConfigMissing(self.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = UnavailableStore::new("DATABASE_URL");
        let query = TenantQuery::new(Uuid::new_v4());

        assert!(matches!(store.ping().await, Err(DatabaseError::ConfigMissing("DATABASE_URL"))));
        assert!(store.select(&query).await.is_err());
        assert!(store.apply(vec![]).await.is_err());
    }

    #[test]
    fn change_id_covers_all_kinds() {
        let record = TenantScopedRecord::create(None);
        let id = record.id;
        assert_eq!(Change::Insert(record.clone()).id(), id);
        assert_eq!(Change::Update(record).id(), id);
        assert_eq!(Change::Delete { tenant_id: Uuid::new_v4(), id }.id(), id);
    }
}
