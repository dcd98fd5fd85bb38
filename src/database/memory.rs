use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::models::record::TenantScopedRecord;
use crate::database::query::{SortDirection, TenantQuery};
use crate::database::store::{Change, RecordStore};

/// In-process record store with the same semantics as the PostgreSQL one.
/// Used by tests and local runs without a database.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    rows: Arc<RwLock<Vec<TenantScopedRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row regardless of tenant
    pub async fn rows(&self) -> Vec<TenantScopedRecord> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn apply(&self, changes: Vec<Change>) -> Result<u64, DatabaseError> {
        let affected = changes.len() as u64;
        let mut guard = self.rows.write().await;
        // work on a copy so a failing change leaves nothing behind
        let mut rows = guard.clone();

        for change in changes {
            match change {
                Change::Insert(record) => {
                    if rows.iter().any(|r| r.id == record.id) {
                        return Err(DatabaseError::QueryError(format!(
                            "duplicate key value for id {}",
                            record.id
                        )));
                    }
                    rows.push(record);
                }
                Change::Update(record) => {
                    let row = rows
                        .iter_mut()
                        .find(|r| r.id == record.id && r.tenant_id == record.tenant_id)
                        .ok_or_else(|| DatabaseError::NotFound(format!("Record {} not found", record.id)))?;
                    row.value = record.value;
                }
                Change::Delete { tenant_id, id } => {
                    let before = rows.len();
                    rows.retain(|r| !(r.id == id && r.tenant_id == tenant_id));
                    if rows.len() == before {
                        return Err(DatabaseError::NotFound(format!("Record {} not found", id)));
                    }
                }
            }
        }

        *guard = rows;
        Ok(affected)
    }

    async fn select(&self, query: &TenantQuery) -> Result<Vec<TenantScopedRecord>, DatabaseError> {
        let rows = self.rows.read().await;
        let mut matched: Vec<TenantScopedRecord> = rows.iter().filter(|r| query.matches(r)).cloned().collect();

        matched.sort_by(|a, b| match query.direction() {
            SortDirection::Asc => a.created_at.cmp(&b.created_at),
            SortDirection::Desc => b.created_at.cmp(&a.created_at),
        });

        if let Some(limit) = query.max_rows() {
            matched.truncate(limit as usize);
        }

        Ok(matched)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
