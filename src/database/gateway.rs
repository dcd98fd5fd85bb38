use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::record::{TenantScoped, TenantScopedRecord};
use crate::database::query::TenantQuery;
use crate::database::store::{Change, RecordStore};
use crate::tenancy::TenantContext;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("tenant-scoped changes cannot be saved without a tenant context")]
    MissingTenant,

    #[error("tenant id cannot be modified once set")]
    TenantIdModified { id: Uuid },

    #[error("record {id} belongs to a different tenant")]
    CrossTenant { id: Uuid },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    state: EntryState,
    record: T,
    /// Tenant id as loaded from the store; `None` for new records
    original_tenant_id: Option<Uuid>,
}

/// A record loaded through the gateway, remembering the tenant it was read with.
/// Only tracked records can be staged for update or removal.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    record: T,
    original_tenant_id: Uuid,
}

impl<T: TenantScoped> Tracked<T> {
    fn loaded(record: T) -> Self {
        let original_tenant_id = record.tenant_id();
        Self {
            record,
            original_tenant_id,
        }
    }

    pub fn get(&self) -> &T {
        &self.record
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.record
    }

    pub fn original_tenant_id(&self) -> Uuid {
        self.original_tenant_id
    }

    pub fn into_inner(self) -> T {
        self.record
    }
}

/// Guard failure, pointing at the offending entry
#[derive(Debug, PartialEq, Eq)]
enum Violation {
    MissingTenant,
    CrossTenant(usize),
    TenantIdModified(usize),
}

/// Stamp, check and reject staged entries against the request's tenant.
///
/// Runs before anything reaches the store. On error no entry has been written.
fn apply_tenant_ids<T: TenantScoped>(context: TenantContext, entries: &mut [Entry<T>]) -> Result<(), Violation> {
    let tenant_id = match context.tenant_id() {
        Some(id) => id,
        None if entries.is_empty() => return Ok(()),
        None => return Err(Violation::MissingTenant),
    };

    for (index, entry) in entries.iter_mut().enumerate() {
        match entry.state {
            EntryState::Added => entry.record.set_tenant_id(tenant_id),
            EntryState::Modified | EntryState::Deleted => {
                if entry.original_tenant_id != Some(tenant_id) {
                    return Err(Violation::CrossTenant(index));
                }
                if entry.state == EntryState::Modified && entry.record.tenant_id() != tenant_id {
                    return Err(Violation::TenantIdModified(index));
                }
            }
        }
    }

    Ok(())
}

/// Request-scoped unit of work over tenant-scoped records.
///
/// Writes are staged with [`add`](Self::add), [`update`](Self::update) and
/// [`remove`](Self::remove) and committed together by
/// [`save_changes`](Self::save_changes). Every read is filtered to the context's
/// tenant.
pub struct TenantGateway {
    context: TenantContext,
    store: Arc<dyn RecordStore>,
    pending: Vec<Entry<TenantScopedRecord>>,
}

impl TenantGateway {
    pub fn new(context: TenantContext, store: Arc<dyn RecordStore>) -> Self {
        Self {
            context,
            store,
            pending: Vec::new(),
        }
    }

    pub fn context(&self) -> TenantContext {
        self.context
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Stage a new record. Its tenant id is overwritten on save.
    pub fn add(&mut self, record: TenantScopedRecord) {
        self.pending.push(Entry {
            state: EntryState::Added,
            record,
            original_tenant_id: None,
        });
    }

    pub fn update(&mut self, tracked: Tracked<TenantScopedRecord>) {
        self.pending.push(Entry {
            state: EntryState::Modified,
            original_tenant_id: Some(tracked.original_tenant_id),
            record: tracked.record,
        });
    }

    pub fn remove(&mut self, tracked: Tracked<TenantScopedRecord>) {
        self.pending.push(Entry {
            state: EntryState::Deleted,
            original_tenant_id: Some(tracked.original_tenant_id),
            record: tracked.record,
        });
    }

    /// Check and persist all staged changes in one transaction. Returns the
    /// records as written. On error the staged changes are kept and nothing is
    /// persisted.
    pub async fn save_changes(&mut self) -> Result<Vec<TenantScopedRecord>, GatewayError> {
        if let Err(violation) = apply_tenant_ids(self.context, &mut self.pending) {
            return Err(self.reject(violation));
        }

        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        let changes = self
            .pending
            .iter()
            .map(|entry| match entry.state {
                EntryState::Added => Change::Insert(entry.record.clone()),
                EntryState::Modified => Change::Update(entry.record.clone()),
                EntryState::Deleted => Change::Delete {
                    tenant_id: entry.record.tenant_id,
                    id: entry.record.id,
                },
            })
            .collect();

        self.store.apply(changes).await?;

        let saved: Vec<TenantScopedRecord> = self.pending.drain(..).map(|entry| entry.record).collect();
        debug!("Saved {} tenant-scoped change(s)", saved.len());
        Ok(saved)
    }

    /// Untracked read of this tenant's records, newest first unless refined
    pub async fn select<F>(&self, refine: F) -> Result<Vec<TenantScopedRecord>, GatewayError>
    where
        F: FnOnce(TenantQuery) -> TenantQuery,
    {
        let query = refine(self.base_query()?);
        Ok(self.store.select(&query).await?)
    }

    /// Load one record for update or removal
    pub async fn find(&self, id: Uuid) -> Result<Option<Tracked<TenantScopedRecord>>, GatewayError> {
        let query = self.base_query()?.by_id(id).limit(1);
        let mut rows = self.store.select(&query).await?;
        Ok(rows.pop().map(Tracked::loaded))
    }

    fn base_query(&self) -> Result<TenantQuery, GatewayError> {
        self.context
            .tenant_id()
            .map(TenantQuery::new)
            .ok_or(GatewayError::MissingTenant)
    }

    fn reject(&self, violation: Violation) -> GatewayError {
        match violation {
            Violation::MissingTenant => {
                warn!("Rejected {} tenant-scoped change(s) without a tenant context", self.pending.len());
                GatewayError::MissingTenant
            }
            Violation::CrossTenant(index) => {
                let entry = &self.pending[index];
                warn!(
                    "Rejected change to record {} of tenant {:?} from another tenant",
                    entry.record.id, entry.original_tenant_id
                );
                GatewayError::CrossTenant { id: entry.record.id }
            }
            Violation::TenantIdModified(index) => {
                let id = self.pending[index].record.id;
                error!("Attempted to change tenant id of record {}", id);
                GatewayError::TenantIdModified { id }
            }
        }
    }
}
