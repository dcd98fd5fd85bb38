use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Column limit for `value`
pub const VALUE_MAX_LENGTH: usize = 500;

/// Entity whose visibility and mutability are constrained to one tenant
pub trait TenantScoped {
    fn tenant_id(&self) -> Uuid;

    fn set_tenant_id(&mut self, tenant_id: Uuid);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TenantScopedRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub value: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TenantScopedRecord {
    /// New unsaved record. The tenant id stays nil until the gateway stamps it.
    pub fn create(value: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            value,
            created_at: Utc::now(),
        }
    }

    pub fn value_too_long(&self) -> bool {
        self.value
            .as_deref()
            .map_or(false, |v| v.chars().count() > VALUE_MAX_LENGTH)
    }
}

impl TenantScoped for TenantScopedRecord {
    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: Uuid) {
        self.tenant_id = tenant_id;
    }
}
