use axum::http::HeaderMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenancyError {
    #[error("Tenant id must not be the nil UUID")]
    NilTenant,
}

/// Tenant resolved for a single request.
///
/// Built once by the tenant resolution middleware and passed by value into
/// every gateway. An empty context is valid; tenant-scoped operations reject it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<Uuid>,
}

impl TenantContext {
    /// Context with no tenant
    pub const fn empty() -> Self {
        Self { tenant_id: None }
    }

    pub fn with_tenant(tenant_id: Uuid) -> Result<Self, TenancyError> {
        if tenant_id.is_nil() {
            return Err(TenancyError::NilTenant);
        }
        Ok(Self {
            tenant_id: Some(tenant_id),
        })
    }

    /// Parse a raw header value. Anything that is not a non-nil UUID yields an
    /// empty context rather than an error.
    pub fn parse(raw: &str) -> Self {
        Uuid::parse_str(raw.trim())
            .ok()
            .and_then(|id| Self::with_tenant(id).ok())
            .unwrap_or_default()
    }

    /// Resolve from the named request header. A header sent more than once is
    /// ambiguous and resolves to no tenant.
    pub fn from_headers(headers: &HeaderMap, header_name: &str) -> Self {
        let mut values = headers.get_all(header_name).iter();
        match (values.next(), values.next()) {
            (Some(value), None) => value.to_str().map(Self::parse).unwrap_or_default(),
            _ => Self::empty(),
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn has_tenant(&self) -> bool {
        self.tenant_id.is_some()
    }
}
