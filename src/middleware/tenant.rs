use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::tenancy::TenantContext;

/// Resolves the tenant header into a [`TenantContext`] and attaches it to the
/// request before any handler runs. Missing or invalid values leave the
/// context empty; tenant-scoped handlers reject that later.
pub async fn resolve_tenant_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header_name = state.config.tenancy.header_name.as_str();
    let tenant = TenantContext::from_headers(request.headers(), header_name);

    match tenant.tenant_id() {
        Some(id) => tracing::debug!("Resolved tenant {} from {}", id, header_name),
        None if request.headers().contains_key(header_name) => {
            tracing::debug!("Ignoring unusable {} header", header_name)
        }
        None => {}
    }

    request.extensions_mut().insert(tenant);
    next.run(request).await
}
