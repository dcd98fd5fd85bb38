use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::record::{TenantScopedRecord, VALUE_MAX_LENGTH};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::TenantContext;

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedRecord {
    pub id: Uuid,
}

/// POST /api/sample/records - Create a record for the request's tenant
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Json(payload): Json<CreateRecordRequest>,
) -> ApiResult<CreatedRecord> {
    if !tenant.has_tenant() {
        return Err(ApiError::tenant_required());
    }

    let record = TenantScopedRecord::create(payload.value);
    if record.value_too_long() {
        let mut field_errors = HashMap::new();
        field_errors.insert(
            "value".to_string(),
            format!("Must be at most {} characters", VALUE_MAX_LENGTH),
        );
        return Err(ApiError::validation_error("Invalid field length", Some(field_errors)));
    }

    let saved = state.records(tenant).add(record).await?;

    Ok(ApiResponse::created(
        CreatedRecord { id: saved.id },
        format!("/api/sample/records/{}", saved.id),
    ))
}

/// GET /api/sample/records - List the tenant's records, newest first
pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<TenantScopedRecord>> {
    if !tenant.has_tenant() {
        return Err(ApiError::tenant_required());
    }

    let records = state.records(tenant).list().await?;
    Ok(ApiResponse::success(records))
}
