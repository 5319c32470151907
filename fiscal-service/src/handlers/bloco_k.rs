//! Bloco K generation endpoints.

use axum::extract::{Query, State};
use axum::Json;
use fiscal_core::error::AppError;
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use crate::fiscal::calendar::{period_end, period_start};
use crate::handlers::{AppState, TenantId};
use crate::models::{BlocoKRecord, BlocoKRecordType};
use crate::services::metrics::ERRORS_TOTAL;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateBlocoKRequest {
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "GenerateBlocoK"))]
pub async fn generate_bloco_k(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(payload): Json<GenerateBlocoKRequest>,
) -> Result<Json<Vec<BlocoKRecord>>, AppError> {
    payload.validate()?;

    let start = period_start(payload.year, payload.month)?;
    let end = period_end(payload.year, payload.month)?;

    let records = state
        .db
        .generate_bloco_k(tenant_id, payload.year, payload.month, start, end)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    Ok(Json(records))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListBlocoKQuery {
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    pub record_type: Option<String>,
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "ListBlocoKRecords"))]
pub async fn list_bloco_k_records(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListBlocoKQuery>,
) -> Result<Json<Vec<BlocoKRecord>>, AppError> {
    query.validate()?;

    let record_type = match &query.record_type {
        Some(raw) => Some(BlocoKRecordType::try_from_str(raw).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown Bloco K record type '{}'", raw))
        })?),
        None => None,
    };

    let records = state
        .db
        .list_bloco_k_records(tenant_id, query.year, query.month, record_type)
        .await?;

    Ok(Json(records))
}
