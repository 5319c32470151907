//! Obligation lifecycle endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use fiscal_core::error::AppError;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::fiscal::calendar::due_date;
use crate::fiscal::tables::{find_definition, OBLIGATION_DEFINITIONS};
use crate::handlers::{AppState, TenantId};
use crate::models::{FiscalObligation, ObligationStatus, StatusUpdateExtra};
use crate::services::metrics::{ERRORS_TOTAL, OBLIGATIONS_TOTAL};

#[derive(Debug, Deserialize, Validate)]
pub struct ListObligationsQuery {
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    pub status: Option<String>,
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "ListObligations"))]
pub async fn list_obligations(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListObligationsQuery>,
) -> Result<Json<Vec<FiscalObligation>>, AppError> {
    query.validate()?;

    let status = match &query.status {
        Some(raw) => Some(ObligationStatus::try_from_str(raw).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown obligation status '{}'", raw))
        })?),
        None => None,
    };

    let obligations = state
        .db
        .list_obligations(tenant_id, query.year, query.month, status)
        .await?;

    Ok(Json(obligations))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateObligationsRequest {
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    /// Subset of obligation codes to generate; all known codes when absent.
    pub codes: Option<Vec<String>>,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "GenerateObligations"))]
pub async fn generate_obligations(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(payload): Json<GenerateObligationsRequest>,
) -> Result<Json<Vec<FiscalObligation>>, AppError> {
    payload.validate()?;

    let definitions: Vec<_> = match &payload.codes {
        Some(codes) => {
            let mut defs = Vec::with_capacity(codes.len());
            for code in codes {
                let def = find_definition(code).ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("Unknown obligation code '{}'", code))
                })?;
                defs.push(def);
            }
            defs
        }
        None => OBLIGATION_DEFINITIONS.iter().collect(),
    };

    let mut entries = Vec::with_capacity(definitions.len());
    for def in definitions {
        entries.push((
            def.code.to_string(),
            due_date(def, payload.year, payload.month)?,
        ));
    }

    let obligations = state
        .db
        .generate_obligations(tenant_id, payload.year, payload.month, &entries)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    OBLIGATIONS_TOTAL
        .with_label_values(&["pending"])
        .inc_by(obligations.len() as f64);

    Ok(Json(obligations))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateObligationStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
    pub receipt_number: Option<String>,
    pub file_name: Option<String>,
    pub file_content: Option<String>,
    pub error_message: Option<String>,
}

#[instrument(
    skip(state, payload),
    fields(service = "fiscal-service", method = "UpdateObligationStatus", obligation_id = %obligation_id)
)]
pub async fn update_obligation_status(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(obligation_id): Path<Uuid>,
    Json(payload): Json<UpdateObligationStatusRequest>,
) -> Result<Json<FiscalObligation>, AppError> {
    payload.validate()?;

    let status = ObligationStatus::try_from_str(&payload.status).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown obligation status '{}'",
            payload.status
        ))
    })?;

    let extra = StatusUpdateExtra {
        receipt_number: payload.receipt_number,
        file_name: payload.file_name,
        file_content: payload.file_content,
        error_message: payload.error_message,
    };

    let obligation = state
        .db
        .update_obligation_status(tenant_id, obligation_id, status, &extra)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    OBLIGATIONS_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();

    Ok(Json(obligation))
}
