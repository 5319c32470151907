//! DIFAL calculation endpoints.

use axum::extract::{Query, State};
use axum::Json;
use fiscal_core::error::AppError;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::fiscal::difal::calculate_difal as compute_difal;
use crate::fiscal::tables::Uf;
use crate::handlers::validation::{fcp_rate, percent_rate, positive};
use crate::handlers::{AppState, TenantId};
use crate::models::{CreateDifal, DifalCalculation};
use crate::services::metrics::{DIFAL_TOTAL, ERRORS_TOTAL};

fn parse_uf(field: &str, raw: &str) -> Result<Uf, AppError> {
    Uf::try_from_str(raw)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown UF '{}' in {}", raw, field)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CalculateDifalRequest {
    #[validate(length(min = 1, max = 32, message = "Document type is required"))]
    pub document_type: String,
    pub document_id: Option<Uuid>,
    pub document_number: Option<String>,
    #[validate(length(min = 2, max = 2, message = "UF must be a two-letter code"))]
    pub uf_origem: String,
    #[validate(length(min = 2, max = 2, message = "UF must be a two-letter code"))]
    pub uf_destino: String,
    pub product_value: Decimal,
    pub icms_origem_rate: Decimal,
    pub icms_destino_rate: Decimal,
    pub fcp_rate: Option<Decimal>,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "CalculateDifal"))]
pub async fn calculate_difal(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(payload): Json<CalculateDifalRequest>,
) -> Result<Json<DifalCalculation>, AppError> {
    payload.validate()?;
    positive("product_value", payload.product_value)?;
    percent_rate("icms_origem_rate", payload.icms_origem_rate)?;
    percent_rate("icms_destino_rate", payload.icms_destino_rate)?;
    fcp_rate("fcp_rate", payload.fcp_rate)?;

    let uf_origem = parse_uf("uf_origem", &payload.uf_origem)?;
    let uf_destino = parse_uf("uf_destino", &payload.uf_destino)?;

    let amounts = compute_difal(
        payload.product_value,
        payload.icms_origem_rate,
        payload.icms_destino_rate,
        payload.fcp_rate,
    );

    let input = CreateDifal {
        document_type: payload.document_type,
        document_id: payload.document_id,
        document_number: payload.document_number,
        uf_origem: uf_origem.as_str().to_string(),
        uf_destino: uf_destino.as_str().to_string(),
        product_value: payload.product_value,
        icms_origem_rate: payload.icms_origem_rate,
        icms_destino_rate: payload.icms_destino_rate,
        fcp_rate: payload.fcp_rate,
    };

    let calculation = state
        .db
        .create_difal_calculation(tenant_id, &input, &amounts)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    DIFAL_TOTAL
        .with_label_values(&[uf_origem.as_str(), uf_destino.as_str()])
        .inc();

    Ok(Json(calculation))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListDifalQuery {
    pub uf_origem: Option<String>,
    pub uf_destino: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub page_size: Option<i32>,
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "ListDifalCalculations"))]
pub async fn list_difal_calculations(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListDifalQuery>,
) -> Result<Json<Vec<DifalCalculation>>, AppError> {
    query.validate()?;

    let uf_origem = query
        .uf_origem
        .as_deref()
        .map(|raw| parse_uf("uf_origem", raw))
        .transpose()?;
    let uf_destino = query
        .uf_destino
        .as_deref()
        .map(|raw| parse_uf("uf_destino", raw))
        .transpose()?;

    let calculations = state
        .db
        .list_difal_calculations(
            tenant_id,
            uf_origem.map(|u| u.as_str()),
            uf_destino.map(|u| u.as_str()),
            query.page_size.unwrap_or(50),
        )
        .await?;

    Ok(Json(calculations))
}
