//! Tax apuration ledger endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use fiscal_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::validation::{non_negative, percent_rate};
use crate::handlers::{AppState, TenantId};
use crate::models::{
    ApurationItem, ApurationSummary, CreateApurationItem, ItemNature, TaxApuration, TaxType,
};
use crate::services::metrics::{APURATION_ITEMS_TOTAL, ERRORS_TOTAL};

fn parse_tax_type(raw: &str) -> Result<TaxType, AppError> {
    TaxType::try_from_str(raw)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown tax type '{}'", raw)))
}

fn parse_nature(raw: &str) -> Result<ItemNature, AppError> {
    ItemNature::try_from_str(raw)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown item nature '{}'", raw)))
}

/// Apuration plus its derived open/closed status.
#[derive(Debug, Serialize)]
pub struct ApurationResponse {
    #[serde(flatten)]
    pub apuration: TaxApuration,
    pub status: &'static str,
}

impl From<TaxApuration> for ApurationResponse {
    fn from(apuration: TaxApuration) -> Self {
        let status = apuration.status();
        Self { apuration, status }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListApurationsQuery {
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    pub tax_type: Option<String>,
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "ListApurations"))]
pub async fn list_apurations(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListApurationsQuery>,
) -> Result<Json<Vec<ApurationResponse>>, AppError> {
    query.validate()?;

    let tax_type = query.tax_type.as_deref().map(parse_tax_type).transpose()?;

    let apurations = state
        .db
        .list_apurations(tenant_id, query.year, query.month, tax_type)
        .await?;

    Ok(Json(apurations.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GetOrCreateApurationRequest {
    #[validate(length(min = 1, message = "Tax type is required"))]
    pub tax_type: String,
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "GetOrCreateApuration"))]
pub async fn get_or_create_apuration(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(payload): Json<GetOrCreateApurationRequest>,
) -> Result<Json<ApurationResponse>, AppError> {
    payload.validate()?;

    let tax_type = parse_tax_type(&payload.tax_type)?;

    let apuration = state
        .db
        .get_or_create_apuration(tenant_id, tax_type, payload.year, payload.month)
        .await?;

    Ok(Json(apuration.into()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddApurationItemRequest {
    #[validate(length(min = 1, max = 32, message = "Document type is required"))]
    pub document_type: String,
    pub document_id: Option<Uuid>,
    pub document_number: Option<String>,
    pub cfop: Option<String>,
    pub base_value: Decimal,
    pub rate: Decimal,
    pub tax_value: Decimal,
    #[validate(length(min = 1, message = "Nature is required"))]
    pub nature: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddApurationItemResponse {
    pub apuration: ApurationResponse,
    pub item: ApurationItem,
}

#[instrument(
    skip(state, payload),
    fields(service = "fiscal-service", method = "AddApurationItem", apuration_id = %apuration_id)
)]
pub async fn add_apuration_item(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(apuration_id): Path<Uuid>,
    Json(payload): Json<AddApurationItemRequest>,
) -> Result<Json<AddApurationItemResponse>, AppError> {
    payload.validate()?;
    non_negative("base_value", payload.base_value)?;
    percent_rate("rate", payload.rate)?;
    // The caller's tax value is trusted, not recomputed, but its sign must
    // agree with the credit/debit nature.
    non_negative("tax_value", payload.tax_value)?;

    let nature = parse_nature(&payload.nature)?;

    let input = CreateApurationItem {
        document_type: payload.document_type,
        document_id: payload.document_id,
        document_number: payload.document_number,
        cfop: payload.cfop,
        base_value: payload.base_value,
        rate: payload.rate,
        tax_value: payload.tax_value,
        nature,
        description: payload.description,
    };

    let (apuration, item) = state
        .db
        .add_apuration_item(tenant_id, apuration_id, &input)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    APURATION_ITEMS_TOTAL
        .with_label_values(&[&apuration.tax_type, nature.as_str()])
        .inc();

    Ok(Json(AddApurationItemResponse {
        apuration: apuration.into(),
        item,
    }))
}

#[instrument(
    skip(state),
    fields(service = "fiscal-service", method = "GetApurationItems", apuration_id = %apuration_id)
)]
pub async fn get_apuration_items(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(apuration_id): Path<Uuid>,
) -> Result<Json<Vec<ApurationItem>>, AppError> {
    let items = state
        .db
        .get_apuration_items(tenant_id, apuration_id)
        .await?;

    Ok(Json(items))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloseApurationRequest {
    #[validate(length(min = 1, message = "Tax type is required"))]
    pub tax_type: String,
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "CloseApuration"))]
pub async fn close_apuration(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(payload): Json<CloseApurationRequest>,
) -> Result<Json<ApurationResponse>, AppError> {
    payload.validate()?;

    let tax_type = parse_tax_type(&payload.tax_type)?;

    let apuration = state
        .db
        .close_apuration(tenant_id, tax_type, payload.year, payload.month)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    Ok(Json(apuration.into()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApurationSummaryQuery {
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "GetApurationSummary"))]
pub async fn get_apuration_summary(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ApurationSummaryQuery>,
) -> Result<Json<ApurationSummary>, AppError> {
    query.validate()?;

    let summary = state
        .db
        .get_apuration_summary(tenant_id, query.year, query.month)
        .await?;

    Ok(Json(summary))
}
