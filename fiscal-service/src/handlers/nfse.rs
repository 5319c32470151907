//! NFS-e issuance endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use fiscal_core::error::AppError;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::fiscal::nfse::calculate_nfse_amounts;
use crate::handlers::validation::{non_negative, optional_percent_rate, percent_rate, positive};
use crate::handlers::{AppState, TenantId};
use crate::models::{
    CreateNfse, ListNfseFilter, NfseConfigView, NfseEnvironment, NfseIssued, NfseStatus,
    UpsertNfseConfig,
};
use crate::services::metrics::{ERRORS_TOTAL, NFSE_TOTAL};

#[instrument(skip(state), fields(service = "fiscal-service", method = "GetNfseConfig"))]
pub async fn get_nfse_config(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
) -> Result<Json<NfseConfigView>, AppError> {
    let config = state
        .db
        .get_nfse_config(tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("NFS-e config not configured")))?;

    // Secrets leave the service masked, even for the owning tenant.
    Ok(Json(config.to_view()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertNfseConfigRequest {
    #[validate(length(min = 1, max = 32, message = "Provider code is required"))]
    pub provider_code: String,
    #[validate(length(min = 1, max = 16, message = "Municipality code is required"))]
    pub municipality_code: String,
    #[validate(length(min = 1, message = "Environment is required"))]
    pub environment: String,
    #[validate(length(min = 1, max = 128, message = "Login is required"))]
    pub login: String,
    pub password: Option<String>,
    pub token: Option<String>,
    pub cnae: Option<String>,
    pub service_code: Option<String>,
    pub iss_rate: Decimal,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "UpsertNfseConfig"))]
pub async fn upsert_nfse_config(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(payload): Json<UpsertNfseConfigRequest>,
) -> Result<Json<NfseConfigView>, AppError> {
    payload.validate()?;
    percent_rate("iss_rate", payload.iss_rate)?;

    let environment = NfseEnvironment::try_from_str(&payload.environment).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown environment '{}'",
            payload.environment
        ))
    })?;

    // Plaintext secrets never reach the database layer.
    let password_enc = payload
        .password
        .as_deref()
        .map(|p| state.cipher.encrypt(p))
        .transpose()?;
    let token_enc = payload
        .token
        .as_deref()
        .map(|t| state.cipher.encrypt(t))
        .transpose()?;

    let input = UpsertNfseConfig {
        provider_code: payload.provider_code,
        municipality_code: payload.municipality_code,
        environment,
        login: payload.login,
        password_enc,
        token_enc,
        cnae: payload.cnae,
        service_code: payload.service_code,
        iss_rate: payload.iss_rate,
    };

    let config = state.db.upsert_nfse_config(tenant_id, &input).await?;

    Ok(Json(config.to_view()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNfseRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 16, message = "Service code is required"))]
    pub service_code: String,
    pub cnae: Option<String>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub competence_date: NaiveDate,
    pub service_value: Decimal,
    pub deduction_value: Option<Decimal>,
    pub iss_rate: Decimal,
    #[serde(default)]
    pub iss_withheld: bool,
    pub pis_rate: Option<Decimal>,
    pub cofins_rate: Option<Decimal>,
    pub ir_rate: Option<Decimal>,
    pub csll_rate: Option<Decimal>,
    pub inss_rate: Option<Decimal>,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "CreateNfse"))]
pub async fn create_nfse(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(payload): Json<CreateNfseRequest>,
) -> Result<Json<NfseIssued>, AppError> {
    payload.validate()?;
    positive("service_value", payload.service_value)?;
    percent_rate("iss_rate", payload.iss_rate)?;
    optional_percent_rate("pis_rate", payload.pis_rate)?;
    optional_percent_rate("cofins_rate", payload.cofins_rate)?;
    optional_percent_rate("ir_rate", payload.ir_rate)?;
    optional_percent_rate("csll_rate", payload.csll_rate)?;
    optional_percent_rate("inss_rate", payload.inss_rate)?;
    if let Some(deduction) = payload.deduction_value {
        non_negative("deduction_value", deduction)?;
        if deduction > payload.service_value {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Deduction {} exceeds service value {}",
                deduction,
                payload.service_value
            )));
        }
    }

    let input = CreateNfse {
        customer_id: payload.customer_id,
        service_code: payload.service_code,
        cnae: payload.cnae,
        description: payload.description,
        competence_date: payload.competence_date,
        service_value: payload.service_value,
        deduction_value: payload.deduction_value,
        iss_rate: payload.iss_rate,
        iss_withheld: payload.iss_withheld,
        pis_rate: payload.pis_rate,
        cofins_rate: payload.cofins_rate,
        ir_rate: payload.ir_rate,
        csll_rate: payload.csll_rate,
        inss_rate: payload.inss_rate,
    };

    let amounts = calculate_nfse_amounts(&input);

    let nfse = state
        .db
        .create_nfse(tenant_id, &input, &amounts)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    NFSE_TOTAL.with_label_values(&[&nfse.status]).inc();

    Ok(Json(nfse))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListNfseQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
    pub competence_from: Option<NaiveDate>,
    pub competence_to: Option<NaiveDate>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i32>,
    pub offset: Option<i64>,
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "ListNfse"))]
pub async fn list_nfse(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListNfseQuery>,
) -> Result<Json<Vec<NfseIssued>>, AppError> {
    query.validate()?;

    let status = match &query.status {
        Some(raw) => Some(NfseStatus::try_from_str(raw).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown NFS-e status '{}'", raw))
        })?),
        None => None,
    };

    let filter = ListNfseFilter {
        status,
        customer_id: query.customer_id,
        competence_from: query.competence_from,
        competence_to: query.competence_to,
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };

    let invoices = state.db.list_nfse(tenant_id, &filter).await?;

    Ok(Json(invoices))
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "GetNfse", nfse_id = %nfse_id))]
pub async fn get_nfse(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(nfse_id): Path<Uuid>,
) -> Result<Json<NfseIssued>, AppError> {
    let nfse = state
        .db
        .get_nfse(tenant_id, nfse_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("NFS-e not found")))?;

    Ok(Json(nfse))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelNfseRequest {
    #[validate(length(min = 1, message = "Cancellation reason is required"))]
    pub reason: String,
}

#[instrument(skip(state, payload), fields(service = "fiscal-service", method = "CancelNfse", nfse_id = %nfse_id))]
pub async fn cancel_nfse(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(nfse_id): Path<Uuid>,
    Json(payload): Json<CancelNfseRequest>,
) -> Result<Json<NfseIssued>, AppError> {
    payload.validate()?;

    let nfse = state
        .db
        .cancel_nfse(tenant_id, nfse_id, &payload.reason)
        .await
        .map_err(|e| {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

    NFSE_TOTAL.with_label_values(&["cancelled"]).inc();

    Ok(Json(nfse))
}
