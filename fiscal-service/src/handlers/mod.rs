//! HTTP surface of the fiscal engine.
//!
//! Tenant resolution happens upstream; every route reads the already-resolved
//! tenant from the `x-tenant-id` header via the [`TenantId`] extractor.

pub mod apuration;
pub mod bloco_k;
pub mod calendar;
pub mod difal;
pub mod nfse;
pub mod obligations;
pub mod validation;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use fiscal_core::crypto::SecretCipher;
use fiscal_core::error::AppError;
use fiscal_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::services::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};
use crate::services::Database;

pub const TENANT_ID_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub cipher: Arc<dyn SecretCipher>,
}

/// Resolved tenant for the request. The gateway authenticates and sets the
/// header; a missing or malformed value is a caller bug, not an auth failure.
pub struct TenantId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Missing {} header", TENANT_ID_HEADER))
            })?;

        let tenant_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("Invalid {} header", TENANT_ID_HEADER))
        })?;

        Ok(TenantId(tenant_id))
    }
}

pub async fn health_check(state: axum::extract::State<AppState>) -> Result<&'static str, AppError> {
    state.db.health_check().await?;
    Ok("OK")
}

pub async fn metrics() -> impl IntoResponse {
    crate::services::metrics::get_metrics()
}

async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    response
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/obligations", get(obligations::list_obligations))
        .route(
            "/obligations/generate",
            post(obligations::generate_obligations),
        )
        .route(
            "/obligations/:id/status",
            patch(obligations::update_obligation_status),
        )
        .route("/calendar", get(calendar::get_fiscal_calendar))
        .route(
            "/apurations",
            get(apuration::list_apurations).post(apuration::get_or_create_apuration),
        )
        .route("/apurations/summary", get(apuration::get_apuration_summary))
        .route("/apurations/close", post(apuration::close_apuration))
        .route(
            "/apurations/:id/items",
            get(apuration::get_apuration_items).post(apuration::add_apuration_item),
        )
        .route("/difal/calculate", post(difal::calculate_difal))
        .route("/difal", get(difal::list_difal_calculations))
        .route(
            "/nfse/config",
            get(nfse::get_nfse_config).put(nfse::upsert_nfse_config),
        )
        .route("/nfse", get(nfse::list_nfse).post(nfse::create_nfse))
        .route("/nfse/:id", get(nfse::get_nfse))
        .route("/nfse/:id/cancel", post(nfse::cancel_nfse))
        .route("/bloco-k/generate", post(bloco_k::generate_bloco_k))
        .route("/bloco-k", get(bloco_k::list_bloco_k_records))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
