//! Fiscal calendar endpoint: planned due dates joined with what was already
//! generated for the period. Never mutates state.

use axum::extract::{Query, State};
use axum::Json;
use fiscal_core::error::AppError;
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use crate::fiscal::calendar::merge_calendar;
use crate::handlers::{AppState, TenantId};
use crate::models::ObligationCalendarEntry;

#[derive(Debug, Deserialize, Validate)]
pub struct FiscalCalendarQuery {
    #[validate(range(min = 2020, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[instrument(skip(state), fields(service = "fiscal-service", method = "GetFiscalCalendar"))]
pub async fn get_fiscal_calendar(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<FiscalCalendarQuery>,
) -> Result<Json<Vec<ObligationCalendarEntry>>, AppError> {
    query.validate()?;

    let existing = state
        .db
        .list_obligations(tenant_id, query.year, query.month, None)
        .await?;

    let entries = merge_calendar(&existing, query.year, query.month)?;

    Ok(Json(entries))
}
