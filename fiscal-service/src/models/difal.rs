//! DIFAL calculation audit model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Saved record of one interstate-tax computation. Audit row, never edited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DifalCalculation {
    pub calculation_id: Uuid,
    pub tenant_id: Uuid,
    pub document_type: String,
    pub document_id: Option<Uuid>,
    pub document_number: Option<String>,
    pub uf_origem: String,
    pub uf_destino: String,
    pub product_value: Decimal,
    pub icms_origem_rate: Decimal,
    pub icms_destino_rate: Decimal,
    pub fcp_rate: Option<Decimal>,
    pub icms_origem_value: Decimal,
    pub icms_destino_value: Decimal,
    pub difal_value: Decimal,
    pub fcp_value: Decimal,
    pub total_value: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for one DIFAL computation, already validated at the handler.
#[derive(Debug, Clone)]
pub struct CreateDifal {
    pub document_type: String,
    pub document_id: Option<Uuid>,
    pub document_number: Option<String>,
    pub uf_origem: String,
    pub uf_destino: String,
    pub product_value: Decimal,
    pub icms_origem_rate: Decimal,
    pub icms_destino_rate: Decimal,
    pub fcp_rate: Option<Decimal>,
}
