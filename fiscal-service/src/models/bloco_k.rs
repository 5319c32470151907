//! SPED Bloco K inventory-movement models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bloco K record types the generator emits.
///
/// K200: end-of-period stock per product. K230: production in the period.
/// K235: inputs consumed by production in the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlocoKRecordType {
    K200,
    K230,
    K235,
}

impl BlocoKRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlocoKRecordType::K200 => "K200",
            BlocoKRecordType::K230 => "K230",
            BlocoKRecordType::K235 => "K235",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "K200" => Some(BlocoKRecordType::K200),
            "K230" => Some(BlocoKRecordType::K230),
            "K235" => Some(BlocoKRecordType::K235),
            _ => None,
        }
    }
}

/// One generated inventory-movement line.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlocoKRecord {
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub record_type: String,
    pub product_code: String,
    pub movement_date: NaiveDate,
    pub quantity: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Source row from the stock subsystem; read-only for this engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMovement {
    pub movement_id: Uuid,
    pub tenant_id: Uuid,
    pub product_code: String,
    pub movement_type: String,
    pub movement_date: NaiveDate,
    pub quantity: Decimal,
    pub created_utc: DateTime<Utc>,
}
