//! Tax apuration ledger models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tax types the ledger assesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    Icms,
    IcmsSt,
    Ipi,
    Pis,
    Cofins,
    Iss,
}

impl TaxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxType::Icms => "icms",
            TaxType::IcmsSt => "icms_st",
            TaxType::Ipi => "ipi",
            TaxType::Pis => "pis",
            TaxType::Cofins => "cofins",
            TaxType::Iss => "iss",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "icms" => Some(TaxType::Icms),
            "icms_st" => Some(TaxType::IcmsSt),
            "ipi" => Some(TaxType::Ipi),
            "pis" => Some(TaxType::Pis),
            "cofins" => Some(TaxType::Cofins),
            "iss" => Some(TaxType::Iss),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an item adds to the credit or the debit side of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemNature {
    Credit,
    Debit,
}

impl ItemNature {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemNature::Credit => "credit",
            ItemNature::Debit => "debit",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(ItemNature::Credit),
            "debit" => Some(ItemNature::Debit),
            _ => None,
        }
    }
}

/// The credit/debit ledger for one tenant, tax type and period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxApuration {
    pub apuration_id: Uuid,
    pub tenant_id: Uuid,
    pub tax_type: String,
    pub year: i32,
    pub month: i32,
    pub total_credit: Decimal,
    pub total_debit: Decimal,
    pub balance: Decimal,
    pub closed_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl TaxApuration {
    pub fn is_closed(&self) -> bool {
        self.closed_utc.is_some()
    }

    /// Derived status string exposed to callers.
    pub fn status(&self) -> &'static str {
        if self.is_closed() {
            "closed"
        } else {
            "open"
        }
    }
}

/// One credit or debit entry tied to a source document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApurationItem {
    pub item_id: Uuid,
    pub apuration_id: Uuid,
    pub tenant_id: Uuid,
    pub document_type: String,
    pub document_id: Option<Uuid>,
    pub document_number: Option<String>,
    pub cfop: Option<String>,
    pub base_value: Decimal,
    pub rate: Decimal,
    pub tax_value: Decimal,
    pub nature: String,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl ApurationItem {
    pub fn parsed_nature(&self) -> Option<ItemNature> {
        ItemNature::try_from_str(&self.nature)
    }
}

/// Input for appending an item to an open apuration.
#[derive(Debug, Clone)]
pub struct CreateApurationItem {
    pub document_type: String,
    pub document_id: Option<Uuid>,
    pub document_number: Option<String>,
    pub cfop: Option<String>,
    pub base_value: Decimal,
    pub rate: Decimal,
    pub tax_value: Decimal,
    pub nature: ItemNature,
    pub description: Option<String>,
}

/// Per-tax-type totals for a period.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApurationSummaryRow {
    pub tax_type: String,
    pub total_credit: Decimal,
    pub total_debit: Decimal,
    pub balance: Decimal,
}

/// Read-only aggregation across all tax types for a period.
#[derive(Debug, Clone, Serialize)]
pub struct ApurationSummary {
    pub year: i32,
    pub month: i32,
    pub by_tax_type: Vec<ApurationSummaryRow>,
    pub total_credit: Decimal,
    pub total_debit: Decimal,
    pub balance: Decimal,
}
