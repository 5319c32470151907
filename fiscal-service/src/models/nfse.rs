//! NFS-e (municipal service invoice) models.

use chrono::{DateTime, NaiveDate, Utc};
use fiscal_core::crypto::MASKED_SECRET;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// NFS-e status. Mirrors the NFe goods-invoice lifecycle used elsewhere in
/// the system: cancellation is terminal, denial is the alternative terminal
/// outcome of a pending transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NfseStatus {
    Draft,
    Pending,
    Authorized,
    Denied,
    Cancelled,
}

impl NfseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NfseStatus::Draft => "draft",
            NfseStatus::Pending => "pending",
            NfseStatus::Authorized => "authorized",
            NfseStatus::Denied => "denied",
            NfseStatus::Cancelled => "cancelled",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(NfseStatus::Draft),
            "pending" => Some(NfseStatus::Pending),
            "authorized" => Some(NfseStatus::Authorized),
            "denied" => Some(NfseStatus::Denied),
            "cancelled" => Some(NfseStatus::Cancelled),
            _ => None,
        }
    }
}

/// Municipal integration environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NfseEnvironment {
    Homologation,
    Production,
}

impl NfseEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            NfseEnvironment::Homologation => "homologation",
            NfseEnvironment::Production => "production",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "homologation" => Some(NfseEnvironment::Homologation),
            "production" => Some(NfseEnvironment::Production),
            _ => None,
        }
    }
}

/// Municipal integration settings, one row per tenant. Secrets are stored as
/// ciphertext and never returned to callers; see [`NfseConfig::to_view`].
#[derive(Debug, Clone, FromRow)]
pub struct NfseConfig {
    pub config_id: Uuid,
    pub tenant_id: Uuid,
    pub provider_code: String,
    pub municipality_code: String,
    pub environment: String,
    pub login: String,
    pub password_enc: Option<String>,
    pub token_enc: Option<String>,
    pub cnae: Option<String>,
    pub service_code: Option<String>,
    pub iss_rate: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Caller-facing view of the config with secrets masked.
#[derive(Debug, Clone, Serialize)]
pub struct NfseConfigView {
    pub config_id: Uuid,
    pub provider_code: String,
    pub municipality_code: String,
    pub environment: String,
    pub login: String,
    pub password: Option<String>,
    pub token: Option<String>,
    pub cnae: Option<String>,
    pub service_code: Option<String>,
    pub iss_rate: Decimal,
    pub updated_utc: DateTime<Utc>,
}

impl NfseConfig {
    pub fn to_view(&self) -> NfseConfigView {
        NfseConfigView {
            config_id: self.config_id,
            provider_code: self.provider_code.clone(),
            municipality_code: self.municipality_code.clone(),
            environment: self.environment.clone(),
            login: self.login.clone(),
            password: self.password_enc.as_ref().map(|_| MASKED_SECRET.to_string()),
            token: self.token_enc.as_ref().map(|_| MASKED_SECRET.to_string()),
            cnae: self.cnae.clone(),
            service_code: self.service_code.clone(),
            iss_rate: self.iss_rate,
            updated_utc: self.updated_utc,
        }
    }
}

/// Input for upserting the tenant config. Plaintext secrets go through the
/// cipher before this struct reaches the database layer.
#[derive(Debug, Clone)]
pub struct UpsertNfseConfig {
    pub provider_code: String,
    pub municipality_code: String,
    pub environment: NfseEnvironment,
    pub login: String,
    pub password_enc: Option<String>,
    pub token_enc: Option<String>,
    pub cnae: Option<String>,
    pub service_code: Option<String>,
    pub iss_rate: Decimal,
}

/// One issued municipal service invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NfseIssued {
    pub nfse_id: Uuid,
    pub tenant_id: Uuid,
    pub nfse_code: i64,
    pub customer_id: Uuid,
    pub service_code: String,
    pub cnae: Option<String>,
    pub description: String,
    pub competence_date: NaiveDate,
    pub service_value: Decimal,
    pub deduction_value: Option<Decimal>,
    pub base_value: Decimal,
    pub iss_rate: Decimal,
    pub iss_value: Decimal,
    pub iss_withheld: bool,
    pub pis_rate: Option<Decimal>,
    pub pis_value: Option<Decimal>,
    pub cofins_rate: Option<Decimal>,
    pub cofins_value: Option<Decimal>,
    pub ir_rate: Option<Decimal>,
    pub ir_value: Option<Decimal>,
    pub csll_rate: Option<Decimal>,
    pub csll_value: Option<Decimal>,
    pub inss_rate: Option<Decimal>,
    pub inss_value: Option<Decimal>,
    pub net_value: Decimal,
    pub status: String,
    pub cancelled_utc: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for issuing an invoice, amounts not yet computed.
#[derive(Debug, Clone)]
pub struct CreateNfse {
    pub customer_id: Uuid,
    pub service_code: String,
    pub cnae: Option<String>,
    pub description: String,
    pub competence_date: NaiveDate,
    pub service_value: Decimal,
    pub deduction_value: Option<Decimal>,
    pub iss_rate: Decimal,
    pub iss_withheld: bool,
    pub pis_rate: Option<Decimal>,
    pub cofins_rate: Option<Decimal>,
    pub ir_rate: Option<Decimal>,
    pub csll_rate: Option<Decimal>,
    pub inss_rate: Option<Decimal>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListNfseFilter {
    pub status: Option<NfseStatus>,
    pub customer_id: Option<Uuid>,
    pub competence_from: Option<NaiveDate>,
    pub competence_to: Option<NaiveDate>,
    pub limit: i32,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config_with_secrets() -> NfseConfig {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        NfseConfig {
            config_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            provider_code: "ginfes".to_string(),
            municipality_code: "3550308".to_string(),
            environment: "homologation".to_string(),
            login: "12345678000190".to_string(),
            password_enc: Some("b64ciphertext".to_string()),
            token_enc: None,
            cnae: Some("6201501".to_string()),
            service_code: Some("1.07".to_string()),
            iss_rate: Decimal::new(5, 0),
            created_utc: now,
            updated_utc: now,
        }
    }

    #[test]
    fn view_masks_stored_secrets() {
        let view = config_with_secrets().to_view();
        assert_eq!(view.password.as_deref(), Some(MASKED_SECRET));
        assert_eq!(view.token, None);
    }

    #[test]
    fn view_never_carries_ciphertext() {
        let config = config_with_secrets();
        let serialized = serde_json::to_string(&config.to_view()).unwrap();
        assert!(!serialized.contains("b64ciphertext"));
    }
}
