//! Database service for fiscal-service.
//!
//! Every operation is tenant-scoped. Multi-step mutations (adding apuration
//! items, closing apurations, cancelling NFS-e, regenerating Bloco K) run
//! inside a single transaction with row locks so concurrent requests
//! serialize instead of double-applying.

use crate::models::{
    ApurationItem, ApurationSummary, ApurationSummaryRow, BlocoKRecord, BlocoKRecordType,
    CreateApurationItem, CreateDifal, CreateNfse, DifalCalculation, FiscalObligation,
    ListNfseFilter, NfseConfig, NfseIssued, ObligationStatus, StatusUpdateExtra, StockMovement,
    TaxApuration, TaxType, UpsertNfseConfig,
};
use crate::fiscal::difal::DifalAmounts;
use crate::fiscal::nfse::NfseAmounts;
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use fiscal_core::error::AppError;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const OBLIGATION_COLUMNS: &str = "obligation_id, tenant_id, code, year, month, due_date, status, \
     receipt_number, file_name, file_content, error_message, created_utc, updated_utc";

const APURATION_COLUMNS: &str = "apuration_id, tenant_id, tax_type, year, month, total_credit, \
     total_debit, balance, closed_utc, created_utc";

const ITEM_COLUMNS: &str = "item_id, apuration_id, tenant_id, document_type, document_id, \
     document_number, cfop, base_value, rate, tax_value, nature, description, created_utc";

const DIFAL_COLUMNS: &str = "calculation_id, tenant_id, document_type, document_id, \
     document_number, uf_origem, uf_destino, product_value, icms_origem_rate, \
     icms_destino_rate, fcp_rate, icms_origem_value, icms_destino_value, difal_value, \
     fcp_value, total_value, created_utc";

const NFSE_CONFIG_COLUMNS: &str = "config_id, tenant_id, provider_code, municipality_code, \
     environment, login, password_enc, token_enc, cnae, service_code, iss_rate, created_utc, \
     updated_utc";

const NFSE_COLUMNS: &str = "nfse_id, tenant_id, nfse_code, customer_id, service_code, cnae, \
     description, competence_date, service_value, deduction_value, base_value, iss_rate, \
     iss_value, iss_withheld, pis_rate, pis_value, cofins_rate, cofins_value, ir_rate, \
     ir_value, csll_rate, csll_value, inss_rate, inss_value, net_value, status, cancelled_utc, \
     cancel_reason, created_utc";

const BLOCO_K_COLUMNS: &str =
    "record_id, tenant_id, year, month, record_type, product_code, movement_date, quantity, \
     created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fiscal-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Obligation Operations
    // -------------------------------------------------------------------------

    /// List obligations for a period, optionally filtered by status.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_obligations(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
        status: Option<ObligationStatus>,
    ) -> Result<Vec<FiscalObligation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_obligations"])
            .start_timer();

        let query = format!(
            r#"
            SELECT {OBLIGATION_COLUMNS}
            FROM fiscal_obligations
            WHERE tenant_id = $1
              AND year = $2
              AND month = $3
              AND ($4::varchar IS NULL OR status = $4)
            ORDER BY due_date, code
            "#,
        );
        let obligations = sqlx::query_as::<_, FiscalObligation>(&query)
            .bind(tenant_id)
            .bind(year)
            .bind(month as i32)
            .bind(status.map(|s| s.as_str().to_string()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list obligations: {}", e))
            })?;

        timer.observe_duration();

        Ok(obligations)
    }

    /// Create the pending obligation rows for a period. Re-running for the
    /// same period inserts nothing thanks to the natural-key conflict clause,
    /// so the row count is stable across calls.
    #[instrument(skip(self, entries), fields(tenant_id = %tenant_id, code_count = entries.len()))]
    pub async fn generate_obligations(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
        entries: &[(String, NaiveDate)],
    ) -> Result<Vec<FiscalObligation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_obligations"])
            .start_timer();

        let mut created = 0u64;
        for (code, due_date) in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO fiscal_obligations
                    (obligation_id, tenant_id, code, year, month, due_date, status)
                VALUES ($1, $2, $3, $4, $5, $6, 'pending')
                ON CONFLICT (tenant_id, code, year, month) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(code)
            .bind(year)
            .bind(month as i32)
            .bind(due_date)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to generate obligation: {}", e))
            })?;
            created += result.rows_affected();
        }

        let codes: Vec<String> = entries.iter().map(|(code, _)| code.clone()).collect();
        let query = format!(
            r#"
            SELECT {OBLIGATION_COLUMNS}
            FROM fiscal_obligations
            WHERE tenant_id = $1 AND year = $2 AND month = $3 AND code = ANY($4)
            ORDER BY due_date, code
            "#,
        );
        let obligations = sqlx::query_as::<_, FiscalObligation>(&query)
            .bind(tenant_id)
            .bind(year)
            .bind(month as i32)
            .bind(&codes)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to fetch obligations: {}", e))
            })?;

        timer.observe_duration();

        info!(created = created, total = obligations.len(), "Obligations generated");

        Ok(obligations)
    }

    /// Update an obligation's status plus any transition attachments.
    /// The row is locked so the guard and the write are atomic.
    #[instrument(skip(self, extra), fields(tenant_id = %tenant_id, obligation_id = %obligation_id, status = %status))]
    pub async fn update_obligation_status(
        &self,
        tenant_id: Uuid,
        obligation_id: Uuid,
        status: ObligationStatus,
        extra: &StatusUpdateExtra,
    ) -> Result<FiscalObligation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_obligation_status"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let query = format!(
            r#"
            SELECT {OBLIGATION_COLUMNS}
            FROM fiscal_obligations
            WHERE tenant_id = $1 AND obligation_id = $2
            FOR UPDATE
            "#,
        );
        let existing = sqlx::query_as::<_, FiscalObligation>(&query)
            .bind(tenant_id)
            .bind(obligation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load obligation: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Obligation not found")))?;

        let current = ObligationStatus::from_string(&existing.status);
        if !current.can_transition_to(status) {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Cannot move obligation from '{}' to '{}'",
                existing.status,
                status
            )));
        }
        if let Err(reason) = extra.allowed_for(status) {
            return Err(AppError::BadRequest(anyhow::anyhow!("{}", reason)));
        }

        let query = format!(
            r#"
            UPDATE fiscal_obligations
            SET status = $3,
                receipt_number = COALESCE($4, receipt_number),
                file_name = COALESCE($5, file_name),
                file_content = COALESCE($6, file_content),
                error_message = COALESCE($7, error_message),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND obligation_id = $2
            RETURNING {OBLIGATION_COLUMNS}
            "#,
        );
        let obligation = sqlx::query_as::<_, FiscalObligation>(&query)
            .bind(tenant_id)
            .bind(obligation_id)
            .bind(status.as_str())
            .bind(&extra.receipt_number)
            .bind(&extra.file_name)
            .bind(&extra.file_content)
            .bind(&extra.error_message)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update obligation: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            obligation_id = %obligation.obligation_id,
            from = %existing.status,
            to = %obligation.status,
            "Obligation status updated"
        );

        Ok(obligation)
    }

    // -------------------------------------------------------------------------
    // Apuration Operations
    // -------------------------------------------------------------------------

    /// List apurations for a period, optionally filtered by tax type.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_apurations(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
        tax_type: Option<TaxType>,
    ) -> Result<Vec<TaxApuration>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_apurations"])
            .start_timer();

        let query = format!(
            r#"
            SELECT {APURATION_COLUMNS}
            FROM tax_apurations
            WHERE tenant_id = $1
              AND year = $2
              AND month = $3
              AND ($4::varchar IS NULL OR tax_type = $4)
            ORDER BY tax_type
            "#,
        );
        let apurations = sqlx::query_as::<_, TaxApuration>(&query)
            .bind(tenant_id)
            .bind(year)
            .bind(month as i32)
            .bind(tax_type.map(|t| t.as_str().to_string()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list apurations: {}", e))
            })?;

        timer.observe_duration();

        Ok(apurations)
    }

    /// Fetch the unique apuration for the key, creating an empty open one
    /// when absent. Pure upsert, no calculation.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, tax_type = %tax_type))]
    pub async fn get_or_create_apuration(
        &self,
        tenant_id: Uuid,
        tax_type: TaxType,
        year: i32,
        month: u32,
    ) -> Result<TaxApuration, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_or_create_apuration"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO tax_apurations (apuration_id, tenant_id, tax_type, year, month)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, tax_type, year, month) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(tax_type.as_str())
        .bind(year)
        .bind(month as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create apuration: {}", e))
        })?;

        let query = format!(
            r#"
            SELECT {APURATION_COLUMNS}
            FROM tax_apurations
            WHERE tenant_id = $1 AND tax_type = $2 AND year = $3 AND month = $4
            "#,
        );
        let apuration = sqlx::query_as::<_, TaxApuration>(&query)
            .bind(tenant_id)
            .bind(tax_type.as_str())
            .bind(year)
            .bind(month as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to fetch apuration: {}", e))
            })?;

        timer.observe_duration();

        Ok(apuration)
    }

    /// Get the items of an apuration, oldest first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, apuration_id = %apuration_id))]
    pub async fn get_apuration_items(
        &self,
        tenant_id: Uuid,
        apuration_id: Uuid,
    ) -> Result<Vec<ApurationItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_apuration_items"])
            .start_timer();

        let query = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM apuration_items
            WHERE tenant_id = $1 AND apuration_id = $2
            ORDER BY created_utc, item_id
            "#,
        );
        let items = sqlx::query_as::<_, ApurationItem>(&query)
            .bind(tenant_id)
            .bind(apuration_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get apuration items: {}", e))
            })?;

        timer.observe_duration();

        Ok(items)
    }

    /// Append an item to an open apuration and refresh its totals.
    ///
    /// Totals are recomputed from the full item set inside the same
    /// transaction that inserts the item, so interleaved writers cannot lose
    /// updates; the row lock makes the closed check race-free.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, apuration_id = %apuration_id))]
    pub async fn add_apuration_item(
        &self,
        tenant_id: Uuid,
        apuration_id: Uuid,
        input: &CreateApurationItem,
    ) -> Result<(TaxApuration, ApurationItem), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_apuration_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let query = format!(
            r#"
            SELECT {APURATION_COLUMNS}
            FROM tax_apurations
            WHERE tenant_id = $1 AND apuration_id = $2
            FOR UPDATE
            "#,
        );
        let apuration = sqlx::query_as::<_, TaxApuration>(&query)
            .bind(tenant_id)
            .bind(apuration_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load apuration: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Apuration not found")))?;

        if apuration.is_closed() {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Apuration {}/{:02} for {} is closed",
                apuration.year,
                apuration.month,
                apuration.tax_type
            )));
        }

        let query = format!(
            r#"
            INSERT INTO apuration_items
                (item_id, apuration_id, tenant_id, document_type, document_id, document_number,
                 cfop, base_value, rate, tax_value, nature, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ITEM_COLUMNS}
            "#,
        );
        let item = sqlx::query_as::<_, ApurationItem>(&query)
            .bind(Uuid::new_v4())
            .bind(apuration_id)
            .bind(tenant_id)
            .bind(&input.document_type)
            .bind(input.document_id)
            .bind(&input.document_number)
            .bind(&input.cfop)
            .bind(input.base_value)
            .bind(input.rate)
            .bind(input.tax_value)
            .bind(input.nature.as_str())
            .bind(&input.description)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert apuration item: {}", e))
            })?;

        let (total_credit, total_debit): (Option<Decimal>, Option<Decimal>) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(tax_value) FILTER (WHERE nature = 'credit'), 0),
                    COALESCE(SUM(tax_value) FILTER (WHERE nature = 'debit'), 0)
                FROM apuration_items
                WHERE tenant_id = $1 AND apuration_id = $2
                "#,
            )
            .bind(tenant_id)
            .bind(apuration_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to recompute totals: {}", e))
            })?;

        let total_credit = total_credit.unwrap_or(Decimal::ZERO);
        let total_debit = total_debit.unwrap_or(Decimal::ZERO);

        let query = format!(
            r#"
            UPDATE tax_apurations
            SET total_credit = $3,
                total_debit = $4,
                balance = $5
            WHERE tenant_id = $1 AND apuration_id = $2
            RETURNING {APURATION_COLUMNS}
            "#,
        );
        let apuration = sqlx::query_as::<_, TaxApuration>(&query)
            .bind(tenant_id)
            .bind(apuration_id)
            .bind(total_credit)
            .bind(total_debit)
            .bind(total_credit - total_debit)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update totals: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            item_id = %item.item_id,
            nature = %item.nature,
            tax_value = %item.tax_value,
            balance = %apuration.balance,
            "Apuration item added"
        );

        Ok((apuration, item))
    }

    /// Close an apuration. Irreversible through this API; once the close
    /// timestamp is set, item insertion always fails.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, tax_type = %tax_type))]
    pub async fn close_apuration(
        &self,
        tenant_id: Uuid,
        tax_type: TaxType,
        year: i32,
        month: u32,
    ) -> Result<TaxApuration, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_apuration"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let query = format!(
            r#"
            SELECT {APURATION_COLUMNS}
            FROM tax_apurations
            WHERE tenant_id = $1 AND tax_type = $2 AND year = $3 AND month = $4
            FOR UPDATE
            "#,
        );
        let existing = sqlx::query_as::<_, TaxApuration>(&query)
            .bind(tenant_id)
            .bind(tax_type.as_str())
            .bind(year)
            .bind(month as i32)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load apuration: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Apuration not found")))?;

        if existing.is_closed() {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Apuration {}/{:02} for {} is already closed",
                year,
                month,
                tax_type
            )));
        }

        let query = format!(
            r#"
            UPDATE tax_apurations
            SET closed_utc = NOW()
            WHERE tenant_id = $1 AND apuration_id = $2
            RETURNING {APURATION_COLUMNS}
            "#,
        );
        let apuration = sqlx::query_as::<_, TaxApuration>(&query)
            .bind(tenant_id)
            .bind(existing.apuration_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to close apuration: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            apuration_id = %apuration.apuration_id,
            balance = %apuration.balance,
            "Apuration closed"
        );

        Ok(apuration)
    }

    /// Read-only aggregation across all tax types for a period.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_apuration_summary(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<ApurationSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_apuration_summary"])
            .start_timer();

        let rows = sqlx::query_as::<_, ApurationSummaryRow>(
            r#"
            SELECT tax_type, total_credit, total_debit, balance
            FROM tax_apurations
            WHERE tenant_id = $1 AND year = $2 AND month = $3
            ORDER BY tax_type
            "#,
        )
        .bind(tenant_id)
        .bind(year)
        .bind(month as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load apuration summary: {}", e))
        })?;

        timer.observe_duration();

        let total_credit: Decimal = rows.iter().map(|r| r.total_credit).sum();
        let total_debit: Decimal = rows.iter().map(|r| r.total_debit).sum();

        Ok(ApurationSummary {
            year,
            month: month as i32,
            total_credit,
            total_debit,
            balance: total_credit - total_debit,
            by_tax_type: rows,
        })
    }

    // -------------------------------------------------------------------------
    // DIFAL Operations
    // -------------------------------------------------------------------------

    /// Persist one DIFAL computation as an immutable audit row.
    #[instrument(skip(self, input, amounts), fields(tenant_id = %tenant_id))]
    pub async fn create_difal_calculation(
        &self,
        tenant_id: Uuid,
        input: &CreateDifal,
        amounts: &DifalAmounts,
    ) -> Result<DifalCalculation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_difal_calculation"])
            .start_timer();

        let query = format!(
            r#"
            INSERT INTO difal_calculations
                (calculation_id, tenant_id, document_type, document_id, document_number,
                 uf_origem, uf_destino, product_value, icms_origem_rate, icms_destino_rate,
                 fcp_rate, icms_origem_value, icms_destino_value, difal_value, fcp_value,
                 total_value)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {DIFAL_COLUMNS}
            "#,
        );
        let calculation = sqlx::query_as::<_, DifalCalculation>(&query)
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(&input.document_type)
            .bind(input.document_id)
            .bind(&input.document_number)
            .bind(&input.uf_origem)
            .bind(&input.uf_destino)
            .bind(input.product_value)
            .bind(input.icms_origem_rate)
            .bind(input.icms_destino_rate)
            .bind(input.fcp_rate)
            .bind(amounts.icms_origem_value)
            .bind(amounts.icms_destino_value)
            .bind(amounts.difal_value)
            .bind(amounts.fcp_value)
            .bind(amounts.total_value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to save DIFAL calculation: {}", e))
            })?;

        timer.observe_duration();

        info!(
            calculation_id = %calculation.calculation_id,
            difal_value = %calculation.difal_value,
            "DIFAL calculation saved"
        );

        Ok(calculation)
    }

    /// List DIFAL audit rows, newest first, optionally filtered by UF pair.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_difal_calculations(
        &self,
        tenant_id: Uuid,
        uf_origem: Option<&str>,
        uf_destino: Option<&str>,
        page_size: i32,
    ) -> Result<Vec<DifalCalculation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_difal_calculations"])
            .start_timer();

        let limit = if page_size <= 0 {
            50
        } else {
            page_size.clamp(1, 100)
        } as i64;

        let query = format!(
            r#"
            SELECT {DIFAL_COLUMNS}
            FROM difal_calculations
            WHERE tenant_id = $1
              AND ($2::varchar IS NULL OR uf_origem = $2)
              AND ($3::varchar IS NULL OR uf_destino = $3)
            ORDER BY created_utc DESC
            LIMIT $4
            "#,
        );
        let calculations = sqlx::query_as::<_, DifalCalculation>(&query)
            .bind(tenant_id)
            .bind(uf_origem)
            .bind(uf_destino)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list DIFAL calculations: {}", e))
            })?;

        timer.observe_duration();

        Ok(calculations)
    }

    // -------------------------------------------------------------------------
    // NFS-e Operations
    // -------------------------------------------------------------------------

    /// Get the tenant's municipal integration config.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_nfse_config(&self, tenant_id: Uuid) -> Result<Option<NfseConfig>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_nfse_config"])
            .start_timer();

        let query = format!(
            r#"
            SELECT {NFSE_CONFIG_COLUMNS}
            FROM nfse_configs
            WHERE tenant_id = $1
            "#,
        );
        let config = sqlx::query_as::<_, NfseConfig>(&query)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get NFS-e config: {}", e))
            })?;

        timer.observe_duration();

        Ok(config)
    }

    /// Upsert the tenant's municipal integration config. Secrets arrive
    /// already encrypted; absent secrets keep their stored value.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    pub async fn upsert_nfse_config(
        &self,
        tenant_id: Uuid,
        input: &UpsertNfseConfig,
    ) -> Result<NfseConfig, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_nfse_config"])
            .start_timer();

        let query = format!(
            r#"
            INSERT INTO nfse_configs
                (config_id, tenant_id, provider_code, municipality_code, environment, login,
                 password_enc, token_enc, cnae, service_code, iss_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tenant_id) DO UPDATE
            SET provider_code = EXCLUDED.provider_code,
                municipality_code = EXCLUDED.municipality_code,
                environment = EXCLUDED.environment,
                login = EXCLUDED.login,
                password_enc = COALESCE(EXCLUDED.password_enc, nfse_configs.password_enc),
                token_enc = COALESCE(EXCLUDED.token_enc, nfse_configs.token_enc),
                cnae = EXCLUDED.cnae,
                service_code = EXCLUDED.service_code,
                iss_rate = EXCLUDED.iss_rate,
                updated_utc = NOW()
            RETURNING {NFSE_CONFIG_COLUMNS}
            "#,
        );
        let config = sqlx::query_as::<_, NfseConfig>(&query)
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(&input.provider_code)
            .bind(&input.municipality_code)
            .bind(input.environment.as_str())
            .bind(&input.login)
            .bind(&input.password_enc)
            .bind(&input.token_enc)
            .bind(&input.cnae)
            .bind(&input.service_code)
            .bind(input.iss_rate)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to upsert NFS-e config: {}", e))
            })?;

        timer.observe_duration();

        info!(config_id = %config.config_id, "NFS-e config upserted");

        Ok(config)
    }

    /// Issue a new NFS-e in draft with the next sequential code.
    #[instrument(skip(self, input, amounts), fields(tenant_id = %tenant_id, customer_id = %input.customer_id))]
    pub async fn create_nfse(
        &self,
        tenant_id: Uuid,
        input: &CreateNfse,
        amounts: &NfseAmounts,
    ) -> Result<NfseIssued, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_nfse"])
            .start_timer();

        let query = format!(
            r#"
            INSERT INTO nfse_issued
                (nfse_id, tenant_id, nfse_code, customer_id, service_code, cnae, description,
                 competence_date, service_value, deduction_value, base_value, iss_rate,
                 iss_value, iss_withheld, pis_rate, pis_value, cofins_rate, cofins_value,
                 ir_rate, ir_value, csll_rate, csll_value, inss_rate, inss_value, net_value,
                 status)
            VALUES ($1, $2, next_nfse_code($2), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, 'draft')
            RETURNING {NFSE_COLUMNS}
            "#,
        );
        let nfse = sqlx::query_as::<_, NfseIssued>(&query)
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(input.customer_id)
            .bind(&input.service_code)
            .bind(&input.cnae)
            .bind(&input.description)
            .bind(input.competence_date)
            .bind(input.service_value)
            .bind(input.deduction_value)
            .bind(amounts.base_value)
            .bind(input.iss_rate)
            .bind(amounts.iss_value)
            .bind(input.iss_withheld)
            .bind(input.pis_rate)
            .bind(amounts.pis_value)
            .bind(input.cofins_rate)
            .bind(amounts.cofins_value)
            .bind(input.ir_rate)
            .bind(amounts.ir_value)
            .bind(input.csll_rate)
            .bind(amounts.csll_value)
            .bind(input.inss_rate)
            .bind(amounts.inss_value)
            .bind(amounts.net_value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create NFS-e: {}", e))
            })?;

        timer.observe_duration();

        info!(
            nfse_id = %nfse.nfse_id,
            nfse_code = nfse.nfse_code,
            net_value = %nfse.net_value,
            "NFS-e created"
        );

        Ok(nfse)
    }

    /// Get an NFS-e by id.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, nfse_id = %nfse_id))]
    pub async fn get_nfse(
        &self,
        tenant_id: Uuid,
        nfse_id: Uuid,
    ) -> Result<Option<NfseIssued>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_nfse"])
            .start_timer();

        let query = format!(
            r#"
            SELECT {NFSE_COLUMNS}
            FROM nfse_issued
            WHERE tenant_id = $1 AND nfse_id = $2
            "#,
        );
        let nfse = sqlx::query_as::<_, NfseIssued>(&query)
            .bind(tenant_id)
            .bind(nfse_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get NFS-e: {}", e)))?;

        timer.observe_duration();

        Ok(nfse)
    }

    /// List NFS-e with filters and explicit limit/offset pagination.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub async fn list_nfse(
        &self,
        tenant_id: Uuid,
        filter: &ListNfseFilter,
    ) -> Result<Vec<NfseIssued>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_nfse"])
            .start_timer();

        let limit = if filter.limit <= 0 {
            50
        } else {
            filter.limit.clamp(1, 100)
        } as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let query = format!(
            r#"
            SELECT {NFSE_COLUMNS}
            FROM nfse_issued
            WHERE tenant_id = $1
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
              AND ($4::date IS NULL OR competence_date >= $4)
              AND ($5::date IS NULL OR competence_date <= $5)
            ORDER BY nfse_code DESC
            LIMIT $6 OFFSET $7
            "#,
        );
        let invoices = sqlx::query_as::<_, NfseIssued>(&query)
            .bind(tenant_id)
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.competence_from)
            .bind(filter.competence_to)
            .bind(limit)
            .bind(filter.offset.max(0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list NFS-e: {}", e))
            })?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Cancel an NFS-e exactly once. The row lock makes two concurrent
    /// cancellations serialize; the loser sees the cancelled state and fails.
    #[instrument(skip(self, reason), fields(tenant_id = %tenant_id, nfse_id = %nfse_id))]
    pub async fn cancel_nfse(
        &self,
        tenant_id: Uuid,
        nfse_id: Uuid,
        reason: &str,
    ) -> Result<NfseIssued, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_nfse"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let query = format!(
            r#"
            SELECT {NFSE_COLUMNS}
            FROM nfse_issued
            WHERE tenant_id = $1 AND nfse_id = $2
            FOR UPDATE
            "#,
        );
        let existing = sqlx::query_as::<_, NfseIssued>(&query)
            .bind(tenant_id)
            .bind(nfse_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load NFS-e: {}", e)))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("NFS-e not found")))?;

        if existing.status == "cancelled" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "NFS-e {} is already cancelled",
                existing.nfse_code
            )));
        }

        let query = format!(
            r#"
            UPDATE nfse_issued
            SET status = 'cancelled',
                cancelled_utc = NOW(),
                cancel_reason = $3
            WHERE tenant_id = $1 AND nfse_id = $2
            RETURNING {NFSE_COLUMNS}
            "#,
        );
        let nfse = sqlx::query_as::<_, NfseIssued>(&query)
            .bind(tenant_id)
            .bind(nfse_id)
            .bind(reason)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to cancel NFS-e: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(nfse_id = %nfse.nfse_id, nfse_code = nfse.nfse_code, "NFS-e cancelled");

        Ok(nfse)
    }

    // -------------------------------------------------------------------------
    // Bloco K Operations
    // -------------------------------------------------------------------------

    /// Regenerate the Bloco K record set for a period from the stock
    /// movements. Replace-by-period: the previous set is dropped in the same
    /// transaction so the output always reflects current source data.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn generate_bloco_k(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<BlocoKRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_bloco_k"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            DELETE FROM bloco_k_records
            WHERE tenant_id = $1 AND year = $2 AND month = $3
            "#,
        )
        .bind(tenant_id)
        .bind(year)
        .bind(month as i32)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to clear Bloco K records: {}", e))
        })?;

        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT movement_id, tenant_id, product_code, movement_type, movement_date,
                   quantity, created_utc
            FROM stock_movements
            WHERE tenant_id = $1 AND movement_date >= $2 AND movement_date <= $3
            ORDER BY movement_date, product_code
            "#,
        )
        .bind(tenant_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to read stock movements: {}", e))
        })?;

        let mut records = Vec::new();
        for movement in &movements {
            let record_type = match movement.movement_type.as_str() {
                "production" => BlocoKRecordType::K230,
                "consumption" => BlocoKRecordType::K235,
                _ => continue,
            };
            let record = self
                .insert_bloco_k_record(
                    &mut tx,
                    tenant_id,
                    year,
                    month,
                    record_type,
                    &movement.product_code,
                    movement.movement_date,
                    movement.quantity,
                )
                .await?;
            records.push(record);
        }

        // End-of-period stock position per product: production and inbound
        // add, consumption and outbound subtract.
        let positions: Vec<(String, Option<Decimal>)> = sqlx::query_as(
            r#"
            SELECT product_code,
                   SUM(CASE WHEN movement_type IN ('production', 'inbound')
                            THEN quantity ELSE -quantity END)
            FROM stock_movements
            WHERE tenant_id = $1 AND movement_date <= $2
            GROUP BY product_code
            ORDER BY product_code
            "#,
        )
        .bind(tenant_id)
        .bind(period_end)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute stock positions: {}", e))
        })?;

        for (product_code, quantity) in positions {
            let record = self
                .insert_bloco_k_record(
                    &mut tx,
                    tenant_id,
                    year,
                    month,
                    BlocoKRecordType::K200,
                    &product_code,
                    period_end,
                    quantity.unwrap_or(Decimal::ZERO),
                )
                .await?;
            records.push(record);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        records.sort_by(|a, b| {
            (a.record_type.as_str(), a.movement_date, a.product_code.as_str()).cmp(&(
                b.record_type.as_str(),
                b.movement_date,
                b.product_code.as_str(),
            ))
        });

        info!(record_count = records.len(), "Bloco K records generated");

        Ok(records)
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_bloco_k_record(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: Uuid,
        year: i32,
        month: u32,
        record_type: BlocoKRecordType,
        product_code: &str,
        movement_date: NaiveDate,
        quantity: Decimal,
    ) -> Result<BlocoKRecord, AppError> {
        let query = format!(
            r#"
            INSERT INTO bloco_k_records
                (record_id, tenant_id, year, month, record_type, product_code, movement_date,
                 quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {BLOCO_K_COLUMNS}
            "#,
        );
        sqlx::query_as::<_, BlocoKRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(year)
            .bind(month as i32)
            .bind(record_type.as_str())
            .bind(product_code)
            .bind(movement_date)
            .bind(quantity)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert Bloco K record: {}", e))
            })
    }

    /// List generated Bloco K records for a period.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_bloco_k_records(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
        record_type: Option<BlocoKRecordType>,
    ) -> Result<Vec<BlocoKRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_bloco_k_records"])
            .start_timer();

        let query = format!(
            r#"
            SELECT {BLOCO_K_COLUMNS}
            FROM bloco_k_records
            WHERE tenant_id = $1
              AND year = $2
              AND month = $3
              AND ($4::varchar IS NULL OR record_type = $4)
            ORDER BY record_type, movement_date, product_code
            "#,
        );
        let records = sqlx::query_as::<_, BlocoKRecord>(&query)
            .bind(tenant_id)
            .bind(year)
            .bind(month as i32)
            .bind(record_type.map(|t| t.as_str().to_string()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list Bloco K records: {}", e))
            })?;

        timer.observe_duration();

        Ok(records)
    }
}
