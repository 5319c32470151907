//! Due-date computation for periodic obligations.
//!
//! Weekend due dates roll forward to the next Monday. National holidays are
//! not modeled; callers needing holiday awareness must adjust downstream.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use fiscal_core::error::AppError;

use crate::fiscal::tables::{ObligationDefinition, OBLIGATION_DEFINITIONS};
use crate::models::{FiscalObligation, ObligationCalendarEntry};

/// Due date for one obligation in the given reference period.
pub fn due_date(
    def: &ObligationDefinition,
    year: i32,
    month: u32,
) -> Result<NaiveDate, AppError> {
    let month0 = (month - 1) + def.month_offset;
    let due_year = year + (month0 / 12) as i32;
    let due_month = month0 % 12 + 1;

    let day = def.due_day.min(days_in_month(due_year, due_month)?);
    let date = NaiveDate::from_ymd_opt(due_year, due_month, day).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Invalid due date {}-{:02}-{:02}",
            due_year,
            due_month,
            day
        ))
    })?;

    Ok(roll_weekend(date))
}

/// Last day of the reference period; Bloco K stock positions are stamped
/// with it.
pub fn period_end(year: i32, month: u32) -> Result<NaiveDate, AppError> {
    let day = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Invalid period {}-{:02}", year, month))
    })
}

/// First day of the reference period.
pub fn period_start(year: i32, month: u32) -> Result<NaiveDate, AppError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Invalid period {}-{:02}", year, month))
    })
}

/// Merge the obligation definitions with the rows that already exist for the
/// period. Planning only: entries without a row carry no id/status.
pub fn merge_calendar(
    existing: &[FiscalObligation],
    year: i32,
    month: u32,
) -> Result<Vec<ObligationCalendarEntry>, AppError> {
    let mut entries = Vec::with_capacity(OBLIGATION_DEFINITIONS.len());
    for def in OBLIGATION_DEFINITIONS {
        let row = existing.iter().find(|o| o.code == def.code);
        entries.push(ObligationCalendarEntry {
            code: def.code.to_string(),
            name: def.name.to_string(),
            due_date: due_date(def, year, month)?,
            obligation_id: row.map(|o| o.obligation_id),
            status: row.map(|o| o.status.clone()),
        });
    }
    Ok(entries)
}

fn days_in_month(year: i32, month: u32) -> Result<u32, AppError> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Invalid month {}-{:02}", year, month))
        })
}

fn roll_weekend(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::tables::find_definition;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn due_on_a_weekday_stays_put() {
        // EFD-Reinf for 2025-10 falls on 2025-11-15... a Saturday, so pick
        // DCTFWEB: day 25 of the following month, 2025-11-25 is a Tuesday.
        let def = find_definition("DCTFWEB").unwrap();
        assert_eq!(due_date(def, 2025, 10).unwrap(), date(2025, 11, 25));
    }

    #[test]
    fn saturday_rolls_to_monday() {
        // EFD ICMS/IPI for 2025-08: 2025-09-20 is a Saturday.
        let def = find_definition("EFD_ICMS_IPI").unwrap();
        assert_eq!(due_date(def, 2025, 8).unwrap(), date(2025, 9, 22));
    }

    #[test]
    fn sunday_rolls_to_monday() {
        // FGTS for 2025-11: 2025-12-07 is a Sunday.
        let def = find_definition("FGTS").unwrap();
        assert_eq!(due_date(def, 2025, 11).unwrap(), date(2025, 12, 8));
    }

    #[test]
    fn december_reference_rolls_into_next_year() {
        let def = find_definition("EFD_ICMS_IPI").unwrap();
        assert_eq!(due_date(def, 2025, 12).unwrap(), date(2026, 1, 20));
    }

    #[test]
    fn two_month_offset_crosses_the_year_boundary() {
        let def = find_definition("EFD_CONTRIBUICOES").unwrap();
        assert_eq!(due_date(def, 2025, 11).unwrap(), date(2026, 1, 15));
    }

    #[test]
    fn due_day_clamps_to_short_months() {
        let def = ObligationDefinition {
            code: "TEST",
            name: "test",
            due_day: 30,
            month_offset: 1,
        };
        // February 2026 has 28 days; the 28th is a Saturday, so the clamped
        // date still rolls to Monday March 2nd.
        assert_eq!(due_date(&def, 2026, 1).unwrap(), date(2026, 3, 2));
    }

    #[test]
    fn period_bounds() {
        assert_eq!(period_start(2026, 2).unwrap(), date(2026, 2, 1));
        assert_eq!(period_end(2026, 2).unwrap(), date(2026, 2, 28));
        assert_eq!(period_end(2024, 2).unwrap(), date(2024, 2, 29));
        assert_eq!(period_end(2025, 12).unwrap(), date(2025, 12, 31));
    }

    #[test]
    fn calendar_merges_existing_rows() {
        use chrono::Utc;
        use uuid::Uuid;

        let obligation = FiscalObligation {
            obligation_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            code: "FGTS".to_string(),
            year: 2026,
            month: 3,
            due_date: date(2026, 4, 7),
            status: "transmitted".to_string(),
            receipt_number: None,
            file_name: None,
            file_content: None,
            error_message: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        };

        let entries = merge_calendar(&[obligation.clone()], 2026, 3).unwrap();
        assert_eq!(entries.len(), OBLIGATION_DEFINITIONS.len());

        let fgts = entries.iter().find(|e| e.code == "FGTS").unwrap();
        assert_eq!(fgts.obligation_id, Some(obligation.obligation_id));
        assert_eq!(fgts.status.as_deref(), Some("transmitted"));

        let not_generated = entries.iter().find(|e| e.code == "GIA").unwrap();
        assert!(not_generated.obligation_id.is_none());
        assert!(not_generated.status.is_none());
    }
}
