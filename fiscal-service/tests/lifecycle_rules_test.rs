//! Lifecycle rules exercised through the public API: obligation status
//! transitions, status-update attachments and the fiscal calendar.

use chrono::{Datelike, NaiveDate, Weekday};
use fiscal_service::fiscal::calendar::{due_date, merge_calendar};
use fiscal_service::fiscal::tables::{find_definition, OBLIGATION_DEFINITIONS};
use fiscal_service::models::{ObligationStatus, StatusUpdateExtra};

#[test]
fn happy_path_walks_the_whole_machine() {
    let path = [
        ObligationStatus::Pending,
        ObligationStatus::Generating,
        ObligationStatus::Generated,
        ObligationStatus::Transmitted,
        ObligationStatus::Accepted,
    ];
    for pair in path.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "{} -> {} should be allowed",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn rejection_recycles_through_rectified() {
    assert!(ObligationStatus::Transmitted.can_transition_to(ObligationStatus::Rejected));
    assert!(ObligationStatus::Rejected.can_transition_to(ObligationStatus::Rectified));
    assert!(ObligationStatus::Rectified.can_transition_to(ObligationStatus::Generating));
}

#[test]
fn verdicts_require_a_prior_transmission() {
    for status in [
        ObligationStatus::Pending,
        ObligationStatus::Generating,
        ObligationStatus::Generated,
        ObligationStatus::Rejected,
        ObligationStatus::Rectified,
    ] {
        assert!(!status.can_transition_to(ObligationStatus::Accepted));
        assert!(!status.can_transition_to(ObligationStatus::Rejected));
    }
}

#[test]
fn rectified_is_the_only_way_back_to_generating() {
    for status in [
        ObligationStatus::Generated,
        ObligationStatus::Transmitted,
        ObligationStatus::Accepted,
        ObligationStatus::Rejected,
    ] {
        assert!(
            !status.can_transition_to(ObligationStatus::Generating),
            "{} must not re-enter generating",
            status
        );
    }
}

#[test]
fn rejection_attachments_only_fit_a_rejection() {
    let extra = StatusUpdateExtra {
        error_message: Some("registro 0000 inválido".to_string()),
        receipt_number: Some("REC-9".to_string()),
        ..Default::default()
    };
    assert!(extra.allowed_for(ObligationStatus::Rejected).is_ok());
    assert!(extra.allowed_for(ObligationStatus::Transmitted).is_err());
}

#[test]
fn every_definition_is_due_after_its_reference_period() {
    for def in OBLIGATION_DEFINITIONS {
        let due = due_date(def, 2026, 6).unwrap();
        assert!(
            due >= NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            "{} due {} inside its own reference period",
            def.code,
            due
        );
    }
}

#[test]
fn calendar_without_rows_is_all_virtual() {
    let entries = merge_calendar(&[], 2026, 5).unwrap();
    assert_eq!(entries.len(), OBLIGATION_DEFINITIONS.len());
    assert!(entries.iter().all(|e| e.obligation_id.is_none()));
    assert!(entries.iter().all(|e| e.status.is_none()));

    let reinf = entries.iter().find(|e| e.code == "EFD_REINF").unwrap();
    let def = find_definition("EFD_REINF").unwrap();
    assert_eq!(reinf.due_date, due_date(def, 2026, 5).unwrap());
}

#[test]
fn due_dates_never_land_on_a_weekend() {
    for def in OBLIGATION_DEFINITIONS {
        for year in [2025, 2026, 2027] {
            for month in 1..=12 {
                let due = due_date(def, year, month).unwrap();
                assert!(
                    !matches!(due.weekday(), Weekday::Sat | Weekday::Sun),
                    "{} for {}-{:02} fell on a weekend ({})",
                    def.code,
                    year,
                    month,
                    due
                );
            }
        }
    }
}
