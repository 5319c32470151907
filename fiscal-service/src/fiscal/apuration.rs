//! Apuration balance math.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{ApurationItem, ItemNature};

/// Running totals of an apuration: `balance = total_credit - total_debit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApurationTotals {
    pub total_credit: Decimal,
    pub total_debit: Decimal,
    pub balance: Decimal,
}

impl ApurationTotals {
    pub const ZERO: ApurationTotals = ApurationTotals {
        total_credit: Decimal::ZERO,
        total_debit: Decimal::ZERO,
        balance: Decimal::ZERO,
    };
}

/// Recompute totals from the full item set. The database layer runs the same
/// formula in SQL inside the inserting transaction; this function is the
/// reference used for auditing and recomputation.
pub fn calculate_balance(items: &[ApurationItem]) -> ApurationTotals {
    let mut total_credit = Decimal::ZERO;
    let mut total_debit = Decimal::ZERO;

    for item in items {
        match item.parsed_nature() {
            Some(ItemNature::Credit) => total_credit += item.tax_value,
            Some(ItemNature::Debit) => total_debit += item.tax_value,
            None => {}
        }
    }

    ApurationTotals {
        total_credit,
        total_debit,
        balance: total_credit - total_debit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn item(nature: &str, tax_value: i64) -> ApurationItem {
        ApurationItem {
            item_id: Uuid::new_v4(),
            apuration_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            document_type: "nfe".to_string(),
            document_id: None,
            document_number: None,
            cfop: None,
            base_value: Decimal::ZERO,
            rate: Decimal::ZERO,
            tax_value: Decimal::from(tax_value),
            nature: nature.to_string(),
            description: None,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn empty_ledger_balances_to_zero() {
        assert_eq!(calculate_balance(&[]), ApurationTotals::ZERO);
    }

    #[test]
    fn credits_minus_debits() {
        let totals = calculate_balance(&[item("credit", 500), item("debit", 180)]);
        assert_eq!(totals.total_credit, Decimal::from(500));
        assert_eq!(totals.total_debit, Decimal::from(180));
        assert_eq!(totals.balance, Decimal::from(320));
    }

    #[test]
    fn debit_heavy_ledger_goes_negative() {
        let totals = calculate_balance(&[item("credit", 100), item("debit", 250)]);
        assert_eq!(totals.balance, Decimal::from(-150));
    }

    #[test]
    fn unknown_nature_contributes_nothing() {
        let totals = calculate_balance(&[item("credit", 100), item("estorno", 40)]);
        assert_eq!(totals.total_credit, Decimal::from(100));
        assert_eq!(totals.total_debit, Decimal::ZERO);
    }
}
