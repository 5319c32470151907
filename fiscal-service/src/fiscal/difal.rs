//! DIFAL / ICMS-ST interstate differential math.

use rust_decimal::Decimal;
use serde::Serialize;

/// Computed amounts for one interstate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DifalAmounts {
    pub icms_origem_value: Decimal,
    pub icms_destino_value: Decimal,
    pub difal_value: Decimal,
    pub fcp_value: Decimal,
    pub total_value: Decimal,
}

/// The destination state only collects the positive differential; a negative
/// differential clamps to zero, never a refund.
pub fn calculate_difal(
    product_value: Decimal,
    icms_origem_rate: Decimal,
    icms_destino_rate: Decimal,
    fcp_rate: Option<Decimal>,
) -> DifalAmounts {
    let icms_origem_value = product_value * icms_origem_rate / Decimal::ONE_HUNDRED;
    let icms_destino_value = product_value * icms_destino_rate / Decimal::ONE_HUNDRED;

    let difal_value = (icms_destino_value - icms_origem_value).max(Decimal::ZERO);
    let fcp_value = fcp_rate
        .map(|rate| product_value * rate / Decimal::ONE_HUNDRED)
        .unwrap_or(Decimal::ZERO);

    DifalAmounts {
        icms_origem_value,
        icms_destino_value,
        difal_value,
        fcp_value,
        total_value: difal_value + fcp_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sp_to_rj_worked_example() {
        let amounts = calculate_difal(
            Decimal::from(1000),
            Decimal::from(12),
            Decimal::from(18),
            Some(Decimal::from(2)),
        );
        assert_eq!(amounts.icms_origem_value, Decimal::from(120));
        assert_eq!(amounts.icms_destino_value, Decimal::from(180));
        assert_eq!(amounts.difal_value, Decimal::from(60));
        assert_eq!(amounts.fcp_value, Decimal::from(20));
        assert_eq!(amounts.total_value, Decimal::from(80));
    }

    #[test]
    fn negative_differential_clamps_to_zero() {
        let amounts = calculate_difal(
            Decimal::from(1000),
            Decimal::from(18),
            Decimal::from(12),
            Some(Decimal::from(2)),
        );
        assert_eq!(amounts.difal_value, Decimal::ZERO);
        // FCP is still due even when the differential clamps.
        assert_eq!(amounts.total_value, Decimal::from(20));
    }

    #[test]
    fn absent_fcp_contributes_nothing() {
        let amounts = calculate_difal(
            Decimal::from(500),
            Decimal::from(7),
            Decimal::from(17),
            None,
        );
        assert_eq!(amounts.fcp_value, Decimal::ZERO);
        assert_eq!(amounts.difal_value, Decimal::from(50));
        assert_eq!(amounts.total_value, Decimal::from(50));
    }

    #[test]
    fn fractional_values_keep_decimal_precision() {
        let amounts = calculate_difal(
            "250.40".parse().unwrap(),
            "7".parse().unwrap(),
            "17.5".parse().unwrap(),
            None,
        );
        assert_eq!(amounts.icms_origem_value, "17.528".parse::<Decimal>().unwrap());
        assert_eq!(amounts.icms_destino_value, "43.82".parse::<Decimal>().unwrap());
        assert_eq!(amounts.difal_value, "26.292".parse::<Decimal>().unwrap());
    }
}
