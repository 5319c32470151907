//! NFS-e amount computation: ISS over the deduction-adjusted base plus the
//! optional federal withholdings (PIS/COFINS/IR/CSLL/INSS).

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::CreateNfse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NfseAmounts {
    pub base_value: Decimal,
    pub iss_value: Decimal,
    pub pis_value: Option<Decimal>,
    pub cofins_value: Option<Decimal>,
    pub ir_value: Option<Decimal>,
    pub csll_value: Option<Decimal>,
    pub inss_value: Option<Decimal>,
    pub net_value: Decimal,
}

/// Withheld taxes only reduce the net amount when the customer retains the
/// ISS at source; otherwise the provider receives the full service value and
/// settles the taxes later.
pub fn calculate_nfse_amounts(input: &CreateNfse) -> NfseAmounts {
    let base_value = input.service_value - input.deduction_value.unwrap_or(Decimal::ZERO);
    let over_base = |rate: Option<Decimal>| rate.map(|r| base_value * r / Decimal::ONE_HUNDRED);

    let iss_value = base_value * input.iss_rate / Decimal::ONE_HUNDRED;
    let pis_value = over_base(input.pis_rate);
    let cofins_value = over_base(input.cofins_rate);
    let ir_value = over_base(input.ir_rate);
    let csll_value = over_base(input.csll_rate);
    let inss_value = over_base(input.inss_rate);

    let withheld_total = if input.iss_withheld {
        iss_value
            + pis_value.unwrap_or(Decimal::ZERO)
            + cofins_value.unwrap_or(Decimal::ZERO)
            + ir_value.unwrap_or(Decimal::ZERO)
            + csll_value.unwrap_or(Decimal::ZERO)
            + inss_value.unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    NfseAmounts {
        base_value,
        iss_value,
        pis_value,
        cofins_value,
        ir_value,
        csll_value,
        inss_value,
        net_value: input.service_value - withheld_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn base_input() -> CreateNfse {
        CreateNfse {
            customer_id: Uuid::new_v4(),
            service_code: "1.07".to_string(),
            cnae: None,
            description: "Consultoria em TI".to_string(),
            competence_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            service_value: Decimal::from(1000),
            deduction_value: None,
            iss_rate: Decimal::from(5),
            iss_withheld: false,
            pis_rate: None,
            cofins_rate: None,
            ir_rate: None,
            csll_rate: None,
            inss_rate: None,
        }
    }

    #[test]
    fn iss_not_withheld_keeps_net_equal_to_service_value() {
        let amounts = calculate_nfse_amounts(&base_input());
        assert_eq!(amounts.iss_value, Decimal::from(50));
        assert_eq!(amounts.net_value, Decimal::from(1000));
    }

    #[test]
    fn withholding_subtracts_every_computed_tax() {
        let input = CreateNfse {
            iss_withheld: true,
            pis_rate: Some("0.65".parse().unwrap()),
            cofins_rate: Some(Decimal::from(3)),
            ir_rate: Some("1.5".parse().unwrap()),
            csll_rate: Some(Decimal::from(1)),
            inss_rate: Some(Decimal::from(11)),
            ..base_input()
        };
        let amounts = calculate_nfse_amounts(&input);
        assert_eq!(amounts.iss_value, Decimal::from(50));
        assert_eq!(amounts.pis_value, Some("6.5".parse().unwrap()));
        assert_eq!(amounts.cofins_value, Some(Decimal::from(30)));
        assert_eq!(amounts.ir_value, Some(Decimal::from(15)));
        assert_eq!(amounts.csll_value, Some(Decimal::from(10)));
        assert_eq!(amounts.inss_value, Some(Decimal::from(110)));
        // 1000 - (50 + 6.5 + 30 + 15 + 10 + 110)
        assert_eq!(amounts.net_value, "778.5".parse::<Decimal>().unwrap());
    }

    #[test]
    fn deduction_shrinks_the_iss_base_but_not_the_net() {
        let input = CreateNfse {
            deduction_value: Some(Decimal::from(200)),
            ..base_input()
        };
        let amounts = calculate_nfse_amounts(&input);
        assert_eq!(amounts.base_value, Decimal::from(800));
        assert_eq!(amounts.iss_value, Decimal::from(40));
        assert_eq!(amounts.net_value, Decimal::from(1000));
    }

    #[test]
    fn withheld_without_federal_rates_only_subtracts_iss() {
        let input = CreateNfse {
            iss_withheld: true,
            ..base_input()
        };
        let amounts = calculate_nfse_amounts(&input);
        assert_eq!(amounts.net_value, Decimal::from(950));
        assert_eq!(amounts.pis_value, None);
    }
}
