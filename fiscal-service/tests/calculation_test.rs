//! Calculator properties exercised through the public API: DIFAL clamping,
//! interstate rate table coverage, apuration balance and NFS-e amounts.

use chrono::{NaiveDate, Utc};
use fiscal_service::fiscal::apuration::calculate_balance;
use fiscal_service::fiscal::difal::calculate_difal;
use fiscal_service::fiscal::nfse::calculate_nfse_amounts;
use fiscal_service::fiscal::tables::{interstate_rate, Uf, ALL_UFS};
use fiscal_service::models::{ApurationItem, CreateNfse};
use rust_decimal::Decimal;
use uuid::Uuid;

#[test]
fn difal_value_is_never_negative() {
    let rates = [0i64, 4, 7, 12, 18, 25];
    for origem in rates {
        for destino in rates {
            for fcp in [None, Some(Decimal::from(2))] {
                let amounts = calculate_difal(
                    Decimal::from(1000),
                    Decimal::from(origem),
                    Decimal::from(destino),
                    fcp,
                );
                assert!(
                    amounts.difal_value >= Decimal::ZERO,
                    "difal went negative for {}->{}",
                    origem,
                    destino
                );
                assert_eq!(
                    amounts.total_value,
                    amounts.difal_value + amounts.fcp_value
                );
            }
        }
    }
}

#[test]
fn interstate_rate_is_exhaustive_over_uf_pairs() {
    let seven = Decimal::from(7);
    let twelve = Decimal::from(12);
    let eighteen = Decimal::from(18);

    for origem in ALL_UFS {
        for destino in ALL_UFS {
            let rate = interstate_rate(origem, destino, false);
            if origem == destino {
                assert_eq!(rate, eighteen, "{}->{}", origem, destino);
            } else if origem.in_south_southeast_group() && destino.in_south_southeast_group() {
                assert_eq!(rate, seven, "{}->{}", origem, destino);
            } else {
                assert_eq!(rate, twelve, "{}->{}", origem, destino);
            }
        }
    }
}

#[test]
fn interstate_rate_examples() {
    assert_eq!(interstate_rate(Uf::Sp, Uf::Rj, false), Decimal::from(7));
    assert_eq!(interstate_rate(Uf::Sp, Uf::Ba, false), Decimal::from(12));
    assert_eq!(interstate_rate(Uf::Pr, Uf::Ba, true), Decimal::from(4));
}

fn ledger_item(nature: &str, tax_value: &str) -> ApurationItem {
    ApurationItem {
        item_id: Uuid::new_v4(),
        apuration_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        document_type: "nfe".to_string(),
        document_id: None,
        document_number: Some("000123".to_string()),
        cfop: Some("5102".to_string()),
        base_value: Decimal::from(1000),
        rate: Decimal::from(18),
        tax_value: tax_value.parse().unwrap(),
        nature: nature.to_string(),
        description: None,
        created_utc: Utc::now(),
    }
}

#[test]
fn apuration_balance_is_credits_minus_debits() {
    let items = vec![
        ledger_item("credit", "500"),
        ledger_item("debit", "180"),
        ledger_item("credit", "20.50"),
        ledger_item("debit", "0.50"),
    ];
    let totals = calculate_balance(&items);
    assert_eq!(totals.total_credit, "520.50".parse::<Decimal>().unwrap());
    assert_eq!(totals.total_debit, "180.50".parse::<Decimal>().unwrap());
    assert_eq!(totals.balance, Decimal::from(340));
}

#[test]
fn apuration_balance_of_empty_ledger_is_zero() {
    let totals = calculate_balance(&[]);
    assert_eq!(totals.total_credit, Decimal::ZERO);
    assert_eq!(totals.total_debit, Decimal::ZERO);
    assert_eq!(totals.balance, Decimal::ZERO);
}

#[test]
fn nfse_without_withholding_nets_the_full_service_value() {
    let input = CreateNfse {
        customer_id: Uuid::new_v4(),
        service_code: "1.07".to_string(),
        cnae: None,
        description: "Desenvolvimento de software".to_string(),
        competence_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        service_value: Decimal::from(1000),
        deduction_value: None,
        iss_rate: Decimal::from(5),
        iss_withheld: false,
        pis_rate: None,
        cofins_rate: None,
        ir_rate: None,
        csll_rate: None,
        inss_rate: None,
    };

    let amounts = calculate_nfse_amounts(&input);
    assert_eq!(amounts.iss_value, Decimal::from(50));
    assert_eq!(amounts.net_value, Decimal::from(1000));
}

#[test]
fn nfse_withholding_reduces_the_net_by_every_computed_tax() {
    let input = CreateNfse {
        customer_id: Uuid::new_v4(),
        service_code: "1.07".to_string(),
        cnae: Some("6201501".to_string()),
        description: "Sustentação mensal".to_string(),
        competence_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        service_value: Decimal::from(2000),
        deduction_value: Some(Decimal::from(500)),
        iss_rate: Decimal::from(2),
        iss_withheld: true,
        pis_rate: Some("0.65".parse().unwrap()),
        cofins_rate: Some(Decimal::from(3)),
        ir_rate: None,
        csll_rate: None,
        inss_rate: None,
    };

    let amounts = calculate_nfse_amounts(&input);
    // Base shrinks by the deduction: 1500.
    assert_eq!(amounts.base_value, Decimal::from(1500));
    assert_eq!(amounts.iss_value, Decimal::from(30));
    assert_eq!(amounts.pis_value, Some("9.75".parse().unwrap()));
    assert_eq!(amounts.cofins_value, Some(Decimal::from(45)));
    // Net comes off the full service value: 2000 - (30 + 9.75 + 45).
    assert_eq!(amounts.net_value, "1915.25".parse::<Decimal>().unwrap());
}
