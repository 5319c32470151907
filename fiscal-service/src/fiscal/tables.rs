//! Static rate tables: UF codes, interstate ICMS rates and the obligation
//! definitions the calendar is built from. Compile-time data, no runtime
//! mutation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Brazilian federative units, exhaustive over the 26 states plus DF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Uf {
    Ac,
    Al,
    Ap,
    Am,
    Ba,
    Ce,
    Df,
    Es,
    Go,
    Ma,
    Mt,
    Ms,
    Mg,
    Pa,
    Pb,
    Pr,
    Pe,
    Pi,
    Rj,
    Rn,
    Rs,
    Ro,
    Rr,
    Sc,
    Sp,
    Se,
    To,
}

pub const ALL_UFS: [Uf; 27] = [
    Uf::Ac,
    Uf::Al,
    Uf::Ap,
    Uf::Am,
    Uf::Ba,
    Uf::Ce,
    Uf::Df,
    Uf::Es,
    Uf::Go,
    Uf::Ma,
    Uf::Mt,
    Uf::Ms,
    Uf::Mg,
    Uf::Pa,
    Uf::Pb,
    Uf::Pr,
    Uf::Pe,
    Uf::Pi,
    Uf::Rj,
    Uf::Rn,
    Uf::Rs,
    Uf::Ro,
    Uf::Rr,
    Uf::Sc,
    Uf::Sp,
    Uf::Se,
    Uf::To,
];

impl Uf {
    pub fn as_str(&self) -> &'static str {
        match self {
            Uf::Ac => "AC",
            Uf::Al => "AL",
            Uf::Ap => "AP",
            Uf::Am => "AM",
            Uf::Ba => "BA",
            Uf::Ce => "CE",
            Uf::Df => "DF",
            Uf::Es => "ES",
            Uf::Go => "GO",
            Uf::Ma => "MA",
            Uf::Mt => "MT",
            Uf::Ms => "MS",
            Uf::Mg => "MG",
            Uf::Pa => "PA",
            Uf::Pb => "PB",
            Uf::Pr => "PR",
            Uf::Pe => "PE",
            Uf::Pi => "PI",
            Uf::Rj => "RJ",
            Uf::Rn => "RN",
            Uf::Rs => "RS",
            Uf::Ro => "RO",
            Uf::Rr => "RR",
            Uf::Sc => "SC",
            Uf::Sp => "SP",
            Uf::Se => "SE",
            Uf::To => "TO",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        ALL_UFS.iter().copied().find(|uf| uf.as_str() == upper)
    }

    /// South/Southeast group used by the interstate rate table. Espírito
    /// Santo is carved out of the group by the rate rules.
    pub fn in_south_southeast_group(&self) -> bool {
        matches!(self, Uf::Sp | Uf::Rj | Uf::Mg | Uf::Pr | Uf::Rs | Uf::Sc)
    }
}

impl std::fmt::Display for Uf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default internal ICMS rate, returned for same-UF lookups. Intra-state
/// operations are priced elsewhere; this value is the fallback the caller
/// gets when it asks the interstate table anyway.
pub const INTERNAL_ICMS_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 0);

/// General interstate rate.
pub const GENERAL_INTERSTATE_RATE: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Rate between two UFs of the South/Southeast group (ES excluded).
pub const SOUTH_SOUTHEAST_RATE: Decimal = Decimal::from_parts(7, 0, 0, false, 0);

/// Reduced rate for goods of foreign origin (Resolução 13/2012); the caller
/// flags foreign origin, it is not detected here.
pub const FOREIGN_ORIGIN_RATE: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

/// Ceiling for the poverty-combat fund surcharge.
pub const FCP_RATE_CEILING: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Standard ICMS interstate percentage for a UF pair.
pub fn interstate_rate(origem: Uf, destino: Uf, foreign_origin: bool) -> Decimal {
    if origem == destino {
        return INTERNAL_ICMS_RATE;
    }
    if foreign_origin {
        return FOREIGN_ORIGIN_RATE;
    }
    if origem.in_south_southeast_group() && destino.in_south_southeast_group() {
        return SOUTH_SOUTHEAST_RATE;
    }
    GENERAL_INTERSTATE_RATE
}

/// Fixed due-date rule for one obligation code: `due_day` of the month
/// `month_offset` months after the reference period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObligationDefinition {
    pub code: &'static str,
    pub name: &'static str,
    pub due_day: u32,
    pub month_offset: u32,
}

/// Every obligation the engine tracks. The calendar and the lifecycle
/// manager both iterate this table.
pub const OBLIGATION_DEFINITIONS: &[ObligationDefinition] = &[
    ObligationDefinition {
        code: "EFD_ICMS_IPI",
        name: "EFD ICMS/IPI (SPED Fiscal)",
        due_day: 20,
        month_offset: 1,
    },
    ObligationDefinition {
        code: "EFD_CONTRIBUICOES",
        name: "EFD Contribuições (PIS/COFINS)",
        due_day: 15,
        month_offset: 2,
    },
    ObligationDefinition {
        code: "EFD_REINF",
        name: "EFD-Reinf",
        due_day: 15,
        month_offset: 1,
    },
    ObligationDefinition {
        code: "ESOCIAL",
        name: "eSocial (eventos periódicos)",
        due_day: 15,
        month_offset: 1,
    },
    ObligationDefinition {
        code: "FGTS",
        name: "FGTS (GFIP/DCTFWeb)",
        due_day: 7,
        month_offset: 1,
    },
    ObligationDefinition {
        code: "DCTFWEB",
        name: "DCTFWeb",
        due_day: 25,
        month_offset: 1,
    },
    ObligationDefinition {
        code: "GIA",
        name: "GIA estadual",
        due_day: 9,
        month_offset: 1,
    },
];

pub fn find_definition(code: &str) -> Option<&'static ObligationDefinition> {
    OBLIGATION_DEFINITIONS.iter().find(|d| d.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_all_27_ufs() {
        assert_eq!(ALL_UFS.len(), 27);
        for uf in ALL_UFS {
            assert_eq!(Uf::try_from_str(uf.as_str()), Some(uf));
        }
        assert_eq!(Uf::try_from_str("sp"), Some(Uf::Sp));
        assert_eq!(Uf::try_from_str("XX"), None);
    }

    #[test]
    fn south_southeast_pair_pays_seven() {
        assert_eq!(interstate_rate(Uf::Sp, Uf::Rj, false), Decimal::from(7));
        assert_eq!(interstate_rate(Uf::Rs, Uf::Mg, false), Decimal::from(7));
    }

    #[test]
    fn general_pair_pays_twelve() {
        assert_eq!(interstate_rate(Uf::Sp, Uf::Ba, false), Decimal::from(12));
        assert_eq!(interstate_rate(Uf::Am, Uf::Rj, false), Decimal::from(12));
    }

    #[test]
    fn espirito_santo_is_not_in_the_group() {
        assert!(!Uf::Es.in_south_southeast_group());
        assert_eq!(interstate_rate(Uf::Sp, Uf::Es, false), Decimal::from(12));
    }

    #[test]
    fn same_uf_returns_internal_rate() {
        assert_eq!(interstate_rate(Uf::Mg, Uf::Mg, false), Decimal::from(18));
    }

    #[test]
    fn foreign_origin_overrides_the_pair() {
        assert_eq!(interstate_rate(Uf::Sp, Uf::Rj, true), Decimal::from(4));
        assert_eq!(interstate_rate(Uf::Sp, Uf::Ba, true), Decimal::from(4));
    }

    #[test]
    fn definitions_are_unique_by_code() {
        for (i, a) in OBLIGATION_DEFINITIONS.iter().enumerate() {
            for b in &OBLIGATION_DEFINITIONS[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
        assert!(find_definition("EFD_REINF").is_some());
        assert!(find_definition("UNKNOWN").is_none());
    }
}
