//! Numeric field checks for Decimal values, reported through the same
//! `ValidationError` channel as the derive-based checks.

use fiscal_core::error::AppError;
use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors};

use crate::fiscal::tables::FCP_RATE_CEILING;

fn field_error(field: &'static str, code: &'static str) -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new(code));
    AppError::ValidationError(errors)
}

/// Percent rate in [0, 100].
pub fn percent_rate(field: &'static str, value: Decimal) -> Result<(), AppError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(field_error(field, "percent_out_of_range"));
    }
    Ok(())
}

/// Optional percent rate in [0, 100].
pub fn optional_percent_rate(field: &'static str, value: Option<Decimal>) -> Result<(), AppError> {
    match value {
        Some(v) => percent_rate(field, v),
        None => Ok(()),
    }
}

/// FCP surcharge in [0, 10].
pub fn fcp_rate(field: &'static str, value: Option<Decimal>) -> Result<(), AppError> {
    match value {
        Some(v) if v < Decimal::ZERO || v > FCP_RATE_CEILING => {
            Err(field_error(field, "fcp_out_of_range"))
        }
        _ => Ok(()),
    }
}

/// Strictly positive monetary value.
pub fn positive(field: &'static str, value: Decimal) -> Result<(), AppError> {
    if value <= Decimal::ZERO {
        return Err(field_error(field, "must_be_positive"));
    }
    Ok(())
}

/// Non-negative monetary value.
pub fn non_negative(field: &'static str, value: Decimal) -> Result<(), AppError> {
    if value < Decimal::ZERO {
        return Err(field_error(field, "must_not_be_negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_bounds() {
        assert!(percent_rate("rate", Decimal::ZERO).is_ok());
        assert!(percent_rate("rate", Decimal::ONE_HUNDRED).is_ok());
        assert!(percent_rate("rate", Decimal::from(101)).is_err());
        assert!(percent_rate("rate", Decimal::from(-1)).is_err());
    }

    #[test]
    fn fcp_capped_at_ten() {
        assert!(fcp_rate("fcp_rate", None).is_ok());
        assert!(fcp_rate("fcp_rate", Some(Decimal::from(10))).is_ok());
        assert!(fcp_rate("fcp_rate", Some(Decimal::from(11))).is_err());
    }

    #[test]
    fn rejections_surface_as_validation_errors() {
        let err = positive("product_value", Decimal::ZERO).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }
}
