use rust_decimal::Decimal;

use crate::error::{ApiError, ApiResult};

/// Money columns are `DECIMAL(12, 2)`.
pub const MONEY_SCALE: u32 = 2;

/// 9 999 999 999.99, the largest value a `DECIMAL(12, 2)` column holds.
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Rejects amounts the money columns would round or refuse.
pub fn validate_money(field: &str, amount: Decimal) -> ApiResult<()> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(ApiError::bad_request(format!(
            "{field} must have at most {MONEY_SCALE} decimal places, got {amount}"
        )));
    }
    if amount.abs() > MAX_MONEY {
        return Err(ApiError::bad_request(format!(
            "{field} exceeds maximum allowed ({MAX_MONEY}), got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_matches_the_column_bound() {
        assert_eq!(MAX_MONEY, Decimal::new(999_999_999_999, 2));
    }

    #[test]
    fn cents_are_accepted() {
        assert!(validate_money("amount", Decimal::new(1, 2)).is_ok());
        assert!(validate_money("amount", Decimal::new(12_050, 2)).is_ok());
        assert!(validate_money("amount", MAX_MONEY).is_ok());
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        // 1.2300
        assert!(validate_money("amount", Decimal::new(12_300, 4)).is_ok());
    }

    #[test]
    fn sub_cent_amounts_are_rejected() {
        let err = validate_money("amount", Decimal::new(1, 3)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("decimal places")));
    }

    #[test]
    fn amounts_beyond_the_column_are_rejected() {
        assert!(validate_money("amount", Decimal::new(100_000_000_000, 0)).is_err());
        assert!(validate_money("amount", MAX_MONEY + Decimal::new(1, 2)).is_err());
    }
}
