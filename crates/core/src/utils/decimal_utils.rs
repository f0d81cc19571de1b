//! Exact decimal helpers for money and quantities.
//!
//! Financial paths never go through `f64`. The only float conversion here,
//! [`to_f64`], feeds the indicator processor which works on prices only.

use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::{DISPLAY_DECIMAL_PRECISION, QUANTITY_THRESHOLD};

/// Number of fractional digits in the currency's minor unit (ISO 4217).
pub fn minor_unit_scale(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" => 0,
        "BHD" | "KWD" | "OMR" | "JOD" | "TND" | "IQD" | "LYD" => 3,
        _ => 2,
    }
}

/// Banker's rounding (half to even) to the currency's minor unit.
pub fn round_money(value: Decimal, currency: &str) -> Decimal {
    value.round_dp_with_strategy(
        minor_unit_scale(currency),
        RoundingStrategy::MidpointNearestEven,
    )
}

/// Presentation rounding for amounts and percentages.
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(
        DISPLAY_DECIMAL_PRECISION,
        RoundingStrategy::MidpointNearestEven,
    )
}

fn quantity_threshold() -> Decimal {
    QUANTITY_THRESHOLD.parse().unwrap_or(Decimal::ZERO)
}

/// Whether a quantity is distinguishable from zero.
pub fn is_quantity_significant(quantity: Decimal) -> bool {
    quantity.abs() >= quantity_threshold()
}

/// Lossy conversion for the float-based indicator math.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// `part / whole * 100`, or zero when `whole` is not positive.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole > Decimal::ZERO {
        part / whole * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_unit_scale() {
        assert_eq!(minor_unit_scale("USD"), 2);
        assert_eq!(minor_unit_scale("jpy"), 0);
        assert_eq!(minor_unit_scale("KWD"), 3);
    }

    #[test]
    fn test_round_money_uses_bankers_rounding() {
        assert_eq!(round_money(dec!(2.345), "USD"), dec!(2.34));
        assert_eq!(round_money(dec!(2.355), "USD"), dec!(2.36));
        assert_eq!(round_money(dec!(1500.5), "JPY"), dec!(1500));
        assert_eq!(round_money(dec!(1501.5), "JPY"), dec!(1502));
    }

    #[test]
    fn test_is_quantity_significant() {
        assert!(!is_quantity_significant(Decimal::ZERO));
        assert!(!is_quantity_significant(dec!(0.000000001)));
        assert!(is_quantity_significant(dec!(0.00000001)));
        assert!(is_quantity_significant(dec!(-3)));
    }

    #[test]
    fn test_percent_of_zero_whole() {
        assert_eq!(percent_of(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent_of(dec!(25), dec!(200)), dec!(12.5));
    }

    #[test]
    fn test_to_f64() {
        assert!((to_f64(dec!(152.25)) - 152.25).abs() < 1e-12);
    }
}
