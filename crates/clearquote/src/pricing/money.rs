//! Monetary helpers. All amounts are `Decimal`, rounded to two places using
//! half-up so £10.005 invoices as £10.01.

use rust_decimal::prelude::*;

const DECIMAL_PLACES: u32 = 2;

/// Ceiling on any single computed amount and on the final total. Amounts
/// beyond this are treated as a calculation overflow.
pub const AMOUNT_CEILING: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    // Force a scale of exactly two so serialized amounts always read £x.xx.
    rounded.rescale(DECIMAL_PLACES);
    rounded
}

/// Clamp into optional `[min, max]` bounds. Callers guarantee `min <= max`
/// via rule validation.
pub fn clamp_bounds(value: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> Decimal {
    let mut value = value;
    if let Some(min) = min {
        value = value.max(min);
    }
    if let Some(max) = max {
        value = value.min(max);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up_at_two_places() {
        let value = Decimal::new(10_005, 3); // 10.005
        assert_eq!(round_money(value), Decimal::new(1_001, 2));

        let value = Decimal::new(10_004, 3); // 10.004
        assert_eq!(round_money(value), Decimal::new(1_000, 2));
    }

    #[test]
    fn clamps_against_optional_bounds() {
        let five = Decimal::new(5, 0);
        let ten = Decimal::new(10, 0);
        let twenty = Decimal::new(20, 0);

        assert_eq!(clamp_bounds(five, Some(ten), Some(twenty)), ten);
        assert_eq!(clamp_bounds(twenty + twenty, Some(ten), Some(twenty)), twenty);
        assert_eq!(clamp_bounds(five, None, None), five);
    }
}
