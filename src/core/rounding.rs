use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fractional digits every rounded price carries.
pub const PRICE_SCALE: u32 = 2;

/// Fractional digits of a resolved reference-currency cost.
pub const COST_SCALE: u32 = 4;

/// The two rounding steps the business allows. Deliberately not a free
/// parameter: prices are only ever rounded up to tens or hundreds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingIncrement {
    Ten,
    Hundred,
}

impl RoundingIncrement {
    pub fn value(self) -> Decimal {
        match self {
            RoundingIncrement::Ten => Decimal::TEN,
            RoundingIncrement::Hundred => Decimal::ONE_HUNDRED,
        }
    }
}

impl fmt::Display for RoundingIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Mandated price rounding.
pub struct RoundingPolicy;

impl RoundingPolicy {
    /// Smallest multiple of `increment` that is `>= value`, with two
    /// fractional digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricing_engine::core::rounding::{RoundingIncrement, RoundingPolicy};
    /// use rust_decimal_macros::dec;
    ///
    /// assert_eq!(RoundingPolicy::round_up(dec!(2375), RoundingIncrement::Ten), dec!(2380));
    /// assert_eq!(RoundingPolicy::round_up(dec!(11250), RoundingIncrement::Hundred), dec!(11300));
    /// assert_eq!(RoundingPolicy::round_up(dec!(2250), RoundingIncrement::Ten), dec!(2250));
    /// ```
    ///
    /// # Panics
    ///
    /// When `value` lies within one increment of `Decimal::MAX`. Use
    /// [`RoundingPolicy::checked_round_up`] for untrusted amounts.
    pub fn round_up(value: Decimal, increment: RoundingIncrement) -> Decimal {
        let step = increment.value();
        let mut rounded = (value / step).ceil() * step;
        rounded.rescale(PRICE_SCALE);
        rounded
    }

    /// [`RoundingPolicy::round_up`], or `None` if the result leaves the
    /// decimal range.
    pub fn checked_round_up(value: Decimal, increment: RoundingIncrement) -> Option<Decimal> {
        let step = increment.value();
        let mut rounded = (value / step).ceil().checked_mul(step)?;
        rounded.rescale(PRICE_SCALE);
        Some(rounded)
    }

    /// Round a resolved cost to its stored precision.
    pub fn round_cost(value: Decimal) -> Decimal {
        value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_up_ten() {
        assert_eq!(RoundingPolicy::round_up(dec!(2371), RoundingIncrement::Ten), dec!(2380));
        assert_eq!(RoundingPolicy::round_up(dec!(2370.01), RoundingIncrement::Ten), dec!(2380));
        assert_eq!(RoundingPolicy::round_up(dec!(2370), RoundingIncrement::Ten), dec!(2370));
        assert_eq!(RoundingPolicy::round_up(dec!(0.01), RoundingIncrement::Ten), dec!(10));
        assert_eq!(RoundingPolicy::round_up(Decimal::ZERO, RoundingIncrement::Ten), Decimal::ZERO);
    }

    #[test]
    fn test_round_up_hundred() {
        assert_eq!(RoundingPolicy::round_up(dec!(1190), RoundingIncrement::Hundred), dec!(1200));
        assert_eq!(RoundingPolicy::round_up(dec!(1200), RoundingIncrement::Hundred), dec!(1200));
    }

    #[test]
    fn test_result_has_two_fractional_digits() {
        let rounded = RoundingPolicy::round_up(dec!(2375), RoundingIncrement::Ten);
        assert_eq!(rounded.scale(), 2);
        assert_eq!(rounded.to_string(), "2380.00");
    }

    #[test]
    fn test_checked_round_up() {
        assert_eq!(
            RoundingPolicy::checked_round_up(dec!(2371), RoundingIncrement::Ten),
            Some(dec!(2380))
        );
        assert_eq!(RoundingPolicy::checked_round_up(Decimal::MAX, RoundingIncrement::Hundred), None);
    }

    #[test]
    fn test_round_cost_half_away_from_zero() {
        assert_eq!(RoundingPolicy::round_cost(dec!(1.23455)), dec!(1.2346));
        assert_eq!(RoundingPolicy::round_cost(dec!(1.23454)), dec!(1.2345));
        assert_eq!(RoundingPolicy::round_cost(dec!(2)), dec!(2));
    }
}
