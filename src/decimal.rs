use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use crate::errors::{LoanError, Result};

/// fraction digits kept for every stored monetary value
pub const MONEY_SCALE: u32 = 2;

/// round to cents using banker's rounding
pub(crate) fn round_cents(d: Decimal) -> Decimal {
    let mut rounded = d.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Money type with 2 decimal places, the ledger currency's minor unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, MONEY_SCALE));
    pub const CENT: Money = Money(Decimal::from_parts(1, 0, 0, false, MONEY_SCALE));
    /// largest amount a loan may carry: 12 digits, 2 of them fractional
    pub const MAX_AMOUNT: Money = Money(Decimal::from_parts(3_567_587_327, 232, 0, false, MONEY_SCALE));

    /// create from decimal, rounding half-to-even to cents
    pub fn from_decimal(d: Decimal) -> Self {
        Money(round_cents(d))
    }

    /// parse a decimal string such as "83333.33"
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Decimal::from_str(trimmed)
            .map(Money::from_decimal)
            .map_err(|_| LoanError::InvalidAmount {
                value: s.to_string(),
            })
    }

    /// convert from a float, rejecting NaN and infinities
    pub fn try_from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(LoanError::InvalidAmount {
                value: value.to_string(),
            });
        }
        Decimal::from_f64(value)
            .map(Money::from_decimal)
            .ok_or_else(|| LoanError::InvalidAmount {
                value: value.to_string(),
            })
    }

    /// create from integer amount (kwanza, dollars, etc)
    pub fn from_major(amount: i64) -> Self {
        Money::from_decimal(Decimal::from(amount))
    }

    /// create from minor amount (cents)
    pub fn from_minor(amount: i64) -> Self {
        Money(Decimal::new(amount, MONEY_SCALE))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// reject zero and negative amounts where a positive amount is required
    pub fn ensure_positive(self, field: &str) -> Result<Self> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(LoanError::Validation {
                message: format!("{field} must be greater than zero, got {self}"),
            })
        }
    }

    /// reject amounts above `max`
    pub fn ensure_at_most(self, max: Money, field: &str) -> Result<Self> {
        if self <= max {
            Ok(self)
        } else {
            Err(LoanError::Validation {
                message: format!("{field} must not exceed {max}, got {self}"),
            })
        }
    }

    /// multiply by a whole number of periods
    pub fn times(self, periods: u32) -> Self {
        Money::from_decimal(self.0 * Decimal::from(periods))
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money::from_decimal)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money::from_decimal)
    }

    pub fn checked_times(self, periods: u32) -> Option<Money> {
        self.0
            .checked_mul(Decimal::from(periods))
            .map(Money::from_decimal)
    }

    /// sum that reports overflow instead of panicking
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, x| acc.checked_add(x))
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self> {
        Money::parse(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<Money> for Decimal {
    fn from(m: Money) -> Self {
        m.0
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money::from_decimal(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money::from_decimal(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        *self = *self - other;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + *x)
    }
}

/// periodic interest rate expressed as a fraction (0.015 is 1.5% per period)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from decimal fraction without validation
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from a fraction, rejecting negative rates
    pub fn try_new(d: Decimal) -> Result<Self> {
        if d.is_sign_negative() && !d.is_zero() {
            return Err(LoanError::Validation {
                message: format!("interest rate must not be negative, got {d}"),
            });
        }
        Ok(Rate(d))
    }

    /// create from a percentage per period (1.5 for 1.5%)
    pub fn from_percent(p: Decimal) -> Result<Self> {
        Rate::try_new(p / Decimal::ONE_HUNDRED)
    }

    /// create from basis points (150 for 1.5%)
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(10_000))
    }

    /// parse a fraction such as "0.015"
    pub fn parse(s: &str) -> Result<Self> {
        let d = Decimal::from_str(s.trim()).map_err(|_| LoanError::Validation {
            message: format!("malformed interest rate: {s}"),
        })?;
        Rate::try_new(d)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::ONE_HUNDRED
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

impl TryFrom<Decimal> for Rate {
    type Error = LoanError;

    fn try_from(d: Decimal) -> Result<Self> {
        Rate::try_new(d)
    }
}

impl From<Rate> for Decimal {
    fn from(r: Rate) -> Self {
        r.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_to_cents_half_even() {
        assert_eq!(Money::parse("10.125").unwrap().to_string(), "10.12");
        assert_eq!(Money::parse("10.135").unwrap().to_string(), "10.14");
        assert_eq!(Money::from_major(1_000_000).to_string(), "1000000.00");
    }

    #[test]
    fn test_malformed_and_non_finite_amounts() {
        assert!(matches!(
            Money::parse("12,5x"),
            Err(LoanError::InvalidAmount { .. })
        ));
        assert!(matches!(
            Money::try_from_f64(f64::NAN),
            Err(LoanError::InvalidAmount { .. })
        ));
        assert!(matches!(
            Money::try_from_f64(f64::INFINITY),
            Err(LoanError::InvalidAmount { .. })
        ));
        assert_eq!(Money::try_from_f64(250.5).unwrap(), Money::from_minor(25_050));
    }

    #[test]
    fn test_ensure_positive() {
        assert!(Money::from_major(1).ensure_positive("amount").is_ok());
        assert!(matches!(
            Money::ZERO.ensure_positive("amount"),
            Err(LoanError::Validation { .. })
        ));
        assert!(matches!(
            Money::from_major(-5).ensure_positive("amount"),
            Err(LoanError::Validation { .. })
        ));
    }

    #[test]
    fn test_sum_and_times() {
        let parts = vec![Money::from_minor(33_33), Money::from_minor(33_33), Money::from_minor(33_34)];
        let total: Money = parts.iter().sum();
        assert_eq!(total, Money::from_major(100));
        assert_eq!(Money::parse("87762.61").unwrap().times(6), Money::parse("526575.66").unwrap());
    }

    #[test]
    fn test_rate_inputs() {
        assert_eq!(Rate::from_percent(dec!(1.5)).unwrap().as_decimal(), dec!(0.015));
        assert_eq!(Rate::from_bps(150).as_decimal(), dec!(0.015));
        assert!(Rate::parse("-0.01").is_err());
        assert!(Rate::parse("abc").is_err());
        assert_eq!(Rate::parse("0.02").unwrap().to_string(), "2%");
    }

    #[test]
    fn test_rate_is_validated_when_deserialized() {
        let rate: Rate = serde_json::from_str("\"0.015\"").unwrap();
        assert_eq!(rate.as_decimal(), dec!(0.015));
        assert!(serde_json::from_str::<Rate>("\"-0.01\"").is_err());
        assert_eq!(serde_json::to_string(&rate).unwrap(), "\"0.015\"");
    }

    #[test]
    fn test_max_amount_bound() {
        assert_eq!(Money::MAX_AMOUNT, Money::parse("9999999999.99").unwrap());
        assert!(Money::MAX_AMOUNT.ensure_at_most(Money::MAX_AMOUNT, "amount").is_ok());
        assert!(matches!(
            (Money::MAX_AMOUNT + Money::CENT).ensure_at_most(Money::MAX_AMOUNT, "amount"),
            Err(LoanError::Validation { .. })
        ));
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let huge = Money::parse("50000000000000000000000000000").unwrap();
        assert!(huge.checked_add(huge).is_none());
        assert!(huge.checked_times(3).is_none());
        assert!(Money::checked_sum([huge, huge, huge]).is_none());
        assert!(Money::from_decimal(Decimal::MIN).checked_sub(huge).is_none());

        assert_eq!(
            Money::checked_sum([Money::from_minor(1_050), Money::from_minor(2_025)]),
            Some(Money::from_minor(3_075))
        );
        assert_eq!(Money::from_minor(33_33).checked_times(3), Some(Money::from_minor(99_99)));
    }
}
