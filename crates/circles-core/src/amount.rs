//! # Fixed-Point Token Amounts
//!
//! Amounts are unsigned 18-decimal fixed-point values held as `u128` base
//! units (1 token = 10^18 base units). Every currency computation in the
//! workspace runs on these integers; percentages and fee rates are scaled
//! to integers before they are applied.
//!
//! ## Serde
//!
//! Serializes as a decimal string with trailing fractional zeros removed
//! (`"1.5"`, `"0"`). Deserializes from a decimal string or a non-negative
//! JSON number.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AmountError;
use crate::percent::{Percentage, MICROS_PER_PERCENT};

/// Number of fractional decimal digits.
pub const DECIMALS: u32 = 18;

/// Base units per whole token.
const SCALE: u128 = 1_000_000_000_000_000_000;

/// Basis points in 100 %.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// A non-negative token amount with 18 decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero tokens.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw base-unit count.
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Raw base units.
    pub const fn base_units(&self) -> u128 {
        self.0
    }

    /// Whether this amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a plain decimal string such as `"12"`, `"0.5"` or `"1.000000000000000001"`.
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if s.starts_with('-') {
            return Err(AmountError::Negative(s.to_string()));
        }

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty() || !all_digits(int_part) || !all_digits(frac_part) {
            return Err(AmountError::Malformed(s.to_string()));
        }
        if s.ends_with('.') {
            return Err(AmountError::Malformed(s.to_string()));
        }
        if frac_part.len() > DECIMALS as usize {
            return Err(AmountError::TooManyDecimals {
                value: s.to_string(),
                max: DECIMALS,
            });
        }

        let overflow = || AmountError::Overflow(s.to_string());
        let whole: u128 = int_part.parse().map_err(|_| overflow())?;
        let mut frac: u128 = 0;
        if !frac_part.is_empty() {
            let digits: u128 = frac_part.parse().map_err(|_| overflow())?;
            let pad = DECIMALS - frac_part.len() as u32;
            frac = digits * 10u128.pow(pad);
        }

        whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac))
            .map(Self)
            .ok_or_else(overflow)
    }

    /// Checked addition.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Addition clamped at the largest representable amount.
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Checked subtraction; `None` if the result would be negative.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Divide evenly among `parts` recipients, discarding the remainder.
    ///
    /// Returns zero when `parts` is zero.
    pub fn split_evenly(self, parts: usize) -> Self {
        if parts == 0 {
            return Self::ZERO;
        }
        Self(self.0 / parts as u128)
    }

    /// `self × percent / 100`, truncated to base units.
    pub fn percent_of(self, percent: Percentage) -> Self {
        let hundred_micros = 100 * MICROS_PER_PERCENT as u128;
        Self(mul_div_floor(self.0, percent.as_micros() as u128, hundred_micros))
    }

    /// `self × bps / 10_000`, truncated to base units. `bps` above 10 000 is clamped.
    pub fn bps_of(self, bps: u32) -> Self {
        let bps = bps.min(BPS_DENOMINATOR);
        Self(mul_div_floor(
            self.0,
            bps as u128,
            BPS_DENOMINATOR as u128,
        ))
    }
}

/// `value × num / den` without intermediate overflow, for `num <= den`.
fn mul_div_floor(value: u128, num: u128, den: u128) -> u128 {
    debug_assert!(num <= den && den > 0);
    let q = value / den;
    let r = value % den;
    q * num + r * num / den
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:018}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl std::str::FromStr for TokenAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = TokenAmount;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a non-negative decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        TokenAmount::parse(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        (v as u128)
            .checked_mul(SCALE)
            .map(TokenAmount)
            .ok_or_else(|| E::custom(AmountError::Overflow(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        if v < 0 {
            return Err(E::custom(AmountError::Negative(v.to_string())));
        }
        self.visit_u64(v as u64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom(AmountError::Malformed(v.to_string())));
        }
        // `Display` for f64 never uses exponent notation.
        TokenAmount::parse(&v.to_string()).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amt(s: &str) -> TokenAmount {
        TokenAmount::parse(s).unwrap()
    }

    #[test]
    fn parses_whole_and_fractional() {
        assert_eq!(amt("1").base_units(), SCALE);
        assert_eq!(amt("0.5").base_units(), SCALE / 2);
        assert_eq!(amt("0.000000000000000001").base_units(), 1);
        assert_eq!(amt(" 42 ").base_units(), 42 * SCALE);
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(amt("1.500").to_string(), "1.5");
        assert_eq!(amt("10").to_string(), "10");
        assert_eq!(TokenAmount::ZERO.to_string(), "0");
        assert_eq!(TokenAmount::from_base_units(1).to_string(), "0.000000000000000001");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(TokenAmount::parse(""), Err(AmountError::Empty));
        assert!(matches!(TokenAmount::parse("-1"), Err(AmountError::Negative(_))));
        assert!(matches!(TokenAmount::parse("abc"), Err(AmountError::Malformed(_))));
        assert!(matches!(TokenAmount::parse(".5"), Err(AmountError::Malformed(_))));
        assert!(matches!(TokenAmount::parse("5."), Err(AmountError::Malformed(_))));
        assert!(matches!(TokenAmount::parse("1e5"), Err(AmountError::Malformed(_))));
        assert!(matches!(
            TokenAmount::parse("0.0000000000000000001"),
            Err(AmountError::TooManyDecimals { .. })
        ));
        assert!(matches!(
            TokenAmount::parse("999999999999999999999999999999999"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn percent_of_uses_integer_math() {
        let third = amt("1").split_evenly(3);
        assert_eq!(third.base_units(), 333_333_333_333_333_333);
        let half = third.percent_of(Percentage::new(50.0).unwrap());
        assert_eq!(half.base_units(), 166_666_666_666_666_666);
        assert_eq!(third.percent_of(Percentage::new(100.0).unwrap()), third);
        assert_eq!(third.percent_of(Percentage::new(0.0).unwrap()), TokenAmount::ZERO);
    }

    #[test]
    fn bps_of_five_percent() {
        assert_eq!(amt("1").bps_of(500), amt("0.05"));
        assert_eq!(amt("1").bps_of(20_000), amt("1"), "clamped at 100%");
    }

    #[test]
    fn split_by_zero_is_zero() {
        assert_eq!(amt("5").split_evenly(0), TokenAmount::ZERO);
    }

    #[test]
    fn serde_accepts_strings_and_numbers() {
        let s: TokenAmount = serde_json::from_str("\"2.25\"").unwrap();
        assert_eq!(s, amt("2.25"));
        let n: TokenAmount = serde_json::from_str("3").unwrap();
        assert_eq!(n, amt("3"));
        let f: TokenAmount = serde_json::from_str("0.75").unwrap();
        assert_eq!(f, amt("0.75"));
        assert!(serde_json::from_str::<TokenAmount>("-1").is_err());
        assert_eq!(serde_json::to_string(&amt("2.25")).unwrap(), "\"2.25\"");
    }

    #[test]
    fn large_values_do_not_overflow_in_percent_math() {
        let big = TokenAmount::from_base_units(u128::MAX);
        let all = big.percent_of(Percentage::new(100.0).unwrap());
        assert_eq!(all, big);
        assert!(big.bps_of(500) < big);
    }

    proptest! {
        #[test]
        fn fee_plus_payout_is_total(units in 0u128..=u128::MAX / 2, bps in 0u32..=10_000) {
            let total = TokenAmount::from_base_units(units);
            let fee = total.bps_of(bps);
            let payout = total.checked_sub(fee).unwrap();
            prop_assert_eq!(fee.checked_add(payout).unwrap(), total);
        }

        #[test]
        fn display_reparses_to_same_value(units in any::<u128>()) {
            let a = TokenAmount::from_base_units(units);
            prop_assert_eq!(TokenAmount::parse(&a.to_string()).unwrap(), a);
        }

        #[test]
        fn even_split_never_exceeds_budget(units in any::<u128>(), parts in 1usize..1000) {
            let budget = TokenAmount::from_base_units(units);
            let share = budget.split_evenly(parts);
            prop_assert!(share.base_units() * parts as u128 <= units);
        }
    }
}
