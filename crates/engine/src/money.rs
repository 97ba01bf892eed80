use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use crate::EngineError;

/// Signed money amount represented as **integer minor units** (cents).
///
/// Use this type for **all** monetary values in the engine (transaction
/// totals, share amounts, scope ceilings, wallet balances) to avoid
/// floating-point drift. Two fractional digits are always persisted.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10".parse::<Money>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<Money>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new amount from whole units (`50_000` -> `50000.00`).
    #[must_use]
    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(100).map(Self)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Multiplies the amount by a percentage, rounding half away from zero
    /// to the cent.
    ///
    /// ```rust
    /// use engine::{Money, Percent};
    ///
    /// let total = Money::new(10_000);
    /// assert_eq!(total.mul_percent(Percent::new(33_33)), Money::new(3_333));
    /// ```
    #[must_use]
    pub fn mul_percent(self, percent: Percent) -> Money {
        let scaled = i128::from(self.0) * i128::from(percent.basis_points());
        Money(saturate(div_round(scaled, i128::from(Percent::SCALE))))
    }

    /// Returns how much of `whole` this amount represents, as a percentage.
    ///
    /// A zero `whole` yields [`Percent::ZERO`] instead of failing, so progress
    /// views degrade gracefully when a ceiling is unset.
    #[must_use]
    pub fn percent_of(self, whole: Money) -> Percent {
        if whole.is_zero() {
            return Percent::ZERO;
        }
        let scaled = i128::from(self.0) * i128::from(Percent::SCALE);
        Percent(saturate(div_round(scaled, i128::from(whole.0))))
    }

    /// Formats the amount with `digits` fractional digits (0 to 2), rounding
    /// half away from zero when digits are dropped.
    #[must_use]
    pub fn format_fixed(self, digits: u32) -> String {
        let digits = digits.min(2);
        let divisor = 10i128.pow(2 - digits);
        let value = div_round(i128::from(self.0), divisor);
        let sign = if value < 0 { "-" } else { "" };
        let abs = value.unsigned_abs();
        if digits == 0 {
            return format!("{sign}{abs}");
        }
        let unit = 10u128.pow(digits);
        let width = digits as usize;
        format!("{sign}{}.{:0width$}", abs / unit, abs % unit)
    }

    /// Formats the whole-unit part as Indonesian Rupiah (`Rp50.000`).
    ///
    /// Fractional cents are truncated, the way bank statements show IDR.
    #[must_use]
    pub fn format_rupiah(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let units = (self.0 / 100).unsigned_abs().to_string();

        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (idx, ch) in units.chars().enumerate() {
            if idx > 0 && (units.len() - idx) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        format!("{sign}Rp{grouped}")
    }
}

/// Integer division rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) == (denominator < 0) {
            quotient + 1
        } else {
            quotient - 1
        }
    } else {
        quotient
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_fixed(2))
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sign, units, frac) = split_decimal(s)?;
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => parse_digits(frac)? * 10,
            2 => parse_digits(frac)?,
            _ => return Err(EngineError::InvalidAmount("too many decimals".to_string())),
        };

        let total = parse_digits(units)?
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(overflow)?;

        Ok(Money(apply_sign(sign, total)?))
    }
}

/// A percentage held as **basis points** (hundredths of a percent).
///
/// `50.00%` is `Percent::new(5000)`. The type is signed and unbounded so it
/// can also carry derived values such as budget progress above 100%.
///
/// ```rust
/// use engine::Percent;
///
/// let p: Percent = "33.33%".parse().unwrap();
/// assert_eq!(p.basis_points(), 3333);
/// assert_eq!(p.to_string(), "33.33");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Percent(i64);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(10_000);
    /// Basis points in 100%.
    pub const SCALE: i64 = 10_000;

    #[must_use]
    pub const fn new(basis_points: i64) -> Self {
        Self(basis_points)
    }

    #[must_use]
    pub const fn basis_points(self) -> i64 {
        self.0
    }

    /// Returns `true` when the value lies in `0..=100%`.
    #[must_use]
    pub const fn is_share(self) -> bool {
        self.0 >= 0 && self.0 <= Self::SCALE
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Percent {
    type Output = Percent;

    fn add(self, rhs: Percent) -> Self::Output {
        Percent(self.0 + rhs.0)
    }
}

impl Sub for Percent {
    type Output = Percent;

    fn sub(self, rhs: Percent) -> Self::Output {
        Percent(self.0 - rhs.0)
    }
}

impl FromStr for Percent {
    type Err = EngineError;

    /// Parses `"50"`, `"33.33"`, `"12,5%"`. Digits beyond the second decimal
    /// are rounded half-up.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
        let (sign, units, frac) = split_decimal(trimmed)?;

        let mut hundredths: i64 = 0;
        for (idx, ch) in frac.chars().take(2).enumerate() {
            let digit = i64::from(ch.to_digit(10).ok_or_else(invalid)?);
            hundredths += digit * if idx == 0 { 10 } else { 1 };
        }
        if frac.chars().nth(2).is_some_and(|c| c >= '5') {
            hundredths += 1;
        }

        let total = parse_digits(units)?
            .checked_mul(100)
            .and_then(|v| v.checked_add(hundredths))
            .ok_or_else(overflow)?;

        Ok(Percent(apply_sign(sign, total)?))
    }
}

fn invalid() -> EngineError {
    EngineError::InvalidAmount("invalid amount".to_string())
}

fn overflow() -> EngineError {
    EngineError::InvalidAmount("amount too large".to_string())
}

/// Splits `[+-]units[.,frac]` into its parts, validating every digit.
fn split_decimal(s: &str) -> Result<(i64, &str, &str), EngineError> {
    let empty = || EngineError::InvalidAmount("empty amount".to_string());

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (-1i64, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (1i64, stripped)
    } else {
        (1i64, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let mut parts = rest.splitn(3, ['.', ',']);
    let units = parts.next().ok_or_else(invalid)?;
    let frac = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return Err(invalid());
    }

    if units.is_empty() || !units.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    Ok((sign, units, frac))
}

fn parse_digits(digits: &str) -> Result<i64, EngineError> {
    digits.parse::<i64>().map_err(|_| overflow())
}

fn apply_sign(sign: i64, value: i64) -> Result<i64, EngineError> {
    if sign < 0 {
        value.checked_neg().ok_or_else(overflow)
    } else {
        Ok(value)
    }
}
