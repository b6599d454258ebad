use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (item prices, tax,
/// fees, owed amounts) to avoid floating-point drift. Values cross JSON
/// boundaries as decimal numbers rounded to 2 places; conversion happens in
/// the serde impls below.
///
/// The value is signed: a negative amount only ever appears as an
/// intermediate (e.g. a fee share of `owed - items_total`).
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "$12.34");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
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

    /// Converts a decimal currency value to cents, rounding to the nearest
    /// cent.
    #[must_use]
    pub fn from_major(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }

    /// Returns the amount as a decimal currency value.
    #[must_use]
    pub fn to_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Lossy coercion from free-form extractor output.
    ///
    /// Strips every character except digits, comma, and period, treats a
    /// comma as the decimal separator, then parses the longest numeric
    /// prefix. Anything unparseable coerces to zero; callers log the event
    /// as a data-quality note rather than failing.
    #[must_use]
    pub fn coerce_lossy(raw: &str) -> Self {
        let mut cleaned = String::with_capacity(raw.len());
        for c in raw.chars() {
            if c.is_ascii_digit() || c == ',' || c == '.' {
                cleaned.push(if c == ',' { '.' } else { c });
            }
        }

        // Longest valid numeric prefix: digits with at most one dot.
        let mut prefix = String::with_capacity(cleaned.len());
        let mut seen_dot = false;
        for c in cleaned.chars() {
            match c {
                '.' if seen_dot => break,
                '.' => {
                    seen_dot = true;
                    prefix.push(c);
                }
                _ => prefix.push(c),
            }
        }

        match prefix.parse::<f64>() {
            Ok(value) => Self::from_major(value),
            Err(_) => Self::ZERO,
        }
    }

    /// Splits the amount into `n` near-equal shares that sum back exactly.
    ///
    /// Shares differ by at most one cent; the first `amount % n` shares carry
    /// the extra cent. Callers decide what "first" means (participant-list
    /// order in the allocation).
    #[must_use]
    pub fn split_even(self, n: usize) -> Vec<MoneyCents> {
        if n == 0 {
            return Vec::new();
        }
        let n = n as i64;
        let base = self.0.div_euclid(n);
        let rem = self.0.rem_euclid(n);
        (0..n)
            .map(|i| MoneyCents(base + i64::from(i < rem)))
            .collect()
    }

    /// Divides by `n`, rounding to the nearest cent. Display value only:
    /// the allocation uses [`MoneyCents::split_even`] for the actual shares.
    #[must_use]
    pub fn div_round(self, n: usize) -> MoneyCents {
        if n == 0 {
            return self;
        }
        MoneyCents((self.0 as f64 / n as f64).round() as i64)
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let dollars = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}${dollars}.{cents:02}")
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a MoneyCents> for MoneyCents {
    fn sum<I: Iterator<Item = &'a MoneyCents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for MoneyCents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_major())
    }
}

impl<'de> Deserialize<'de> for MoneyCents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Self::from_major(value))
    }
}
