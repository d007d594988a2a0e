//! Amounts in euro cents.
//!
//! Arithmetic stays in integer cents so totals add up exactly. The remote
//! store keeps amounts as decimal euros (`29.5`), so that is also the serde
//! representation; values are rounded to the nearest cent on the way in.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cents(i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// `None` for NaN, infinities and amounts beyond the `i64` cent range.
    pub fn from_euros(euros: f64) -> Option<Self> {
        let cents = (euros * 100.0).round();
        if !cents.is_finite() || cents.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self(cents as i64))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn to_euros(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `self × factor`, rounded half away from zero to the cent.
    pub fn scale(self, factor: f64) -> Self {
        Self::from_euros(self.to_euros() * factor).unwrap_or(self)
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, Add::add)
    }
}

/// French formatting: `1 234,50 €`.
impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = (abs / 100).to_string();
        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (i, c) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push(' ');
            }
            grouped.push(c);
        }
        write!(f, "{sign}{grouped},{:02} €", abs % 100)
    }
}

impl Serialize for Cents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_euros())
    }
}

impl<'de> Deserialize<'de> for Cents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let euros = f64::deserialize(deserializer)?;
        Cents::from_euros(euros).ok_or_else(|| de::Error::custom(format!("{euros} is not a valid amount")))
    }
}
