//! Monetary amounts.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Amount in the smallest currency unit (e.g. cents).
///
/// The CRM is single-currency, so no currency code is carried.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parse a decimal string such as `"10.99"`, `"500"` or `"3.5"`.
    ///
    /// At most two fractional digits are accepted; negative amounts are rejected.
    pub fn parse_decimal(s: &str) -> DomainResult<Self> {
        let s = s.trim();
        let invalid = || DomainError::validation(format!("invalid amount: {s:?}"));

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 2 || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Convert a floating-point amount (as some JSON producers emit it),
    /// rounding to the nearest cent.
    pub fn from_f64(amount: f64) -> DomainResult<Self> {
        let cents = (amount * 100.0).round();
        if !cents.is_finite() || cents < 0.0 || cents >= u64::MAX as f64 {
            return Err(DomainError::validation(format!("invalid amount: {amount}")));
        }
        Ok(Self(cents as u64))
    }

    /// Mean of `count` amounts totalling `self`, rounded half-up to the cent.
    pub fn average(&self, count: u64) -> Money {
        if count == 0 {
            return Money::ZERO;
        }
        let (quotient, remainder) = (self.0 / count, self.0 % count);
        // Half-up without computing `self.0 + count / 2`.
        if remainder >= count - remainder {
            Money(quotient + 1)
        } else {
            Money(quotient)
        }
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
