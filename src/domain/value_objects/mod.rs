//! Value Objects for the storefront

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Neg, Sub};
use thiserror::Error;

/// Coupon code value object. Codes compare case-insensitively, so the
/// canonical form is trimmed and upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        if value.len() > 32 { return Err(CouponCodeError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponCodeError {
    #[error("coupon code is empty")]
    Empty,
    #[error("coupon code is too long")]
    TooLong,
}

/// Money value object, in whole units of the store currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(amount: i64) -> Self { Self(amount) }
    pub const fn amount(self) -> i64 { self.0 }
    pub fn is_positive(self) -> bool { self.0 > 0 }

    pub fn checked_add(self, rhs: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(rhs.0).map(Money).ok_or(MoneyError::Overflow)
    }

    pub fn multiply(self, qty: u32) -> Result<Money, MoneyError> {
        self.0.checked_mul(i64::from(qty)).map(Money).ok_or(MoneyError::Overflow)
    }

    /// `floor(self * pct / 100)`.
    pub fn percent_floor(self, pct: Percent) -> Result<Money, MoneyError> {
        let scaled = self.0.checked_mul(i64::from(pct.value())).ok_or(MoneyError::Overflow)?;
        Ok(Money(scaled.div_euclid(100)))
    }

    pub fn try_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, MoneyError> {
        amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }

    /// Amount in minor currency units (x100), as the payment gateway expects.
    pub fn to_minor_units(self) -> Result<i64, MoneyError> {
        self.0.checked_mul(100).ok_or(MoneyError::Overflow)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money { Money(-self.0) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount is out of range")]
    Overflow,
}

/// Whole-number percentage in `0..=100`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Percent(u8);

impl Percent {
    pub fn new(value: u32) -> Result<Self, PercentError> {
        u8::try_from(value).ok().filter(|v| *v <= 100).map(Self).ok_or(PercentError::OutOfRange(value))
    }
    pub fn value(self) -> u8 { self.0 }
    pub fn complement(self) -> Percent { Percent(100 - self.0) }
}

impl TryFrom<u32> for Percent {
    type Error = PercentError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Percent> for u32 {
    fn from(p: Percent) -> Self { u32::from(p.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PercentError {
    #[error("percentage {0} is outside 0..=100")]
    OutOfRange(u32),
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Externally visible order number: ten decimal digits, never starting with 0.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    const LOW: u64 = 1_000_000_000;
    const HIGH: u64 = 9_999_999_999;

    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(Self::LOW..=Self::HIGH).to_string())
    }

    pub fn parse(value: &str) -> Result<Self, OrderNumberError> {
        if value.len() != 10 || !value.bytes().all(|b| b.is_ascii_digit()) || value.starts_with('0') {
            return Err(OrderNumberError(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<OrderNumber> for String {
    fn from(n: OrderNumber) -> Self { n.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid order number {0:?}")]
pub struct OrderNumberError(String);
