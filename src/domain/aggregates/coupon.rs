//! Coupon Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::events::{CouponEvent, DomainEvent};
use crate::domain::value_objects::{CouponCode, Money, Percent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Coupon {
    code: CouponCode,
    discount: Percent,
    min_purchase: Money,
    expires_at: DateTime<Utc>,
    usage_limit: u32,
    used_count: u32,
    #[serde(default)]
    pub(crate) version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Coupon {
    pub fn new(code: CouponCode, discount: Percent, min_purchase: Money, expires_at: DateTime<Utc>, usage_limit: u32) -> Self {
        Self { code, discount, min_purchase, expires_at, usage_limit, used_count: 0, version: 0, events: vec![] }
    }

    pub fn code(&self) -> &CouponCode { &self.code }
    pub fn discount(&self) -> Percent { self.discount }
    pub fn min_purchase(&self) -> Money { self.min_purchase }
    pub fn expires_at(&self) -> DateTime<Utc> { self.expires_at }
    pub fn usage_limit(&self) -> u32 { self.usage_limit }
    pub fn used_count(&self) -> u32 { self.used_count }

    /// Checks, in order: usage limit, expiry, minimum purchase.
    pub fn validate(&self, subtotal: Money, now: DateTime<Utc>) -> Result<Percent, CouponError> {
        if self.used_count >= self.usage_limit { return Err(CouponError::LimitReached); }
        if now > self.expires_at { return Err(CouponError::Expired); }
        if subtotal < self.min_purchase { return Err(CouponError::MinPurchaseNotMet { min_purchase: self.min_purchase }); }
        Ok(self.discount)
    }

    /// Counts one completed order against the usage limit.
    pub fn record_usage(&mut self) -> Result<u32, CouponError> {
        if self.used_count >= self.usage_limit { return Err(CouponError::LimitReached); }
        self.used_count += 1;
        self.events.push(DomainEvent::Coupon(CouponEvent::Redeemed { code: self.code.clone(), used_count: self.used_count }));
        Ok(self.used_count)
    }

    /// Replaces the coupon's terms. Redemptions so far still count.
    pub fn revise(&mut self, discount: Percent, min_purchase: Money, expires_at: DateTime<Utc>, usage_limit: u32) -> Result<(), CouponError> {
        if usage_limit < self.used_count {
            return Err(CouponError::LimitBelowUsage { used_count: self.used_count });
        }
        self.discount = discount;
        self.min_purchase = min_purchase;
        self.expires_at = expires_at;
        self.usage_limit = usage_limit;
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon code is not valid")]
    Invalid,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    LimitReached,
    #[error("coupon needs a minimum purchase of {min_purchase}")]
    MinPurchaseNotMet { min_purchase: Money },
    #[error("coupon {0} already exists")]
    AlreadyExists(CouponCode),
    #[error("coupon not found")]
    NotFound,
    #[error("usage limit cannot drop below the {used_count} redemptions already made")]
    LimitBelowUsage { used_count: u32 },
}
