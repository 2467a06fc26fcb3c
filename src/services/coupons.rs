//! Coupon validation, redemption and administration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::aggregates::{Coupon, CouponError};
use crate::domain::pricing::Quote;
use crate::domain::value_objects::{CouponCode, Money, Percent};
use crate::events::EventSink;
use crate::store::{Store, StoreError};
use crate::{CommerceError, Result};

use super::MAX_WRITE_ATTEMPTS;

/// A coupon that passed validation for a given subtotal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedCoupon {
    pub code: CouponCode,
    pub discount: Percent,
}

/// What the cart would cost with the coupon applied.
#[derive(Clone, Debug, Serialize)]
pub struct CouponPreview {
    pub coupon: AppliedCoupon,
    pub quote: Quote,
}

/// Terms an administrator sets on a coupon.
#[derive(Clone, Debug, Deserialize)]
pub struct CouponTerms {
    pub discount: Percent,
    pub min_purchase: Money,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: u32,
}

#[derive(Clone)]
pub struct CouponValidator {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl CouponValidator {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self { store, events, clock }
    }

    async fn find(&self, code: &str) -> Result<Coupon> {
        let code = CouponCode::new(code).map_err(|_| CouponError::Invalid)?;
        Ok(self.store.find_coupon(&code).await?.ok_or(CouponError::Invalid)?)
    }

    /// Checks usage limit, expiry and minimum purchase, in that order.
    #[instrument(skip(self))]
    pub async fn validate(&self, code: &str, subtotal: Money, now: DateTime<Utc>) -> Result<AppliedCoupon> {
        let coupon = self.find(code).await?;
        let discount = coupon.validate(subtotal, now)?;
        Ok(AppliedCoupon { code: coupon.code().clone(), discount })
    }

    /// Counts one completed order against the coupon. Never exceeds the limit.
    #[instrument(skip(self))]
    pub async fn record_usage(&self, code: &CouponCode) -> Result<u32> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut coupon = self.find(code.as_str()).await?;
            let used = coupon.record_usage()?;
            let events = coupon.take_events();
            match self.store.save_coupon(&coupon).await {
                Ok(()) => {
                    self.events.publish(events).await;
                    return Ok(used);
                }
                Err(StoreError::Conflict) => debug!(code = %code, attempt, "coupon changed concurrently, retrying"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Contention)
    }

    /// Prices the customer's cart with `code` applied, without redeeming it.
    pub async fn preview(&self, customer_id: Uuid, code: &str) -> Result<CouponPreview> {
        let cart = self.store.find_cart(customer_id).await?.filter(|c| !c.is_empty()).ok_or(CommerceError::CartEmpty)?;
        let coupon = self.validate(code, cart.quote(None)?.summary.subtotal, self.clock.now()).await?;
        let quote = cart.quote(Some(coupon.discount))?;
        Ok(CouponPreview { coupon, quote })
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub async fn coupons(&self) -> Result<Vec<Coupon>> {
        Ok(self.store.find_coupons().await?)
    }

    /// Adds a coupon. Codes are unique regardless of case.
    #[instrument(skip(self, terms))]
    pub async fn create(&self, code: &str, terms: CouponTerms) -> Result<Coupon> {
        let code = CouponCode::new(code).map_err(|_| CouponError::Invalid)?;
        let mut coupon = Coupon::new(code.clone(), terms.discount, terms.min_purchase, terms.expires_at, terms.usage_limit);
        match self.store.save_coupon(&coupon).await {
            Ok(()) => {
                coupon.version += 1;
                info!(%code, discount = terms.discount.value(), "coupon created");
                Ok(coupon)
            }
            Err(StoreError::Conflict) => Err(CouponError::AlreadyExists(code).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces a coupon's terms; its redemption count is kept.
    #[instrument(skip(self, terms))]
    pub async fn update(&self, code: &str, terms: CouponTerms) -> Result<Coupon> {
        let code = CouponCode::new(code).map_err(|_| CouponError::NotFound)?;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut coupon = self.store.find_coupon(&code).await?.ok_or(CouponError::NotFound)?;
            coupon.revise(terms.discount, terms.min_purchase, terms.expires_at, terms.usage_limit)?;
            match self.store.save_coupon(&coupon).await {
                Ok(()) => {
                    coupon.version += 1;
                    info!(%code, "coupon updated");
                    return Ok(coupon);
                }
                Err(StoreError::Conflict) => debug!(%code, attempt, "coupon changed concurrently, retrying"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Contention)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, code: &str) -> Result<()> {
        let code = CouponCode::new(code).map_err(|_| CouponError::NotFound)?;
        if !self.store.delete_coupon(&code).await? {
            return Err(CouponError::NotFound.into());
        }
        info!(%code, "coupon deleted");
        Ok(())
    }
}
