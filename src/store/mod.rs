//! Persistence
//!
//! Aggregates are stored as whole documents. Every save is a compare-and-swap
//! on the aggregate's `version`: the write only lands when the stored version
//! still equals the one that was loaded, and the store bumps it on success.
//! A mismatch is reported as [`StoreError::Conflict`] and the caller reloads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Address, Cart, Coupon, Offer, Order, PendingCheckout, Product, Wallet};
use crate::domain::value_objects::{CouponCode, OrderNumber};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document was modified concurrently")]
    Conflict,

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Ways to look up a single order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderFilter {
    Number(OrderNumber),
    /// Matches any gateway payment ever opened for the order, not only the latest.
    GatewayOrderId(String),
    ItemId(Uuid),
}

/// Ways to list orders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderQuery {
    Customer(Uuid),
    /// Orders with at least one item delivered inside the range.
    DeliveredBetween { from: DateTime<Utc>, to: DateTime<Utc> },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_cart(&self, customer_id: Uuid) -> Result<Option<Cart>, StoreError>;
    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError>;
    async fn find_carts_with_product(&self, product_id: Uuid) -> Result<Vec<Cart>, StoreError>;

    async fn find_addresses(&self, customer_id: Uuid) -> Result<Vec<Address>, StoreError>;
    async fn save_addresses(&self, customer_id: Uuid, addresses: &[Address]) -> Result<(), StoreError>;

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn find_products_in_category(&self, category_id: Uuid) -> Result<Vec<Product>, StoreError>;
    async fn save_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn find_order(&self, filter: OrderFilter) -> Result<Option<Order>, StoreError>;
    async fn find_orders(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError>;
    async fn save_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn save_pending_checkout(&self, checkout: &PendingCheckout) -> Result<(), StoreError>;
    /// Removes and returns the pending checkout, so only one caller can complete it.
    async fn take_pending_checkout(&self, gateway_order_id: &str) -> Result<Option<PendingCheckout>, StoreError>;

    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError>;
    async fn find_coupons(&self) -> Result<Vec<Coupon>, StoreError>;
    /// Inserting a code that already exists is a [`StoreError::Conflict`].
    async fn save_coupon(&self, coupon: &Coupon) -> Result<(), StoreError>;
    /// Returns whether a coupon was removed.
    async fn delete_coupon(&self, code: &CouponCode) -> Result<bool, StoreError>;

    async fn find_wallet(&self, customer_id: Uuid) -> Result<Option<Wallet>, StoreError>;
    async fn save_wallet(&self, wallet: &Wallet) -> Result<(), StoreError>;

    async fn find_offers(&self) -> Result<Vec<Offer>, StoreError>;
    async fn save_offer(&self, offer: &Offer) -> Result<(), StoreError>;
}

/// Address at `index` in the customer's saved list.
pub async fn find_address(store: &dyn Store, customer_id: Uuid, index: usize) -> Result<Option<Address>, StoreError> {
    Ok(store.find_addresses(customer_id).await?.into_iter().nth(index))
}

/// Aggregates saved with an optimistic version check.
pub(crate) trait Versioned {
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

macro_rules! versioned {
    ($($ty:ty),*) => {$(
        impl Versioned for $ty {
            fn version(&self) -> u64 { self.version }
            fn set_version(&mut self, version: u64) { self.version = version; }
        }
    )*};
}

versioned!(Cart, Product, Order, Coupon, Wallet);
