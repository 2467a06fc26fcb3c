//! Storefront order lifecycle service
//!
//! Takes a customer's cart to a placed order and keeps money and stock
//! consistent for the rest of the order's life.
//!
//! ## Features
//! - Pricing with offer and coupon discounts
//! - Per-size inventory reservation with all-or-nothing checkout commits
//! - Cash on delivery, wallet and online gateway payments
//! - Per-item cancellation and returns with restock and wallet refunds
//! - Sales reporting over delivered items

use thiserror::Error;

pub mod clock;
pub mod config;
pub mod domain;
pub mod events;
pub mod gateway;
pub mod http;
pub mod services;
pub mod store;

#[cfg(test)]
mod test;

use domain::aggregates::{CartError, CouponError, InventoryError, OrderError, WalletError};
use domain::value_objects::MoneyError;
use gateway::GatewayError;
use store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("cart is empty")]
    CartEmpty,

    #[error("no saved address at index {0}")]
    InvalidAddress(usize),

    #[error("order not found")]
    OrderNotFound,

    #[error("no pending checkout for gateway order {0}")]
    PendingCheckoutNotFound(String),

    #[error("order cannot be paid again")]
    PaymentNotRetryable,

    #[error("payment signature does not match")]
    InvalidSignature,

    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,

    #[error("too many concurrent updates, try again")]
    Contention,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CommerceError>;
