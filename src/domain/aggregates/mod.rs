//! Aggregates module
pub mod cart;
pub mod coupon;
pub mod offer;
pub mod order;
pub mod product;
pub mod wallet;

pub use cart::{Cart, CartError, CartLine};
pub use coupon::{Coupon, CouponError};
pub use offer::{best_discount, Offer, OfferTarget};
pub use order::{
    Actor, Address, Capture, GatewayCharge, ItemTransition, Order, OrderError, OrderItem, OrderStatus, OwedRefund, PaymentMethod, PaymentStatus, PendingCheckout,
};
pub use product::{InventoryError, Product, StockRequest, SubVariant, Variant};
pub use wallet::{Wallet, WalletError, WalletTransaction};
