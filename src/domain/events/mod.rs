//! Domain events
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{CouponCode, Money, OrderNumber};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Wallet(WalletEvent),
    Coupon(CouponEvent),
}

impl DomainEvent {
    /// Subject suffix used when publishing, e.g. `order.placed`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(e) => ("product", e.name()),
            Self::Order(e) => ("order", e.name()),
            Self::Wallet(e) => ("wallet", e.name()),
            Self::Coupon(e) => ("coupon", e.name()),
        };
        format!("{aggregate}.{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockReserved { product_id: Uuid, color: String, size: String, quantity: u32 },
    StockReleased { product_id: Uuid, color: String, size: String, quantity: u32 },
    Repriced { product_id: Uuid },
}

impl ProductEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::StockReserved { .. } => "stock_reserved",
            Self::StockReleased { .. } => "stock_released",
            Self::Repriced { .. } => "repriced",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_number: OrderNumber, customer_id: Uuid, total: Money },
    PaymentConfirmed { order_number: OrderNumber },
    ItemStatusChanged { order_number: OrderNumber, item_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl OrderEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::ItemStatusChanged { .. } => "item_status_changed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletEvent {
    Credited { customer_id: Uuid, amount: Money, balance: Money },
    Debited { customer_id: Uuid, amount: Money, balance: Money },
}

impl WalletEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Credited { .. } => "credited",
            Self::Debited { .. } => "debited",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponEvent {
    Redeemed { code: CouponCode, used_count: u32 },
}

impl CouponEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Redeemed { .. } => "redeemed",
        }
    }
}
