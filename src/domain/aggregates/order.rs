//! Order Aggregate
//!
//! An order owns its items; each item moves through its own status machine:
//!
//! ```text
//! Pending -> Processing -> Dispatched -> Delivered -> Return requested -> Returned
//!    \___________\_____________\--> Canceled
//! ```
//!
//! Canceled and Returned are terminal. Entering either one hands stock back
//! and, when money was collected, owes the customer a refund. The order
//! records what it owes in [`Order::owed_refunds`] until the lifecycle
//! service has credited it, so a refund that fails midway is never lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::{LinePrice, PriceSummary};
use crate::domain::value_objects::{CouponCode, Money, MoneyError, OrderNumber};

use super::product::StockRequest;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    order_number: OrderNumber,
    customer_id: Uuid,
    address: Address,
    items: Vec<OrderItem>,
    order_date: DateTime<Utc>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    coupon_code: Option<CouponCode>,
    summary: PriceSummary,
    /// Every gateway payment opened for this order, oldest first.
    #[serde(default)]
    gateway_charges: Vec<GatewayCharge>,
    #[serde(default)]
    owed_refunds: Vec<OwedRefund>,
    #[serde(default)]
    pub(crate) version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// Final unit price actually charged, after offer and coupon.
    pub discounted_unit_price: Money,
    pub offer_discount: Money,
    pub coupon_discount: Money,
    pub delivery_date: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub return_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    Cod,
    Gateway,
    Wallet,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus { #[default] Pending, Paid }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Dispatched,
    Delivered,
    Canceled,
    #[serde(rename = "Return requested")]
    ReturnRequested,
    Returned,
}

/// Who is asking for a status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor { Customer, Admin }

impl OrderStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Dispatched => 2,
            Self::Delivered => 3,
            Self::Canceled => 4,
            Self::ReturnRequested => 5,
            Self::Returned => 6,
        }
    }

    pub fn is_terminal(self) -> bool { matches!(self, Self::Canceled | Self::Returned) }

    /// Entering this status puts stock back on the shelf.
    pub fn restocks(self) -> bool { matches!(self, Self::Canceled | Self::Returned) }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Dispatched => "Dispatched",
            Self::Delivered => "Delivered",
            Self::Canceled => "Canceled",
            Self::ReturnRequested => "Return requested",
            Self::Returned => "Returned",
        }
    }

    fn is_fulfillment(self) -> bool { matches!(self, Self::Pending | Self::Processing | Self::Dispatched | Self::Delivered) }

    fn allows(self, next: Self, actor: Actor) -> bool {
        use OrderStatus::*;
        match (actor, self, next) {
            (_, Pending | Processing | Dispatched, Canceled) => true,
            (_, Delivered, ReturnRequested) => true,
            (Actor::Admin, ReturnRequested, Returned) => true,
            // admins may move forward along the fulfillment chain, skipping steps
            (Actor::Admin, from, to) => from.is_fulfillment() && to.is_fulfillment() && to.rank() > from.rank(),
            (Actor::Customer, _, _) => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Outcome of one item status change, including the compensations it owes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemTransition {
    pub item_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub restock: Option<StockRequest>,
    pub refund: Option<Money>,
}

/// One payment opened at the gateway. A retry opens a new charge; older ones
/// stay on the order so a late capture of any of them still finds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCharge {
    pub gateway_order_id: String,
    pub amount: Money,
    pub captured: bool,
}

/// Wallet credit the customer is owed, kept until it has been paid out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwedRefund {
    pub id: Uuid,
    pub amount: Money,
    pub description: String,
}

/// What a verified gateway capture did to the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
    /// The order is now paid.
    Applied,
    /// The order was already paid through another charge; the amount is owed back.
    Duplicate(Money),
    /// This charge had been captured before; nothing changed.
    AlreadyCaptured,
}

/// An online-payment order awaiting gateway confirmation. Nothing is
/// reserved or charged until the payment is verified or declared failed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub gateway_order_id: String,
    pub order: Order,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(product_id: Uuid, color: impl Into<String>, size: impl Into<String>, price: LinePrice, delivery_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_id,
            color: color.into(),
            size: size.into(),
            quantity: price.quantity,
            unit_price: price.unit_price,
            discounted_unit_price: price.final_unit_price(),
            offer_discount: price.offer_discount,
            coupon_discount: price.coupon_discount,
            delivery_date: Some(delivery_date),
            status: OrderStatus::Pending,
            return_reason: None,
        }
    }

    pub fn price(&self) -> LinePrice {
        LinePrice { unit_price: self.unit_price, offer_discount: self.offer_discount, coupon_discount: self.coupon_discount, quantity: self.quantity }
    }

    pub fn stock_request(&self) -> StockRequest {
        StockRequest { product_id: self.product_id, color: self.color.clone(), size: self.size.clone(), quantity: self.quantity }
    }

    pub fn amount_paid(&self) -> Result<Money, MoneyError> { self.discounted_unit_price.multiply(self.quantity) }
}

impl Order {
    pub fn place(
        order_number: OrderNumber,
        customer_id: Uuid,
        address: Address,
        items: Vec<OrderItem>,
        payment_method: PaymentMethod,
        coupon_code: Option<CouponCode>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let summary = PriceSummary::of(&items.iter().map(OrderItem::price).collect::<Vec<_>>())?;
        let mut order = Self {
            id: Uuid::now_v7(), order_number, customer_id, address, items, order_date: now,
            payment_method, payment_status: PaymentStatus::Pending, coupon_code, summary,
            gateway_charges: vec![], owed_refunds: vec![], version: 0, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_number: order.order_number.clone(), customer_id, total: order.total(),
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &OrderNumber { &self.order_number }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn address(&self) -> &Address { &self.address }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> { self.items.iter().find(|i| i.id == item_id) }
    pub fn order_date(&self) -> DateTime<Utc> { self.order_date }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn coupon_code(&self) -> Option<&CouponCode> { self.coupon_code.as_ref() }
    pub fn is_paid(&self) -> bool { self.payment_status == PaymentStatus::Paid }
    pub fn owed_refunds(&self) -> &[OwedRefund] { &self.owed_refunds }
    pub fn gateway_charges(&self) -> &[GatewayCharge] { &self.gateway_charges }

    /// The most recently opened gateway payment.
    pub fn gateway_order_id(&self) -> Option<&str> { self.gateway_charges.last().map(|c| c.gateway_order_id.as_str()) }

    pub fn has_gateway_order(&self, gateway_order_id: &str) -> bool {
        self.gateway_charges.iter().any(|c| c.gateway_order_id == gateway_order_id)
    }

    pub fn summary(&self) -> PriceSummary { self.summary }
    pub fn total(&self) -> Money { self.summary.total }

    /// Amount still owed for items that have not been canceled or returned.
    pub fn payable_total(&self) -> Result<Money, MoneyError> {
        let amounts = self.items.iter().filter(|i| !i.status.restocks()).map(OrderItem::amount_paid).collect::<Result<Vec<_>, _>>()?;
        Money::try_sum(amounts)
    }

    /// Whether the customer has actually been charged for this order.
    pub fn money_collected(&self) -> bool {
        match self.payment_method {
            PaymentMethod::Wallet => true,
            PaymentMethod::Gateway => self.is_paid(),
            PaymentMethod::Cod => false,
        }
    }

    pub fn all_delivered(&self) -> bool { self.items.iter().all(|i| i.status == OrderStatus::Delivered) }

    pub fn attach_gateway_order(&mut self, gateway_order_id: impl Into<String>, amount: Money) {
        self.gateway_charges.push(GatewayCharge { gateway_order_id: gateway_order_id.into(), amount, captured: false });
    }

    /// Applies a verified capture of one of this order's gateway charges.
    ///
    /// A charge that covers more than is still payable (items were canceled
    /// while it was outstanding) owes the excess back, and a second capture
    /// on an already paid order owes its whole amount back.
    pub fn capture(&mut self, gateway_order_id: &str) -> Result<Capture, OrderError> {
        let already_paid = self.is_paid();
        let payable = self.payable_total()?;
        let charge = self.gateway_charges.iter_mut().find(|c| c.gateway_order_id == gateway_order_id)
            .ok_or_else(|| OrderError::UnknownGatewayOrder(gateway_order_id.to_string()))?;
        if charge.captured { return Ok(Capture::AlreadyCaptured); }
        charge.captured = true;
        let amount = charge.amount;

        if already_paid {
            self.owe_refund(amount, format!("Refund for duplicate payment on order {}", self.order_number));
            return Ok(Capture::Duplicate(amount));
        }
        self.mark_paid();
        self.owe_refund(amount - payable, format!("Refund for canceled items on order {}", self.order_number));
        Ok(Capture::Applied)
    }

    /// Marks an owed refund as paid out. Returns whether it was still owed.
    pub fn settle_refund(&mut self, refund_id: Uuid) -> bool {
        let before = self.owed_refunds.len();
        self.owed_refunds.retain(|r| r.id != refund_id);
        self.owed_refunds.len() != before
    }

    pub fn mark_paid(&mut self) {
        if self.is_paid() { return; }
        self.payment_status = PaymentStatus::Paid;
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentConfirmed { order_number: self.order_number.clone() }));
    }

    /// Payment was accepted: every pending item moves on to processing.
    pub fn start_processing(&mut self) {
        let pending: Vec<Uuid> = self.items.iter().filter(|i| i.status == OrderStatus::Pending).map(|i| i.id).collect();
        for item_id in pending {
            self.set_status(item_id, OrderStatus::Processing);
        }
    }

    pub fn transition_item(&mut self, item_id: Uuid, next: OrderStatus, actor: Actor, now: DateTime<Utc>) -> Result<ItemTransition, OrderError> {
        let item = self.item(item_id).ok_or(OrderError::ItemNotFound(item_id))?;
        let from = item.status;
        let legal = if actor == Actor::Admin { next.rank() > from.rank() && from.allows(next, actor) } else { from.allows(next, actor) };
        if !legal {
            return Err(OrderError::InvalidTransition { from, to: next });
        }

        let restock = next.restocks().then(|| item.stock_request());
        let refund = if next.restocks() && self.money_collected() { Some(item.amount_paid()?).filter(|a| a.is_positive()) } else { None };

        self.set_status(item_id, next);
        if let Some(amount) = refund {
            let description = if next == OrderStatus::Returned { "Order returned" } else { "Order canceled" };
            self.owe_refund(amount, description.to_string());
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
            match next {
                OrderStatus::Delivered => item.delivery_date = Some(now),
                OrderStatus::Canceled => item.delivery_date = None,
                _ => {}
            }
        }
        Ok(ItemTransition { item_id, from, to: next, restock, refund })
    }

    pub fn request_return(&mut self, item_id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<ItemTransition, OrderError> {
        let reason = reason.trim();
        if reason.is_empty() { return Err(OrderError::ReturnReasonRequired); }
        let transition = self.transition_item(item_id, OrderStatus::ReturnRequested, Actor::Customer, now)?;
        if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
            item.return_reason = Some(reason.to_string());
        }
        Ok(transition)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }

    fn owe_refund(&mut self, amount: Money, description: String) {
        if !amount.is_positive() { return; }
        self.owed_refunds.push(OwedRefund { id: Uuid::now_v7(), amount, description });
    }

    fn set_status(&mut self, item_id: Uuid, to: OrderStatus) {
        let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) else { return };
        let from = std::mem::replace(&mut item.status, to);
        let order_number = self.order_number.clone();
        self.raise_event(DomainEvent::Order(OrderEvent::ItemStatusChanged { order_number, item_id, from, to }));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("order item {0} not found")]
    ItemNotFound(Uuid),
    #[error("cannot move item from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("a return reason is required")]
    ReturnReasonRequired,
    #[error("gateway order {0} does not belong to this order")]
    UnknownGatewayOrder(String),
    #[error(transparent)]
    Amount(#[from] MoneyError),
}
