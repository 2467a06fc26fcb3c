//! Order Lifecycle
//!
//! Turns a cart into an order and drives every later item status change.
//!
//! Checkout commits are all-or-nothing across stock: every line is reserved
//! before the order is saved, and a failure at any point hands back what was
//! already taken. Online payments are deferred: the draft order waits in a
//! [`PendingCheckout`] until the gateway payment is verified or reported as
//! failed, and only then is stock reserved and the order saved.
//!
//! Saved orders change through version-checked read-modify-write cycles that
//! retry on a conflict. Refunds are recorded on the order before any wallet
//! is credited and cleared afterwards, so one that fails stays visible and
//! can be settled later.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::aggregates::{
    Actor, Capture, InventoryError, ItemTransition, Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PendingCheckout, StockRequest,
};
use crate::domain::value_objects::{Money, OrderNumber};
use crate::events::EventSink;
use crate::gateway::PaymentGateway;
use crate::store::{find_address, OrderFilter, OrderQuery, Store, StoreError};
use crate::{CommerceError, Result};

use super::{CheckoutSettings, CouponValidator, InventoryLedger, WalletLedger, MAX_WRITE_ATTEMPTS};

/// Attempts at drawing an unused order number.
pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 16;

#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: Uuid,
    pub address_index: usize,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// What the browser needs to open the gateway's payment form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub order_number: OrderNumber,
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Cash on delivery or wallet: the order is committed.
    Placed { order: Order },
    /// Online payment: nothing is committed until the payment is verified.
    AwaitingPayment { payment: PaymentIntent },
}

/// The gateway's success callback, as relayed by the browser.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentConfirmation {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Confirmed { order: Order },
    /// The payment had already been applied; nothing changed.
    AlreadyPaid { order: Order },
    /// The order was paid through another charge, so this one goes back to the wallet.
    Refunded { order: Order, amount: Money },
}

impl VerifyOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Confirmed { order } | Self::AlreadyPaid { order } | Self::Refunded { order, .. } => order,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusChange {
    pub order: Order,
    pub transition: ItemTransition,
}

#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    inventory: InventoryLedger,
    coupons: CouponValidator,
    wallet: WalletLedger,
    settings: CheckoutSettings,
}

impl OrderLifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        inventory: InventoryLedger,
        coupons: CouponValidator,
        wallet: WalletLedger,
        settings: CheckoutSettings,
    ) -> Self {
        Self { store, gateway, events, clock, inventory, coupons, wallet, settings }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, method = ?request.payment_method))]
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<CheckoutOutcome> {
        let now = self.clock.now();
        let customer_id = request.customer_id;

        let cart = self.store.find_cart(customer_id).await?.filter(|c| !c.is_empty()).ok_or(CommerceError::CartEmpty)?;
        let address = find_address(self.store.as_ref(), customer_id, request.address_index).await?
            .ok_or(CommerceError::InvalidAddress(request.address_index))?;

        let coupon = match request.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.coupons.validate(code, cart.quote(None)?.summary.subtotal, now).await?),
            None => None,
        };
        let quote = cart.quote(coupon.as_ref().map(|c| c.discount))?;
        let delivery_date = now + Duration::days(self.settings.delivery_days);
        let items: Vec<OrderItem> = cart.lines().iter().zip(quote.lines)
            .map(|(line, price)| OrderItem::new(line.product_id, line.color.as_str(), line.size.as_str(), price, delivery_date))
            .collect();

        let order_number = self.allocate_order_number().await?;
        let mut order = Order::place(order_number, customer_id, address, items, request.payment_method, coupon.map(|c| c.code), now)?;
        let requests = stock_requests(&order);

        match request.payment_method {
            PaymentMethod::Cod => Ok(CheckoutOutcome::Placed { order: self.commit(order, true).await? }),
            PaymentMethod::Wallet => {
                self.inventory.check(&requests).await?;
                let total = order.total();
                if total.is_positive() {
                    self.wallet.debit(customer_id, total, &format!("Payment for order {}", order.order_number())).await?;
                }
                order.mark_paid();
                match self.commit(order.clone(), true).await {
                    Ok(order) => Ok(CheckoutOutcome::Placed { order }),
                    Err(e) => {
                        self.refund_unfulfilled(&order).await;
                        Err(e)
                    }
                }
            }
            PaymentMethod::Gateway => {
                self.inventory.check(&requests).await?;
                let payment = self.open_payment(&order, order.total()).await?;
                order.attach_gateway_order(payment.gateway_order_id.as_str(), payment.total);
                let checkout = PendingCheckout { gateway_order_id: payment.gateway_order_id.clone(), order, created_at: now };
                self.store.save_pending_checkout(&checkout).await?;
                info!(order_number = %payment.order_number, gateway_order_id = %payment.gateway_order_id, "awaiting gateway payment");
                Ok(CheckoutOutcome::AwaitingPayment { payment })
            }
        }
    }

    /// Applies a verified gateway payment. Safe to call more than once.
    #[instrument(skip(self, confirmation), fields(gateway_order_id = %confirmation.gateway_order_id))]
    pub async fn verify_payment(&self, confirmation: &PaymentConfirmation) -> Result<VerifyOutcome> {
        if !self.gateway.verify_signature(&confirmation.gateway_order_id, &confirmation.gateway_payment_id, &confirmation.signature) {
            warn!("payment signature mismatch");
            return Err(CommerceError::InvalidSignature);
        }
        let gateway_order_id = confirmation.gateway_order_id.as_str();

        if let Some(order) = self.store.find_order(OrderFilter::GatewayOrderId(gateway_order_id.to_string())).await? {
            if order.gateway_charges().iter().any(|c| c.gateway_order_id == gateway_order_id && c.captured) {
                debug!(order_number = %order.order_number(), "payment already applied");
                return Ok(VerifyOutcome::AlreadyPaid { order });
            }
            return self.capture_saved(gateway_order_id).await;
        }

        let checkout = self.store.take_pending_checkout(gateway_order_id).await?
            .ok_or_else(|| CommerceError::PendingCheckoutNotFound(gateway_order_id.to_string()))?;
        let mut order = checkout.order;
        order.capture(gateway_order_id)?;
        match self.commit(order.clone(), true).await {
            Ok(order) => Ok(VerifyOutcome::Confirmed { order }),
            Err(e) => {
                self.refund_unfulfilled(&order).await;
                Err(e)
            }
        }
    }

    /// The gateway reported a failed payment: keep the order, unpaid, so the
    /// customer can retry from their order history.
    #[instrument(skip(self))]
    pub async fn record_payment_failure(&self, gateway_order_id: &str) -> Result<Order> {
        if let Some(order) = self.store.find_order(OrderFilter::GatewayOrderId(gateway_order_id.to_string())).await? {
            return Ok(order);
        }
        let checkout = self.store.take_pending_checkout(gateway_order_id).await?
            .ok_or_else(|| CommerceError::PendingCheckoutNotFound(gateway_order_id.to_string()))?;
        self.commit(checkout.order, false).await
    }

    /// Opens a new gateway payment for an unpaid online order. Earlier
    /// payments stay attached, so a late success on one of them still counts.
    #[instrument(skip(self))]
    pub async fn retry_payment(&self, customer_id: Uuid, order_number: &OrderNumber) -> Result<PaymentIntent> {
        let order = self.customer_order(customer_id, order_number).await?;
        let amount = order.payable_total()?;
        if order.payment_method() != PaymentMethod::Gateway || order.is_paid() || !amount.is_positive() {
            return Err(CommerceError::PaymentNotRetryable);
        }
        let payment = self.open_payment(&order, amount).await?;
        let gateway_order_id = payment.gateway_order_id.as_str();
        self.update_order(OrderFilter::Number(order_number.clone()), Some(customer_id), |order| {
            if order.is_paid() { return Err(CommerceError::PaymentNotRetryable); }
            order.attach_gateway_order(gateway_order_id, amount);
            Ok(())
        }).await?;
        info!(%order_number, %gateway_order_id, "payment retry opened");
        Ok(payment)
    }

    // =========================================================================
    // Item status
    // =========================================================================

    pub async fn cancel_item(&self, customer_id: Uuid, item_id: Uuid) -> Result<StatusChange> {
        let now = self.clock.now();
        self.transition(item_id, Some(customer_id), |order| order.transition_item(item_id, OrderStatus::Canceled, Actor::Customer, now)).await
    }

    pub async fn request_return(&self, customer_id: Uuid, item_id: Uuid, reason: &str) -> Result<StatusChange> {
        let now = self.clock.now();
        self.transition(item_id, Some(customer_id), |order| order.request_return(item_id, reason, now)).await
    }

    /// Admin status change: forward only, along legal edges.
    pub async fn update_item_status(&self, item_id: Uuid, status: OrderStatus) -> Result<StatusChange> {
        let now = self.clock.now();
        self.transition(item_id, None, |order| order.transition_item(item_id, status, Actor::Admin, now)).await
    }

    pub async fn approve_return(&self, item_id: Uuid) -> Result<StatusChange> {
        self.update_item_status(item_id, OrderStatus::Returned).await
    }

    /// Credits every refund the order still owes. Refunds that fail again
    /// stay on the returned order.
    #[instrument(skip(self))]
    pub async fn settle_refunds(&self, order_number: &OrderNumber) -> Result<Order> {
        let order = self.order(order_number).await?;
        Ok(self.pay_owed_refunds(order).await)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>> {
        Ok(self.store.find_orders(OrderQuery::Customer(customer_id)).await?)
    }

    pub async fn customer_order(&self, customer_id: Uuid, order_number: &OrderNumber) -> Result<Order> {
        self.store.find_order(OrderFilter::Number(order_number.clone())).await?
            .filter(|o| o.customer_id() == customer_id)
            .ok_or(CommerceError::OrderNotFound)
    }

    pub async fn order(&self, order_number: &OrderNumber) -> Result<Order> {
        self.store.find_order(OrderFilter::Number(order_number.clone())).await?.ok_or(CommerceError::OrderNotFound)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn allocate_order_number(&self) -> Result<OrderNumber> {
        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            let candidate = OrderNumber::generate(&mut rand::thread_rng());
            if self.store.find_order(OrderFilter::Number(candidate.clone())).await?.is_none() {
                return Ok(candidate);
            }
            debug!(%candidate, attempt, "order number taken");
        }
        Err(CommerceError::OrderNumberExhausted)
    }

    async fn open_payment(&self, order: &Order, total: Money) -> Result<PaymentIntent> {
        let amount_minor = total.to_minor_units()?;
        let gateway_order = self.gateway.create_order(amount_minor, &self.settings.currency, order.order_number().as_str()).await?;
        Ok(PaymentIntent {
            order_number: order.order_number().clone(),
            gateway_order_id: gateway_order.id,
            amount_minor: gateway_order.amount,
            currency: gateway_order.currency,
            total,
        })
    }

    /// Loads one order, applies `change` and saves it. A version conflict
    /// reloads and applies `change` again; events go out once a save lands.
    async fn update_order<T, F>(&self, filter: OrderFilter, owner: Option<Uuid>, mut change: F) -> Result<(Order, T)>
    where
        F: FnMut(&mut Order) -> Result<T> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut order = self.store.find_order(filter.clone()).await?
                .filter(|o| owner.map_or(true, |customer_id| o.customer_id() == customer_id))
                .ok_or(CommerceError::OrderNotFound)?;
            let outcome = change(&mut order)?;
            let events = order.take_events();
            match self.store.save_order(&order).await {
                Ok(()) => {
                    order.version += 1;
                    self.events.publish(events).await;
                    return Ok((order, outcome));
                }
                Err(StoreError::Conflict) => debug!(?filter, attempt, "order changed concurrently, retrying"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Contention)
    }

    /// A capture on an order that is already saved: a retried payment, or a
    /// late success on a payment that was reported as failed.
    async fn capture_saved(&self, gateway_order_id: &str) -> Result<VerifyOutcome> {
        let (order, capture) = self.update_order(OrderFilter::GatewayOrderId(gateway_order_id.to_string()), None, |order| {
            let capture = order.capture(gateway_order_id)?;
            if capture == Capture::Applied { order.start_processing(); }
            Ok(capture)
        }).await?;

        match capture {
            Capture::AlreadyCaptured => Ok(VerifyOutcome::AlreadyPaid { order }),
            Capture::Applied => {
                info!(order_number = %order.order_number(), "gateway payment applied to saved order");
                Ok(VerifyOutcome::Confirmed { order: self.pay_owed_refunds(order).await })
            }
            Capture::Duplicate(amount) => {
                warn!(order_number = %order.order_number(), %amount, "order paid twice, refunding the second payment");
                Ok(VerifyOutcome::Refunded { order: self.pay_owed_refunds(order).await, amount })
            }
        }
    }

    /// Reserves stock for every item, then saves the order. Any failure
    /// releases what was reserved and nothing is saved. Cart cleanup and
    /// coupon usage run after the order is safe and only log on failure.
    async fn commit(&self, mut order: Order, accepted: bool) -> Result<Order> {
        let reservations = self.inventory.reserve_all(&stock_requests(&order)).await?;

        if accepted { order.start_processing(); }
        let events = order.take_events();
        if let Err(e) = self.store.save_order(&order).await {
            warn!(order_number = %order.order_number(), error = %e, "order save failed, releasing stock");
            reservations.rollback().await;
            return Err(e.into());
        }
        reservations.commit();
        order.version += 1;
        self.events.publish(events).await;

        self.remove_ordered_lines(&order).await;
        if let Some(code) = order.coupon_code().cloned() {
            match self.coupons.record_usage(&code).await {
                Ok(used) => debug!(%code, used, "coupon usage recorded"),
                Err(e) => warn!(%code, error = %e, "coupon usage not recorded"),
            }
        }

        info!(order_number = %order.order_number(), total = %order.total(), method = ?order.payment_method(), paid = order.is_paid(), "order committed");
        Ok(order)
    }

    /// Takes the ordered lines out of the customer's cart. Lines added after
    /// the order was priced stay.
    async fn remove_ordered_lines(&self, order: &Order) {
        let customer_id = order.customer_id();
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut cart = match self.store.find_cart(customer_id).await {
                Ok(Some(cart)) => cart,
                Ok(None) => return,
                Err(e) => {
                    warn!(%customer_id, error = %e, "cart not cleared after checkout");
                    return;
                }
            };
            let mut removed = false;
            for item in order.items() {
                removed |= cart.remove_stock(item.product_id, &item.color, &item.size);
            }
            if !removed { return; }
            match self.store.save_cart(&cart).await {
                Ok(()) => return,
                Err(StoreError::Conflict) => debug!(%customer_id, attempt, "cart changed concurrently, retrying"),
                Err(e) => {
                    warn!(%customer_id, error = %e, "cart not cleared after checkout");
                    return;
                }
            }
        }
        warn!(%customer_id, "cart not cleared after checkout, too many concurrent updates");
    }

    /// Money was taken for an order that could not be committed.
    async fn refund_unfulfilled(&self, order: &Order) {
        let total = order.total();
        if !total.is_positive() { return; }
        let description = format!("Refund for unfulfilled order {}", order.order_number());
        match self.wallet.credit(order.customer_id(), total, &description).await {
            Ok(_) => warn!(order_number = %order.order_number(), %total, "payment refunded to wallet"),
            Err(e) => error!(order_number = %order.order_number(), %total, error = %e, "could not refund unfulfilled order"),
        }
    }

    /// Credits each owed refund, then clears it from the order. The wallet
    /// skips a refund it has already credited, so a clear that fails is
    /// repaired by the next settlement.
    async fn pay_owed_refunds(&self, mut order: Order) -> Order {
        for refund in order.owed_refunds().to_vec() {
            if let Err(e) = self.wallet.credit_refund(order.customer_id(), refund.amount, &refund.description, refund.id).await {
                error!(order_number = %order.order_number(), refund_id = %refund.id, amount = %refund.amount, error = %e, "refund left owed");
                continue;
            }
            let cleared = self.update_order(OrderFilter::Number(order.order_number().clone()), None, |o| Ok(o.settle_refund(refund.id))).await;
            match cleared {
                Ok((updated, _)) => order = updated,
                Err(e) => warn!(order_number = %order.order_number(), refund_id = %refund.id, error = %e, "refund credited but still listed as owed"),
            }
        }
        order
    }

    /// Saves the status change, pays any refund it owes, then restocks.
    async fn transition<F>(&self, item_id: Uuid, owner: Option<Uuid>, mut change: F) -> Result<StatusChange>
    where
        F: FnMut(&mut Order) -> std::result::Result<ItemTransition, OrderError> + Send,
    {
        let (order, transition) = self.update_order(OrderFilter::ItemId(item_id), owner, |order| Ok(change(order)?)).await?;
        info!(order_number = %order.order_number(), %item_id, from = %transition.from, to = %transition.to, "item status changed");
        let order = self.pay_owed_refunds(order).await;

        if let Some(request) = &transition.restock {
            match self.inventory.release(request).await {
                Ok(()) => {}
                Err(CommerceError::Inventory(e)) if matches!(e,
                    InventoryError::ProductNotFound(_) | InventoryError::VariantNotFound { .. } | InventoryError::SubvariantNotFound { .. }) =>
                {
                    warn!(%item_id, error = %e, "item not restocked, no longer in catalog");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(StatusChange { order, transition })
    }
}

fn stock_requests(order: &Order) -> Vec<StockRequest> {
    order.items().iter().map(OrderItem::stock_request).collect()
}
