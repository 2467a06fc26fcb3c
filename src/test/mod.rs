//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::aggregates::{Address, Coupon, Order, OrderItem, PaymentMethod, Product, Variant};
use crate::domain::events::DomainEvent;
use crate::domain::pricing::LinePrice;
use crate::domain::value_objects::{CouponCode, Money, OrderNumber, Percent};
use crate::events::EventSink;
use crate::gateway::{self, GatewayError, GatewayOrder, PaymentGateway};
use crate::services::{AddLine, CheckoutSettings, PaymentConfirmation, Services};
use crate::store::{MemoryStore, Store};

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl Default for FixedClock {
    fn default() -> Self {
        Self { at: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()) }
    }
}

impl FixedClock {
    pub fn now(&self) -> DateTime<Utc> { *self.at.lock().unwrap() }

    pub fn advance(&self, by: Duration) {
        *self.at.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { *self.at.lock().unwrap() }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    pub fn subjects(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(DomainEvent::subject).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, events: Vec<DomainEvent>) {
        self.events.lock().unwrap().extend(events);
    }
}

/// In-process gateway that signs with a fixed secret.
#[derive(Debug, Default)]
pub struct FakeGateway {
    issued: AtomicU64,
}

impl FakeGateway {
    const SECRET: &'static [u8] = b"test_key_secret";

    /// What the browser would relay after a successful payment.
    pub fn confirmation(&self, gateway_order_id: &str, gateway_payment_id: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            gateway_order_id: gateway_order_id.to_string(),
            gateway_payment_id: gateway_payment_id.to_string(),
            signature: gateway::sign(Self::SECRET, gateway_order_id, gateway_payment_id).unwrap(),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, amount_minor: i64, currency: &str, _receipt: &str) -> Result<GatewayOrder, GatewayError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder { id: format!("order_test{n}"), amount: amount_minor, currency: currency.to_string() })
    }

    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        gateway::verify(Self::SECRET, gateway_order_id, gateway_payment_id, signature)
    }
}

/// A customer with one saved address, backed by the in-memory store.
pub struct TestContext {
    pub customer: Uuid,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub sink: Arc<RecordingSink>,
    pub gateway: Arc<FakeGateway>,
    pub services: Services,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::default());
        let sink = Arc::new(RecordingSink::default());
        let gateway = Arc::new(FakeGateway::default());
        let customer = Uuid::now_v7();
        store.save_addresses(customer, &[address()]).await.unwrap();

        let services = Services::new(store.clone(), gateway.clone(), sink.clone(), clock.clone(), CheckoutSettings::default());
        Self { customer, store, clock, sink, gateway, services }
    }

    pub fn replace_gateway(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.services = Services::new(self.store.clone(), gateway, self.sink.clone(), self.clock.clone(), CheckoutSettings::default());
    }

    pub fn services_with_store(&self, store: Arc<dyn Store>) -> Services {
        Services::new(store, self.gateway.clone(), self.sink.clone(), self.clock.clone(), CheckoutSettings::default())
    }

    /// A red frame listed at 1000 with an offer price of 900, `stock` units in size M.
    pub async fn seed_product(&self, stock: u32) -> Product {
        let mut variant = Variant::new("red", Money::new(1000)).with_size("M", stock);
        variant.discount_price = Some(Money::new(900));
        let product = Product::create("Clubmaster", None).with_variant(variant);
        self.store.save_product(&product).await.unwrap();
        product
    }

    pub async fn seed_coupon(&self, code: &str, discount: u32, min_purchase: i64, usage_limit: u32) -> Coupon {
        let coupon = Coupon::new(
            CouponCode::new(code).unwrap(), Percent::new(discount).unwrap(), Money::new(min_purchase),
            self.clock.now() + Duration::days(30), usage_limit,
        );
        self.store.save_coupon(&coupon).await.unwrap();
        coupon
    }

    pub async fn add_to_cart(&self, product: &Product, size: &str, quantity: u32) {
        let line = AddLine { product_id: product.id(), color: "red".into(), size: size.into(), quantity };
        self.services.carts.add_line(self.customer, line).await.unwrap();
    }

    pub async fn stock(&self, product: &Product, size: &str) -> u32 {
        self.store.find_product(product.id()).await.unwrap().unwrap().available("red", size).unwrap()
    }

    pub async fn coupon_uses(&self, code: &str) -> u32 {
        self.store.find_coupon(&CouponCode::new(code).unwrap()).await.unwrap().unwrap().used_count()
    }

    /// An unsaved cash-on-delivery order for `quantity` red/M units.
    pub fn draft_order(&self, product_id: Uuid, quantity: u32) -> Order {
        let now = self.clock.now();
        let price = LinePrice::compute(Money::new(1000), Some(Money::new(900)), quantity, None).unwrap();
        let item = OrderItem::new(product_id, "red", "M", price, now + Duration::days(3));
        let number = OrderNumber::generate(&mut rand::thread_rng());
        Order::place(number, self.customer, address(), vec![item], PaymentMethod::Cod, None, now).unwrap()
    }
}

pub fn address() -> Address {
    Address {
        id: Uuid::now_v7(),
        name: "Asha Rao".into(),
        phone: "9800000000".into(),
        line1: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        postal_code: "560001".into(),
        ..Address::default()
    }
}
