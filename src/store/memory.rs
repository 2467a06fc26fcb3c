//! In-process document store.
//!
//! Documents are kept as JSON so loads and saves go through the same serde
//! path as the Postgres store.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderFilter, OrderQuery, Store, StoreError, Versioned};
use crate::domain::aggregates::{Address, Cart, Coupon, Offer, Order, PendingCheckout, Product, Wallet};
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug)]
struct Document {
    version: u64,
    body: Value,
}

#[derive(Default)]
struct Collections {
    carts: HashMap<Uuid, Document>,
    addresses: HashMap<Uuid, Vec<Address>>,
    products: HashMap<Uuid, Document>,
    orders: HashMap<Uuid, Document>,
    pending: HashMap<String, Value>,
    coupons: HashMap<String, Document>,
    wallets: HashMap<Uuid, Document>,
    offers: HashMap<Uuid, Value>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn load<T: DeserializeOwned + Versioned>(doc: &Document) -> Result<T, StoreError> {
    let mut value: T = serde_json::from_value(doc.body.clone())?;
    value.set_version(doc.version);
    Ok(value)
}

fn put<K: Eq + Hash, T: Serialize + Versioned>(map: &mut HashMap<K, Document>, key: K, value: &T) -> Result<(), StoreError> {
    let current = map.get(&key).map_or(0, |d| d.version);
    if current != value.version() {
        return Err(StoreError::Conflict);
    }
    map.insert(key, Document { version: current + 1, body: serde_json::to_value(value)? });
    Ok(())
}

fn all<K, T: DeserializeOwned + Versioned>(map: &HashMap<K, Document>) -> Result<Vec<T>, StoreError> {
    map.values().map(load).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_cart(&self, customer_id: Uuid) -> Result<Option<Cart>, StoreError> {
        self.inner.read().await.carts.get(&customer_id).map(load).transpose()
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        put(&mut self.inner.write().await.carts, cart.customer_id(), cart)
    }

    async fn find_carts_with_product(&self, product_id: Uuid) -> Result<Vec<Cart>, StoreError> {
        let carts: Vec<Cart> = all(&self.inner.read().await.carts)?;
        Ok(carts.into_iter().filter(|c| c.lines().iter().any(|l| l.product_id == product_id)).collect())
    }

    async fn find_addresses(&self, customer_id: Uuid) -> Result<Vec<Address>, StoreError> {
        Ok(self.inner.read().await.addresses.get(&customer_id).cloned().unwrap_or_default())
    }

    async fn save_addresses(&self, customer_id: Uuid, addresses: &[Address]) -> Result<(), StoreError> {
        self.inner.write().await.addresses.insert(customer_id, addresses.to_vec());
        Ok(())
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, StoreError> {
        self.inner.read().await.products.get(&product_id).map(load).transpose()
    }

    async fn find_products_in_category(&self, category_id: Uuid) -> Result<Vec<Product>, StoreError> {
        let products: Vec<Product> = all(&self.inner.read().await.products)?;
        Ok(products.into_iter().filter(|p| p.category_id() == Some(category_id)).collect())
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        put(&mut self.inner.write().await.products, product.id(), product)
    }

    async fn find_order(&self, filter: OrderFilter) -> Result<Option<Order>, StoreError> {
        let orders: Vec<Order> = all(&self.inner.read().await.orders)?;
        Ok(orders.into_iter().find(|o| match &filter {
            OrderFilter::Number(number) => o.order_number() == number,
            OrderFilter::GatewayOrderId(id) => o.has_gateway_order(id),
            OrderFilter::ItemId(item_id) => o.item(*item_id).is_some(),
        }))
    }

    async fn find_orders(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
        let orders: Vec<Order> = all(&self.inner.read().await.orders)?;
        let mut found: Vec<Order> = orders.into_iter().filter(|o| match &query {
            OrderQuery::Customer(customer_id) => o.customer_id() == *customer_id,
            OrderQuery::DeliveredBetween { from, to } => o.items().iter()
                .any(|i| i.delivery_date.is_some_and(|d| d >= *from && d <= *to)),
        }).collect();
        found.sort_by_key(|o| std::cmp::Reverse(o.order_date()));
        Ok(found)
    }

    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        put(&mut self.inner.write().await.orders, order.id(), order)
    }

    async fn save_pending_checkout(&self, checkout: &PendingCheckout) -> Result<(), StoreError> {
        let body = serde_json::to_value(checkout)?;
        self.inner.write().await.pending.insert(checkout.gateway_order_id.clone(), body);
        Ok(())
    }

    async fn take_pending_checkout(&self, gateway_order_id: &str) -> Result<Option<PendingCheckout>, StoreError> {
        let taken = self.inner.write().await.pending.remove(gateway_order_id);
        Ok(taken.map(serde_json::from_value).transpose()?)
    }

    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        self.inner.read().await.coupons.get(code.as_str()).map(load).transpose()
    }

    async fn find_coupons(&self) -> Result<Vec<Coupon>, StoreError> {
        let mut coupons: Vec<Coupon> = all(&self.inner.read().await.coupons)?;
        coupons.sort_by(|a, b| a.code().as_str().cmp(b.code().as_str()));
        Ok(coupons)
    }

    async fn save_coupon(&self, coupon: &Coupon) -> Result<(), StoreError> {
        put(&mut self.inner.write().await.coupons, coupon.code().as_str().to_string(), coupon)
    }

    async fn delete_coupon(&self, code: &CouponCode) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.coupons.remove(code.as_str()).is_some())
    }

    async fn find_wallet(&self, customer_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        self.inner.read().await.wallets.get(&customer_id).map(load).transpose()
    }

    async fn save_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        put(&mut self.inner.write().await.wallets, wallet.customer_id(), wallet)
    }

    async fn find_offers(&self) -> Result<Vec<Offer>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.offers.values().cloned().map(serde_json::from_value).collect::<Result<_, _>>()?)
    }

    async fn save_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        let body = serde_json::to_value(offer)?;
        self.inner.write().await.offers.insert(offer.id, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderItem, PaymentMethod, Variant};
    use crate::domain::value_objects::{Money, OrderNumber, Percent};

    #[tokio::test]
    async fn test_save_requires_loaded_version() {
        let store = MemoryStore::new();
        let product = Product::create("Clubmaster", None).with_variant(Variant::new("tortoise", Money::new(1200)).with_size("M", 4));
        store.save_product(&product).await.unwrap();

        let mut first = store.find_product(product.id()).await.unwrap().unwrap();
        let mut second = first.clone();
        assert_eq!(first.version, 1);

        first.reserve("tortoise", "M", 1).unwrap();
        store.save_product(&first).await.unwrap();

        second.reserve("tortoise", "M", 4).unwrap();
        let result = store.save_product(&second).await;
        assert!(matches!(result, Err(StoreError::Conflict)), "expected Conflict, got {result:?}");

        let stored = store.find_product(product.id()).await.unwrap().unwrap();
        assert_eq!(stored.available("tortoise", "M").unwrap(), 3);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_new_document_must_start_unversioned() {
        let store = MemoryStore::new();
        let mut wallet = Wallet::open(Uuid::now_v7());
        wallet.version = 3;
        assert!(matches!(store.save_wallet(&wallet).await, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn test_coupon_codes_are_unique() {
        let store = MemoryStore::new();
        let expires = chrono::Utc::now();
        let first = Coupon::new(CouponCode::new("save10").unwrap(), Percent::new(10).unwrap(), Money::new(500), expires, 5);
        store.save_coupon(&first).await.unwrap();
        let again = Coupon::new(CouponCode::new("Save10").unwrap(), Percent::new(25).unwrap(), Money::ZERO, expires, 1);
        assert!(matches!(store.save_coupon(&again).await, Err(StoreError::Conflict)));
        assert_eq!(store.find_coupons().await.unwrap().len(), 1);

        assert!(store.delete_coupon(first.code()).await.unwrap());
        assert!(!store.delete_coupon(first.code()).await.unwrap());
        assert!(store.find_coupon(first.code()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_any_gateway_charge_finds_the_order() {
        let store = MemoryStore::new();
        let price = crate::domain::pricing::LinePrice::compute(Money::new(700), None, 1, None).unwrap();
        let item = OrderItem::new(Uuid::now_v7(), "black", "M", price, chrono::Utc::now());
        let number = OrderNumber::generate(&mut rand::thread_rng());
        let mut order = Order::place(number, Uuid::now_v7(), Address::default(), vec![item], PaymentMethod::Gateway, None, chrono::Utc::now()).unwrap();
        order.attach_gateway_order("order_first", Money::new(700));
        order.attach_gateway_order("order_second", Money::new(700));
        store.save_order(&order).await.unwrap();

        for id in ["order_first", "order_second"] {
            let found = store.find_order(OrderFilter::GatewayOrderId(id.into())).await.unwrap();
            assert_eq!(found.map(|o| o.id()), Some(order.id()));
        }
        assert!(store.find_order(OrderFilter::GatewayOrderId("order_other".into())).await.unwrap().is_none());
    }
}
