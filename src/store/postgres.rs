//! Postgres document store
//!
//! One JSONB document per aggregate plus a `version` column. New documents
//! are inserted with version 1; updates match on the loaded version and bump
//! it, so a concurrent writer shows up as zero affected rows.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{OrderFilter, OrderQuery, Store, StoreError, Versioned};
use crate::domain::aggregates::{Address, Cart, Coupon, Offer, Order, PendingCheckout, Product, Wallet};
use crate::domain::value_objects::CouponCode;

type Row<T> = (i64, Json<T>);

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(sqlx::Error::from)?;
        Ok(())
    }
}

fn hydrate<T: Versioned>((version, Json(mut doc)): Row<T>) -> T {
    doc.set_version(version as u64);
    doc
}

fn written(result: PgQueryResult) -> Result<(), StoreError> {
    if result.rows_affected() == 0 { Err(StoreError::Conflict) } else { Ok(()) }
}

const ORDER_BY_NUMBER: &str = "SELECT version, doc FROM orders WHERE order_number = $1";
const ORDER_BY_GATEWAY_ID: &str = "SELECT version, doc FROM orders WHERE doc->'gateway_charges' @> jsonb_build_array(jsonb_build_object('gateway_order_id', $1::text))";
const ORDER_BY_ITEM: &str = "SELECT version, doc FROM orders WHERE doc->'items' @> jsonb_build_array(jsonb_build_object('id', $1::text))";
const ORDERS_FOR_CUSTOMER: &str = "SELECT version, doc FROM orders WHERE customer_id = $1 ORDER BY order_date DESC";
const ORDERS_DELIVERED_BETWEEN: &str = "SELECT version, doc FROM orders WHERE EXISTS (\
    SELECT 1 FROM jsonb_array_elements(doc->'items') AS item \
    WHERE (item->>'delivery_date')::timestamptz BETWEEN $1 AND $2) ORDER BY order_date DESC";

#[async_trait]
impl Store for PgStore {
    async fn find_cart(&self, customer_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, Row<Cart>>("SELECT version, doc FROM carts WHERE customer_id = $1")
            .bind(customer_id).fetch_optional(&self.pool).await?;
        Ok(row.map(hydrate))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        let result = if cart.version() == 0 {
            sqlx::query("INSERT INTO carts (customer_id, version, doc, updated_at) VALUES ($1, 1, $2, NOW()) ON CONFLICT DO NOTHING")
                .bind(cart.customer_id()).bind(Json(cart)).execute(&self.pool).await?
        } else {
            sqlx::query("UPDATE carts SET version = version + 1, doc = $2, updated_at = NOW() WHERE customer_id = $1 AND version = $3")
                .bind(cart.customer_id()).bind(Json(cart)).bind(cart.version() as i64).execute(&self.pool).await?
        };
        written(result)
    }

    async fn find_carts_with_product(&self, product_id: Uuid) -> Result<Vec<Cart>, StoreError> {
        let rows = sqlx::query_as::<_, Row<Cart>>("SELECT version, doc FROM carts WHERE doc->'lines' @> jsonb_build_array(jsonb_build_object('product_id', $1::text))")
            .bind(product_id.to_string()).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn find_addresses(&self, customer_id: Uuid) -> Result<Vec<Address>, StoreError> {
        let row = sqlx::query_as::<_, (Json<Vec<Address>>,)>("SELECT doc FROM addresses WHERE customer_id = $1")
            .bind(customer_id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(addresses),)| addresses).unwrap_or_default())
    }

    async fn save_addresses(&self, customer_id: Uuid, addresses: &[Address]) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO addresses (customer_id, doc) VALUES ($1, $2) ON CONFLICT (customer_id) DO UPDATE SET doc = EXCLUDED.doc")
            .bind(customer_id).bind(Json(addresses)).execute(&self.pool).await?;
        Ok(())
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Row<Product>>("SELECT version, doc FROM products WHERE id = $1")
            .bind(product_id).fetch_optional(&self.pool).await?;
        Ok(row.map(hydrate))
    }

    async fn find_products_in_category(&self, category_id: Uuid) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, Row<Product>>("SELECT version, doc FROM products WHERE category_id = $1")
            .bind(category_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        let result = if product.version() == 0 {
            sqlx::query("INSERT INTO products (id, category_id, version, doc, updated_at) VALUES ($1, $2, 1, $3, NOW()) ON CONFLICT DO NOTHING")
                .bind(product.id()).bind(product.category_id()).bind(Json(product)).execute(&self.pool).await?
        } else {
            sqlx::query("UPDATE products SET version = version + 1, category_id = $2, doc = $3, updated_at = NOW() WHERE id = $1 AND version = $4")
                .bind(product.id()).bind(product.category_id()).bind(Json(product)).bind(product.version() as i64)
                .execute(&self.pool).await?
        };
        written(result)
    }

    async fn find_order(&self, filter: OrderFilter) -> Result<Option<Order>, StoreError> {
        let query = match &filter {
            OrderFilter::Number(number) => sqlx::query_as::<_, Row<Order>>(ORDER_BY_NUMBER).bind(number.as_str().to_string()),
            OrderFilter::GatewayOrderId(id) => sqlx::query_as::<_, Row<Order>>(ORDER_BY_GATEWAY_ID).bind(id.clone()),
            OrderFilter::ItemId(item_id) => sqlx::query_as::<_, Row<Order>>(ORDER_BY_ITEM).bind(item_id.to_string()),
        };
        Ok(query.fetch_optional(&self.pool).await?.map(hydrate))
    }

    async fn find_orders(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
        let rows = match query {
            OrderQuery::Customer(customer_id) => sqlx::query_as::<_, Row<Order>>(ORDERS_FOR_CUSTOMER)
                .bind(customer_id).fetch_all(&self.pool).await?,
            OrderQuery::DeliveredBetween { from, to } => sqlx::query_as::<_, Row<Order>>(ORDERS_DELIVERED_BETWEEN)
                .bind(from).bind(to).fetch_all(&self.pool).await?,
        };
        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        let result = if order.version() == 0 {
            sqlx::query("INSERT INTO orders (id, order_number, customer_id, gateway_order_id, order_date, version, doc) VALUES ($1, $2, $3, $4, $5, 1, $6) ON CONFLICT DO NOTHING")
                .bind(order.id()).bind(order.order_number().as_str().to_string()).bind(order.customer_id())
                .bind(order.gateway_order_id().map(str::to_string)).bind(order.order_date()).bind(Json(order))
                .execute(&self.pool).await?
        } else {
            sqlx::query("UPDATE orders SET version = version + 1, gateway_order_id = $2, doc = $3 WHERE id = $1 AND version = $4")
                .bind(order.id()).bind(order.gateway_order_id().map(str::to_string)).bind(Json(order)).bind(order.version() as i64)
                .execute(&self.pool).await?
        };
        written(result)
    }

    async fn save_pending_checkout(&self, checkout: &PendingCheckout) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO pending_checkouts (gateway_order_id, doc, created_at) VALUES ($1, $2, $3) ON CONFLICT (gateway_order_id) DO UPDATE SET doc = EXCLUDED.doc")
            .bind(checkout.gateway_order_id.clone()).bind(Json(checkout)).bind(checkout.created_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn take_pending_checkout(&self, gateway_order_id: &str) -> Result<Option<PendingCheckout>, StoreError> {
        let row = sqlx::query_as::<_, (Json<PendingCheckout>,)>("DELETE FROM pending_checkouts WHERE gateway_order_id = $1 RETURNING doc")
            .bind(gateway_order_id.to_string()).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(checkout),)| checkout))
    }

    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query_as::<_, Row<Coupon>>("SELECT version, doc FROM coupons WHERE code = $1")
            .bind(code.as_str().to_string()).fetch_optional(&self.pool).await?;
        Ok(row.map(hydrate))
    }

    async fn find_coupons(&self) -> Result<Vec<Coupon>, StoreError> {
        let rows = sqlx::query_as::<_, Row<Coupon>>("SELECT version, doc FROM coupons ORDER BY code").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn save_coupon(&self, coupon: &Coupon) -> Result<(), StoreError> {
        let code = coupon.code().as_str().to_string();
        let result = if coupon.version() == 0 {
            sqlx::query("INSERT INTO coupons (code, version, doc) VALUES ($1, 1, $2) ON CONFLICT DO NOTHING")
                .bind(code).bind(Json(coupon)).execute(&self.pool).await?
        } else {
            sqlx::query("UPDATE coupons SET version = version + 1, doc = $2 WHERE code = $1 AND version = $3")
                .bind(code).bind(Json(coupon)).bind(coupon.version() as i64).execute(&self.pool).await?
        };
        written(result)
    }

    async fn delete_coupon(&self, code: &CouponCode) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM coupons WHERE code = $1").bind(code.as_str().to_string()).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_wallet(&self, customer_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        let row = sqlx::query_as::<_, Row<Wallet>>("SELECT version, doc FROM wallets WHERE customer_id = $1")
            .bind(customer_id).fetch_optional(&self.pool).await?;
        Ok(row.map(hydrate))
    }

    async fn save_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let result = if wallet.version() == 0 {
            sqlx::query("INSERT INTO wallets (customer_id, version, doc) VALUES ($1, 1, $2) ON CONFLICT DO NOTHING")
                .bind(wallet.customer_id()).bind(Json(wallet)).execute(&self.pool).await?
        } else {
            sqlx::query("UPDATE wallets SET version = version + 1, doc = $2 WHERE customer_id = $1 AND version = $3")
                .bind(wallet.customer_id()).bind(Json(wallet)).bind(wallet.version() as i64).execute(&self.pool).await?
        };
        written(result)
    }

    async fn find_offers(&self) -> Result<Vec<Offer>, StoreError> {
        let rows = sqlx::query_as::<_, (Json<Offer>,)>("SELECT doc FROM offers").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(offer),)| offer).collect())
    }

    async fn save_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO offers (id, doc) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc")
            .bind(offer.id).bind(Json(offer)).execute(&self.pool).await?;
        Ok(())
    }
}
