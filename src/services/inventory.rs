//! Inventory ledger
//!
//! Reserves and releases stock on product documents. Every write is a
//! version-checked save, retried on conflict, so two checkouts racing for the
//! last unit cannot both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{InventoryError, Product, StockRequest};
use crate::events::EventSink;
use crate::store::{Store, StoreError};
use crate::{CommerceError, Result};

use super::MAX_WRITE_ATTEMPTS;

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    pub async fn product(&self, product_id: Uuid) -> Result<Product> {
        Ok(self.store.find_product(product_id).await?.ok_or(InventoryError::ProductNotFound(product_id))?)
    }

    #[instrument(skip(self), fields(product_id = %request.product_id))]
    pub async fn reserve(&self, request: &StockRequest) -> Result<()> {
        self.update(request.product_id, |p| p.reserve(&request.color, &request.size, request.quantity)).await
    }

    #[instrument(skip(self), fields(product_id = %request.product_id))]
    pub async fn release(&self, request: &StockRequest) -> Result<()> {
        self.update(request.product_id, |p| p.release(&request.color, &request.size, request.quantity)).await
    }

    /// Dry run: fails if any request cannot be met right now. Requests for
    /// the same (product, color, size) are summed first.
    pub async fn check(&self, requests: &[StockRequest]) -> Result<()> {
        let mut wanted: HashMap<(Uuid, &str, &str), u32> = HashMap::new();
        for r in requests {
            *wanted.entry((r.product_id, r.color.as_str(), r.size.as_str())).or_default() += r.quantity;
        }

        let mut products: HashMap<Uuid, Product> = HashMap::new();
        for ((product_id, color, size), quantity) in wanted {
            if !products.contains_key(&product_id) {
                products.insert(product_id, self.product(product_id).await?);
            }
            if let Some(product) = products.get(&product_id) {
                product.ensure_available(color, size, quantity)?;
            }
        }
        Ok(())
    }

    /// Reserves every request or none. On failure the reservations already
    /// made are released before the error is returned.
    #[instrument(skip_all, fields(lines = requests.len()))]
    pub async fn reserve_all(&self, requests: &[StockRequest]) -> Result<Reservations> {
        self.check(requests).await?;

        let mut reservations = Reservations { ledger: self.clone(), applied: Vec::with_capacity(requests.len()) };
        for request in requests {
            if let Err(e) = self.reserve(request).await {
                info!(error = %e, "reservation failed, rolling back");
                reservations.rollback().await;
                return Err(e);
            }
            reservations.applied.push(request.clone());
        }
        Ok(reservations)
    }

    async fn update<F>(&self, product_id: Uuid, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut Product) -> std::result::Result<(), InventoryError> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut product = self.product(product_id).await?;
            apply(&mut product)?;
            let events = product.take_events();
            match self.store.save_product(&product).await {
                Ok(()) => {
                    self.events.publish(events).await;
                    return Ok(());
                }
                Err(StoreError::Conflict) => debug!(%product_id, attempt, "product changed concurrently, retrying"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Contention)
    }
}

/// Stock held for an order that is still being committed.
#[must_use = "reservations must be committed or rolled back"]
pub struct Reservations {
    ledger: InventoryLedger,
    applied: Vec<StockRequest>,
}

impl Reservations {
    pub fn requests(&self) -> &[StockRequest] { &self.applied }

    /// Keeps the stock taken.
    pub fn commit(self) -> Vec<StockRequest> { self.applied }

    /// Hands every reservation back, newest first.
    pub async fn rollback(self) {
        for request in self.applied.iter().rev() {
            if let Err(e) = self.ledger.release(request).await {
                error!(product_id = %request.product_id, color = %request.color, size = %request.size, quantity = request.quantity, error = %e, "failed to release reservation during rollback");
            }
        }
    }
}
