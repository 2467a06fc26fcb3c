//! Offer repricing
//!
//! Keeps each variant's offer price in step with the best active offer and
//! pushes the new prices into open carts.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::aggregates::{best_discount, InventoryError, Offer, OfferTarget, Product};
use crate::events::EventSink;
use crate::store::{Store, StoreError};
use crate::{CommerceError, Result};

use super::MAX_WRITE_ATTEMPTS;

#[derive(Clone)]
pub struct OfferService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl OfferService {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self { store, events, clock }
    }

    /// Saves the offer and reprices everything it targets.
    pub async fn save_offer(&self, offer: Offer) -> Result<Offer> {
        self.store.save_offer(&offer).await?;
        match offer.target {
            OfferTarget::Product(product_id) => { self.reprice_product(product_id).await?; }
            OfferTarget::Category(category_id) => { self.reprice_category(category_id).await?; }
        }
        Ok(offer)
    }

    #[instrument(skip(self))]
    pub async fn reprice_product(&self, product_id: Uuid) -> Result<Product> {
        let offers = self.store.find_offers().await?;
        let product = self.apply(product_id, &offers).await?;
        self.reprice_carts(&product).await?;
        Ok(product)
    }

    /// Reprices every product in the category. Returns how many were updated.
    #[instrument(skip(self))]
    pub async fn reprice_category(&self, category_id: Uuid) -> Result<usize> {
        let offers = self.store.find_offers().await?;
        let products = self.store.find_products_in_category(category_id).await?;
        for product in &products {
            let product = self.apply(product.id(), &offers).await?;
            self.reprice_carts(&product).await?;
        }
        info!(%category_id, products = products.len(), "category repriced");
        Ok(products.len())
    }

    async fn apply(&self, product_id: Uuid, offers: &[Offer]) -> Result<Product> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut product = self.store.find_product(product_id).await?.ok_or(InventoryError::ProductNotFound(product_id))?;
            product.apply_offer(best_discount(offers, &product, self.clock.now()))?;
            let events = product.take_events();
            match self.store.save_product(&product).await {
                Ok(()) => {
                    self.events.publish(events).await;
                    product.version += 1;
                    return Ok(product);
                }
                Err(StoreError::Conflict) => debug!(%product_id, attempt, "product changed concurrently, retrying"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Contention)
    }

    async fn reprice_carts(&self, product: &Product) -> Result<()> {
        for mut cart in self.store.find_carts_with_product(product.id()).await? {
            let mut changed = false;
            for variant in product.variants() {
                changed |= cart.reprice(product.id(), &variant.color, variant.price, variant.discount_price);
            }
            if !changed { continue; }
            match self.store.save_cart(&cart).await {
                Ok(()) => {}
                Err(StoreError::Conflict) => warn!(customer_id = %cart.customer_id(), "cart changed while repricing, skipped"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Cart, CartLine, Variant};
    use crate::domain::value_objects::{Money, Percent};
    use crate::store::MemoryStore;
    use crate::test::{FixedClock, RecordingSink};
    use chrono::Duration;

    fn offer(discount: u32, target: OfferTarget, clock: &FixedClock) -> Offer {
        Offer {
            id: Uuid::now_v7(), name: format!("{discount}% off"), discount: Percent::new(discount).unwrap(),
            target, active: true, expires_at: clock.now() + Duration::days(10),
        }
    }

    #[tokio::test]
    async fn test_best_offer_reprices_product_and_carts() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::default());
        let offers = OfferService::new(store.clone(), Arc::new(RecordingSink::default()), clock.clone());

        let category = Uuid::now_v7();
        let product = Product::create("Wayfarer", Some(category)).with_variant(Variant::new("black", Money::new(999)).with_size("M", 5));
        store.save_product(&product).await.unwrap();
        let customer = Uuid::now_v7();
        let mut cart = Cart::new(customer);
        cart.add_line(CartLine::new(product.id(), "black", "M", Money::new(999), None, 1)).unwrap();
        store.save_cart(&cart).await.unwrap();

        offers.save_offer(offer(10, OfferTarget::Product(product.id()), &clock)).await.unwrap();
        let repriced = store.find_product(product.id()).await.unwrap().unwrap();
        assert_eq!(repriced.variants()[0].discount_price, Some(Money::new(899)));

        assert_eq!(offers.save_offer(offer(15, OfferTarget::Category(category), &clock)).await.unwrap().discount.value(), 15);
        let repriced = store.find_product(product.id()).await.unwrap().unwrap();
        assert_eq!(repriced.variants()[0].discount_price, Some(Money::new(849)));

        let cart = store.find_cart(customer).await.unwrap().unwrap();
        assert_eq!(cart.lines()[0].unit_discount_price, Some(Money::new(849)));
        assert_eq!(cart.quote(None).unwrap().summary.total, Money::new(849));
    }

    #[tokio::test]
    async fn test_expired_offer_clears_price() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::default());
        let offers = OfferService::new(store.clone(), Arc::new(RecordingSink::default()), clock.clone());
        let product = Product::create("Round", None).with_variant(Variant::new("gold", Money::new(1000)));
        store.save_product(&product).await.unwrap();

        offers.save_offer(offer(20, OfferTarget::Product(product.id()), &clock)).await.unwrap();
        assert_eq!(store.find_product(product.id()).await.unwrap().unwrap().variants()[0].discount_price, Some(Money::new(800)));

        clock.advance(Duration::days(11));
        let product = offers.reprice_product(product.id()).await.unwrap();
        assert_eq!(product.variants()[0].discount_price, None);
    }
}
