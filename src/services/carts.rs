//! Cart service.

use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartError, CartLine, InventoryError};
use crate::store::Store;
use crate::Result;

/// A request to put one (product, color, size) into the cart.
#[derive(Clone, Debug, Deserialize)]
pub struct AddLine {
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub quantity: u32,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// The customer's cart; empty if they never had one.
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<Cart> {
        Ok(self.store.find_cart(customer_id).await?.unwrap_or_else(|| Cart::new(customer_id)))
    }

    /// Adds a line priced from the variant's current price and offer price.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_line(&self, customer_id: Uuid, request: AddLine) -> Result<Cart> {
        if request.quantity == 0 { return Err(CartError::InvalidQuantity.into()); }
        let product = self.store.find_product(request.product_id).await?
            .ok_or(InventoryError::ProductNotFound(request.product_id))?;
        product.ensure_available(&request.color, &request.size, request.quantity)?;
        let variant = product.variant(&request.color)?;

        let mut cart = self.get_cart(customer_id).await?;
        cart.add_line(CartLine::new(product.id(), request.color.as_str(), request.size.as_str(), variant.price, variant.discount_price, request.quantity))?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(&self, customer_id: Uuid, line_id: Uuid, quantity: u32) -> Result<Cart> {
        let mut cart = self.get_cart(customer_id).await?;
        let line = cart.line(line_id).ok_or(CartError::LineNotFound(line_id))?.clone();
        if quantity == 0 { return Err(CartError::InvalidQuantity.into()); }
        let product = self.store.find_product(line.product_id).await?
            .ok_or(InventoryError::ProductNotFound(line.product_id))?;
        product.ensure_available(&line.color, &line.size, quantity)?;

        cart.update_quantity(line_id, quantity)?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    #[instrument(skip(self))]
    pub async fn remove_line(&self, customer_id: Uuid, line_id: Uuid) -> Result<Cart> {
        let mut cart = self.get_cart(customer_id).await?;
        cart.remove_line(line_id)?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }
}
