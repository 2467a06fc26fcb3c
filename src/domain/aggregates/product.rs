//! Product Aggregate
//!
//! Inventory lives on the product document: each color variant carries its
//! own price and a list of size sub-variants, and each sub-variant quantity is
//! the authoritative stock counter for that (product, color, size).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, MoneyError, Percent, Quantity};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    name: String,
    category_id: Option<Uuid>,
    variants: Vec<Variant>,
    order_count: u64,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub color: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub sub_variants: Vec<SubVariant>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubVariant {
    pub size: String,
    pub quantity: Quantity,
}

/// A quantity of one (product, color, size).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockRequest {
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub quantity: u32,
}

impl Variant {
    pub fn new(color: impl Into<String>, price: Money) -> Self {
        Self { color: color.into(), price, discount_price: None, sub_variants: vec![] }
    }

    pub fn with_size(mut self, size: impl Into<String>, quantity: u32) -> Self {
        self.sub_variants.push(SubVariant { size: size.into(), quantity: Quantity::new(quantity) });
        self
    }
}

impl Product {
    pub fn create(name: impl Into<String>, category_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::now_v7(), name: name.into(), category_id, variants: vec![], order_count: 0,
            updated_at: Utc::now(), version: 0, events: vec![],
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self { self.variants.push(variant); self }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn category_id(&self) -> Option<Uuid> { self.category_id }
    pub fn variants(&self) -> &[Variant] { &self.variants }
    pub fn order_count(&self) -> u64 { self.order_count }

    pub fn variant(&self, color: &str) -> Result<&Variant, InventoryError> {
        self.variants.iter().find(|v| v.color == color).ok_or_else(|| InventoryError::VariantNotFound { color: color.to_string() })
    }

    pub fn available(&self, color: &str, size: &str) -> Result<u32, InventoryError> {
        self.sub_variant(color, size).map(|s| s.quantity.value())
    }

    /// Fails unless `quantity` units of (color, size) are in stock.
    pub fn ensure_available(&self, color: &str, size: &str, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 { return Err(InventoryError::InvalidQuantity); }
        let available = self.available(color, size)?;
        if available == 0 {
            return Err(InventoryError::OutOfStock { color: color.to_string(), size: size.to_string() });
        }
        if quantity > available {
            return Err(InventoryError::InsufficientStock { color: color.to_string(), size: size.to_string(), available, requested: quantity });
        }
        Ok(())
    }

    pub fn reserve(&mut self, color: &str, size: &str, quantity: u32) -> Result<(), InventoryError> {
        self.ensure_available(color, size, quantity)?;
        let sub = self.sub_variant_mut(color, size)?;
        sub.quantity = sub.quantity.subtract(quantity).ok_or(InventoryError::InvalidQuantity)?;
        self.order_count += u64::from(quantity);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReserved {
            product_id: self.id, color: color.to_string(), size: size.to_string(), quantity,
        }));
        Ok(())
    }

    pub fn release(&mut self, color: &str, size: &str, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 { return Err(InventoryError::InvalidQuantity); }
        let sub = self.sub_variant_mut(color, size)?;
        sub.quantity = sub.quantity.add(quantity);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReleased {
            product_id: self.id, color: color.to_string(), size: size.to_string(), quantity,
        }));
        Ok(())
    }

    /// Sets every variant's offer price from `discount`, or clears it.
    pub fn apply_offer(&mut self, discount: Option<Percent>) -> Result<(), MoneyError> {
        let prices = self.variants.iter()
            .map(|v| discount.map(|pct| v.price.percent_floor(pct.complement())).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        for (variant, price) in self.variants.iter_mut().zip(prices) {
            variant.discount_price = price;
        }
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Repriced { product_id: self.id }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }

    fn sub_variant(&self, color: &str, size: &str) -> Result<&SubVariant, InventoryError> {
        self.variant(color)?.sub_variants.iter().find(|s| s.size == size)
            .ok_or_else(|| InventoryError::SubvariantNotFound { color: color.to_string(), size: size.to_string() })
    }

    fn sub_variant_mut(&mut self, color: &str, size: &str) -> Result<&mut SubVariant, InventoryError> {
        let variant = self.variants.iter_mut().find(|v| v.color == color)
            .ok_or_else(|| InventoryError::VariantNotFound { color: color.to_string() })?;
        variant.sub_variants.iter_mut().find(|s| s.size == size)
            .ok_or_else(|| InventoryError::SubvariantNotFound { color: color.to_string(), size: size.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("product {0} not found")]
    ProductNotFound(Uuid),
    #[error("no {color} variant")]
    VariantNotFound { color: String },
    #[error("no size {size} in {color}")]
    SubvariantNotFound { color: String, size: String },
    #[error("{color} / {size} is out of stock")]
    OutOfStock { color: String, size: String },
    #[error("only {available} left in size {size} ({color}), {requested} requested")]
    InsufficientStock { color: String, size: String, available: u32, requested: u32 },
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Product {
        Product::create("Aviator", None)
            .with_variant(Variant::new("red", Money::new(1000)).with_size("M", 3).with_size("L", 0))
    }

    #[test]
    fn test_reserve_and_release_round_trip() {
        let mut p = frame();
        p.reserve("red", "M", 2).unwrap();
        assert_eq!(p.available("red", "M").unwrap(), 1);
        assert_eq!(p.order_count(), 2);
        p.release("red", "M", 2).unwrap();
        assert_eq!(p.available("red", "M").unwrap(), 3);
        assert_eq!(p.take_events().len(), 2);
    }

    #[test]
    fn test_insufficient_stock_leaves_quantity() {
        let mut p = frame();
        let err = p.reserve("red", "M", 5).unwrap_err();
        assert_eq!(err, InventoryError::InsufficientStock { color: "red".into(), size: "M".into(), available: 3, requested: 5 });
        assert_eq!(err.to_string(), "only 3 left in size M (red), 5 requested");
        assert_eq!(p.available("red", "M").unwrap(), 3);
        assert_eq!(p.order_count(), 0);
    }

    #[test]
    fn test_missing_stock_keys() {
        let mut p = frame();
        assert!(matches!(p.reserve("red", "L", 1), Err(InventoryError::OutOfStock { .. })));
        assert!(matches!(p.reserve("blue", "M", 1), Err(InventoryError::VariantNotFound { .. })));
        assert!(matches!(p.release("red", "XL", 1), Err(InventoryError::SubvariantNotFound { .. })));
        assert_eq!(p.reserve("red", "M", 0), Err(InventoryError::InvalidQuantity));
    }

    #[test]
    fn test_apply_offer_rounds_down() {
        let mut p = Product::create("Round", None).with_variant(Variant::new("black", Money::new(999)));
        p.apply_offer(Some(Percent::new(15).unwrap())).unwrap();
        // 999 - 149.85 = 849.15
        assert_eq!(p.variants()[0].discount_price, Some(Money::new(849)));
        p.apply_offer(None).unwrap();
        assert_eq!(p.variants()[0].discount_price, None);

        let mut luxury = Product::create("Gold", None).with_variant(Variant::new("gold", Money::new(i64::MAX)));
        assert_eq!(luxury.apply_offer(Some(Percent::new(15).unwrap())), Err(MoneyError::Overflow));
        assert_eq!(luxury.variants()[0].discount_price, None);
    }
}
