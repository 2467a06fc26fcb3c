//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::pricing::{LinePrice, Quote};
use crate::domain::value_objects::{Money, MoneyError, Percent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    customer_id: Uuid,
    lines: Vec<CartLine>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) version: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub unit_price: Money,
    pub unit_discount_price: Option<Money>,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: Uuid, color: impl Into<String>, size: impl Into<String>, unit_price: Money, unit_discount_price: Option<Money>, quantity: u32) -> Self {
        Self { id: Uuid::now_v7(), product_id, color: color.into(), size: size.into(), unit_price, unit_discount_price, quantity }
    }

    pub fn price(&self, coupon: Option<Percent>) -> Result<LinePrice, MoneyError> {
        LinePrice::compute(self.unit_price, self.unit_discount_price, self.quantity, coupon)
    }

    pub fn holds(&self, product_id: Uuid, color: &str, size: &str) -> bool {
        self.product_id == product_id && self.color == color && self.size == size
    }

    fn same_stock(&self, other: &CartLine) -> bool { self.holds(other.product_id, &other.color, &other.size) }
}

impl Cart {
    pub fn new(customer_id: Uuid) -> Self {
        Self { customer_id, lines: vec![], updated_at: Utc::now(), version: 0 }
    }

    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, line_id: Uuid) -> Option<&CartLine> { self.lines.iter().find(|l| l.id == line_id) }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Adds a line. The same product/color/size may only appear once.
    pub fn add_line(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if self.lines.iter().any(|l| l.same_stock(&line)) { return Err(CartError::AlreadyInCart); }
        self.lines.push(line);
        self.touch();
        Ok(())
    }

    pub fn update_quantity(&mut self, line_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let line = self.lines.iter_mut().find(|l| l.id == line_id).ok_or(CartError::LineNotFound(line_id))?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        if self.lines.len() == before { return Err(CartError::LineNotFound(line_id)); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    /// Drops the line for this product/color/size, if any. Returns whether one was removed.
    pub fn remove_stock(&mut self, product_id: Uuid, color: &str, size: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.holds(product_id, color, size));
        let removed = self.lines.len() != before;
        if removed { self.touch(); }
        removed
    }

    /// Re-prices every line of `product_id` in `color`. Returns whether anything changed.
    pub fn reprice(&mut self, product_id: Uuid, color: &str, unit_price: Money, unit_discount_price: Option<Money>) -> bool {
        let mut changed = false;
        for line in self.lines.iter_mut().filter(|l| l.product_id == product_id && l.color == color) {
            if line.unit_price != unit_price || line.unit_discount_price != unit_discount_price {
                line.unit_price = unit_price;
                line.unit_discount_price = unit_discount_price;
                changed = true;
            }
        }
        if changed { self.touch(); }
        changed
    }

    pub fn quote(&self, coupon: Option<Percent>) -> Result<Quote, MoneyError> {
        Quote::new(self.lines.iter().map(|l| l.price(coupon)).collect::<Result<_, _>>()?)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart line {0} not found")]
    LineNotFound(Uuid),
    #[error("product already in cart")]
    AlreadyInCart,
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, size: &str, qty: u32) -> CartLine {
        CartLine::new(product_id, "red", size, Money::new(1000), Some(Money::new(900)), qty)
    }

    #[test]
    fn test_cart_operations() {
        let product = Uuid::now_v7();
        let mut cart = Cart::new(Uuid::now_v7());
        cart.add_line(line(product, "M", 2)).unwrap();
        cart.add_line(line(product, "L", 1)).unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.add_line(line(product, "M", 1)), Err(CartError::AlreadyInCart));

        let id = cart.lines()[0].id;
        cart.update_quantity(id, 5).unwrap();
        assert_eq!(cart.line(id).unwrap().quantity, 5);
        assert_eq!(cart.update_quantity(id, 0), Err(CartError::InvalidQuantity));

        cart.remove_line(id).unwrap();
        assert_eq!(cart.remove_line(id), Err(CartError::LineNotFound(id)));
        assert!(!cart.remove_stock(product, "red", "M"));
        assert!(cart.remove_stock(product, "red", "L"));
        assert!(cart.is_empty());
        cart.add_line(line(product, "S", 1)).unwrap();
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quote_matches_pricing() {
        let mut cart = Cart::new(Uuid::now_v7());
        cart.add_line(line(Uuid::now_v7(), "M", 2)).unwrap();
        let quote = cart.quote(Some(Percent::new(10).unwrap())).unwrap();
        assert_eq!(quote.summary.total, Money::new(1620));
        assert_eq!(cart.quote(None).unwrap().summary.total, Money::new(1800));
    }

    #[test]
    fn test_reprice_only_touches_matching_lines() {
        let product = Uuid::now_v7();
        let mut cart = Cart::new(Uuid::now_v7());
        cart.add_line(line(product, "M", 1)).unwrap();
        cart.add_line(CartLine::new(product, "blue", "M", Money::new(1000), None, 1)).unwrap();
        assert!(cart.reprice(product, "red", Money::new(1000), Some(Money::new(800))));
        assert!(!cart.reprice(product, "red", Money::new(1000), Some(Money::new(800))));
        assert_eq!(cart.lines()[0].unit_discount_price, Some(Money::new(800)));
        assert_eq!(cart.lines()[1].unit_discount_price, None);
    }
}
