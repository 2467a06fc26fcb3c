//! Offers: promotional percentage discounts on a product or a whole category.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Percent;

use super::product::Product;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OfferTarget { Product(Uuid), Category(Uuid) }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub name: String,
    pub discount: Percent,
    pub target: OfferTarget,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
}

impl Offer {
    pub fn applies_to(&self, product: &Product, now: DateTime<Utc>) -> bool {
        if !self.active || now > self.expires_at { return false; }
        match self.target {
            OfferTarget::Product(id) => id == product.id(),
            OfferTarget::Category(id) => product.category_id() == Some(id),
        }
    }
}

/// Highest discount among the offers that currently apply to `product`.
pub fn best_discount<'a>(offers: impl IntoIterator<Item = &'a Offer>, product: &Product, now: DateTime<Utc>) -> Option<Percent> {
    offers.into_iter().filter(|o| o.applies_to(product, now)).map(|o| o.discount).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(discount: u32, target: OfferTarget, active: bool, expires_in: i64) -> Offer {
        Offer {
            id: Uuid::now_v7(), name: format!("{discount}% off"), discount: Percent::new(discount).unwrap(),
            target, active, expires_at: Utc::now() + Duration::days(expires_in),
        }
    }

    #[test]
    fn test_best_discount_picks_highest_applicable() {
        let category = Uuid::now_v7();
        let product = Product::create("Wayfarer", Some(category));
        let offers = vec![
            offer(10, OfferTarget::Product(product.id()), true, 5),
            offer(25, OfferTarget::Category(category), true, 5),
            offer(40, OfferTarget::Category(category), false, 5),
            offer(50, OfferTarget::Product(product.id()), true, -1),
            offer(60, OfferTarget::Product(Uuid::now_v7()), true, 5),
        ];
        assert_eq!(best_discount(&offers, &product, Utc::now()), Some(Percent::new(25).unwrap()));
        assert_eq!(best_discount(&offers[2..], &product, Utc::now()), None);
    }
}
