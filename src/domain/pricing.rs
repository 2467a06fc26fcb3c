//! Pricing engine.
//!
//! Pure computation shared by the coupon preview and the checkout commit, so
//! both always agree. All amounts are whole currency units and every
//! percentage is applied per unit and rounded down. Arithmetic is checked;
//! an amount that leaves the `i64` range is a [`MoneyError::Overflow`].

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Money, MoneyError, Percent};

/// Per-unit price breakdown of one cart or order line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    pub unit_price: Money,
    pub offer_discount: Money,
    pub coupon_discount: Money,
    pub quantity: u32,
}

impl LinePrice {
    /// Price a line from its base price, its offer price (if an offer is
    /// active) and an optional coupon percentage.
    ///
    /// The coupon applies to the offer-discounted unit price.
    pub fn compute(unit_price: Money, unit_discount_price: Option<Money>, quantity: u32, coupon: Option<Percent>) -> Result<Self, MoneyError> {
        let unit_price = unit_price.max(Money::ZERO);
        let offer_price = unit_discount_price.unwrap_or(unit_price).clamp(Money::ZERO, unit_price);
        let offer_discount = unit_price - offer_price;
        let coupon_discount = match coupon {
            Some(pct) => offer_price.percent_floor(pct)?,
            None => Money::ZERO,
        };
        Ok(Self { unit_price, offer_discount, coupon_discount, quantity })
    }

    pub fn final_unit_price(&self) -> Money { self.unit_price - self.offer_discount - self.coupon_discount }
    pub fn line_total(&self) -> Result<Money, MoneyError> { self.final_unit_price().multiply(self.quantity) }
}

/// Aggregate totals over a set of lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub subtotal: Money,
    pub total_discount: Money,
    pub total_coupon: Money,
    pub total: Money,
}

impl PriceSummary {
    pub fn of<'a>(lines: impl IntoIterator<Item = &'a LinePrice>) -> Result<Self, MoneyError> {
        let mut summary = Self::default();
        for line in lines {
            summary.subtotal = summary.subtotal.checked_add(line.unit_price.multiply(line.quantity)?)?;
            summary.total_discount = summary.total_discount.checked_add(line.offer_discount.multiply(line.quantity)?)?;
            summary.total_coupon = summary.total_coupon.checked_add(line.coupon_discount.multiply(line.quantity)?)?;
            summary.total = summary.total.checked_add(line.line_total()?)?;
        }
        Ok(summary)
    }
}

/// Priced view of a whole cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lines: Vec<LinePrice>,
    pub summary: PriceSummary,
}

impl Quote {
    pub fn new(lines: Vec<LinePrice>) -> Result<Self, MoneyError> {
        let summary = PriceSummary::of(&lines)?;
        Ok(Self { lines, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: u32) -> Option<Percent> { Some(Percent::new(v).unwrap()) }

    #[test]
    fn test_offer_and_coupon_scenario() {
        let line = LinePrice::compute(Money::new(1000), Some(Money::new(900)), 2, pct(10)).unwrap();
        assert_eq!(line.offer_discount, Money::new(100));
        assert_eq!(line.coupon_discount, Money::new(90));
        assert_eq!(line.final_unit_price(), Money::new(810));

        let summary = PriceSummary::of(&[line]).unwrap();
        assert_eq!(summary.subtotal, Money::new(2000));
        assert_eq!(summary.total_discount, Money::new(200));
        assert_eq!(summary.total_coupon, Money::new(180));
        assert_eq!(summary.total, Money::new(1620));
    }

    #[test]
    fn test_coupon_rounds_down_per_unit() {
        let line = LinePrice::compute(Money::new(999), None, 3, pct(15)).unwrap();
        // 999 * 15 / 100 = 149.85
        assert_eq!(line.coupon_discount, Money::new(149));
        assert_eq!(line.line_total(), Ok(Money::new(850 * 3)));
    }

    #[test]
    fn test_offer_price_above_base_is_ignored() {
        let line = LinePrice::compute(Money::new(500), Some(Money::new(650)), 1, None).unwrap();
        assert_eq!(line.offer_discount, Money::ZERO);
        assert_eq!(line.final_unit_price(), Money::new(500));
    }

    #[test]
    fn test_full_discounts_never_go_negative() {
        let line = LinePrice::compute(Money::new(400), Some(Money::new(0)), 1, pct(100)).unwrap();
        assert_eq!(line.final_unit_price(), Money::ZERO);
        let line = LinePrice::compute(Money::new(400), Some(Money::new(100)), 1, pct(100)).unwrap();
        assert_eq!(line.final_unit_price(), Money::ZERO);
    }

    #[test]
    fn test_summary_identity_holds() {
        let lines = [
            LinePrice::compute(Money::new(1299), Some(Money::new(1039)), 3, pct(7)).unwrap(),
            LinePrice::compute(Money::new(15), None, 11, pct(33)).unwrap(),
            LinePrice::compute(Money::new(2750), Some(Money::new(2749)), 1, None).unwrap(),
            LinePrice::compute(Money::new(1), Some(Money::new(1)), 9, pct(99)).unwrap(),
        ];
        let s = PriceSummary::of(&lines).unwrap();
        assert_eq!(s.subtotal - s.total_discount - s.total_coupon, s.total);
        let totals: Vec<Money> = lines.iter().map(|l| l.line_total().unwrap()).collect();
        assert_eq!(Money::try_sum(totals), Ok(s.total));
    }

    #[test]
    fn test_overflowing_lines_are_rejected() {
        let huge = LinePrice::compute(Money::new(i64::MAX / 2), None, 3, None).unwrap();
        assert_eq!(huge.line_total(), Err(MoneyError::Overflow));
        assert_eq!(Quote::new(vec![huge]), Err(MoneyError::Overflow));
        assert_eq!(LinePrice::compute(Money::new(i64::MAX), None, 1, pct(10)), Err(MoneyError::Overflow));

        let half = LinePrice::compute(Money::new(i64::MAX / 2 + 1), None, 1, None).unwrap();
        assert_eq!(PriceSummary::of(&[half, half]), Err(MoneyError::Overflow));
    }
}
