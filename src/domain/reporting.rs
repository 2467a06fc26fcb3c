//! Sales reporting over delivered order items.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderItem, OrderStatus};
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod { #[default] Daily, Weekly, Monthly, Yearly }

/// Calendar bucket a delivery falls into. Weekly buckets use ISO weeks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PeriodBucket {
    pub year: i32,
    pub month: Option<u32>,
    pub week: Option<u32>,
    pub day: Option<u32>,
}

impl PeriodBucket {
    pub fn of(period: ReportPeriod, at: DateTime<Utc>) -> Self {
        match period {
            ReportPeriod::Daily => Self { year: at.year(), month: Some(at.month()), week: None, day: Some(at.day()) },
            ReportPeriod::Weekly => {
                let iso = at.iso_week();
                Self { year: iso.year(), month: None, week: Some(iso.week()), day: None }
            }
            ReportPeriod::Monthly => Self { year: at.year(), month: Some(at.month()), week: None, day: None },
            ReportPeriod::Yearly => Self { year: at.year(), month: None, week: None, day: None },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SalesTotals {
    pub total_quantity: u64,
    pub total_sales: Money,
    pub total_discount: Money,
    pub total_coupons: Money,
    pub total_orders: u64,
}

impl SalesTotals {
    fn add(&mut self, item: &OrderItem) -> Result<(), MoneyError> {
        self.total_sales = self.total_sales.checked_add(item.unit_price.multiply(item.quantity)?)?;
        self.total_discount = self.total_discount.checked_add(item.offer_discount.multiply(item.quantity)?)?;
        self.total_coupons = self.total_coupons.checked_add(item.coupon_discount.multiply(item.quantity)?)?;
        self.total_quantity += u64::from(item.quantity);
        self.total_orders += 1;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SalesRow {
    pub bucket: PeriodBucket,
    pub product_id: Uuid,
    #[serde(flatten)]
    pub totals: SalesTotals,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SalesReport {
    pub rows: Vec<SalesRow>,
    pub overall: SalesTotals,
}

/// Groups delivered items with a delivery date in `[from, to]` by period and product.
pub fn sales_report<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    period: ReportPeriod,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<SalesReport, MoneyError> {
    let mut groups: BTreeMap<(PeriodBucket, Uuid), SalesTotals> = BTreeMap::new();
    let mut overall = SalesTotals::default();

    let delivered = orders.into_iter().flat_map(|o| o.items()).filter_map(|item| {
        let at = item.delivery_date.filter(|d| *d >= from && *d <= to)?;
        (item.status == OrderStatus::Delivered).then_some((item, at))
    });
    for (item, at) in delivered {
        groups.entry((PeriodBucket::of(period, at), item.product_id)).or_default().add(item)?;
        overall.add(item)?;
    }

    let rows = groups.into_iter().map(|((bucket, product_id), totals)| SalesRow { bucket, product_id, totals }).collect();
    Ok(SalesReport { rows, overall })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Actor, Address, PaymentMethod};
    use crate::domain::pricing::LinePrice;
    use crate::domain::value_objects::{OrderNumber, Percent};
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    fn delivered_order(product: Uuid, qty: u32, at: DateTime<Utc>, seed: u64) -> Order {
        let price = LinePrice::compute(Money::new(1000), Some(Money::new(900)), qty, Some(Percent::new(10).unwrap())).unwrap();
        let item = OrderItem::new(product, "red", "M", price, at);
        let mut order = Order::place(OrderNumber::generate(&mut StdRng::seed_from_u64(seed)), Uuid::now_v7(), Address::default(), vec![item], PaymentMethod::Cod, None, at).unwrap();
        let id = order.items()[0].id;
        order.transition_item(id, OrderStatus::Delivered, Actor::Admin, at).unwrap();
        order
    }

    #[test]
    fn test_monthly_groups_by_product() {
        let p1 = Uuid::now_v7();
        let p2 = Uuid::now_v7();
        let jan = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 3, 12, 0, 0).unwrap();
        let orders = vec![
            delivered_order(p1, 2, jan, 1),
            delivered_order(p1, 1, jan, 2),
            delivered_order(p2, 1, feb, 3),
        ];
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let report = sales_report(&orders, ReportPeriod::Monthly, from, to).unwrap();

        assert_eq!(report.rows.len(), 2);
        let jan_row = report.rows.iter().find(|r| r.product_id == p1).unwrap();
        assert_eq!(jan_row.bucket, PeriodBucket { year: 2024, month: Some(1), week: None, day: None });
        assert_eq!(jan_row.totals.total_quantity, 3);
        assert_eq!(jan_row.totals.total_sales, Money::new(3000));
        assert_eq!(jan_row.totals.total_discount, Money::new(300));
        assert_eq!(jan_row.totals.total_coupons, Money::new(270));
        assert_eq!(jan_row.totals.total_orders, 2);
        assert_eq!(report.overall.total_quantity, 4);
        assert_eq!(report.overall.total_orders, 3);
    }

    #[test]
    fn test_range_and_status_filter() {
        let product = Uuid::now_v7();
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let mut pending = delivered_order(product, 1, at, 4);
        let id = pending.items()[0].id;
        pending.request_return(id, "wrong size", at).unwrap();
        let orders = vec![delivered_order(product, 1, at, 5), pending];

        let report = sales_report(&orders, ReportPeriod::Weekly, at, at).unwrap();
        assert_eq!(report.overall.total_orders, 1);
        assert_eq!(report.rows[0].bucket.week, Some(10));

        let later = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert!(sales_report(&orders, ReportPeriod::Daily, later, later).unwrap().rows.is_empty());
    }
}
