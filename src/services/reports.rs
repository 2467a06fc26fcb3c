//! Sales reports.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::reporting::{sales_report, ReportPeriod, SalesReport};
use crate::store::{OrderQuery, Store};
use crate::Result;

#[derive(Clone)]
pub struct SalesReports {
    store: Arc<dyn Store>,
}

impl SalesReports {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn sales_report(&self, period: ReportPeriod, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<SalesReport> {
        let orders = self.store.find_orders(OrderQuery::DeliveredBetween { from, to }).await?;
        Ok(sales_report(&orders, period, from, to)?)
    }
}
