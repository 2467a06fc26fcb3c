//! Application services
//!
//! Each service owns one concern and talks to the [`Store`] through the
//! version-checked saves it exposes. [`Services`] wires them together.

use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::aggregates::Address;
use crate::events::EventSink;
use crate::gateway::PaymentGateway;
use crate::store::Store;
use crate::Result;

pub mod carts;
pub mod coupons;
pub mod inventory;
pub mod offers;
pub mod orders;
pub mod reports;
pub mod wallet;

pub use carts::{AddLine, CartService};
pub use coupons::{AppliedCoupon, CouponPreview, CouponTerms, CouponValidator};
pub use inventory::{InventoryLedger, Reservations};
pub use offers::OfferService;
pub use orders::{CheckoutOutcome, CheckoutRequest, OrderLifecycle, PaymentConfirmation, PaymentIntent, StatusChange, VerifyOutcome};
pub use reports::SalesReports;
pub use wallet::WalletLedger;

/// Save attempts before a ledger gives up with `Contention`.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    /// ISO currency code sent to the payment gateway.
    pub currency: String,
    /// Days from order date to the promised delivery date.
    pub delivery_days: i64,
}

impl Default for CheckoutSettings {
    fn default() -> Self { Self { currency: "INR".to_string(), delivery_days: 3 } }
}

#[derive(Clone)]
pub struct Services {
    pub carts: CartService,
    pub coupons: CouponValidator,
    pub inventory: InventoryLedger,
    pub wallet: WalletLedger,
    pub offers: OfferService,
    pub orders: OrderLifecycle,
    pub reports: SalesReports,
    store: Arc<dyn Store>,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
    ) -> Self {
        let inventory = InventoryLedger::new(store.clone(), events.clone());
        let coupons = CouponValidator::new(store.clone(), events.clone(), clock.clone());
        let wallet = WalletLedger::new(store.clone(), events.clone(), clock.clone());
        let orders = OrderLifecycle::new(
            store.clone(), gateway, events.clone(), clock.clone(),
            inventory.clone(), coupons.clone(), wallet.clone(), settings,
        );
        Self {
            carts: CartService::new(store.clone()),
            offers: OfferService::new(store.clone(), events, clock),
            reports: SalesReports::new(store.clone()),
            store,
            coupons,
            inventory,
            wallet,
            orders,
        }
    }

    /// Saved delivery addresses, in the order checkout indexes them.
    pub async fn addresses(&self, customer_id: Uuid) -> Result<Vec<Address>> {
        Ok(self.store.find_addresses(customer_id).await?)
    }

    pub async fn save_addresses(&self, customer_id: Uuid, addresses: &[Address]) -> Result<()> {
        Ok(self.store.save_addresses(customer_id, addresses).await?)
    }
}
