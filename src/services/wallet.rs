//! Wallet ledger.

use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::aggregates::{Wallet, WalletError};
use crate::domain::value_objects::Money;
use crate::events::EventSink;
use crate::store::{Store, StoreError};
use crate::{CommerceError, Result};

use super::MAX_WRITE_ATTEMPTS;

#[derive(Clone)]
pub struct WalletLedger {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

#[derive(Clone, Copy)]
enum Entry { Credit, Refund(Uuid), Debit }

impl WalletLedger {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self { store, events, clock }
    }

    pub async fn wallet(&self, customer_id: Uuid) -> Result<Wallet> {
        Ok(self.store.find_wallet(customer_id).await?.ok_or(WalletError::NotFound)?)
    }

    /// Whether the balance covers `amount`. A customer without a wallet has nothing.
    pub async fn check_sufficient(&self, customer_id: Uuid, amount: Money) -> Result<bool> {
        let balance = self.store.find_wallet(customer_id).await?.map_or(Money::ZERO, |w| w.balance());
        Ok(balance >= amount)
    }

    /// Adds `amount`, opening the wallet on first credit. Returns the new balance.
    #[instrument(skip(self))]
    pub async fn credit(&self, customer_id: Uuid, amount: Money, description: &str) -> Result<Money> {
        let balance = self.write(customer_id, amount, description, Entry::Credit).await?;
        info!(%customer_id, %amount, %balance, "wallet credited");
        Ok(balance)
    }

    /// Credits an owed refund. Crediting the same `refund_id` again is a no-op.
    #[instrument(skip(self))]
    pub async fn credit_refund(&self, customer_id: Uuid, amount: Money, description: &str, refund_id: Uuid) -> Result<Money> {
        let balance = self.write(customer_id, amount, description, Entry::Refund(refund_id)).await?;
        info!(%customer_id, %amount, %balance, %refund_id, "refund credited");
        Ok(balance)
    }

    #[instrument(skip(self))]
    pub async fn debit(&self, customer_id: Uuid, amount: Money, description: &str) -> Result<Money> {
        let balance = self.write(customer_id, amount, description, Entry::Debit).await?;
        info!(%customer_id, %amount, %balance, "wallet debited");
        Ok(balance)
    }

    async fn write(&self, customer_id: Uuid, amount: Money, description: &str, entry: Entry) -> Result<Money> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let mut wallet = match (self.store.find_wallet(customer_id).await?, &entry) {
                (Some(wallet), _) => wallet,
                (None, Entry::Credit | Entry::Refund(_)) => Wallet::open(customer_id),
                (None, Entry::Debit) => return Err(WalletError::NotFound.into()),
            };
            let balance = match entry {
                Entry::Credit => wallet.credit(amount, description, now)?,
                Entry::Refund(reference) => match wallet.credit_once(amount, description, reference, now)? {
                    Some(balance) => balance,
                    None => {
                        debug!(%customer_id, %reference, "refund already credited");
                        return Ok(wallet.balance());
                    }
                },
                Entry::Debit => wallet.debit(amount, description, now)?,
            };
            let events = wallet.take_events();
            match self.store.save_wallet(&wallet).await {
                Ok(()) => {
                    self.events.publish(events).await;
                    return Ok(balance);
                }
                Err(StoreError::Conflict) => debug!(%customer_id, attempt, "wallet changed concurrently, retrying"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Contention)
    }
}
