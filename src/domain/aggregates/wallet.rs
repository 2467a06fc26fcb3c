//! Wallet Aggregate
//!
//! Store credit per customer. The transaction log is append-only and the
//! balance is a cache of its running sum. Credits carrying a reference are
//! applied at most once per reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, WalletEvent};
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wallet {
    customer_id: Uuid,
    balance: Money,
    transactions: Vec<WalletTransaction>,
    #[serde(default)]
    pub(crate) version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub description: String,
    /// Signed: credits are positive, debits negative.
    pub amount: Money,
    pub balance_after: Money,
    pub date: DateTime<Utc>,
    /// Set for credits that settle something recorded elsewhere, such as an owed refund.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Uuid>,
}

impl Wallet {
    pub fn open(customer_id: Uuid) -> Self {
        Self { customer_id, balance: Money::ZERO, transactions: vec![], version: 0, events: vec![] }
    }

    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn balance(&self) -> Money { self.balance }
    pub fn transactions(&self) -> &[WalletTransaction] { &self.transactions }
    pub fn has_at_least(&self, amount: Money) -> bool { self.balance >= amount }

    /// Sum of the transaction log; always equal to [`Wallet::balance`].
    pub fn ledger_balance(&self) -> Result<Money, MoneyError> { Money::try_sum(self.transactions.iter().map(|t| t.amount)) }

    pub fn has_reference(&self, reference: Uuid) -> bool {
        self.transactions.iter().any(|t| t.reference == Some(reference))
    }

    pub fn credit(&mut self, amount: Money, description: &str, now: DateTime<Utc>) -> Result<Money, WalletError> {
        self.credit_with(amount, description, None, now)
    }

    /// Credits once per `reference`. Returns `None` when it was already applied.
    pub fn credit_once(&mut self, amount: Money, description: &str, reference: Uuid, now: DateTime<Utc>) -> Result<Option<Money>, WalletError> {
        if self.has_reference(reference) { return Ok(None); }
        self.credit_with(amount, description, Some(reference), now).map(Some)
    }

    pub fn debit(&mut self, amount: Money, description: &str, now: DateTime<Utc>) -> Result<Money, WalletError> {
        if !amount.is_positive() { return Err(WalletError::InvalidAmount(amount)); }
        if !self.has_at_least(amount) {
            return Err(WalletError::InsufficientBalance { balance: self.balance, required: amount });
        }
        self.append(-amount, description, None, now)?;
        self.events.push(DomainEvent::Wallet(WalletEvent::Debited { customer_id: self.customer_id, amount, balance: self.balance }));
        Ok(self.balance)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn credit_with(&mut self, amount: Money, description: &str, reference: Option<Uuid>, now: DateTime<Utc>) -> Result<Money, WalletError> {
        if !amount.is_positive() { return Err(WalletError::InvalidAmount(amount)); }
        self.append(amount, description, reference, now)?;
        self.events.push(DomainEvent::Wallet(WalletEvent::Credited { customer_id: self.customer_id, amount, balance: self.balance }));
        Ok(self.balance)
    }

    fn append(&mut self, amount: Money, description: &str, reference: Option<Uuid>, now: DateTime<Utc>) -> Result<(), WalletError> {
        self.balance = self.balance.checked_add(amount)?;
        self.transactions.push(WalletTransaction { description: description.to_string(), amount, balance_after: self.balance, date: now, reference });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet not found")]
    NotFound,
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Money),
    #[error("insufficient wallet balance: {balance} available, {required} required")]
    InsufficientBalance { balance: Money, required: Money },
    #[error(transparent)]
    Amount(#[from] MoneyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_tracks_log() {
        let now = Utc::now();
        let mut w = Wallet::open(Uuid::now_v7());
        w.credit(Money::new(500), "Top up", now).unwrap();
        w.debit(Money::new(120), "Order 1234567890", now).unwrap();
        w.credit(Money::new(45), "Order canceled", now).unwrap();
        assert_eq!(w.balance(), Money::new(425));
        assert_eq!(w.ledger_balance(), Ok(w.balance()));
        assert_eq!(w.transactions()[1].amount, Money::new(-120));
        assert_eq!(w.transactions()[1].balance_after, Money::new(380));
    }

    #[test]
    fn test_debit_rejects_overdraft() {
        let now = Utc::now();
        let mut w = Wallet::open(Uuid::now_v7());
        w.credit(Money::new(100), "Top up", now).unwrap();
        assert_eq!(w.debit(Money::new(101), "Order", now), Err(WalletError::InsufficientBalance { balance: Money::new(100), required: Money::new(101) }));
        assert_eq!(w.credit(Money::ZERO, "noop", now), Err(WalletError::InvalidAmount(Money::ZERO)));
        assert_eq!(w.transactions().len(), 1);
        assert_eq!(w.ledger_balance(), Ok(Money::new(100)));
        assert_eq!(w.credit(Money::new(i64::MAX), "Top up", now), Err(WalletError::Amount(MoneyError::Overflow)));
        assert_eq!(w.balance(), Money::new(100));
    }

    #[test]
    fn test_credit_once_per_reference() {
        let now = Utc::now();
        let mut w = Wallet::open(Uuid::now_v7());
        let refund = Uuid::now_v7();
        assert_eq!(w.credit_once(Money::new(900), "Order canceled", refund, now), Ok(Some(Money::new(900))));
        assert_eq!(w.credit_once(Money::new(900), "Order canceled", refund, now), Ok(None));
        assert_eq!(w.balance(), Money::new(900));
        assert_eq!(w.transactions()[0].reference, Some(refund));
        assert_eq!(w.take_events().len(), 1);
    }
}
