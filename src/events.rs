//! Event publishing
//!
//! Aggregates collect [`DomainEvent`]s while they change; services hand them
//! to an [`EventSink`] once the change is saved. Publishing is best effort:
//! a failed publish is logged and never undoes the write.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>);
}

/// Publishes JSON events to NATS under `<prefix>.<aggregate>.<event>`.
#[derive(Clone, Debug)]
pub struct NatsEventSink {
    client: async_nats::Client,
    prefix: String,
}

impl NatsEventSink {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }

    pub fn subject(&self, event: &DomainEvent) -> String { format!("{}.{}", self.prefix, event.subject()) }
}

#[async_trait]
impl EventSink for NatsEventSink {
    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = self.subject(&event);
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(%subject, %error, "could not encode event");
                    continue;
                }
            };
            if let Err(error) = self.client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, %error, "event publish failed");
            }
        }
    }
}

/// Sink for deployments without a message bus.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardEvents;

#[async_trait]
impl EventSink for DiscardEvents {
    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in &events {
            debug!(subject = %event.subject(), "event dropped, no bus configured");
        }
    }
}
