//! Storefront - order lifecycle and pricing service

use anyhow::Result;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::clock::SystemClock;
use storefront::config::Config;
use storefront::events::{DiscardEvents, EventSink, NatsEventSink};
use storefront::gateway::RazorpayGateway;
use storefront::http::{router, AppState};
use storefront::services::{CheckoutSettings, Services};
use storefront::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let events: Arc<dyn EventSink> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsEventSink::new(client, "storefront")),
            Err(error) => {
                tracing::warn!(%error, "NATS unavailable, events will be dropped");
                Arc::new(DiscardEvents)
            }
        },
        None => Arc::new(DiscardEvents),
    };

    let settings = CheckoutSettings { currency: config.currency.clone(), delivery_days: config.delivery_days };
    let gateway = Arc::new(RazorpayGateway::new(config.gateway.clone()));
    let services = Services::new(store, gateway, events, Arc::new(SystemClock), settings);

    let app = router(AppState { services }).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!(port = config.port, "storefront listening");
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
