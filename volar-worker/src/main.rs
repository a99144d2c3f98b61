use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use volar_catalog::CityListClassifier;
use volar_core::{LogNotifier, Notifier, SystemClock};
use volar_order::{BookingContext, HoldStore};
use volar_store::app_config::Config;
use volar_store::{DbClient, KafkaNotifier, PgBookingStore};

mod sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volar_worker=debug,volar_order=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Volar booking worker");

    // Database
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let rules = db
        .fetch_booking_rules(config.booking.clone())
        .await
        .context("Failed to load business rules")?;
    tracing::info!(?rules, "Booking rules loaded");

    // Notifications
    let notifier: Arc<dyn Notifier> = if config.kafka.brokers.trim().is_empty() {
        tracing::warn!("No Kafka brokers configured, notifications are only logged");
        Arc::new(LogNotifier)
    } else {
        Arc::new(
            KafkaNotifier::new(&config.kafka.brokers, &config.kafka.notification_topic)
                .context("Failed to create Kafka producer")?,
        )
    };

    let ctx = BookingContext::new(
        Arc::new(PgBookingStore::new(db.pool.clone())),
        Arc::new(SystemClock),
        Arc::new(CityListClassifier::new(&config.routes.domestic_cities)),
        notifier,
        rules,
    );

    let period = Duration::from_secs(config.worker.sweep_interval_seconds.max(1));
    sweeper::run(HoldStore::new(ctx), period, shutdown_signal()).await;

    tracing::info!("Worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
