//! Farm Operations server
//!
//! Serves the alerting API and runs the monitoring engine until Ctrl-C.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farm_ops_backend::{
    create_app,
    services::{LineNotifier, MonitoringEngine, NotificationSink},
    store::{MemoryStore, PgStore, Stores},
    AppState, Config,
};
use shared::GrowthProfileRegistry;

const DEFAULT_LOG_FILTER: &str = "farm_ops_server=debug,farm_ops_backend=debug,tower_http=debug,sqlx=warn";

fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_stores(config: &Config) -> anyhow::Result<(Stores, &'static str)> {
    let Some(url) = &config.database.url else {
        tracing::warn!("No database configured; using in-memory stores");
        return Ok((Stores::in_memory(Arc::new(MemoryStore::new())), "memory"));
    };

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
        .context("connecting to database")?;
    tracing::info!("Database connection established");

    let store = PgStore::new(db_pool, config.monitoring.poll_interval());
    tracing::info!("Running database migrations...");
    store.migrate().await?;
    tracing::info!("Migrations completed");

    Ok((Stores::postgres(Arc::new(store)), "postgres"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("loading configuration")?;

    init_tracing(&config.log_format);

    tracing::info!("Starting Farm Operations Server");
    tracing::info!("Environment: {}", config.environment);

    let (stores, storage_kind) = build_stores(&config).await?;
    let registry = Arc::new(GrowthProfileRegistry::builtin());

    let mut sink = NotificationSink::new(
        stores.notifications.clone(),
        config.monitoring.live_channel_capacity,
    );
    if let Some(line) = LineNotifier::from_config(&config.notifier) {
        tracing::info!("LINE notifications enabled for urgent alerts");
        sink = sink.with_notifier(Arc::new(line), config.notifier.icon_url.clone());
    }
    let sink = Arc::new(sink);

    let engine = Arc::new(MonitoringEngine::new(
        stores.clone(),
        sink.clone(),
        registry.clone(),
        config.monitoring.clone(),
    ));
    engine.start().await?;

    let state = AppState {
        stores,
        sink,
        engine: engine.clone(),
        registry,
        config: Arc::new(config.clone()),
        storage_kind,
    };
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing server address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.stop().await;
    tracing::info!("Server stopped");
    Ok(())
}
