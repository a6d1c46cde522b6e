//! netbrokerd: network connectivity broker daemon.

use std::sync::Arc;

use anyhow::Result;

use netbroker_api::ApiState;
use netbroker_core::config::BrokerConfig;
use netbroker_services::{Broker, LoggingConfigurator, NetworkConfigurator};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = BrokerConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = BrokerConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BrokerConfig::default()
    });
    tracing::info!(
        port = config.api.port,
        persist = config.policy.persist,
        background_restricted = config.policy.background_restricted,
        duplicates = ?config.registry.duplicate_suppliers,
        "netbrokerd starting"
    );

    // ── Broker ───────────────────────────────────────────────────────────────
    let configurator: Arc<dyn NetworkConfigurator> = Arc::new(LoggingConfigurator);
    let (broker, broker_task) = Broker::spawn(&config, configurator);

    let default_printer = {
        let mut default_rx = broker.subscribe_default();
        tokio::spawn(async move {
            while default_rx.changed().await.is_ok() {
                let current = *default_rx.borrow_and_update();
                match current {
                    Some(id) => tracing::info!(supplier = id, "default network"),
                    None => tracing::info!("no default network"),
                }
            }
        })
    };

    // ── API ──────────────────────────────────────────────────────────────────
    let api_task = {
        let state = ApiState::new(broker.clone(), &config);
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = netbroker_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
        r = api_task                => tracing::error!("API task exited: {:?}", r),
        r = broker_task             => tracing::error!("broker task exited: {:?}", r),
        r = default_printer         => tracing::error!("default printer exited: {:?}", r),
    }

    tracing::info!("shutting down");
    Ok(())
}
