// ABOUTME: Scheduled monitor binary: platform health checks plus tenant connection sweeps
// ABOUTME: Wires environment config, database, and provider clients; runs until Ctrl-C
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use payconnect::config::ServerConfig;
use payconnect::crypto::SecretCipher;
use payconnect::database::Database;
use payconnect::models::TenantId;
use payconnect::oauth::HttpTokenClient;
use payconnect::provider::HttpProviderClient;
use payconnect::services::{
    ConnectionAlert, ConnectionMonitoringService, LiveInventory, NotificationSender,
    PlatformHealthService,
};

/// Until the inventory system is wired in, every tenant is treated as
/// having live inventory so a broken connection always escalates. Missing
/// an urgent outage costs more than an over-loud alert.
struct AssumeLiveInventory;

#[async_trait]
impl LiveInventory for AssumeLiveInventory {
    async fn has_live_inventory(&self, _tenant_id: TenantId) -> bool {
        true
    }
}

/// Logs alerts instead of delivering them; the mail integration plugs in
/// here.
struct LogNotifier {
    from_address: String,
}

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send(&self, alert: &ConnectionAlert) -> payconnect::AppResult<()> {
        warn!(
            tenant_id = %alert.tenant_id,
            from = %self.from_address,
            to = ?alert.recipients,
            urgent = alert.urgent,
            subject = %alert.subject,
            "Connection alert (log-only delivery)"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    let cipher =
        SecretCipher::new(&config.master_key).context("Failed to initialize cipher")?;
    let db = Database::new(&config.database_url, cipher)
        .await
        .context("Failed to open database")?;

    let exchanger = Arc::new(
        HttpTokenClient::new(&config.oauth).context("Failed to build token client")?,
    );
    let provider = Arc::new(
        HttpProviderClient::new(&config.provider_api_base_url)
            .context("Failed to build provider client")?,
    );

    let health = Arc::new(PlatformHealthService::new(
        Arc::new(db.clone()),
        provider,
        exchanger,
    ));
    let monitoring = Arc::new(ConnectionMonitoringService::new(
        db,
        Arc::new(AssumeLiveInventory),
        Arc::new(LogNotifier {
            from_address: config.notify_from_address.clone(),
        }),
    ));

    info!(
        interval_secs = config.monitor_interval.as_secs(),
        "Starting payconnect monitor"
    );

    let health_task = {
        let health = Arc::clone(&health);
        let period = config.monitor_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match health.check_health().await {
                    Ok(snapshot) if snapshot.is_healthy => {
                        info!("Platform credential healthy");
                    }
                    Ok(snapshot) => {
                        warn!(
                            needs_refresh = snapshot.needs_refresh,
                            error = snapshot.error.as_deref().unwrap_or("unknown"),
                            "Platform credential unhealthy"
                        );
                    }
                    Err(e) => error!("Platform health check failed: {e}"),
                }
            }
        })
    };

    let sweep_task = {
        let monitoring = Arc::clone(&monitoring);
        let period = config.monitor_interval;
        tokio::spawn(async move {
            monitoring.run_scheduled(period).await;
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping monitor");
    health_task.abort();
    sweep_task.abort();

    Ok(())
}
