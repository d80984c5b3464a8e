// ABOUTME: Scheduled sweep over connected tenants with escalation notifications
// ABOUTME: Urgency scales with live, revenue-bearing inventory; failures never abort the sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{ConnectionCheck, Tenant, TenantId};

/// Answers whether a tenant currently has revenue-bearing inventory on sale
#[async_trait]
pub trait LiveInventory: Send + Sync {
    /// True when the tenant has at least one live, purchasable listing
    async fn has_live_inventory(&self, tenant_id: TenantId) -> bool;
}

/// Outbound notification channel for connection escalations
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Deliver one alert; errors are the sender's to describe
    async fn send(&self, alert: &ConnectionAlert) -> AppResult<()>;
}

/// One escalation notification about a broken tenant connection
#[derive(Debug, Clone)]
pub struct ConnectionAlert {
    /// Affected tenant
    pub tenant_id: TenantId,
    /// Resolved recipient addresses
    pub recipients: Vec<String>,
    /// Subject line, `[URGENT]`-prefixed when revenue is at risk
    pub subject: String,
    /// Plain-text body with reconnect instructions
    pub body: String,
    /// Whether the tenant has live inventory affected by the outage
    pub urgent: bool,
}

/// Scheduled connection-monitoring service.
///
/// Detects tenants whose stored provider credential has become unusable and
/// notifies them, escalating when live inventory means active revenue loss.
pub struct ConnectionMonitoringService {
    db: Database,
    inventory: Arc<dyn LiveInventory>,
    notifier: Arc<dyn NotificationSender>,
}

impl ConnectionMonitoringService {
    /// Create the monitoring service
    #[must_use]
    pub fn new(
        db: Database,
        inventory: Arc<dyn LiveInventory>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            db,
            inventory,
            notifier,
        }
    }

    /// Sweep every connected tenant once.
    ///
    /// Per-tenant failures are recorded in that tenant's check result and
    /// never abort the rest of the sweep.
    pub async fn check_all_connections(&self) -> AppResult<Vec<ConnectionCheck>> {
        let tenants = self.db.list_connected_tenants().await?;
        info!(tenant_count = tenants.len(), "Starting connection monitoring sweep");

        let mut checks = Vec::with_capacity(tenants.len());
        for tenant in &tenants {
            checks.push(self.check_one(tenant).await);
        }

        let broken = checks.iter().filter(|c| !c.connection_valid).count();
        if broken > 0 {
            warn!(broken, total = checks.len(), "Sweep found broken tenant connections");
        }
        Ok(checks)
    }

    /// Re-check one tenant on demand and notify if the connection is broken.
    ///
    /// Returns whether a notification went out; `false` covers both a
    /// healthy connection and a broken one with no reachable recipient.
    pub async fn notify_connection_failure(&self, tenant_id: TenantId) -> AppResult<bool> {
        let tenant = self.db.get_tenant(tenant_id).await?;
        let check = self.check_one(&tenant).await;
        Ok(check.notified)
    }

    /// Run the sweep on a fixed interval until the task is cancelled
    pub async fn run_scheduled(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = self.check_all_connections().await {
                error!("Connection monitoring sweep failed: {e}");
            }
        }
    }

    async fn check_one(&self, tenant: &Tenant) -> ConnectionCheck {
        let has_live_inventory = self.inventory.has_live_inventory(tenant.id).await;
        let recipients = tenant.notification_targets();

        // Local-state heuristic: the stored credential must exist and
        // decrypt. A token the provider has revoked server-side still
        // passes.
        // TODO: follow up with a live verification call against the
        // provider identity endpoint once sweep-level rate budgeting is in
        let connection_valid = match self.db.get_tenant_tokens(tenant.id).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                error!(tenant_id = %tenant.id, "Stored credential unreadable: {e}");
                false
            }
        };

        let mut notified = false;
        if !connection_valid {
            if recipients.is_empty() {
                warn!(
                    tenant_id = %tenant.id,
                    tenant_name = %tenant.name,
                    "Broken connection but tenant has no notification address"
                );
            } else {
                notified = self
                    .send_alert(build_alert(tenant, has_live_inventory, recipients.clone()))
                    .await;
            }
        }

        ConnectionCheck {
            tenant_id: tenant.id,
            tenant_name: tenant.name.clone(),
            connection_valid,
            has_live_inventory,
            recipients,
            notified,
        }
    }

    async fn send_alert(&self, alert: ConnectionAlert) -> bool {
        match self.notifier.send(&alert).await {
            Ok(()) => {
                info!(tenant_id = %alert.tenant_id, urgent = alert.urgent, "Sent connection alert");
                true
            }
            Err(e) => {
                error!(tenant_id = %alert.tenant_id, "Failed to send connection alert: {e}");
                false
            }
        }
    }
}

/// Build the escalation message; live inventory upgrades it to urgent
fn build_alert(tenant: &Tenant, urgent: bool, recipients: Vec<String>) -> ConnectionAlert {
    let subject = if urgent {
        format!(
            "[URGENT] Payment connection for {} is broken: ticket sales are blocked",
            tenant.name
        )
    } else {
        format!("Payment connection for {} needs to be reconnected", tenant.name)
    };

    let body = if urgent {
        format!(
            "The payment provider connection for {} is no longer working and you \
             have tickets on sale right now. Buyers cannot complete purchases until \
             the connection is restored. Please reconnect your payment provider \
             account from the dashboard as soon as possible.",
            tenant.name
        )
    } else {
        format!(
            "The payment provider connection for {} is no longer working. No live \
             sales are affected at the moment, but please reconnect your payment \
             provider account from the dashboard before your next sale.",
            tenant.name
        )
    };

    ConnectionAlert {
        tenant_id: tenant.id,
        recipients,
        subject,
        body,
        urgent,
    }
}
