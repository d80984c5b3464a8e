// ABOUTME: Credential lifecycle services: platform health, provisioning, monitoring
// ABOUTME: Also hosts the shared OAuth callback dispatcher for both credential scopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

/// Connection monitoring sweep and escalation notifications
pub mod monitoring;
/// Platform credential health checks and automatic refresh
pub mod platform_health;
/// Privileged tenant-account provisioning
pub mod provisioning;

pub use monitoring::{ConnectionAlert, ConnectionMonitoringService, LiveInventory, NotificationSender};
pub use platform_health::PlatformHealthService;
pub use provisioning::PlatformProvisioningService;

use crate::errors::AppResult;
use crate::models::TenantId;
use crate::oauth::{CallbackState, ConnectService};

/// What an OAuth callback resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A tenant completed the connect (or provisioning) flow
    TenantConnected(TenantId),
    /// The operator completed the platform-level authorization
    PlatformAuthorized,
}

/// Dispatch an inbound OAuth callback.
///
/// The `state` parameter decides which credential scope the code belongs
/// to; the kind is decoded before any tenant id is assumed. Tenant connects
/// and provisioning-flow completions converge here on the same exchange
/// path.
pub async fn handle_oauth_callback(
    connect: &ConnectService,
    provisioning: &PlatformProvisioningService,
    code: &str,
    state: &str,
) -> AppResult<CallbackOutcome> {
    match CallbackState::decode(state)? {
        CallbackState::Tenant(tenant_id) => {
            connect.complete_connect(tenant_id, code).await?;
            Ok(CallbackOutcome::TenantConnected(tenant_id))
        }
        CallbackState::Platform => {
            provisioning.exchange_platform_code(code).await?;
            Ok(CallbackOutcome::PlatformAuthorized)
        }
    }
}
