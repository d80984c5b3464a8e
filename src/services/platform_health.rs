// ABOUTME: Platform credential health checks with one automatic refresh on 401
// ABOUTME: Persists a wholesale-overwritten health snapshot consumed by provisioning and ops
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::database::PlatformCredentialStore;
use crate::errors::AppResult;
use crate::models::HealthSnapshot;
use crate::oauth::TokenExchanger;
use crate::provider::ProviderApi;

/// A snapshot older than this provides no assurance about the present
pub const FRESHNESS_WINDOW_HOURS: i64 = 6;

/// Platform credential health service.
///
/// The only writer path for the platform token pair is this service's own
/// refresh; deployments running multiple scheduled-job instances must
/// serialize them (single leader) so two refreshes cannot race.
pub struct PlatformHealthService {
    store: Arc<dyn PlatformCredentialStore>,
    provider: Arc<dyn ProviderApi>,
    exchanger: Arc<dyn TokenExchanger>,
}

impl PlatformHealthService {
    /// Create the health service
    #[must_use]
    pub fn new(
        store: Arc<dyn PlatformCredentialStore>,
        provider: Arc<dyn ProviderApi>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self {
            store,
            provider,
            exchanger,
        }
    }

    /// Verify the platform credential is usable, attempting exactly one
    /// automatic refresh when the provider rejects it with a 401.
    ///
    /// Every call persists its resulting snapshot, overwriting the prior
    /// one; health state is always the result of the most recent check.
    /// `last_successful_refresh` is the one field carried forward when the
    /// current check performs no refresh itself.
    pub async fn check_health(&self) -> AppResult<HealthSnapshot> {
        let carried_refresh = self
            .store
            .load_health_snapshot()
            .await?
            .and_then(|prior| prior.last_successful_refresh);

        let token = match self.store.platform_access_token().await {
            Ok(token) => token,
            // Unreadable ciphertext recovers the same way as a missing
            // credential, but is logged louder: it means corruption or a
            // key rotation mismatch, not normal expiry.
            Err(e) if e.is_not_connected() => {
                error!("Stored platform access token is unreadable: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        let Some(token) = token else {
            let snapshot = HealthSnapshot {
                is_healthy: false,
                last_checked: Utc::now(),
                last_successful_refresh: carried_refresh,
                error: Some(
                    "Platform credential not configured; authorize the platform application"
                        .to_owned(),
                ),
                expires_at: None,
                needs_refresh: false,
                organization: None,
            };
            self.store.store_health_snapshot(&snapshot).await?;
            return Ok(snapshot);
        };

        let expires_at = self.store.platform_token_expiry().await?;

        let snapshot = match self.provider.current_organization(&token).await {
            Ok(organization) => HealthSnapshot {
                is_healthy: true,
                last_checked: Utc::now(),
                last_successful_refresh: carried_refresh,
                error: None,
                expires_at,
                needs_refresh: false,
                organization: Some(organization),
            },
            Err(e) if e.is_unauthorized() => {
                info!("Platform token rejected, attempting one automatic refresh");
                if self.attempt_token_refresh().await {
                    // Best-effort identity re-probe with the fresh token for
                    // observability; failure here does not undo the refresh.
                    let organization = match self.store.platform_access_token().await {
                        Ok(Some(fresh)) => self.provider.current_organization(&fresh).await.ok(),
                        _ => None,
                    };
                    HealthSnapshot {
                        is_healthy: true,
                        last_checked: Utc::now(),
                        last_successful_refresh: Some(Utc::now()),
                        error: None,
                        expires_at: self.store.platform_token_expiry().await?,
                        needs_refresh: false,
                        organization,
                    }
                } else {
                    HealthSnapshot {
                        is_healthy: false,
                        last_checked: Utc::now(),
                        last_successful_refresh: carried_refresh,
                        error: Some("Platform token rejected and refresh failed".to_owned()),
                        expires_at,
                        needs_refresh: true,
                        organization: None,
                    }
                }
            }
            // Transient outages must not be mis-classified as "needs reauth"
            Err(e) => HealthSnapshot {
                is_healthy: false,
                last_checked: Utc::now(),
                last_successful_refresh: carried_refresh,
                error: Some(e.to_string()),
                expires_at,
                needs_refresh: false,
                organization: None,
            },
        };

        self.store.store_health_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Attempt one platform token refresh.
    ///
    /// On success the new pair and computed expiry are persisted; on any
    /// failure nothing changes and `false` is returned without an error
    /// (callers decide what a false return means).
    pub async fn attempt_token_refresh(&self) -> bool {
        let refresh_token = match self.store.platform_refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No platform refresh token stored, nothing to refresh");
                return false;
            }
            Err(e) => {
                error!("Failed to load platform refresh token: {e}");
                return false;
            }
        };

        let tokens = match self.exchanger.refresh_token(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Platform token refresh rejected by provider: {e}");
                return false;
            }
        };

        let expires_at = tokens.expires_at();
        let stored = async {
            self.store
                .set_platform_access_token(&tokens.access_token)
                .await?;
            self.store
                .set_platform_refresh_token(&tokens.refresh_token)
                .await?;
            self.store.set_platform_token_expiry(expires_at).await
        }
        .await;

        match stored {
            Ok(()) => {
                info!(%expires_at, "Platform token refreshed");
                true
            }
            Err(e) => {
                error!("Failed to persist refreshed platform tokens: {e}");
                false
            }
        }
    }

    /// Whether the platform credential needs operator attention.
    ///
    /// True when no snapshot exists yet, when the last check failed and a
    /// refresh also failed, or when the last check is older than the
    /// freshness window; staleness itself is a signal.
    pub async fn needs_attention(&self) -> AppResult<bool> {
        let Some(snapshot) = self.store.load_health_snapshot().await? else {
            return Ok(true);
        };

        if !snapshot.is_healthy && snapshot.needs_refresh {
            return Ok(true);
        }

        let age = Utc::now() - snapshot.last_checked;
        Ok(age > Duration::hours(FRESHNESS_WINDOW_HOURS))
    }
}
