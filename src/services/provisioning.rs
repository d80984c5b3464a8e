// ABOUTME: Platform-credential provisioning: create provider accounts on tenants' behalf
// ABOUTME: Platform authorization, prefilled client links, onboarding status polling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use super::platform_health::PlatformHealthService;
use crate::config::OAuthConfig;
use crate::database::{Database, PlatformCredentialStore};
use crate::errors::{AppError, AppResult};
use crate::models::{OnboardingPoll, OnboardingStatus, Tenant, TenantId};
use crate::oauth::{CallbackState, ConnectService, TokenExchanger, TENANT_SCOPES};
use crate::provider::{ClientLinkAddress, ClientLinkOwner, ClientLinkRequest, ProviderApi};

/// Scopes the platform credential is authorized for. Provisioning
/// privileges only; the platform credential can never move money.
pub const PLATFORM_SCOPES: &str =
    "organizations.read organizations.write onboarding.read onboarding.write clients.write";

/// Privileged provisioning service operating with the platform credential.
pub struct PlatformProvisioningService {
    db: Database,
    store: Arc<dyn PlatformCredentialStore>,
    provider: Arc<dyn ProviderApi>,
    exchanger: Arc<dyn TokenExchanger>,
    health: Arc<PlatformHealthService>,
    oauth: OAuthConfig,
}

impl PlatformProvisioningService {
    /// Create the provisioning service
    #[must_use]
    pub fn new(
        db: Database,
        store: Arc<dyn PlatformCredentialStore>,
        provider: Arc<dyn ProviderApi>,
        exchanger: Arc<dyn TokenExchanger>,
        health: Arc<PlatformHealthService>,
        oauth: OAuthConfig,
    ) -> Self {
        Self {
            db,
            store,
            provider,
            exchanger,
            health,
            oauth,
        }
    }

    /// Authorization URL for the operator-driven platform flow.
    ///
    /// Uses the `platform` state sentinel and forces the consent screen so
    /// a routine re-authorization cannot silently bind the wrong provider
    /// account.
    pub fn platform_auth_url(&self) -> AppResult<String> {
        let mut url = Url::parse(&self.oauth.authorize_url)
            .map_err(|e| AppError::config(format!("Malformed authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.oauth.client_id)
            .append_pair("redirect_uri", &self.oauth.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", PLATFORM_SCOPES)
            .append_pair("state", &CallbackState::Platform.encode())
            .append_pair("approval_prompt", "force");
        Ok(url.into())
    }

    /// Complete the platform authorization: exchange the code and persist
    /// the resulting pair as the platform credential
    pub async fn exchange_platform_code(&self, code: &str) -> AppResult<()> {
        let tokens = self.exchanger.exchange_code(code).await?;
        let expires_at = tokens.expires_at();
        self.store
            .set_platform_access_token(&tokens.access_token)
            .await?;
        self.store
            .set_platform_refresh_token(&tokens.refresh_token)
            .await?;
        self.store.set_platform_token_expiry(expires_at).await?;
        info!(%expires_at, "Platform credential authorized and stored");
        Ok(())
    }

    /// Create a hosted, prefilled account-provisioning link for a tenant.
    ///
    /// Validates the tenant profile, gates on platform credential health,
    /// then calls the provider. The link URL and any assigned account id
    /// are persisted and the tenant's onboarding status moves to `PENDING`.
    pub async fn create_provisioning_link(&self, tenant_id: TenantId) -> AppResult<String> {
        let tenant = self.db.get_tenant(tenant_id).await?;
        let request = build_client_link_request(&tenant)?;

        // Known-bad credentials fail fast with recovery instructions
        // instead of burning a provider call.
        let snapshot = self.health.check_health().await?;
        if !snapshot.is_healthy {
            let auth_url = self.platform_auth_url()?;
            let reason = snapshot.error.unwrap_or_else(|| "unknown".to_owned());
            if snapshot.needs_refresh {
                return Err(AppError::unauthorized(format!(
                    "Platform credential is unhealthy ({reason}); re-authorize the platform application at {auth_url}"
                )));
            }
            return Err(AppError::config(format!(
                "Platform credential is unhealthy ({reason}); check configuration or authorize at {auth_url}"
            )));
        }

        let Some(platform_token) = self.store.platform_access_token().await? else {
            let auth_url = self.platform_auth_url()?;
            return Err(AppError::config(format!(
                "Platform credential missing; authorize the platform application at {auth_url}"
            )));
        };

        let link = self
            .provider
            .create_client_link(&platform_token, &request)
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    let auth_url = self
                        .platform_auth_url()
                        .unwrap_or_else(|_| self.oauth.authorize_url.clone());
                    AppError::unauthorized(format!(
                        "Platform credential was rejected by the provider; re-authorize the platform application at {auth_url}"
                    ))
                } else {
                    e
                }
            })?;

        self.db
            .set_provisioning_link(tenant_id, &link.url, link.account_id.as_deref())
            .await?;
        self.db
            .set_onboarding_status(tenant_id, OnboardingStatus::Pending)
            .await?;

        info!(%tenant_id, "Created provider provisioning link");
        Ok(link.url)
    }

    /// OAuth-decorated onboarding URL for a tenant, or `None` when no
    /// provisioning link has been created yet.
    ///
    /// Completing the hosted flow behind this link lands on the same
    /// callback as a plain tenant connect, so the decoration carries the
    /// tenant-state parameter and the full tenant scope set.
    pub async fn onboarding_url(&self, tenant_id: TenantId) -> AppResult<Option<String>> {
        let tenant = self.db.get_tenant(tenant_id).await?;
        let Some(link) = tenant.provisioning_link_url else {
            return Ok(None);
        };

        let mut url = Url::parse(&link)
            .map_err(|e| AppError::internal(format!("Stored provisioning link is malformed: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.oauth.client_id)
            .append_pair("redirect_uri", &self.oauth.redirect_uri)
            .append_pair("state", &CallbackState::Tenant(tenant_id).encode())
            .append_pair("scope", TENANT_SCOPES)
            .append_pair("approval_prompt", "force");
        Ok(Some(url.into()))
    }

    /// Poll the provider's onboarding status for a tenant and reconcile the
    /// local status with it.
    ///
    /// A tenant without a usable token is not an error: the last local
    /// status is reported with `changed == false`. Unknown provider
    /// vocabulary is logged and leaves the local status untouched.
    pub async fn poll_onboarding_status(
        &self,
        connect: &ConnectService,
        tenant_id: TenantId,
    ) -> AppResult<OnboardingPoll> {
        let tenant = self.db.get_tenant(tenant_id).await?;

        let token = match connect.get_valid_token(tenant_id).await {
            Ok(token) => token,
            Err(e) if e.is_not_connected() => {
                return Ok(OnboardingPoll {
                    status: tenant.onboarding_status,
                    can_receive_payments: false,
                    changed: false,
                });
            }
            Err(e) => return Err(e),
        };

        let response = self.provider.onboarding_status(&token).await?;

        let (status, changed) = match OnboardingStatus::from_provider_status(&response.status) {
            None => {
                warn!(%tenant_id, provider_status = %response.status, "Unknown provider onboarding status, keeping local status");
                (tenant.onboarding_status, false)
            }
            Some(mapped) if tenant.onboarding_status == Some(mapped) => (Some(mapped), false),
            Some(mapped) => {
                self.db.set_onboarding_status(tenant_id, mapped).await?;
                info!(%tenant_id, status = mapped.as_str(), "Onboarding status advanced");
                (Some(mapped), true)
            }
        };

        Ok(OnboardingPoll {
            status,
            can_receive_payments: response.can_receive_payments,
            changed,
        })
    }

    /// Whether a tenant may publish revenue-bearing events.
    ///
    /// A pure local read of the persisted onboarding status; never blocks
    /// on the provider.
    pub async fn can_publish_events(&self, tenant_id: TenantId) -> AppResult<bool> {
        let tenant = self.db.get_tenant(tenant_id).await?;
        Ok(tenant.onboarding_status == Some(OnboardingStatus::Completed))
    }
}

/// Build the prefilled provisioning request from a tenant profile.
///
/// Each missing required field fails with an error naming that field so
/// operators know exactly what to complete.
fn build_client_link_request(tenant: &Tenant) -> AppResult<ClientLinkRequest> {
    let contact_name = tenant
        .legal_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(&tenant.name);
    if contact_name.is_empty() {
        return Err(AppError::missing_field("name"));
    }

    let email = require_field(tenant.email.as_deref(), "email")?;
    let street = require_field(tenant.street.as_deref(), "street")?;
    let city = require_field(tenant.city.as_deref(), "city")?;
    let postal_code = require_field(tenant.postal_code.as_deref(), "postal_code")?;
    let country = require_field(tenant.country.as_deref(), "country")?;

    Ok(ClientLinkRequest {
        owner: ClientLinkOwner {
            email: email.to_owned(),
            given_name: contact_name.to_owned(),
            family_name: None,
        },
        name: contact_name.to_owned(),
        address: ClientLinkAddress {
            street_and_number: street.to_owned(),
            postal_code: postal_code.to_owned(),
            city: city.to_owned(),
            country: country.to_owned(),
        },
    })
}

fn require_field<'a>(value: Option<&'a str>, field: &str) -> AppResult<&'a str> {
    value
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::missing_field(field))
}
