// ABOUTME: Payment provider REST client for identity, onboarding, and provisioning calls
// ABOUTME: Bearer-authenticated requests with bounded timeouts; trait seam for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::environment::DEFAULT_HTTP_TIMEOUT;
use crate::errors::{AppError, AppResult};
use crate::models::OrganizationIdentity;

/// Provider onboarding-status endpoint response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatusResponse {
    /// Provider status vocabulary: "needs-data", "in-review", "completed"
    pub status: String,
    /// Whether the account can receive payments
    pub can_receive_payments: bool,
    /// Whether the account can receive settlements
    #[serde(default)]
    pub can_receive_settlements: bool,
}

/// Prefilled profile sent to the account-provisioning endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLinkRequest {
    /// Account owner contact
    pub owner: ClientLinkOwner,
    /// Organization legal name
    pub name: String,
    /// Registered address
    pub address: ClientLinkAddress,
}

/// Owner block of a provisioning request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLinkOwner {
    /// Contact email
    pub email: String,
    /// Given name (or full contact name when not split)
    pub given_name: String,
    /// Family name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

/// Address block of a provisioning request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLinkAddress {
    /// Street and number
    pub street_and_number: String,
    /// Postal code
    pub postal_code: String,
    /// City
    pub city: String,
    /// ISO country code
    pub country: String,
}

/// Hosted provisioning link returned by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct ClientLink {
    /// Hosted, prefilled account-creation URL
    pub url: String,
    /// Provider account id, when assigned at link-creation time
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Provider REST API collaborator.
///
/// A 401 from any endpoint maps to [`AppError::Unauthorized`] so callers
/// can distinguish "credential rejected" from transient failures.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Lightweight authenticated identity call used as the liveness probe
    async fn current_organization(&self, access_token: &str) -> AppResult<OrganizationIdentity>;
    /// Onboarding status for the account owning the bearer token
    async fn onboarding_status(&self, access_token: &str) -> AppResult<OnboardingStatusResponse>;
    /// Create a prefilled provisioning link using the platform credential
    async fn create_client_link(
        &self,
        platform_token: &str,
        request: &ClientLinkRequest,
    ) -> AppResult<ClientLink>;
}

/// Production provider REST client
pub struct HttpProviderClient {
    http: reqwest::Client,
    api_base_url: String,
}

impl HttpProviderClient {
    /// Create a client for the given API base URL
    pub fn new(api_base_url: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }
}

/// Map a non-2xx provider response: 401 becomes `Unauthorized`, everything
/// else a health-check failure carrying the status. Body is logged, never
/// returned to callers.
async fn classify_failure(
    endpoint: &str,
    subject: &str,
    response: reqwest::Response,
) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(
        endpoint,
        subject,
        status = status.as_u16(),
        provider_response = %body,
        "Provider API call failed"
    );
    if status == reqwest::StatusCode::UNAUTHORIZED {
        AppError::unauthorized(format!("provider returned 401 for {subject}"))
    } else {
        AppError::health_check(format!("provider returned status {status} for {subject}"))
    }
}

fn transport_error(endpoint: &str, subject: &str, e: &reqwest::Error) -> AppError {
    warn!(endpoint, subject, "Provider API request failed: {e}");
    AppError::health_check(format!("provider unreachable for {subject}"))
}

#[async_trait]
impl ProviderApi for HttpProviderClient {
    async fn current_organization(&self, access_token: &str) -> AppResult<OrganizationIdentity> {
        let endpoint = self.endpoint("/organizations/me");
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, "identity check", &e))?;

        if !response.status().is_success() {
            return Err(classify_failure(&endpoint, "identity check", response).await);
        }

        response
            .json::<OrganizationIdentity>()
            .await
            .map_err(|e| AppError::health_check(format!("malformed identity response: {e}")))
    }

    async fn onboarding_status(&self, access_token: &str) -> AppResult<OnboardingStatusResponse> {
        let endpoint = self.endpoint("/onboarding/me");
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, "onboarding status", &e))?;

        if !response.status().is_success() {
            return Err(classify_failure(&endpoint, "onboarding status", response).await);
        }

        response
            .json::<OnboardingStatusResponse>()
            .await
            .map_err(|e| AppError::health_check(format!("malformed onboarding response: {e}")))
    }

    async fn create_client_link(
        &self,
        platform_token: &str,
        request: &ClientLinkRequest,
    ) -> AppResult<ClientLink> {
        let endpoint = self.endpoint("/client-links");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(platform_token)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, "platform provisioning", &e))?;

        if !response.status().is_success() {
            return Err(classify_failure(&endpoint, "platform provisioning", response).await);
        }

        response
            .json::<ClientLink>()
            .await
            .map_err(|e| AppError::internal(format!("malformed client link response: {e}")))
    }
}
