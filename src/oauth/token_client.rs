// ABOUTME: Provider token endpoint client for code exchange and token refresh
// ABOUTME: Form-encoded grant requests with bounded timeouts; trait seam for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use async_trait::async_trait;
use tracing::warn;

use crate::config::environment::DEFAULT_HTTP_TIMEOUT;
use crate::config::OAuthConfig;
use crate::errors::{AppError, AppResult};
use crate::models::TokenResponse;

/// Token endpoint collaborator.
///
/// Exchange and refresh fail with distinct error variants so callers can
/// react differently: a refresh failure means "reconnect required", an
/// exchange failure means "retry the authorize step".
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange an authorization code for a token pair
    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse>;
    /// Refresh an expired or expiring token pair
    async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenResponse>;
}

/// Production token endpoint client
pub struct HttpTokenClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl HttpTokenClient {
    /// Create a client from OAuth configuration.
    ///
    /// Every request carries a bounded timeout; a timed-out call is treated
    /// identically to a non-2xx response.
    pub fn new(config: &OAuthConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    async fn post_grant(&self, form: &[(&str, &str)], grant_type: &str) -> AppResult<TokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.token_url, grant_type, "Token endpoint request failed: {e}");
                token_error(grant_type, "provider unreachable or timed out")
            })?;

        let status = response.status();
        if !status.is_success() {
            // The raw provider body is logged for operators, never surfaced
            // to end users.
            let body = response.text().await.unwrap_or_default();
            warn!(
                endpoint = %self.token_url,
                grant_type,
                status = status.as_u16(),
                provider_response = %body,
                "Token endpoint rejected the request"
            );
            return Err(token_error(
                grant_type,
                &format!("provider returned status {status}"),
            ));
        }

        response.json::<TokenResponse>().await.map_err(|e| {
            warn!(endpoint = %self.token_url, grant_type, "Malformed token response: {e}");
            token_error(grant_type, "malformed token response")
        })
    }
}

fn token_error(grant_type: &str, detail: &str) -> AppError {
    if grant_type == "refresh_token" {
        AppError::refresh(detail.to_owned())
    } else {
        AppError::exchange(detail.to_owned())
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenClient {
    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        self.post_grant(&form, "authorization_code").await
    }

    async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        self.post_grant(&form, "refresh_token").await
    }
}
