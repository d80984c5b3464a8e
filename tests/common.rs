// ABOUTME: Shared fixtures for integration tests
// ABOUTME: In-memory credential store, scripted provider, mock exchanger, temp database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payconnect::config::OAuthConfig;
use payconnect::crypto::SecretCipher;
use payconnect::database::{Database, PlatformCredentialStore};
use payconnect::errors::{AppError, AppResult};
use payconnect::models::{HealthSnapshot, OrganizationIdentity, TokenResponse};
use payconnect::oauth::TokenExchanger;
use payconnect::provider::{ClientLink, ClientLinkRequest, OnboardingStatusResponse, ProviderApi};

/// Open a migrated database backed by a temp file; keep the dir alive for
/// the test's duration
pub async fn test_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let cipher = SecretCipher::new(&[9u8; 32]).unwrap();
    let db = Database::new(&url, cipher).await.unwrap();
    (db, dir)
}

pub fn oauth_config() -> OAuthConfig {
    OAuthConfig {
        client_id: "app_123".to_owned(),
        client_secret: "secret_456".to_owned(),
        redirect_uri: "https://platform.example/oauth/callback".to_owned(),
        authorize_url: "https://auth.provider.example/oauth2/authorize".to_owned(),
        token_url: "https://api.provider.example/oauth2/tokens".to_owned(),
    }
}

pub fn token_response(access: &str, refresh: &str, expires_in: i64) -> TokenResponse {
    TokenResponse {
        access_token: access.to_owned(),
        refresh_token: refresh.to_owned(),
        expires_in,
        token_type: Some("bearer".to_owned()),
        scope: None,
    }
}

pub fn org() -> OrganizationIdentity {
    OrganizationIdentity {
        id: "org_platform".to_owned(),
        name: "Platform BV".to_owned(),
        email: Some("finance@platform.example".to_owned()),
    }
}

/// Platform credential store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    pub access: Mutex<Option<String>>,
    pub refresh: Mutex<Option<String>>,
    pub expiry: Mutex<Option<DateTime<Utc>>>,
    pub snapshot: Mutex<Option<HealthSnapshot>>,
}

#[async_trait]
impl PlatformCredentialStore for MemoryStore {
    async fn platform_access_token(&self) -> AppResult<Option<String>> {
        Ok(self.access.lock().unwrap().clone())
    }
    async fn set_platform_access_token(&self, token: &str) -> AppResult<()> {
        *self.access.lock().unwrap() = Some(token.to_owned());
        Ok(())
    }
    async fn platform_refresh_token(&self) -> AppResult<Option<String>> {
        Ok(self.refresh.lock().unwrap().clone())
    }
    async fn set_platform_refresh_token(&self, token: &str) -> AppResult<()> {
        *self.refresh.lock().unwrap() = Some(token.to_owned());
        Ok(())
    }
    async fn platform_token_expiry(&self) -> AppResult<Option<DateTime<Utc>>> {
        Ok(*self.expiry.lock().unwrap())
    }
    async fn set_platform_token_expiry(&self, expires_at: DateTime<Utc>) -> AppResult<()> {
        *self.expiry.lock().unwrap() = Some(expires_at);
        Ok(())
    }
    async fn load_health_snapshot(&self) -> AppResult<Option<HealthSnapshot>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
    async fn store_health_snapshot(&self, snapshot: &HealthSnapshot) -> AppResult<()> {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}

/// Provider double with per-endpoint scripted responses, consumed front to
/// back, and call counters
#[derive(Default)]
pub struct ScriptedProvider {
    pub identity_results: Mutex<Vec<AppResult<OrganizationIdentity>>>,
    pub identity_calls: AtomicUsize,
    pub onboarding_results: Mutex<Vec<AppResult<OnboardingStatusResponse>>>,
    pub onboarding_calls: AtomicUsize,
    pub link_results: Mutex<Vec<AppResult<ClientLink>>>,
    pub link_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with_identity(results: Vec<AppResult<OrganizationIdentity>>) -> Self {
        Self {
            identity_results: Mutex::new(results),
            ..Self::default()
        }
    }
}

fn next<T>(results: &Mutex<Vec<AppResult<T>>>) -> AppResult<T> {
    let mut results = results.lock().unwrap();
    if results.is_empty() {
        return Err(AppError::health_check("no scripted response left"));
    }
    results.remove(0)
}

#[async_trait]
impl ProviderApi for ScriptedProvider {
    async fn current_organization(&self, _access_token: &str) -> AppResult<OrganizationIdentity> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.identity_results)
    }

    async fn onboarding_status(&self, _access_token: &str) -> AppResult<OnboardingStatusResponse> {
        self.onboarding_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.onboarding_results)
    }

    async fn create_client_link(
        &self,
        _platform_token: &str,
        _request: &ClientLinkRequest,
    ) -> AppResult<ClientLink> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.link_results)
    }
}

/// Token exchanger double: fixed responses plus call counters
pub struct MockExchanger {
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub fail_refresh: bool,
}

impl MockExchanger {
    pub fn ok() -> Self {
        Self {
            exchanges: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            fail_refresh: false,
        }
    }

    pub fn failing_refresh() -> Self {
        Self {
            fail_refresh: true,
            ..Self::ok()
        }
    }
}

#[async_trait]
impl TokenExchanger for MockExchanger {
    async fn exchange_code(&self, _code: &str) -> AppResult<TokenResponse> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(token_response("exchanged-at", "exchanged-rt", 3600))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> AppResult<TokenResponse> {
        if self.fail_refresh {
            return Err(AppError::refresh("provider returned status 400"));
        }
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(token_response("refreshed-at", "refreshed-rt", 3600))
    }
}
