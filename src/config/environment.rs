// ABOUTME: Environment-based server configuration with startup validation
// ABOUTME: Every required value is checked at process start, never on first request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use std::env;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Default bound on every outbound provider HTTP call
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between scheduled monitoring sweeps
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// OAuth client configuration shared by the tenant and platform flows
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client id issued by the payment provider
    pub client_id: String,
    /// OAuth client secret issued by the payment provider
    pub client_secret: String,
    /// Callback URI registered with the provider
    pub redirect_uri: String,
    /// Provider authorization endpoint (browser redirect target)
    pub authorize_url: String,
    /// Provider token endpoint
    pub token_url: String,
}

/// Full server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database connection string
    pub database_url: String,
    /// Cipher master key (32 bytes, decoded from 64 hex chars)
    pub master_key: Vec<u8>,
    /// OAuth client configuration
    pub oauth: OAuthConfig,
    /// Base URL of the provider's REST API
    pub provider_api_base_url: String,
    /// From-address for escalation notifications
    pub notify_from_address: String,
    /// Interval between scheduled monitoring sweeps
    pub monitor_interval: Duration,
}

impl ServerConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// Missing or malformed required values fail startup with a
    /// [`AppError::Config`] naming the offending variable.
    pub fn from_env() -> AppResult<Self> {
        let master_key_hex = required("PAYCONNECT_MASTER_KEY")?;
        let master_key = hex::decode(master_key_hex.trim()).map_err(|e| {
            AppError::config(format!("PAYCONNECT_MASTER_KEY is not valid hex: {e}"))
        })?;
        if master_key.len() != 32 {
            return Err(AppError::config(format!(
                "PAYCONNECT_MASTER_KEY must decode to 32 bytes, got {}",
                master_key.len()
            )));
        }

        let auth_base = required("PROVIDER_AUTH_BASE_URL")?;
        let oauth = OAuthConfig {
            client_id: required("PAYCONNECT_CLIENT_ID")?,
            client_secret: required("PAYCONNECT_CLIENT_SECRET")?,
            redirect_uri: required("PAYCONNECT_REDIRECT_URI")?,
            authorize_url: format!("{}/oauth2/authorize", auth_base.trim_end_matches('/')),
            token_url: format!("{}/oauth2/tokens", auth_base.trim_end_matches('/')),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            master_key,
            oauth,
            provider_api_base_url: required("PROVIDER_API_BASE_URL")?,
            notify_from_address: required("NOTIFY_FROM_ADDRESS")?,
            monitor_interval: duration_from_env("MONITOR_INTERVAL_SECS", DEFAULT_MONITOR_INTERVAL)?,
        })
    }
}

fn required(name: &str) -> AppResult<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::config(format!(
            "Required environment variable {name} is not set"
        ))),
    }
}

fn duration_from_env(name: &str, default: Duration) -> AppResult<Duration> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(v) => v
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| AppError::config(format!("{name} must be a number of seconds: {e}"))),
    }
}
