// ABOUTME: Shared domain types for tenants, credentials, onboarding, and health snapshots
// ABOUTME: TenantId, OnboardingStatus, Tenant, TokenPair, TokenResponse, HealthSnapshot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Tenant identifier (an organization on the platform)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Generate a fresh tenant id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TenantId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Tenant progress through the provider's account-verification process.
///
/// Written from exactly two paths: OAuth connect success (via
/// `Database::complete_tenant_connection`) and onboarding status polling
/// (via `Database::set_onboarding_status`). Token refreshes never touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    /// Provisioning link created, tenant has not started the hosted flow
    Pending,
    /// Provider needs more information from the tenant
    NeedsData,
    /// Provider is reviewing the submitted data
    InReview,
    /// Account verified; tenant is assumed connectable
    Completed,
}

impl OnboardingStatus {
    /// Stored string form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::NeedsData => "NEEDS_DATA",
            Self::InReview => "IN_REVIEW",
            Self::Completed => "COMPLETED",
        }
    }

    /// Parse the stored string form
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "NEEDS_DATA" => Some(Self::NeedsData),
            "IN_REVIEW" => Some(Self::InReview),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Map the provider's onboarding vocabulary onto the local enum
    #[must_use]
    pub fn from_provider_status(s: &str) -> Option<Self> {
        match s {
            "needs-data" => Some(Self::NeedsData),
            "in-review" => Some(Self::InReview),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A tenant (organization) record with its provider-connection fields.
///
/// Encrypted token columns are intentionally absent here: plaintext tokens
/// are only materialized by `Database::get_tenant_tokens` for the scope of
/// one operation. `has_stored_token` reflects whether the encrypted access
/// token column is non-null.
#[derive(Debug, Clone)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: TenantId,
    /// Display name
    pub name: String,
    /// Legal or contact name used for provider provisioning
    pub legal_name: Option<String>,
    /// General contact email
    pub email: Option<String>,
    /// Billing-specific email, preferred for escalation notifications
    pub billing_email: Option<String>,
    /// Street and number
    pub street: Option<String>,
    /// City
    pub city: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// ISO country code
    pub country: Option<String>,
    /// Whether an encrypted access token is stored for this tenant
    pub has_stored_token: bool,
    /// When the stored access token expires
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Local onboarding status
    pub onboarding_status: Option<OnboardingStatus>,
    /// External account id assigned by the provider
    pub provider_account_id: Option<String>,
    /// Hosted provisioning link created on the tenant's behalf
    pub provisioning_link_url: Option<String>,
    /// Record creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a fresh tenant record with no provider connection
    #[must_use]
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: TenantId::new(),
            name: name.to_owned(),
            legal_name: None,
            email: None,
            billing_email: None,
            street: None,
            city: None,
            postal_code: None,
            country: None,
            has_stored_token: false,
            token_expires_at: None,
            onboarding_status: None,
            provider_account_id: None,
            provisioning_link_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Email addresses to notify for this tenant, billing address preferred.
    ///
    /// An empty list is valid and means the tenant cannot be notified.
    #[must_use]
    pub fn notification_targets(&self) -> Vec<String> {
        if let Some(billing) = self.billing_email.as_deref().filter(|e| !e.is_empty()) {
            return vec![billing.to_owned()];
        }
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| vec![e.to_owned()])
            .unwrap_or_default()
    }
}

/// Decrypted token pair, only materialized for the scope of one operation
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Plaintext access token
    pub access_token: String,
    /// Plaintext refresh token
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

/// Provider token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer access token
    pub access_token: String,
    /// Refresh token (providers may rotate this on each refresh)
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Token type, normally "bearer"
    #[serde(default)]
    pub token_type: Option<String>,
    /// Granted scope string
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry computed from `expires_in`
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(self.expires_in)
    }
}

/// Account identity returned by the provider's health/identity endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationIdentity {
    /// Provider-side account id
    pub id: String,
    /// Account display name
    pub name: String,
    /// Account contact email
    #[serde(default)]
    pub email: Option<String>,
}

/// Persisted result of the most recent platform-credential liveness check.
///
/// Overwritten wholesale on every check; `last_successful_refresh` is the
/// only field carried forward when the current check performs no refresh.
/// Optional fields use `#[serde(default)]` so stored snapshots tolerate
/// additive format evolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Whether the platform credential is currently usable
    pub is_healthy: bool,
    /// When this check ran
    pub last_checked: DateTime<Utc>,
    /// When a refresh last succeeded (carried forward between checks)
    #[serde(default)]
    pub last_successful_refresh: Option<DateTime<Utc>>,
    /// Raw error captured on an unhealthy check
    #[serde(default)]
    pub error: Option<String>,
    /// Stored platform token expiry at check time
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// True only when a refresh was attempted and failed, never speculative
    pub needs_refresh: bool,
    /// Provider account identity attached on healthy checks
    #[serde(default)]
    pub organization: Option<OrganizationIdentity>,
}

/// Result of polling the provider's onboarding-status endpoint
#[derive(Debug, Clone)]
pub struct OnboardingPoll {
    /// Local status after the poll
    pub status: Option<OnboardingStatus>,
    /// Whether the provider reports the account can receive payments
    pub can_receive_payments: bool,
    /// Whether the local status changed as a result of this poll
    pub changed: bool,
}

/// Outcome of one tenant in a monitoring sweep
#[derive(Debug, Clone)]
pub struct ConnectionCheck {
    /// Tenant that was checked
    pub tenant_id: TenantId,
    /// Tenant display name
    pub tenant_name: String,
    /// Whether the stored connection looks valid (local-state heuristic)
    pub connection_valid: bool,
    /// Whether the tenant has live, revenue-bearing inventory
    pub has_live_inventory: bool,
    /// Resolved notification recipients
    pub recipients: Vec<String>,
    /// Whether an escalation notification was sent
    pub notified: bool,
}

/// Parse an optional status column into the enum, rejecting unknown values
pub fn parse_status_column(value: Option<String>) -> AppResult<Option<OnboardingStatus>> {
    match value {
        None => Ok(None),
        Some(s) => OnboardingStatus::from_str_value(&s)
            .map(Some)
            .ok_or_else(|| AppError::database(format!("Unknown onboarding status in store: {s}"))),
    }
}
