// ABOUTME: Unified error handling for credential lifecycle and provider operations
// ABOUTME: AppError taxonomy with constructor helpers and AppResult alias
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use thiserror::Error;

/// Result alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy
///
/// Variants map to how callers react, not to where the error occurred:
/// `NotConnected` routes to the connect flow, `Refresh` means "reconnect
/// required", `Exchange` means "retry the authorize step", `Config` is fatal
/// at startup, `Decryption` is treated like `NotConnected` for recovery but
/// logged at higher severity.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed configuration (fatal, detected at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    Internal(String),

    /// Caller supplied invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Entity not found
    #[error("{0} not found")]
    NotFound(String),

    /// A required business field is missing on the tenant record
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Tenant has no stored payment provider credential (expected state,
    /// caller should route the tenant to the connect flow)
    #[error("No payment provider connection for {0}")]
    NotConnected(String),

    /// Provider rejected an authorization-code exchange
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// Provider rejected a refresh-token operation (distinct from
    /// `Exchange` so callers can route to reconnect instead of retry)
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Stored ciphertext could not be decrypted
    ///
    /// Deliberately carries no detail: "bad key" and "bad tag" must be
    /// indistinguishable at the error surface.
    #[error("Decryption failed")]
    Decryption,

    /// Provider rejected the credential with a 401
    #[error("Provider rejected credential: {0}")]
    Unauthorized(String),

    /// Transient failure during a health probe
    #[error("Health check failed: {0}")]
    HealthCheck(String),
}

impl AppError {
    /// Configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Not-found error for the named entity
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    /// Missing required business field
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Tenant or platform has no stored credential
    pub fn not_connected(subject: impl Into<String>) -> Self {
        Self::NotConnected(subject.into())
    }

    /// Authorization-code exchange failure
    pub fn exchange(msg: impl Into<String>) -> Self {
        Self::Exchange(msg.into())
    }

    /// Refresh-token failure
    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::Refresh(msg.into())
    }

    /// Provider 401 rejection
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Transient health probe failure
    pub fn health_check(msg: impl Into<String>) -> Self {
        Self::HealthCheck(msg.into())
    }

    /// True when the provider answered with a 401
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// True when the error means "no credential stored" (including
    /// unreadable ciphertext, which is recovered the same way)
    #[must_use]
    pub const fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected(_) | Self::Decryption)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(format!("Database operation failed: {e}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("Serialization failed: {e}"))
    }
}

impl From<uuid::Error> for AppError {
    fn from(e: uuid::Error) -> Self {
        Self::InvalidInput(format!("Invalid UUID: {e}"))
    }
}
