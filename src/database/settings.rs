// ABOUTME: Key-value platform settings store with upsert semantics
// ABOUTME: Backs the platform credential pair, token expiry, and health snapshot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::HealthSnapshot;

/// Settings keys for the platform-scoped singletons
mod keys {
    pub const PLATFORM_ACCESS_TOKEN: &str = "platform_access_token";
    pub const PLATFORM_REFRESH_TOKEN: &str = "platform_refresh_token";
    pub const PLATFORM_TOKEN_EXPIRES_AT: &str = "platform_token_expires_at";
    pub const PLATFORM_HEALTH_SNAPSHOT: &str = "platform_health_snapshot";
}

impl Database {
    /// Get a setting value, `None` when the key has never been written.
    ///
    /// Absence is distinct from an empty string: a not-yet-provisioned
    /// platform has no row at all.
    pub async fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM platform_settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to query setting {key}: {e}")))?;

        row.map(|r| {
            r.try_get("value")
                .map_err(|e| AppError::database(format!("Failed to get setting value: {e}")))
        })
        .transpose()
    }

    /// Insert or update a setting value
    pub async fn upsert_setting(&self, key: &str, value: &str) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO platform_settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert setting {key}: {e}")))?;

        Ok(())
    }

    /// Delete a setting
    pub async fn delete_setting(&self, key: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM platform_settings WHERE key = ?1")
            .bind(key)
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to delete setting {key}: {e}")))?;

        Ok(())
    }
}

/// Access to the platform-level credential pair and health snapshot.
///
/// The platform credential is global mutable state reached from several
/// call sites; modelling it as an injected trait keeps the provisioning and
/// health services testable without a real database.
#[async_trait]
pub trait PlatformCredentialStore: Send + Sync {
    /// Stored platform access token, decrypted
    async fn platform_access_token(&self) -> AppResult<Option<String>>;
    /// Persist a new platform access token
    async fn set_platform_access_token(&self, token: &str) -> AppResult<()>;
    /// Stored platform refresh token, decrypted
    async fn platform_refresh_token(&self) -> AppResult<Option<String>>;
    /// Persist a new platform refresh token
    async fn set_platform_refresh_token(&self, token: &str) -> AppResult<()>;
    /// Stored platform token expiry
    async fn platform_token_expiry(&self) -> AppResult<Option<DateTime<Utc>>>;
    /// Persist the platform token expiry
    async fn set_platform_token_expiry(&self, expires_at: DateTime<Utc>) -> AppResult<()>;
    /// Load the most recent health snapshot
    async fn load_health_snapshot(&self) -> AppResult<Option<HealthSnapshot>>;
    /// Persist a health snapshot, replacing the prior one wholesale
    async fn store_health_snapshot(&self, snapshot: &HealthSnapshot) -> AppResult<()>;
}

#[async_trait]
impl PlatformCredentialStore for Database {
    async fn platform_access_token(&self) -> AppResult<Option<String>> {
        self.get_setting(keys::PLATFORM_ACCESS_TOKEN)
            .await?
            .map(|enc| self.cipher().decrypt(&enc))
            .transpose()
    }

    async fn set_platform_access_token(&self, token: &str) -> AppResult<()> {
        let encrypted = self.cipher().encrypt(token)?;
        self.upsert_setting(keys::PLATFORM_ACCESS_TOKEN, &encrypted)
            .await
    }

    async fn platform_refresh_token(&self) -> AppResult<Option<String>> {
        self.get_setting(keys::PLATFORM_REFRESH_TOKEN)
            .await?
            .map(|enc| self.cipher().decrypt(&enc))
            .transpose()
    }

    async fn set_platform_refresh_token(&self, token: &str) -> AppResult<()> {
        let encrypted = self.cipher().encrypt(token)?;
        self.upsert_setting(keys::PLATFORM_REFRESH_TOKEN, &encrypted)
            .await
    }

    async fn platform_token_expiry(&self) -> AppResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.get_setting(keys::PLATFORM_TOKEN_EXPIRES_AT).await? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
            AppError::database(format!("Stored platform token expiry is malformed: {e}"))
        })?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    async fn set_platform_token_expiry(&self, expires_at: DateTime<Utc>) -> AppResult<()> {
        self.upsert_setting(keys::PLATFORM_TOKEN_EXPIRES_AT, &expires_at.to_rfc3339())
            .await
    }

    async fn load_health_snapshot(&self) -> AppResult<Option<HealthSnapshot>> {
        let Some(raw) = self.get_setting(keys::PLATFORM_HEALTH_SNAPSHOT).await? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_str(&raw)?;
        Ok(Some(snapshot))
    }

    async fn store_health_snapshot(&self, snapshot: &HealthSnapshot) -> AppResult<()> {
        let raw = serde_json::to_string(snapshot)?;
        self.upsert_setting(keys::PLATFORM_HEALTH_SNAPSHOT, &raw)
            .await
    }
}
