// ABOUTME: Per-tenant credential storage on the tenant record
// ABOUTME: Encrypted token pair, expiry, onboarding status, and provisioning link CRUD
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{parse_status_column, OnboardingStatus, Tenant, TenantId, TokenPair};

impl Database {
    /// Create a tenant record
    pub async fn create_tenant(&self, tenant: &Tenant) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO tenants (
                id, name, legal_name, email, billing_email,
                street, city, postal_code, country,
                onboarding_status, provider_account_id, provisioning_link_url,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
        )
        .bind(tenant.id.to_string())
        .bind(&tenant.name)
        .bind(&tenant.legal_name)
        .bind(&tenant.email)
        .bind(&tenant.billing_email)
        .bind(&tenant.street)
        .bind(&tenant.city)
        .bind(&tenant.postal_code)
        .bind(&tenant.country)
        .bind(tenant.onboarding_status.map(|s| s.as_str()))
        .bind(&tenant.provider_account_id)
        .bind(&tenant.provisioning_link_url)
        .bind(tenant.created_at.to_rfc3339())
        .bind(tenant.updated_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create tenant: {e}")))?;

        Ok(())
    }

    /// Get a tenant by id
    pub async fn get_tenant(&self, tenant_id: TenantId) -> AppResult<Tenant> {
        let row = sqlx::query(
            r"
            SELECT id, name, legal_name, email, billing_email,
                   street, city, postal_code, country,
                   access_token_enc, token_expires_at, onboarding_status,
                   provider_account_id, provisioning_link_url, created_at, updated_at
            FROM tenants
            WHERE id = ?1
            ",
        )
        .bind(tenant_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to query tenant: {e}")))?;

        row.map_or_else(|| Err(AppError::not_found("Tenant")), |row| row_to_tenant(&row))
    }

    /// Store a token pair for a tenant without touching onboarding status.
    ///
    /// The proactive-refresh write path: a routine refresh must never
    /// promote a status the polling path has downgraded. Connect
    /// completions use [`Self::complete_tenant_connection`] instead.
    pub async fn store_tenant_tokens(
        &self,
        tenant_id: TenantId,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let access_enc = self.cipher().encrypt_token(access_token)?;
        let refresh_enc = self.cipher().encrypt_token(refresh_token)?;

        let rows =
            update_token_columns(self.pool(), tenant_id, &access_enc, &refresh_enc, expires_at)
                .await?;
        if rows == 0 {
            return Err(AppError::not_found("Tenant"));
        }
        Ok(())
    }

    /// Store a freshly issued token pair and mark the tenant `COMPLETED`,
    /// in one transaction.
    ///
    /// A successful OAuth connect means the provider let the tenant through
    /// its hosted flow. The token triple and the status land together or
    /// not at all; a tenant can never hold a fresh pair with a stale
    /// status.
    pub async fn complete_tenant_connection(
        &self,
        tenant_id: TenantId,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let access_enc = self.cipher().encrypt_token(access_token)?;
        let refresh_enc = self.cipher().encrypt_token(refresh_token)?;

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::database(format!("Failed to begin tenant connection transaction: {e}"))
        })?;

        let rows =
            update_token_columns(&mut *tx, tenant_id, &access_enc, &refresh_enc, expires_at)
                .await?;
        if rows == 0 {
            return Err(AppError::not_found("Tenant"));
        }
        update_status_column(&mut *tx, tenant_id, OnboardingStatus::Completed).await?;

        tx.commit().await.map_err(|e| {
            AppError::database(format!("Failed to commit tenant connection: {e}"))
        })
    }

    /// Get the decrypted token pair for a tenant, `None` when not connected.
    ///
    /// Plaintext is decrypted fresh on each call and must not outlive the
    /// calling operation.
    pub async fn get_tenant_tokens(&self, tenant_id: TenantId) -> AppResult<Option<TokenPair>> {
        let row = sqlx::query(
            r"
            SELECT access_token_enc, refresh_token_enc, token_expires_at
            FROM tenants
            WHERE id = ?1
            ",
        )
        .bind(tenant_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to query tenant tokens: {e}")))?;

        let Some(row) = row else {
            return Err(AppError::not_found("Tenant"));
        };

        let access_enc: Option<String> = row
            .try_get("access_token_enc")
            .map_err(|e| AppError::database(format!("Failed to get access_token_enc: {e}")))?;
        let Some(access_enc) = access_enc else {
            return Ok(None);
        };

        // Tokens are issued as a pair with an expiry; a half-populated row
        // is corruption, not a normal state.
        let refresh_enc: String = row
            .try_get::<Option<String>, _>("refresh_token_enc")
            .map_err(|e| AppError::database(format!("Failed to get refresh_token_enc: {e}")))?
            .ok_or_else(|| {
                AppError::database(format!(
                    "Tenant {tenant_id} has an access token but no refresh token"
                ))
            })?;
        let expires_raw: String = row
            .try_get::<Option<String>, _>("token_expires_at")
            .map_err(|e| AppError::database(format!("Failed to get token_expires_at: {e}")))?
            .ok_or_else(|| {
                AppError::database(format!(
                    "Tenant {tenant_id} has an access token but no expiry"
                ))
            })?;

        let expires_at = DateTime::parse_from_rfc3339(&expires_raw)
            .map_err(|e| AppError::database(format!("Stored token expiry is malformed: {e}")))?
            .with_timezone(&Utc);

        Ok(Some(TokenPair {
            access_token: self.cipher().decrypt_token(&access_enc)?,
            refresh_token: self.cipher().decrypt_token(&refresh_enc)?,
            expires_at,
        }))
    }

    /// Disconnect a tenant from the payment provider.
    ///
    /// All four token-related columns are nulled in one statement; no
    /// partial state is ever observable.
    pub async fn disconnect_tenant(&self, tenant_id: TenantId) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE tenants
            SET access_token_enc = NULL,
                refresh_token_enc = NULL,
                token_expires_at = NULL,
                onboarding_status = NULL,
                updated_at = ?2
            WHERE id = ?1
            ",
        )
        .bind(tenant_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to disconnect tenant: {e}")))?;

        Ok(())
    }

    /// Set the onboarding status for a tenant.
    ///
    /// Both writers (OAuth connect success, onboarding polling) funnel into
    /// the same status-column update, so the two paths cannot disagree on
    /// the enum.
    pub async fn set_onboarding_status(
        &self,
        tenant_id: TenantId,
        status: OnboardingStatus,
    ) -> AppResult<()> {
        let rows = update_status_column(self.pool(), tenant_id, status).await?;
        if rows == 0 {
            return Err(AppError::not_found("Tenant"));
        }
        Ok(())
    }

    /// Persist the provisioning link created for a tenant, together with the
    /// provider account id when the provisioning call returned one
    pub async fn set_provisioning_link(
        &self,
        tenant_id: TenantId,
        link_url: &str,
        provider_account_id: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE tenants
            SET provisioning_link_url = ?2,
                provider_account_id = COALESCE(?3, provider_account_id),
                updated_at = ?4
            WHERE id = ?1
            ",
        )
        .bind(tenant_id.to_string())
        .bind(link_url)
        .bind(provider_account_id)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to set provisioning link: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Tenant"));
        }
        Ok(())
    }

    /// List tenants with a completed connection and a stored access token.
    ///
    /// The population the monitoring sweep operates on.
    pub async fn list_connected_tenants(&self) -> AppResult<Vec<Tenant>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, legal_name, email, billing_email,
                   street, city, postal_code, country,
                   access_token_enc, token_expires_at, onboarding_status,
                   provider_account_id, provisioning_link_url, created_at, updated_at
            FROM tenants
            WHERE onboarding_status = 'COMPLETED' AND access_token_enc IS NOT NULL
            ORDER BY created_at
            ",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list connected tenants: {e}")))?;

        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            tenants.push(row_to_tenant(&row)?);
        }
        Ok(tenants)
    }
}

async fn update_token_columns<'e, E>(
    executor: E,
    tenant_id: TenantId,
    access_enc: &str,
    refresh_enc: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<u64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        r"
        UPDATE tenants
        SET access_token_enc = ?2,
            refresh_token_enc = ?3,
            token_expires_at = ?4,
            updated_at = ?5
        WHERE id = ?1
        ",
    )
    .bind(tenant_id.to_string())
    .bind(access_enc)
    .bind(refresh_enc)
    .bind(expires_at.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to store tenant tokens: {e}")))?;

    Ok(result.rows_affected())
}

async fn update_status_column<'e, E>(
    executor: E,
    tenant_id: TenantId,
    status: OnboardingStatus,
) -> AppResult<u64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result =
        sqlx::query("UPDATE tenants SET onboarding_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(tenant_id.to_string())
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .execute(executor)
            .await
            .map_err(|e| AppError::database(format!("Failed to set onboarding status: {e}")))?;

    Ok(result.rows_affected())
}

fn row_to_tenant(row: &SqliteRow) -> AppResult<Tenant> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database(format!("Failed to get id: {e}")))?;
    let access_enc: Option<String> = row
        .try_get("access_token_enc")
        .map_err(|e| AppError::database(format!("Failed to get access_token_enc: {e}")))?;
    let status_raw: Option<String> = row
        .try_get("onboarding_status")
        .map_err(|e| AppError::database(format!("Failed to get onboarding_status: {e}")))?;

    Ok(Tenant {
        id: id_str.parse()?,
        name: row
            .try_get("name")
            .map_err(|e| AppError::database(format!("Failed to get name: {e}")))?,
        legal_name: row
            .try_get("legal_name")
            .map_err(|e| AppError::database(format!("Failed to get legal_name: {e}")))?,
        email: row
            .try_get("email")
            .map_err(|e| AppError::database(format!("Failed to get email: {e}")))?,
        billing_email: row
            .try_get("billing_email")
            .map_err(|e| AppError::database(format!("Failed to get billing_email: {e}")))?,
        street: row
            .try_get("street")
            .map_err(|e| AppError::database(format!("Failed to get street: {e}")))?,
        city: row
            .try_get("city")
            .map_err(|e| AppError::database(format!("Failed to get city: {e}")))?,
        postal_code: row
            .try_get("postal_code")
            .map_err(|e| AppError::database(format!("Failed to get postal_code: {e}")))?,
        country: row
            .try_get("country")
            .map_err(|e| AppError::database(format!("Failed to get country: {e}")))?,
        has_stored_token: access_enc.is_some(),
        token_expires_at: parse_optional_timestamp(row, "token_expires_at")?,
        onboarding_status: parse_status_column(status_raw)?,
        provider_account_id: row
            .try_get("provider_account_id")
            .map_err(|e| AppError::database(format!("Failed to get provider_account_id: {e}")))?,
        provisioning_link_url: row
            .try_get("provisioning_link_url")
            .map_err(|e| AppError::database(format!("Failed to get provisioning_link_url: {e}")))?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> AppResult<DateTime<Utc>> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| AppError::database(format!("Failed to get {column}: {e}")))?;
    Ok(DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| AppError::database(format!("Stored {column} is malformed: {e}")))?
        .with_timezone(&Utc))
}

fn parse_optional_timestamp(row: &SqliteRow, column: &str) -> AppResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row
        .try_get(column)
        .map_err(|e| AppError::database(format!("Failed to get {column}: {e}")))?;
    raw.map(|r| {
        DateTime::parse_from_rfc3339(&r)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AppError::database(format!("Stored {column} is malformed: {e}")))
    })
    .transpose()
}
