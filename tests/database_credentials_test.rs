// ABOUTME: Integration tests for tenant credential storage and platform settings
// ABOUTME: Encryption at rest, disconnect atomicity, status chokepoint, settings semantics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::{Duration, Utc};
use payconnect::crypto::SecretCipher;
use payconnect::database::{Database, PlatformCredentialStore};
use payconnect::errors::AppError;
use payconnect::models::{HealthSnapshot, OnboardingStatus, Tenant, TenantId};
use sqlx::Row;

async fn test_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let cipher = SecretCipher::new(&[9u8; 32]).unwrap();
    let db = Database::new(&url, cipher).await.unwrap();
    (db, dir)
}

async fn seeded_tenant(db: &Database) -> Tenant {
    let mut tenant = Tenant::new("Fest Collective");
    tenant.email = Some("ops@fest.example".to_owned());
    db.create_tenant(&tenant).await.unwrap();
    tenant
}

#[tokio::test]
async fn tokens_round_trip_and_are_encrypted_at_rest() {
    let (db, _dir) = test_db().await;
    let tenant = seeded_tenant(&db).await;
    let expires_at = Utc::now() + Duration::hours(1);

    db.store_tenant_tokens(tenant.id, "access-plain", "refresh-plain", expires_at)
        .await
        .unwrap();

    let pair = db.get_tenant_tokens(tenant.id).await.unwrap().unwrap();
    assert_eq!(pair.access_token, "access-plain");
    assert_eq!(pair.refresh_token, "refresh-plain");
    assert_eq!(pair.expires_at.timestamp(), expires_at.timestamp());

    // The stored columns must never contain the plaintext
    let row = sqlx::query("SELECT access_token_enc, refresh_token_enc FROM tenants WHERE id = ?1")
        .bind(tenant.id.to_string())
        .fetch_one(db.pool())
        .await
        .unwrap();
    let access_enc: String = row.try_get("access_token_enc").unwrap();
    let refresh_enc: String = row.try_get("refresh_token_enc").unwrap();
    assert_ne!(access_enc, "access-plain");
    assert_ne!(refresh_enc, "refresh-plain");
    assert!(!access_enc.contains("access-plain"));
}

#[tokio::test]
async fn successful_connect_marks_onboarding_completed() {
    let (db, _dir) = test_db().await;
    let tenant = seeded_tenant(&db).await;

    db.complete_tenant_connection(tenant.id, "at", "rt", Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let loaded = db.get_tenant(tenant.id).await.unwrap();
    assert_eq!(loaded.onboarding_status, Some(OnboardingStatus::Completed));
    assert!(loaded.has_stored_token);
    assert!(loaded.token_expires_at.is_some());
}

#[tokio::test]
async fn token_only_write_leaves_onboarding_status_untouched() {
    let (db, _dir) = test_db().await;
    let tenant = seeded_tenant(&db).await;

    db.complete_tenant_connection(tenant.id, "at", "rt", Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    db.set_onboarding_status(tenant.id, OnboardingStatus::NeedsData)
        .await
        .unwrap();

    db.store_tenant_tokens(tenant.id, "at2", "rt2", Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let loaded = db.get_tenant(tenant.id).await.unwrap();
    assert_eq!(loaded.onboarding_status, Some(OnboardingStatus::NeedsData));
    let pair = db.get_tenant_tokens(tenant.id).await.unwrap().unwrap();
    assert_eq!(pair.access_token, "at2");
}

#[tokio::test]
async fn unconnected_tenant_yields_none_unknown_tenant_errors() {
    let (db, _dir) = test_db().await;
    let tenant = seeded_tenant(&db).await;

    assert!(db.get_tenant_tokens(tenant.id).await.unwrap().is_none());

    let missing = db.get_tenant_tokens(TenantId::new()).await.unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
    let missing = db
        .store_tenant_tokens(TenantId::new(), "a", "r", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
    let missing = db
        .complete_tenant_connection(TenantId::new(), "a", "r", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}

#[tokio::test]
async fn disconnect_clears_all_token_fields_but_keeps_provisioning_state() {
    let (db, _dir) = test_db().await;
    let tenant = seeded_tenant(&db).await;

    db.set_provisioning_link(tenant.id, "https://provider.example/onboard/x", Some("org_77"))
        .await
        .unwrap();
    db.complete_tenant_connection(tenant.id, "at", "rt", Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    db.disconnect_tenant(tenant.id).await.unwrap();

    let loaded = db.get_tenant(tenant.id).await.unwrap();
    assert!(!loaded.has_stored_token);
    assert!(loaded.token_expires_at.is_none());
    assert!(loaded.onboarding_status.is_none());
    assert!(db.get_tenant_tokens(tenant.id).await.unwrap().is_none());

    // Provisioning history survives a disconnect
    assert_eq!(
        loaded.provisioning_link_url.as_deref(),
        Some("https://provider.example/onboard/x")
    );
    assert_eq!(loaded.provider_account_id.as_deref(), Some("org_77"));
}

#[tokio::test]
async fn provisioning_link_keeps_existing_account_id_when_none_given() {
    let (db, _dir) = test_db().await;
    let tenant = seeded_tenant(&db).await;

    db.set_provisioning_link(tenant.id, "https://provider.example/a", Some("org_1"))
        .await
        .unwrap();
    db.set_provisioning_link(tenant.id, "https://provider.example/b", None)
        .await
        .unwrap();

    let loaded = db.get_tenant(tenant.id).await.unwrap();
    assert_eq!(loaded.provisioning_link_url.as_deref(), Some("https://provider.example/b"));
    assert_eq!(loaded.provider_account_id.as_deref(), Some("org_1"));
}

#[tokio::test]
async fn onboarding_status_chokepoint_requires_existing_tenant() {
    let (db, _dir) = test_db().await;
    let tenant = seeded_tenant(&db).await;

    db.set_onboarding_status(tenant.id, OnboardingStatus::InReview)
        .await
        .unwrap();
    let loaded = db.get_tenant(tenant.id).await.unwrap();
    assert_eq!(loaded.onboarding_status, Some(OnboardingStatus::InReview));

    let err = db
        .set_onboarding_status(TenantId::new(), OnboardingStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_connected_tenants_filters_on_status_and_token() {
    let (db, _dir) = test_db().await;

    let connected = seeded_tenant(&db).await;
    db.complete_tenant_connection(connected.id, "at", "rt", Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    // Completed status but no token: not part of the monitored population
    let stale = seeded_tenant(&db).await;
    db.complete_tenant_connection(stale.id, "at", "rt", Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    db.disconnect_tenant(stale.id).await.unwrap();

    let pending = seeded_tenant(&db).await;
    db.set_onboarding_status(pending.id, OnboardingStatus::Pending)
        .await
        .unwrap();

    let listed = db.list_connected_tenants().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, connected.id);
}

#[tokio::test]
async fn settings_distinguish_absence_from_empty_value() {
    let (db, _dir) = test_db().await;

    assert!(db.get_setting("some_key").await.unwrap().is_none());

    db.upsert_setting("some_key", "").await.unwrap();
    assert_eq!(db.get_setting("some_key").await.unwrap().as_deref(), Some(""));

    db.upsert_setting("some_key", "v2").await.unwrap();
    assert_eq!(db.get_setting("some_key").await.unwrap().as_deref(), Some("v2"));

    db.delete_setting("some_key").await.unwrap();
    assert!(db.get_setting("some_key").await.unwrap().is_none());
}

#[tokio::test]
async fn platform_credential_store_round_trips_encrypted() {
    let (db, _dir) = test_db().await;

    assert!(db.platform_access_token().await.unwrap().is_none());
    assert!(db.platform_token_expiry().await.unwrap().is_none());

    let expires_at = Utc::now() + Duration::hours(2);
    db.set_platform_access_token("platform-at").await.unwrap();
    db.set_platform_refresh_token("platform-rt").await.unwrap();
    db.set_platform_token_expiry(expires_at).await.unwrap();

    assert_eq!(
        db.platform_access_token().await.unwrap().as_deref(),
        Some("platform-at")
    );
    assert_eq!(
        db.platform_refresh_token().await.unwrap().as_deref(),
        Some("platform-rt")
    );
    assert_eq!(
        db.platform_token_expiry().await.unwrap().unwrap().timestamp(),
        expires_at.timestamp()
    );

    let raw = db
        .get_setting("platform_access_token")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(raw, "platform-at");
}

#[tokio::test]
async fn health_snapshot_is_overwritten_wholesale() {
    let (db, _dir) = test_db().await;

    assert!(db.load_health_snapshot().await.unwrap().is_none());

    let unhealthy = HealthSnapshot {
        is_healthy: false,
        last_checked: Utc::now(),
        last_successful_refresh: None,
        error: Some("provider returned status 503".to_owned()),
        expires_at: None,
        needs_refresh: false,
        organization: None,
    };
    db.store_health_snapshot(&unhealthy).await.unwrap();

    let healthy = HealthSnapshot {
        is_healthy: true,
        last_checked: Utc::now(),
        last_successful_refresh: Some(Utc::now()),
        error: None,
        expires_at: Some(Utc::now() + Duration::hours(1)),
        needs_refresh: false,
        organization: None,
    };
    db.store_health_snapshot(&healthy).await.unwrap();

    let loaded = db.load_health_snapshot().await.unwrap().unwrap();
    assert!(loaded.is_healthy);
    assert!(loaded.error.is_none());
    assert!(loaded.last_successful_refresh.is_some());
}

#[tokio::test]
async fn database_file_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("persist.db").display());
    let cipher = SecretCipher::new(&[9u8; 32]).unwrap();

    let tenant_id = {
        let db = Database::new(&url, cipher.clone()).await.unwrap();
        let tenant = seeded_tenant(&db).await;
        db.store_tenant_tokens(tenant.id, "at", "rt", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        tenant.id
    };

    let db = Database::new(&url, cipher).await.unwrap();
    let pair = db.get_tenant_tokens(tenant_id).await.unwrap().unwrap();
    assert_eq!(pair.access_token, "at");
}
