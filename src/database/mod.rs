// ABOUTME: Database connection management with embedded migrations
// ABOUTME: SQLite pool plus the secret cipher used by both credential stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

/// Platform-scoped key-value settings store
pub mod settings;
/// Per-tenant credential storage on the tenant record
pub mod tenant_credentials;

pub use settings::PlatformCredentialStore;

use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::info;

use crate::crypto::SecretCipher;
use crate::errors::{AppError, AppResult};

/// Database connection pool with encryption support
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    cipher: SecretCipher,
}

impl Database {
    /// Create a new database connection and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Database URL is invalid or malformed
    /// - Database connection fails
    /// - Migration process fails
    pub async fn new(database_url: &str, cipher: SecretCipher) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool, cipher };
        db.migrate().await?;
        Ok(db)
    }

    /// Run all pending migrations embedded at compile time
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a reference to the connection pool
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Get a reference to the secret cipher
    #[must_use]
    pub const fn cipher(&self) -> &SecretCipher {
        &self.cipher
    }
}
