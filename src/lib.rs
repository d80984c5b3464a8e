// ABOUTME: Multi-tenant payment provider connection library: credentials, provisioning, health
// ABOUTME: Encrypted token storage, OAuth flows, platform provisioning, connection monitoring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

//! Payment provider connection management for a multi-tenant platform.
//!
//! Each tenant (an organization selling through the platform) connects its
//! own payment provider account over OAuth; the platform additionally holds
//! one privileged credential used to provision provider accounts on behalf
//! of tenants. This crate owns the full credential lifecycle:
//!
//! - encrypted at-rest storage of tenant and platform token pairs
//! - the OAuth connect, exchange, and proactive-refresh flows
//! - platform credential health checks with automatic refresh
//! - hosted account provisioning and onboarding-status reconciliation
//! - scheduled monitoring of tenant connections with escalation alerts
//!
//! Plaintext tokens are only ever materialized for the scope of a single
//! operation; everything that crosses a storage boundary is AES-256-GCM
//! encrypted under the platform master key.

/// Environment-driven runtime configuration
pub mod config;
/// AES-256-GCM secret encryption under the platform master key
pub mod crypto;
/// SQLite-backed persistence for tenants and platform settings
pub mod database;
/// Application error type and result alias
pub mod errors;
/// Shared domain types
pub mod models;
/// OAuth flows: callback state, token endpoint client, connect service
pub mod oauth;
/// Payment provider REST API collaborator
pub mod provider;
/// Lifecycle services: health, provisioning, monitoring, callback dispatch
pub mod services;

pub use errors::{AppError, AppResult};
