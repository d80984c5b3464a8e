// ABOUTME: OAuth protocol handling for tenant and platform credential flows
// ABOUTME: Callback state encoding, token endpoint client, and the connect service
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

/// Tenant-level connect service and `get_valid_token` chokepoint
pub mod connect;
/// Callback `state` parameter encoding and decoding
pub mod state;
/// Provider token endpoint client
pub mod token_client;

pub use connect::{ConnectService, REFRESH_BUFFER_MINUTES, TENANT_SCOPES};
pub use state::CallbackState;
pub use token_client::{HttpTokenClient, TokenExchanger};
