// ABOUTME: OAuth callback state parameter as a tagged union
// ABOUTME: Distinguishes tenant-level connects from the platform-level authorization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::TenantId;

/// Sentinel `state` value for the platform-level authorization flow
const PLATFORM_SENTINEL: &str = "platform";

/// Decoded OAuth callback `state`.
///
/// Two independent credential scopes share one callback route; the kind is
/// always decoded from `state` before a tenant id is assumed, never
/// inferred from side channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    /// Normal tenant connect (or provisioning-flow completion)
    Tenant(TenantId),
    /// Platform-level authorization completion
    Platform,
}

/// Wire form of the tenant state payload
#[derive(Serialize, Deserialize)]
struct TenantStatePayload {
    tenant_id: TenantId,
}

impl CallbackState {
    /// Encode for the `state` query parameter.
    ///
    /// Tenant states round-trip the tenant id as base64url JSON so the
    /// callback needs no server-side session; the platform flow uses a
    /// fixed sentinel.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Platform => PLATFORM_SENTINEL.to_owned(),
            Self::Tenant(tenant_id) => {
                let payload = TenantStatePayload {
                    tenant_id: *tenant_id,
                };
                // Serializing a single-field struct of plain types cannot fail
                let json = serde_json::to_vec(&payload).unwrap_or_default();
                URL_SAFE_NO_PAD.encode(json)
            }
        }
    }

    /// Decode a callback `state` parameter
    pub fn decode(state: &str) -> AppResult<Self> {
        if state == PLATFORM_SENTINEL {
            return Ok(Self::Platform);
        }

        let raw = URL_SAFE_NO_PAD
            .decode(state)
            .map_err(|e| AppError::invalid_input(format!("Malformed OAuth state: {e}")))?;
        let payload: TenantStatePayload = serde_json::from_slice(&raw)
            .map_err(|e| AppError::invalid_input(format!("Malformed OAuth state payload: {e}")))?;
        Ok(Self::Tenant(payload.tenant_id))
    }
}
