// ABOUTME: Payment provider REST API collaborator
// ABOUTME: Identity, onboarding-status, and account-provisioning endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

/// HTTP client and trait seam for the provider REST API
pub mod client;

pub use client::{
    ClientLink, ClientLinkAddress, ClientLinkOwner, ClientLinkRequest, HttpProviderClient,
    OnboardingStatusResponse, ProviderApi,
};
