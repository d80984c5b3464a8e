// ABOUTME: Configuration management for the credential lifecycle service
// ABOUTME: Environment-driven, fail-fast at process start
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

/// Environment variable loading and validation
pub mod environment;

pub use environment::{OAuthConfig, ServerConfig};
