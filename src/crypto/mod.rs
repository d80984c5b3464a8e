// ABOUTME: Cryptographic utilities for at-rest secret storage
// ABOUTME: Exposes the SecretCipher used by both credential stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

/// Authenticated encryption of opaque secret strings
pub mod cipher;

pub use cipher::SecretCipher;
