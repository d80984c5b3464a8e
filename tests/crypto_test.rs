// ABOUTME: Integration tests for the secret cipher used on stored credentials
// ABOUTME: Round trips, tamper detection, and key isolation for both variants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use payconnect::crypto::SecretCipher;
use payconnect::errors::AppError;

fn cipher_a() -> SecretCipher {
    SecretCipher::new(&[1u8; 32]).unwrap()
}

fn cipher_b() -> SecretCipher {
    SecretCipher::new(&[2u8; 32]).unwrap()
}

#[test]
fn derived_variant_round_trips() {
    let cipher = cipher_a();
    let long = "x".repeat(4096);
    for plaintext in ["", "a", "access_token_abc123", "pâté 🎟️ büyük", long.as_str()] {
        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }
}

#[test]
fn token_variant_round_trips() {
    let cipher = cipher_a();
    let long = "y".repeat(4096);
    for plaintext in ["", "rt_9f8e7d", "токен", long.as_str()] {
        let encrypted = cipher.encrypt_token(plaintext).unwrap();
        assert_eq!(cipher.decrypt_token(&encrypted).unwrap(), plaintext);
    }
}

#[test]
fn from_hex_matches_raw_key() {
    let raw = SecretCipher::new(&[0xabu8; 32]).unwrap();
    let hex = SecretCipher::from_hex(&"ab".repeat(32)).unwrap();
    let encrypted = raw.encrypt_token("secret").unwrap();
    assert_eq!(hex.decrypt_token(&encrypted).unwrap(), "secret");
}

#[test]
fn encryption_is_randomized() {
    let cipher = cipher_a();
    assert_ne!(
        cipher.encrypt("same").unwrap(),
        cipher.encrypt("same").unwrap()
    );
    assert_ne!(
        cipher.encrypt_token("same").unwrap(),
        cipher.encrypt_token("same").unwrap()
    );
}

#[test]
fn wrong_key_fails_uniformly() {
    let encrypted = cipher_a().encrypt("platform_token").unwrap();
    let err = cipher_b().decrypt(&encrypted).unwrap_err();
    assert!(matches!(err, AppError::Decryption));

    let encrypted = cipher_a().encrypt_token("tenant_token").unwrap();
    let err = cipher_b().decrypt_token(&encrypted).unwrap_err();
    assert!(matches!(err, AppError::Decryption));
}

#[test]
fn any_single_byte_tamper_is_rejected() {
    let cipher = cipher_a();
    let encrypted = cipher.encrypt_token("do-not-touch").unwrap();
    let raw = STANDARD.decode(&encrypted).unwrap();

    for i in 0..raw.len() {
        let mut tampered = raw.clone();
        tampered[i] ^= 0x01;
        let result = cipher.decrypt_token(&STANDARD.encode(&tampered));
        assert!(
            matches!(result, Err(AppError::Decryption)),
            "tampered byte {i} was accepted"
        );
    }
}

#[test]
fn truncated_and_garbage_inputs_are_rejected() {
    let cipher = cipher_a();
    assert!(matches!(cipher.decrypt(""), Err(AppError::Decryption)));
    assert!(matches!(
        cipher.decrypt("not base64 !!!"),
        Err(AppError::Decryption)
    ));
    // Valid base64 but shorter than the fixed header
    let short = STANDARD.encode([0u8; 20]);
    assert!(matches!(cipher.decrypt(&short), Err(AppError::Decryption)));
    assert!(matches!(
        cipher.decrypt_token(&STANDARD.encode([0u8; 10])),
        Err(AppError::Decryption)
    ));
}
