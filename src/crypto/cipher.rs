// ABOUTME: Symmetric authenticated encryption for OAuth tokens and other opaque secrets
// ABOUTME: AES-256-GCM with a PBKDF2-derived per-call key, plus a fast master-key variant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Payconnect

use std::num::NonZeroU32;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::{AppError, AppResult};

/// AES-256-GCM with the 16-byte IV the storage format mandates
type Cipher = AesGcm<Aes256, U16>;

const KEY_LEN: usize = 32;
const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Symmetric authenticated cipher for opaque secret strings.
///
/// Two variants share one master key:
///
/// - `encrypt`/`decrypt` derive a per-call working key via PBKDF2 from a
///   fresh random salt. Layout: base64(`salt(32) ∥ iv(16) ∥ tag(16) ∥ ct`).
///   Used for the platform credential pair (low volume, highest privilege).
/// - `encrypt_token`/`decrypt_token` use the master key directly with a
///   fresh random IV. Layout: base64(`iv(16) ∥ tag(16) ∥ ct`). Used for
///   per-tenant tokens, which sit on the hot path of every provider call.
///
/// A given class of secret is always encrypted and decrypted with the same
/// variant. All decryption failures collapse to [`AppError::Decryption`]:
/// the error surface never distinguishes a wrong key from a bad tag or a
/// truncated input.
#[derive(Clone)]
pub struct SecretCipher {
    master_key: [u8; KEY_LEN],
}

impl SecretCipher {
    /// Create a cipher from raw key material.
    ///
    /// Fails fast when the key is not exactly 32 bytes so a misconfigured
    /// deployment dies at startup, not on first use.
    pub fn new(key: &[u8]) -> AppResult<Self> {
        let master_key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            AppError::config(format!(
                "Cipher master key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self { master_key })
    }

    /// Create a cipher from a hex-encoded key (64 hex characters)
    pub fn from_hex(hex_key: &str) -> AppResult<Self> {
        let key = hex::decode(hex_key.trim())
            .map_err(|e| AppError::config(format!("Cipher master key is not valid hex: {e}")))?;
        Self::new(&key)
    }

    /// Encrypt a secret with a PBKDF2-derived per-call key
    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let salt = random_bytes::<SALT_LEN>()?;
        let iv = random_bytes::<IV_LEN>()?;

        let derived = self.derive_key(&salt);
        let sealed = seal(&derived, &iv, plaintext)?;

        // salt ∥ iv ∥ tag ∥ ciphertext
        let mut combined = Vec::with_capacity(SALT_LEN + IV_LEN + sealed.len());
        combined.extend_from_slice(&salt);
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&sealed);
        Ok(STANDARD.encode(combined))
    }

    /// Decrypt a secret produced by [`Self::encrypt`]
    pub fn decrypt(&self, secret: &str) -> AppResult<String> {
        let combined = STANDARD.decode(secret).map_err(|_| AppError::Decryption)?;
        if combined.len() < SALT_LEN + IV_LEN + TAG_LEN {
            return Err(AppError::Decryption);
        }

        let (salt, rest) = combined.split_at(SALT_LEN);
        let (iv, sealed) = rest.split_at(IV_LEN);

        let derived = self.derive_key(salt);
        open(&derived, iv, sealed)
    }

    /// Encrypt a token with the master key directly (no derivation step)
    pub fn encrypt_token(&self, plaintext: &str) -> AppResult<String> {
        let iv = random_bytes::<IV_LEN>()?;
        let sealed = seal(&self.master_key, &iv, plaintext)?;

        // iv ∥ tag ∥ ciphertext
        let mut combined = Vec::with_capacity(IV_LEN + sealed.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&sealed);
        Ok(STANDARD.encode(combined))
    }

    /// Decrypt a token produced by [`Self::encrypt_token`]
    pub fn decrypt_token(&self, secret: &str) -> AppResult<String> {
        let combined = STANDARD.decode(secret).map_err(|_| AppError::Decryption)?;
        if combined.len() < IV_LEN + TAG_LEN {
            return Err(AppError::Decryption);
        }

        let (iv, sealed) = combined.split_at(IV_LEN);
        open(&self.master_key, iv, sealed)
    }

    fn derive_key(&self, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut derived = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            salt,
            &self.master_key,
            &mut derived,
        );
        derived
    }
}

/// Encrypt, returning `tag(16) ∥ ciphertext`
fn seal(key: &[u8; KEY_LEN], iv: &[u8], plaintext: &str) -> AppResult<Vec<u8>> {
    let cipher = Cipher::new_from_slice(key)
        .map_err(|e| AppError::internal(format!("Failed to create cipher key: {e}")))?;
    let nonce = Nonce::<U16>::from_slice(iv);

    // aes-gcm appends the tag; the storage format wants it up front
    let mut ct_and_tag = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| AppError::internal("Encryption failed"))?;
    let tag = ct_and_tag.split_off(ct_and_tag.len() - TAG_LEN);

    let mut out = Vec::with_capacity(ct_and_tag.len() + TAG_LEN);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&ct_and_tag);
    Ok(out)
}

/// Decrypt `tag(16) ∥ ciphertext`; every failure mode maps to `Decryption`
fn open(key: &[u8; KEY_LEN], iv: &[u8], sealed: &[u8]) -> AppResult<String> {
    let cipher = Cipher::new_from_slice(key).map_err(|_| AppError::Decryption)?;
    let nonce = Nonce::<U16>::from_slice(iv);

    let (tag, ciphertext) = sealed.split_at(TAG_LEN);
    let mut ct_and_tag = Vec::with_capacity(sealed.len());
    ct_and_tag.extend_from_slice(ciphertext);
    ct_and_tag.extend_from_slice(tag);

    let plaintext = cipher
        .decrypt(nonce, ct_and_tag.as_slice())
        .map_err(|_| AppError::Decryption)?;
    String::from_utf8(plaintext).map_err(|_| AppError::Decryption)
}

fn random_bytes<const N: usize>() -> AppResult<[u8; N]> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; N];
    rng.fill(&mut bytes)
        .map_err(|e| AppError::internal(format!("Failed to generate random bytes: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn test_cipher() -> SecretCipher {
        SecretCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn rejects_short_and_long_keys() {
        assert!(SecretCipher::new(&[0u8; 16]).is_err());
        assert!(SecretCipher::new(&[0u8; 33]).is_err());
        assert!(SecretCipher::new(&[0u8; 32]).is_ok());
    }

    #[test]
    fn derived_layout_has_expected_length() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("abc").unwrap();
        let raw = STANDARD.decode(encrypted).unwrap();
        assert_eq!(raw.len(), SALT_LEN + IV_LEN + TAG_LEN + 3);
    }

    #[test]
    fn token_layout_has_expected_length() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt_token("abc").unwrap();
        let raw = STANDARD.decode(encrypted).unwrap();
        assert_eq!(raw.len(), IV_LEN + TAG_LEN + 3);
    }

    #[test]
    fn variants_are_not_interchangeable() {
        let cipher = test_cipher();
        let derived = cipher.encrypt("secret").unwrap();
        let fast = cipher.encrypt_token("secret").unwrap();
        assert!(cipher.decrypt_token(&derived).is_err());
        assert!(cipher.decrypt(&fast).is_err());
    }
}
