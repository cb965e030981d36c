// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Crypto Service
//!
//! AES-256-GCM encryption for stored scripts. The process-wide master key
//! comes from `MASTER_ENCRYPTION_KEY` (base64 of 32 bytes); when unset a
//! fresh key is generated and exported into the environment for the
//! process lifetime. Password-derived keys use PBKDF2-HMAC-SHA256 with
//! 100 000 iterations or scrypt with N=2^14, r=8, p=1.
//!
//! Ciphertext layout: 96-bit random nonce prepended to the GCM output,
//! base64-encoded.

use std::num::NonZeroU32;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

use text_etl_domain::error::EtlError;

/// Environment variable supplying the process-wide master key.
pub const MASTER_KEY_ENV: &str = "MASTER_ENCRYPTION_KEY";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Process-wide symmetric key; zeroed on drop.
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Generates a fresh random key.
    pub fn generate() -> Result<Self, EtlError> {
        let mut bytes = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| EtlError::InternalError("random key generation failed".to_string()))?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Resolves the key from `MASTER_ENCRYPTION_KEY`, generating and
    /// exporting a fresh one when the variable is unset.
    pub fn from_env() -> Result<Self, EtlError> {
        match std::env::var(MASTER_KEY_ENV) {
            Ok(encoded) => {
                let decoded = BASE64.decode(encoded.trim()).map_err(|e| {
                    EtlError::InvalidConfiguration(format!("{} is not base64: {}", MASTER_KEY_ENV, e))
                })?;
                let bytes: [u8; KEY_LEN] = decoded.try_into().map_err(|_| {
                    EtlError::InvalidConfiguration(format!(
                        "{} must decode to exactly {} bytes",
                        MASTER_KEY_ENV, KEY_LEN
                    ))
                })?;
                Ok(Self { bytes })
            }
            Err(_) => {
                let key = Self::generate()?;
                std::env::set_var(MASTER_KEY_ENV, BASE64.encode(key.bytes));
                Ok(key)
            }
        }
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Symmetric authenticated encryption over a fixed key.
pub struct CryptoService {
    cipher: Aes256Gcm,
}

impl CryptoService {
    pub fn new(key: &MasterKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
        Self { cipher }
    }

    /// Service keyed by PBKDF2-HMAC-SHA256 (100 000 iterations).
    pub fn from_password_pbkdf2(password: &str, salt: &[u8]) -> Result<Self, EtlError> {
        let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
            .ok_or_else(|| EtlError::InternalError("zero iteration count".to_string()))?;
        let mut key = [0u8; KEY_LEN];
        ring::pbkdf2::derive(
            ring::pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            salt,
            password.as_bytes(),
            &mut key,
        );
        let service = Self::new(&MasterKey::from_bytes(key));
        key.zeroize();
        Ok(service)
    }

    /// Service keyed by scrypt with N=2^14, r=8, p=1.
    pub fn from_password_scrypt(password: &str, salt: &[u8]) -> Result<Self, EtlError> {
        let params = scrypt::Params::new(14, 8, 1, KEY_LEN)
            .map_err(|e| EtlError::InternalError(format!("scrypt parameters: {}", e)))?;
        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(password.as_bytes(), salt, &params, &mut key)
            .map_err(|e| EtlError::InternalError(format!("scrypt derivation: {}", e)))?;
        let service = Self::new(&MasterKey::from_bytes(key));
        key.zeroize();
        Ok(service)
    }

    /// Encrypts UTF-8 text; returns base64 of nonce || ciphertext.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, EtlError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| EtlError::InternalError("nonce generation failed".to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| EtlError::InternalError("encryption failed".to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    /// Decrypts a payload produced by [`CryptoService::encrypt_str`].
    ///
    /// # Errors
    ///
    /// `EtlError::IntegrityError` when the payload is malformed or
    /// authentication fails (tampered or wrong key).
    pub fn decrypt_str(&self, payload: &str) -> Result<String, EtlError> {
        let decoded = BASE64
            .decode(payload.trim())
            .map_err(|_| EtlError::IntegrityError("ciphertext is not base64".to_string()))?;
        if decoded.len() < NONCE_LEN {
            return Err(EtlError::IntegrityError("ciphertext too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = decoded.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EtlError::IntegrityError("decryption failed (tampered or wrong key)".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| EtlError::IntegrityError("decrypted payload is not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let service = CryptoService::new(&MasterKey::generate().unwrap());
        let plaintext = "result = input['text'].upper()";
        let ciphertext = service.encrypt_str(plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(service.decrypt_str(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_nonces_differ_between_calls() {
        let service = CryptoService::new(&MasterKey::generate().unwrap());
        let a = service.encrypt_str("same").unwrap();
        let b = service.encrypt_str("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_fails_integrity() {
        let service = CryptoService::new(&MasterKey::generate().unwrap());
        let ciphertext = service.encrypt_str("payload").unwrap();
        let mut bytes = BASE64.decode(&ciphertext).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = BASE64.encode(bytes);

        let err = service.decrypt_str(&tampered).unwrap_err();
        assert_eq!(err.kind(), "integrity_error");
    }

    #[test]
    fn test_wrong_key_fails_integrity() {
        let a = CryptoService::new(&MasterKey::generate().unwrap());
        let b = CryptoService::new(&MasterKey::generate().unwrap());
        let ciphertext = a.encrypt_str("secret").unwrap();
        assert!(b.decrypt_str(&ciphertext).is_err());
    }

    #[test]
    fn test_password_derivation_is_deterministic() {
        let salt = b"0123456789abcdef";
        let a = CryptoService::from_password_pbkdf2("hunter2", salt).unwrap();
        let b = CryptoService::from_password_pbkdf2("hunter2", salt).unwrap();
        let ciphertext = a.encrypt_str("data").unwrap();
        assert_eq!(b.decrypt_str(&ciphertext).unwrap(), "data");
    }

    #[test]
    fn test_scrypt_derivation_round_trips() {
        let salt = b"fedcba9876543210";
        let a = CryptoService::from_password_scrypt("hunter2", salt).unwrap();
        let ciphertext = a.encrypt_str("data").unwrap();
        let b = CryptoService::from_password_scrypt("hunter2", salt).unwrap();
        assert_eq!(b.decrypt_str(&ciphertext).unwrap(), "data");
    }

    // Single test touching MASTER_ENCRYPTION_KEY so parallel tests never
    // race on the process environment.
    #[test]
    fn test_master_key_env_behavior() {
        std::env::remove_var(MASTER_KEY_ENV);
        let _first = MasterKey::from_env().unwrap();
        let exported = std::env::var(MASTER_KEY_ENV).unwrap();
        let second = MasterKey::from_env().unwrap();
        assert_eq!(BASE64.encode(second.as_slice()), exported);

        std::env::set_var(MASTER_KEY_ENV, "not-base64!!!");
        assert!(MasterKey::from_env().is_err());
        std::env::set_var(MASTER_KEY_ENV, BASE64.encode([0u8; 16]));
        assert!(MasterKey::from_env().is_err());
        std::env::remove_var(MASTER_KEY_ENV);
    }
}
