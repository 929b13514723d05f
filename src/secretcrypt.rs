//! Encryption/decryption using Argon2id + AES-256-GCM
//!
//! This module implements password-based encryption of one text value at a
//! time:
//! - Argon2id derives a 256-bit key from the password and a per-record salt
//! - AES-256-GCM provides authenticated encryption under a per-record IV
//!
//! Every call draws a fresh salt and IV, so encrypting the same value twice
//! produces unrelated records. The derived key only ever lives on the stack
//! wrapped in `Zeroizing`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, PhraselockError, Result};
use crate::record::{IV_LEN, Record, SALT_LEN, TAG_LEN};

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// Argon2 memory cost in KiB (64 MiB)
const ARGON2_MEMORY_KIB: u32 = 65536;

/// Argon2 time cost (iterations)
const ARGON2_ITERATIONS: u32 = 4;

/// Argon2 parallelism degree
const ARGON2_PARALLELISM: u32 = 1;

/// Derive a 32-byte key from a password and salt using Argon2id
///
/// Uses the crate's raw-output entry point rather than the PHC string API:
/// the output feeds a cipher directly and is never stored, so no encoding
/// or parameter self-description is wanted.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LEN),
    )
    .map_err(|e| {
        PhraselockError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            format!("failed to create Argon2 params: {}", e),
        )
    })?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt, &mut *key)
        .map_err(|e| {
            PhraselockError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::KeyDerivation,
                format!("Argon2 key derivation failed: {}", e),
            )
        })?;

    Ok(key)
}

/// Encrypt one text value with a password using random salt and IV
pub fn encrypt(password: &[u8], plaintext: &str) -> Result<Record> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    encrypt_deterministic(password, plaintext, &salt, &iv)
}

/// Encrypt one text value with a password using provided salt and IV
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/IV.
pub fn encrypt_deterministic(
    password: &[u8],
    plaintext: &str,
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<Record> {
    let key = derive_key(password, salt)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| {
        PhraselockError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Cipher,
            format!("failed to initialize cipher: {}", e),
        )
    })?;

    // The aead API returns ciphertext with the 16-byte GCM tag appended;
    // the record format stores the two separately.
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(iv), plaintext.as_bytes())
        .map_err(|e| {
            PhraselockError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Cipher,
                format!("encryption failed: {}", e),
            )
        })?;

    if sealed.len() < TAG_LEN {
        return Err(PhraselockError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Cipher,
            "sealed data shorter than the authentication tag",
        ));
    }
    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    let auth_tag: [u8; TAG_LEN] = tag.try_into().map_err(|_| {
        PhraselockError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Cipher,
            "authentication tag has unexpected length",
        )
    })?;

    Ok(Record::from_parts(&sealed, iv, salt, &auth_tag))
}

/// Decrypt a record with a password
///
/// All field decoding happens before any cryptographic work; a record that
/// does not decode fails with a record-format error. Tag verification
/// failure rejects the record atomically - no partial plaintext is ever
/// returned.
pub fn decrypt(password: &[u8], record: &Record) -> Result<String> {
    let iv = record.iv_bytes()?;
    let salt = record.salt_bytes()?;
    let auth_tag = record.auth_tag_bytes()?;
    let mut sealed = record.ciphertext_bytes()?;
    sealed.extend_from_slice(&auth_tag);

    let key = derive_key(password, &salt)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| {
        PhraselockError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Cipher,
            format!("failed to initialize cipher: {}", e),
        )
    })?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
        .map_err(|_| {
            PhraselockError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt record, tampered-with data, or bad password",
            )
        })?;

    String::from_utf8(plaintext).map_err(|e| {
        PhraselockError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::RecordFormat,
            "decrypted data is not valid UTF-8",
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let password = b"test password";
        let plaintext = "hello world";

        let record = encrypt(password, plaintext).unwrap();
        let decrypted = decrypt(password, &record).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_empty_plaintext() {
        let password = b"test";
        let plaintext = "";

        let record = encrypt(password, plaintext).unwrap();
        assert_eq!(record.encrypted_data, "");
        let decrypted = decrypt(password, &record).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_deterministic_encryption() {
        let password = b"test";
        let plaintext = "hello world";
        let salt = [1u8; SALT_LEN];
        let iv = [2u8; IV_LEN];

        let r1 = encrypt_deterministic(password, plaintext, &salt, &iv).unwrap();
        let r2 = encrypt_deterministic(password, plaintext, &salt, &iv).unwrap();

        // Same salt/IV produces identical records
        assert_eq!(r1, r2);

        let decrypted = decrypt(password, &r1).unwrap();
        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_fresh_randomness_per_record() {
        let password = b"test";
        let plaintext = "hello world";

        let r1 = encrypt(password, plaintext).unwrap();
        let r2 = encrypt(password, plaintext).unwrap();

        assert_ne!(r1.salt, r2.salt);
        assert_ne!(r1.iv, r2.iv);
        assert_ne!(r1.encrypted_data, r2.encrypted_data);
    }

    #[test]
    fn test_wrong_password() {
        let record = encrypt(b"correct", "secret data").unwrap();
        let err = decrypt(b"wrong", &record).expect_err("expected authentication failure");

        assert_eq!(err.kind, Some(crate::error::ErrorKind::AuthenticationFailed));
    }

    /// Flips one bit in the named hex field and expects decryption to be
    /// rejected with an authentication failure rather than returning
    /// altered plaintext.
    fn assert_tamper_detected(mutate: impl FnOnce(&mut Record)) {
        let password = b"test";
        let mut record = encrypt(password, "tamper target").unwrap();
        mutate(&mut record);
        let err = decrypt(password, &record).expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(crate::error::ErrorKind::AuthenticationFailed));
    }

    fn flip_first_bit(hex_field: &mut String) {
        let mut bytes = hex::decode(&*hex_field).unwrap();
        bytes[0] ^= 0x01;
        *hex_field = hex::encode(bytes);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        assert_tamper_detected(|r| flip_first_bit(&mut r.encrypted_data));
    }

    #[test]
    fn test_tampered_iv_rejected() {
        assert_tamper_detected(|r| flip_first_bit(&mut r.iv));
    }

    #[test]
    fn test_tampered_salt_rejected() {
        assert_tamper_detected(|r| flip_first_bit(&mut r.salt));
    }

    #[test]
    fn test_tampered_auth_tag_rejected() {
        assert_tamper_detected(|r| flip_first_bit(&mut r.auth_tag));
    }

    #[test]
    fn test_known_example() {
        let record = encrypt(b"mypassword", "correct horse battery staple").unwrap();

        assert_eq!(record.iv.len(), 24);
        assert_eq!(record.salt.len(), 32);
        assert_eq!(record.auth_tag.len(), 32);

        let decrypted = decrypt(b"mypassword", &record).unwrap();
        assert_eq!(decrypted, "correct horse battery staple");

        let err = decrypt(b"wrongpassword", &record).expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(crate::error::ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [7u8; SALT_LEN];
        let k1 = derive_key(b"password", &salt).unwrap();
        let k2 = derive_key(b"password", &salt).unwrap();
        assert_eq!(*k1, *k2);
    }

    #[test]
    fn test_derive_key_sensitive_to_inputs() {
        let salt_a = [7u8; SALT_LEN];
        let salt_b = [8u8; SALT_LEN];
        let base = derive_key(b"password", &salt_a).unwrap();

        let other_salt = derive_key(b"password", &salt_b).unwrap();
        assert_ne!(*base, *other_salt);

        let other_password = derive_key(b"passwore", &salt_a).unwrap();
        assert_ne!(*base, *other_password);
    }
}
