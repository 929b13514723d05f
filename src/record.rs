//! The serialized record format
//!
//! One encrypted line is persisted as a single-line JSON object with four
//! hex-encoded fields:
//!
//! `{"encryptedData":"<hex>","iv":"<hex>","salt":"<hex>","authTag":"<hex>"}`
//!
//! The field names match files written by earlier versions of this tool
//! and must not change.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, ErrorKind, PhraselockError, Result};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of the AES-GCM IV in bytes
pub const IV_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// One encrypted line, every component hex-encoded.
///
/// Parsing is strict: all four fields must be present, with nothing else.
/// Decoding of the individual fields is deferred to the accessors so that
/// a parse failure and a bad field are reported the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    #[serde(rename = "encryptedData")]
    pub encrypted_data: String,
    pub iv: String,
    pub salt: String,
    #[serde(rename = "authTag")]
    pub auth_tag: String,
}

impl Record {
    /// Builds a record from raw components, hex-encoding each field.
    pub fn from_parts(
        ciphertext: &[u8],
        iv: &[u8; IV_LEN],
        salt: &[u8; SALT_LEN],
        auth_tag: &[u8; TAG_LEN],
    ) -> Self {
        Self {
            encrypted_data: hex::encode(ciphertext),
            iv: hex::encode(iv),
            salt: hex::encode(salt),
            auth_tag: hex::encode(auth_tag),
        }
    }

    /// Parses a single serialized record.
    pub fn from_json(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| {
            PhraselockError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::RecordFormat,
                "input unrecognized as an encrypted record",
                e,
            )
        })
    }

    /// Serializes the record to a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            PhraselockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::RecordFormat,
                "failed to serialize record",
                e,
            )
        })
    }

    /// Decodes the ciphertext field.
    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>> {
        decode_hex("encryptedData", &self.encrypted_data)
    }

    /// Decodes the IV field, which must be exactly [`IV_LEN`] bytes.
    pub fn iv_bytes(&self) -> Result<[u8; IV_LEN]> {
        decode_fixed("iv", &self.iv)
    }

    /// Decodes the salt field, which must be exactly [`SALT_LEN`] bytes.
    pub fn salt_bytes(&self) -> Result<[u8; SALT_LEN]> {
        decode_fixed("salt", &self.salt)
    }

    /// Decodes the authentication tag field, which must be exactly [`TAG_LEN`] bytes.
    pub fn auth_tag_bytes(&self) -> Result<[u8; TAG_LEN]> {
        decode_fixed("authTag", &self.auth_tag)
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| {
        PhraselockError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::RecordFormat,
            format!("field {} is not valid hex", field),
            e,
        )
    })
}

fn decode_fixed<const N: usize>(field: &str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(field, value)?;
    bytes.try_into().map_err(|_| {
        PhraselockError::with_kind(
            ErrorCategory::User,
            ErrorKind::RecordFormat,
            format!("field {} must decode to exactly {} bytes", field, N),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record::from_parts(b"\x01\x02\x03", &[0xAA; IV_LEN], &[0xBB; SALT_LEN], &[0xCC; TAG_LEN])
    }

    #[test]
    fn test_roundtrip_through_json() {
        let record = sample_record();
        let line = record.to_json().unwrap();
        let parsed = Record::from_json(&line).unwrap();
        assert_eq!(record, parsed);
    }

    #[test]
    fn test_exact_field_names() {
        // Files written by earlier versions use these exact keys; they are
        // part of the persisted format.
        let line = sample_record().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("encryptedData"));
        assert!(object.contains_key("iv"));
        assert!(object.contains_key("salt"));
        assert!(object.contains_key("authTag"));
        assert_eq!(object.len(), 4);
    }

    #[test]
    fn test_field_lengths() {
        let record = sample_record();
        assert_eq!(record.iv.len(), IV_LEN * 2);
        assert_eq!(record.salt.len(), SALT_LEN * 2);
        assert_eq!(record.auth_tag.len(), TAG_LEN * 2);
        assert_eq!(record.iv_bytes().unwrap(), [0xAA; IV_LEN]);
        assert_eq!(record.salt_bytes().unwrap(), [0xBB; SALT_LEN]);
        assert_eq!(record.auth_tag_bytes().unwrap(), [0xCC; TAG_LEN]);
        assert_eq!(record.ciphertext_bytes().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_field_rejected() {
        let line = r#"{"encryptedData":"00","iv":"00","salt":"00"}"#;
        let err = Record::from_json(line).expect_err("expected missing field error");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let line = concat!(
            r#"{"encryptedData":"00","iv":"00","salt":"00","authTag":"00","#,
            r#""extra":"00"}"#
        );
        let err = Record::from_json(line).expect_err("expected unknown field error");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }

    #[test]
    fn test_not_json_rejected() {
        let err = Record::from_json("something not looking like a record")
            .expect_err("expected parse error");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }

    #[test]
    fn test_non_hex_content_rejected() {
        let mut record = sample_record();
        record.iv = "zz".repeat(IV_LEN);
        let err = record.iv_bytes().expect_err("expected hex decode error");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut record = sample_record();
        record.salt = "ab".repeat(SALT_LEN - 1);
        let err = record.salt_bytes().expect_err("expected length error");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));

        let mut record = sample_record();
        record.iv = "ab".repeat(IV_LEN + 1);
        let err = record.iv_bytes().expect_err("expected length error");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }

    #[test]
    fn test_empty_ciphertext_allowed() {
        let record = Record::from_parts(b"", &[0; IV_LEN], &[0; SALT_LEN], &[0; TAG_LEN]);
        assert_eq!(record.encrypted_data, "");
        assert_eq!(record.ciphertext_bytes().unwrap(), Vec::<u8>::new());
    }
}
