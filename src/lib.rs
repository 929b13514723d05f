//! Phraselock - password-based line-by-line file encryption
//!
//! Each non-blank line of the input is sealed independently: a fresh salt
//! and IV are drawn per line, a 256-bit key is derived from the password
//! with Argon2id, and the line is encrypted with AES-256-GCM. The result
//! is one self-contained JSON record per line.

#![forbid(unsafe_code)]

pub mod error;
pub mod file_ops;
pub mod passphrase;
pub mod record;
pub mod secretcrypt;
