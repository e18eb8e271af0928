//! Password Cipher — ciphered copy of the invoking user's password
//!
//! The context password is never written in the clear when a secret is
//! configured. Each password is sealed with AES-256-GCM under a key derived
//! from the configured secret and the entry's `now` timestamp, with a fresh
//! random nonce:
//!
//! ```text
//! key   = SHA-256(secret || 0x00 || now)
//! text  = base64(nonce[12] || ciphertext+tag)
//! ```
//!
//! Reading back requires the same secret. Journals written without a secret
//! carry `type="plain"` passwords, which any reader accepts.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const NONCE_LEN: usize = 12;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CipherError {
    #[error("Unknown password cipher type: {0}")]
    UnknownType(String),

    #[error("Password is ciphered but no cipher key is configured")]
    MissingKey,

    #[error("Malformed ciphered password: {0}")]
    Malformed(String),

    #[error("Password could not be deciphered (wrong cipher key?)")]
    Decrypt,

    #[error("Password encryption failed")]
    Encrypt,
}

// ── Cipher Type ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherType {
    Plain,
    Aes256Gcm,
}

impl CipherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherType::Plain => "plain",
            CipherType::Aes256Gcm => "aes-256-gcm",
        }
    }

    pub fn parse(name: &str) -> Result<Self, CipherError> {
        match name {
            "plain" => Ok(CipherType::Plain),
            "aes-256-gcm" => Ok(CipherType::Aes256Gcm),
            other => Err(CipherError::UnknownType(other.to_string())),
        }
    }
}

// ── Password Cipher ─────────────────────────────────────────────────

/// Enciphers and deciphers context passwords.
#[derive(Clone, Default)]
pub struct PasswordCipher {
    secret: Option<Vec<u8>>,
}

impl PasswordCipher {
    /// Cipher keyed by `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Some(secret.as_ref().to_vec()),
        }
    }

    /// Cipher with no secret: writes passwords as `plain`.
    pub fn plain() -> Self {
        Self { secret: None }
    }

    pub fn has_key(&self) -> bool {
        self.secret.is_some()
    }

    /// Encipher `password` for an entry whose `now` renders as `key`.
    ///
    /// Empty passwords are written as empty `plain` values.
    pub fn encipher(&self, key: &str, password: &str) -> Result<(CipherType, String), CipherError> {
        let secret = match &self.secret {
            Some(secret) if !password.is_empty() => secret,
            _ => return Ok((CipherType::Plain, password.to_string())),
        };

        let cipher = Self::derive(secret, key)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, password.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&sealed);
        Ok((CipherType::Aes256Gcm, BASE64.encode(framed)))
    }

    /// Recover a password written by `encipher`.
    pub fn decipher(&self, key: &str, kind: CipherType, text: &str) -> Result<String, CipherError> {
        match kind {
            CipherType::Plain => Ok(text.to_string()),
            CipherType::Aes256Gcm => {
                let secret = self.secret.as_ref().ok_or(CipherError::MissingKey)?;
                let framed = BASE64
                    .decode(text.trim())
                    .map_err(|e| CipherError::Malformed(e.to_string()))?;
                if framed.len() <= NONCE_LEN {
                    return Err(CipherError::Malformed(format!(
                        "{} bytes is too short for nonce and tag",
                        framed.len()
                    )));
                }
                let (nonce, sealed) = framed.split_at(NONCE_LEN);
                let cipher = Self::derive(secret, key)?;
                let plain = cipher
                    .decrypt(Nonce::from_slice(nonce), sealed)
                    .map_err(|_| CipherError::Decrypt)?;
                String::from_utf8(plain).map_err(|e| CipherError::Malformed(e.to_string()))
            }
        }
    }

    fn derive(secret: &[u8], key: &str) -> Result<Aes256Gcm, CipherError> {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        Aes256Gcm::new_from_slice(digest.as_slice()).map_err(|_| CipherError::Encrypt)
    }
}

impl fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCipher")
            .field("keyed", &self.has_key())
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
