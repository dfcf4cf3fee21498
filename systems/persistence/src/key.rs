//! Secret key used to authenticate save files.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Environment variable holding the base64 encoded save key.
pub const SAVE_KEY_ENV: &str = "DELVE_SAVE_KEY";

/// Shortest accepted key, in bytes.
pub const MIN_KEY_LEN: usize = 16;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Reasons a save key cannot be loaded.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The environment variable is unset or not unicode.
    #[error("environment variable {var} is not set")]
    Missing {
        /// Variable that was read.
        var: String,
    },
    /// The key is not valid base64.
    #[error("save key is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    /// The key is too short to be secret.
    #[error("save key has {len} bytes, at least {min} are required")]
    TooShort {
        /// Decoded length.
        len: usize,
        /// Required length.
        min: usize,
    },
    /// The MAC rejected the key material.
    #[error("save key cannot initialise HMAC-SHA256")]
    Mac,
}

/// Process-wide secret for authenticating saves.
///
/// The bytes are wiped when the key is dropped and never appear in `Debug`
/// output.
#[derive(Clone)]
pub struct SaveKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl SaveKey {
    /// Wraps raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::TooShort`] for keys below [`MIN_KEY_LEN`] bytes.
    pub fn new(bytes: Vec<u8>) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() < MIN_KEY_LEN {
            return Err(KeyError::TooShort {
                len: bytes.len(),
                min: MIN_KEY_LEN,
            });
        }
        Ok(Self { bytes })
    }

    /// Decodes a standard base64 key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Encoding`] or [`KeyError::TooShort`].
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let decoded = STANDARD.decode(encoded.trim())?;
        Self::new(decoded)
    }

    /// Reads a base64 key from the environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] when the variable is absent, otherwise
    /// any error from [`SaveKey::from_base64`].
    pub fn from_env(var: &str) -> Result<Self, KeyError> {
        let encoded = std::env::var(var)
            .map(Zeroizing::new)
            .map_err(|_| KeyError::Missing {
                var: var.to_owned(),
            })?;
        let key = Self::from_base64(&encoded)?;
        log::debug!("loaded {}-byte save key from {var}", key.bytes.len());
        Ok(key)
    }

    pub(crate) fn mac(&self) -> Result<HmacSha256, KeyError> {
        <HmacSha256 as Mac>::new_from_slice(&self.bytes).map_err(|_| KeyError::Mac)
    }
}

impl fmt::Debug for SaveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SaveKey(<redacted>)")
    }
}
