#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tamper-evident save envelopes with replay protection.
//!
//! A save is the canonical bincode encoding of the game state followed by an
//! HMAC-SHA256 tag over `payload ‖ nonce`. Nonces come from a monotonic
//! counter; a loader refuses any envelope whose nonce does not exceed the
//! last one it accepted.
//!
//! On disk an envelope is laid out as follows, all integers little-endian:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 2 | format version |
//! | 2 | 4 | magic `DLVS` |
//! | 6 | 8 | nonce |
//! | 14 | 4 | payload length `n` |
//! | 18 | n | payload |
//! | 18 + n | 32 | tag |

mod file;
mod key;

use bincode::Options;
use hmac::Mac;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use file::SaveFile;
pub use key::{KeyError, SaveKey, MIN_KEY_LEN, SAVE_KEY_ENV};

/// Envelope format written by this crate.
pub const SAVE_FORMAT_VERSION: u16 = 1;

/// Magic bytes following the version field.
pub const MAGIC: [u8; 4] = *b"DLVS";

/// Length of the authentication tag.
pub const TAG_LEN: usize = 32;

/// Largest payload accepted when encoding or decoding.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

const HEADER_LEN: usize = 2 + 4 + 8 + 4;

/// Errors raised while producing a save.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The state could not be encoded.
    #[error("state could not be encoded: {0}")]
    Encode(#[from] bincode::Error),
    /// The encoded state exceeds [`MAX_PAYLOAD_LEN`].
    #[error("encoded state is {len} bytes, the limit is {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge {
        /// Encoded length.
        len: usize,
    },
    /// The nonce counter cannot advance any further.
    #[error("save nonce counter is exhausted")]
    NonceExhausted,
    /// The key cannot be used for signing.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// Writing the save failed.
    #[error("save could not be written: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a save. A failed load yields no state.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The tag does not match the payload and nonce.
    #[error("save file failed authentication")]
    TamperedSave,
    /// The nonce is not newer than the last accepted one.
    #[error("save nonce {nonce} is not newer than {last_accepted}")]
    ReplayedSave {
        /// Nonce carried by the envelope.
        nonce: u64,
        /// Last nonce the loader accepted.
        last_accepted: u64,
    },
    /// The bytes are not a well-formed envelope or the payload does not
    /// decode.
    #[error("save file is corrupt: {0}")]
    CorruptSave(String),
    /// The envelope was written by another format version.
    #[error("save format version {0} is not supported")]
    UnsupportedVersion(u16),
    /// Reading the save failed.
    #[error("save file could not be read: {0}")]
    Io(#[from] std::io::Error),
}

/// Monotonic source of save nonces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NonceCounter {
    last_issued: u64,
}

impl NonceCounter {
    /// Counter that has issued nothing yet; its first nonce is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { last_issued: 0 }
    }

    /// Resumes a counter after `last_issued`.
    #[must_use]
    pub const fn resume(last_issued: u64) -> Self {
        Self { last_issued }
    }

    /// Most recently issued nonce, zero if none.
    #[must_use]
    pub const fn last_issued(&self) -> u64 {
        self.last_issued
    }

    /// Issues the next nonce.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::NonceExhausted`] once `u64::MAX` has been issued.
    pub fn next_nonce(&mut self) -> Result<u64, SaveError> {
        let next = self
            .last_issued
            .checked_add(1)
            .ok_or(SaveError::NonceExhausted)?;
        self.last_issued = next;
        Ok(next)
    }
}

/// Authenticated save envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveEnvelope {
    version: u16,
    nonce: u64,
    payload: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl SaveEnvelope {
    /// Format version of the envelope.
    #[must_use]
    pub const fn version(&self) -> u16 {
        self.version
    }

    /// Anti-replay nonce.
    #[must_use]
    pub const fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Canonical encoding of the saved state.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Authentication tag.
    #[must_use]
    pub const fn tag(&self) -> &[u8; TAG_LEN] {
        &self.tag
    }

    /// Serialises the envelope into its on-disk layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len() + TAG_LEN);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        let len = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(&self.tag);
        bytes
    }

    /// Parses the on-disk layout. The version is checked before anything
    /// else is interpreted; authentication happens in [`load`].
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnsupportedVersion`] for foreign versions and
    /// [`LoadError::CorruptSave`] for structural damage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let version_bytes: [u8; 2] = take(bytes, 0)?;
        let version = u16::from_le_bytes(version_bytes);
        if version != SAVE_FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion(version));
        }

        let magic: [u8; 4] = take(bytes, 2)?;
        if magic != MAGIC {
            return Err(LoadError::CorruptSave("bad magic".to_owned()));
        }
        let nonce = u64::from_le_bytes(take(bytes, 6)?);
        let payload_len = u32::from_le_bytes(take(bytes, 14)?);
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(LoadError::CorruptSave(format!(
                "payload length {payload_len} exceeds the limit"
            )));
        }

        let payload_len = payload_len as usize;
        let expected = HEADER_LEN + payload_len + TAG_LEN;
        if bytes.len() != expected {
            return Err(LoadError::CorruptSave(format!(
                "expected {expected} bytes, found {}",
                bytes.len()
            )));
        }

        let payload = bytes[HEADER_LEN..HEADER_LEN + payload_len].to_vec();
        let tag = take(bytes, HEADER_LEN + payload_len)?;
        Ok(Self {
            version,
            nonce,
            payload,
            tag,
        })
    }
}

fn take<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], LoadError> {
    bytes
        .get(offset..offset + N)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or_else(|| LoadError::CorruptSave(format!("truncated at byte {offset}")))
}

/// Canonical payload encoding: fixed-width little-endian integers, fields in
/// declaration order, bounded length, trailing bytes rejected.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(u64::from(MAX_PAYLOAD_LEN))
        .reject_trailing_bytes()
}

fn compute_tag(key: &SaveKey, payload: &[u8], nonce: u64) -> Result<key::HmacSha256, KeyError> {
    let mut mac = key.mac()?;
    mac.update(payload);
    mac.update(&nonce.to_le_bytes());
    Ok(mac)
}

/// Encodes and authenticates `state` under the next nonce of `counter`.
///
/// # Errors
///
/// Returns [`SaveError`] when the state cannot be encoded, is too large, or
/// the counter is exhausted.
pub fn save<S: Serialize>(
    state: &S,
    key: &SaveKey,
    counter: &mut NonceCounter,
) -> Result<SaveEnvelope, SaveError> {
    let payload = codec().serialize(state)?;
    if payload.len() > MAX_PAYLOAD_LEN as usize {
        return Err(SaveError::PayloadTooLarge { len: payload.len() });
    }
    let nonce = counter.next_nonce()?;
    let mut tag = [0_u8; TAG_LEN];
    tag.copy_from_slice(&compute_tag(key, &payload, nonce)?.finalize().into_bytes());

    log::info!("sealed {}-byte save with nonce {nonce}", payload.len());
    Ok(SaveEnvelope {
        version: SAVE_FORMAT_VERSION,
        nonce,
        payload,
        tag,
    })
}

/// Verifies and decodes an envelope.
///
/// Checks run in order: version, tag (constant time), nonce freshness,
/// payload decoding. On success the caller advances its accepted nonce to
/// [`SaveEnvelope::nonce`].
///
/// # Errors
///
/// Returns the [`LoadError`] of the first failing check.
pub fn load<S: DeserializeOwned>(
    envelope: &SaveEnvelope,
    key: &SaveKey,
    last_accepted_nonce: u64,
) -> Result<S, LoadError> {
    if envelope.version != SAVE_FORMAT_VERSION {
        log::warn!("rejected save with format version {}", envelope.version);
        return Err(LoadError::UnsupportedVersion(envelope.version));
    }

    let verified = compute_tag(key, &envelope.payload, envelope.nonce)
        .map_err(|_| LoadError::TamperedSave)
        .and_then(|mac| mac.verify_slice(&envelope.tag).map_err(|_| LoadError::TamperedSave));
    if let Err(error) = verified {
        log::warn!("rejected save with nonce {}: tag mismatch", envelope.nonce);
        return Err(error);
    }

    if envelope.nonce <= last_accepted_nonce {
        log::warn!(
            "rejected replayed save: nonce {} <= {last_accepted_nonce}",
            envelope.nonce
        );
        return Err(LoadError::ReplayedSave {
            nonce: envelope.nonce,
            last_accepted: last_accepted_nonce,
        });
    }

    let state = codec().deserialize(&envelope.payload).map_err(|error| {
        log::warn!("rejected save with nonce {}: {error}", envelope.nonce);
        LoadError::CorruptSave(error.to_string())
    })?;
    log::info!("loaded save with nonce {}", envelope.nonce);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SaveKey {
        SaveKey::new(vec![0x5a; 32]).expect("long enough")
    }

    #[test]
    fn counter_is_strictly_increasing() {
        let mut counter = NonceCounter::new();
        assert_eq!(counter.next_nonce().expect("room"), 1);
        assert_eq!(counter.next_nonce().expect("room"), 2);
        assert_eq!(counter.last_issued(), 2);

        let mut exhausted = NonceCounter::resume(u64::MAX);
        assert!(matches!(
            exhausted.next_nonce(),
            Err(SaveError::NonceExhausted)
        ));
    }

    #[test]
    fn header_layout_is_fixed() {
        let envelope = save(&(7_u32, 9_u64), &key(), &mut NonceCounter::resume(4)).expect("saves");
        let bytes = envelope.to_bytes();
        assert_eq!(&bytes[0..2], &[1, 0]);
        assert_eq!(&bytes[2..6], b"DLVS");
        assert_eq!(&bytes[6..14], &5_u64.to_le_bytes());
        assert_eq!(&bytes[14..18], &12_u32.to_le_bytes());
        assert_eq!(&bytes[18..22], &7_u32.to_le_bytes());
        assert_eq!(&bytes[22..30], &9_u64.to_le_bytes());
        assert_eq!(bytes.len(), 18 + 12 + TAG_LEN);
    }

    #[test]
    fn version_is_checked_before_structure() {
        let bytes = [2_u8, 0, b'X'];
        assert!(matches!(
            SaveEnvelope::from_bytes(&bytes),
            Err(LoadError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            SaveEnvelope::from_bytes(&[1_u8]),
            Err(LoadError::CorruptSave(_))
        ));
    }

    #[test]
    fn trailing_payload_bytes_are_corrupt() {
        let key = key();
        let mut counter = NonceCounter::new();
        let envelope = save(&(1_u32, 2_u32), &key, &mut counter).expect("saves");
        assert!(matches!(
            load::<u32>(&envelope, &key, 0),
            Err(LoadError::CorruptSave(_))
        ));
        assert_eq!(load::<(u32, u32)>(&envelope, &key, 0).expect("loads"), (1, 2));
    }
}
