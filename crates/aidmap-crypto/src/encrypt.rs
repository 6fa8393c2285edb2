use aes_gcm::{
    Aes256Gcm, AesGcm, Key, KeyInit, Nonce,
    aead::{Aead, OsRng, consts::U16, rand_core::RngCore},
    aes::Aes256,
};
use tracing::warn;

use crate::CodecError;
use crate::keys::{KEY_LEN, key_from_hex};

/// Nonce length written by [`FieldCipher::encrypt`].
pub const NONCE_LEN: usize = 12;
/// IV length used by tokens written before the switch to standard nonces.
pub const LEGACY_IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

type LegacyAes256Gcm = AesGcm<Aes256, U16>;

/// AES-256-GCM protection for sensitive text columns.
///
/// Tokens have the form `hex(nonce):hex(tag):hex(ciphertext)` so they fit in a
/// plain TEXT column.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; KEY_LEN],
}

impl FieldCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Build from a 64-character hex key.
    pub fn from_hex(encoded: &str) -> Result<Self, CodecError> {
        key_from_hex(encoded).map(Self::new)
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encryption)?;

        // aes-gcm appends the tag to the ciphertext
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypt a stored token.
    ///
    /// Absent, empty, and malformed tokens yield `Ok(None)`. A well-formed token
    /// whose tag does not verify is [`CodecError::Tampered`].
    pub fn decrypt(&self, token: Option<&str>) -> Result<Option<String>, CodecError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let Some((nonce, tag, ciphertext)) = split_token(token) else {
            warn!("Ignoring malformed encrypted field ({} bytes)", token.len());
            return Ok(None);
        };

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let plaintext = match nonce.len() {
            NONCE_LEN => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
                .decrypt(Nonce::from_slice(&nonce), sealed.as_slice()),
            _ => LegacyAes256Gcm::new(Key::<LegacyAes256Gcm>::from_slice(&self.key))
                .decrypt(aes_gcm::Nonce::<U16>::from_slice(&nonce), sealed.as_slice()),
        }
        .map_err(|_| CodecError::Tampered)?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| CodecError::Tampered)
    }

    /// Encrypt an optional value, keeping `None` as `None`.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CodecError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipher { key: <redacted> }")
    }
}

/// Split a token into (nonce, tag, ciphertext), or `None` if it is not shaped
/// like one.
fn split_token(token: &str) -> Option<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let mut parts = token.split(':');
    let (nonce, tag, ciphertext) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let nonce = hex::decode(nonce).ok()?;
    let tag = hex::decode(tag).ok()?;
    let ciphertext = hex::decode(ciphertext).ok()?;

    if !matches!(nonce.len(), NONCE_LEN | LEGACY_IV_LEN) || tag.len() != TAG_LEN {
        return None;
    }
    Some((nonce, tag, ciphertext))
}
