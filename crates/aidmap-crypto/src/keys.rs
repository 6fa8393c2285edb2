use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;

use crate::CodecError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Generate a random 256-bit key for AES-256-GCM.
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encode a key as 64 lowercase hex characters.
pub fn key_to_hex(key: &[u8; KEY_LEN]) -> String {
    hex::encode(key)
}

/// Decode a 64-character hex key.
pub fn key_from_hex(encoded: &str) -> Result<[u8; KEY_LEN], CodecError> {
    let encoded = encoded.trim();
    if encoded.len() != KEY_LEN * 2 {
        return Err(CodecError::InvalidKey(format!(
            "expected {} hex characters, got {}",
            KEY_LEN * 2,
            encoded.len()
        )));
    }

    let bytes = hex::decode(encoded)
        .map_err(|e| CodecError::InvalidKey(format!("not valid hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| CodecError::InvalidKey("invalid key length".into()))
}
