//! Aidmap crypto: at-rest protection for contact fields and the unguessable
//! slugs that act as management links for help requests.

pub mod encrypt;
pub mod keys;
pub mod slug;

pub use encrypt::FieldCipher;
pub use slug::new_slug;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("encryption failed")]
    Encryption,

    /// The token was well formed but failed authentication: the data was
    /// altered or was written under a different key.
    #[error("encrypted field failed authentication")]
    Tampered,
}
