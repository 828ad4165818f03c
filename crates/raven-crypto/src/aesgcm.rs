//! AES-256-GCM encryption for password-protected channel messages.
//!
//! The key comes from [`crate::pbkdf2::derive_channel_key`]. Each message
//! is encrypted with a fresh random 96-bit IV, which is prepended to the
//! ciphertext on the wire.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::{CryptoError, Result};

/// Length in bytes of the random IV prepended to every ciphertext.
pub const IV_LEN: usize = 12;

/// Encrypt a channel message, returning `iv || ciphertext`.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::AeadDecryption)?;

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `iv || ciphertext` blob produced by [`encrypt`].
pub fn decrypt(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < IV_LEN {
        return Err(CryptoError::InvalidInput("ciphertext shorter than IV".into()));
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AeadDecryption)
}
