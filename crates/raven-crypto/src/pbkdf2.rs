//! Channel password key derivation.
//!
//! Password-protected channels derive their AES-GCM key with PBKDF2-HMAC-SHA256
//! over the UTF-8 password, salted with the UTF-8 channel tag, 100,000
//! iterations, 256-bit output.

use hmac::Hmac;
use sha2::Sha256;

/// Iteration count mandated for channel key derivation.
pub const CHANNEL_KEY_ITERATIONS: u32 = 100_000;

/// Derive a 256-bit channel key from a password and the channel's tag.
///
/// The channel tag (e.g. `#general`) is used verbatim as the PBKDF2 salt.
pub fn derive_channel_key(password: &str, channel_tag: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(
        password.as_bytes(),
        channel_tag.as_bytes(),
        CHANNEL_KEY_ITERATIONS,
        &mut key,
    )
    .expect("32-byte output is always valid for HMAC-SHA256");
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let k1 = derive_channel_key("hunter2", "#general");
        let k2 = derive_channel_key("hunter2", "#general");
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let k1 = derive_channel_key("hunter2", "#general");
        let k2 = derive_channel_key("hunter2", "#random");
        assert_ne!(k1, k2);
    }

    #[test]
    fn different_passwords_produce_different_keys() {
        let k1 = derive_channel_key("hunter2", "#general");
        let k2 = derive_channel_key("hunter3", "#general");
        assert_ne!(k1, k2);
    }
}
