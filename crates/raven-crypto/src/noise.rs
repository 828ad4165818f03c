//! Noise_XX_25519_ChaChaPoly_SHA256 handshake and transport primitives.
//!
//! `raven-session` drives the three-message XX pattern and owns the state
//! machine (UNINITIALIZED/HANDSHAKING/ESTABLISHED/FAILED plus tie-break by
//! the numerically smaller peer id); this module only wraps `snow` so the
//! rest of the workspace never touches the underlying handshake object
//! directly.

use snow::{Builder, HandshakeState, TransportState};

use crate::{CryptoError, Result};

const NOISE_PATTERN: &str = "Noise_XX_25519_ChaChaPoly_SHA256";

/// Maximum size of a single Noise handshake or transport message, per the
/// Noise spec's framing limit.
pub const MAX_MESSAGE_LEN: usize = 65535;

fn params() -> snow::params::NoiseParams {
    NOISE_PATTERN
        .parse()
        .expect("static Noise pattern string always parses")
}

/// Start the XX handshake as the initiator, using our static private key.
pub fn build_initiator(local_private_key: &[u8; 32]) -> Result<HandshakeState> {
    Builder::new(params())
        .local_private_key(local_private_key)
        .build_initiator()
        .map_err(|e| CryptoError::Noise(e.to_string()))
}

/// Start the XX handshake as the responder, using our static private key.
pub fn build_responder(local_private_key: &[u8; 32]) -> Result<HandshakeState> {
    Builder::new(params())
        .local_private_key(local_private_key)
        .build_responder()
        .map_err(|e| CryptoError::Noise(e.to_string()))
}

/// Generate a fresh X25519 static keypair in the form `snow` expects.
pub fn generate_static_keypair() -> Result<snow::Keypair> {
    Builder::new(params())
        .generate_keypair()
        .map_err(|e| CryptoError::Noise(e.to_string()))
}

/// Write the next handshake message. Returns the message bytes to send.
pub fn write_handshake_message(state: &mut HandshakeState, payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; MAX_MESSAGE_LEN];
    let len = state
        .write_message(payload, &mut buf)
        .map_err(|e| CryptoError::Noise(e.to_string()))?;
    buf.truncate(len);
    Ok(buf)
}

/// Read a handshake message, returning any payload carried alongside it.
pub fn read_handshake_message(state: &mut HandshakeState, message: &[u8]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; MAX_MESSAGE_LEN];
    let len = state
        .read_message(message, &mut buf)
        .map_err(|e| CryptoError::Noise(e.to_string()))?;
    buf.truncate(len);
    Ok(buf)
}

/// Finish the handshake and move into transport mode, once both sides have
/// exchanged all three XX messages.
pub fn into_transport(state: HandshakeState) -> Result<TransportState> {
    state
        .into_transport_mode()
        .map_err(|e| CryptoError::Noise(e.to_string()))
}

/// Encrypt a payload in transport mode.
pub fn encrypt(transport: &mut TransportState, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; plaintext.len() + 16];
    let len = transport
        .write_message(plaintext, &mut buf)
        .map_err(|e| CryptoError::Noise(e.to_string()))?;
    buf.truncate(len);
    Ok(buf)
}

/// Decrypt a payload in transport mode.
pub fn decrypt(transport: &mut TransportState, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; ciphertext.len()];
    let len = transport
        .read_message(ciphertext, &mut buf)
        .map_err(|_| CryptoError::AeadDecryption)?;
    buf.truncate(len);
    Ok(buf)
}

/// The remote party's static public key, once the handshake has revealed it.
pub fn remote_static_public_key(transport: &TransportState) -> Option<[u8; 32]> {
    let bytes = transport.get_remote_static()?;
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Some(out)
}
