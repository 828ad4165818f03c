//! Per-peer Noise XX session state machine (design spec §4.3).
//!
//! Tie-break rule: the peer with the numerically smaller `peer_id`
//! initiates; the other side waits for the first handshake message and
//! replies. An inbound `NOISE_HANDSHAKE` while `ESTABLISHED` drops the old
//! session and rehandshakes cleanly (re-keying / identity rotation).

use std::collections::HashMap;

use raven_crypto::noise;
use raven_types::session::SessionState;
use raven_types::PeerId;
use snow::{HandshakeState, TransportState};

use crate::{Result, SessionError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Initiator,
    Responder,
}

struct PeerSession {
    state: SessionState,
    role: Role,
    handshake: Option<HandshakeState>,
    transport: Option<TransportState>,
}

impl PeerSession {
    fn uninitialized() -> Self {
        Self {
            state: SessionState::Uninitialized,
            role: Role::Responder,
            handshake: None,
            transport: None,
        }
    }
}

/// Owns every peer's Noise session state.
pub struct SecurityCore {
    local_static_private: [u8; 32],
    local_peer_id: PeerId,
    sessions: HashMap<PeerId, PeerSession>,
}

/// True if `local` should be the XX initiator against `remote`, per the
/// numerically-smaller-peer_id tie-break.
fn should_initiate(local: &PeerId, remote: &PeerId) -> bool {
    local < remote
}

impl SecurityCore {
    pub fn new(local_static_private: [u8; 32], local_peer_id: PeerId) -> Self {
        Self {
            local_static_private,
            local_peer_id,
            sessions: HashMap::new(),
        }
    }

    /// Current session state for a peer (`UNINITIALIZED` if none exists).
    pub fn session_state(&self, peer_id: &PeerId) -> SessionState {
        self.sessions
            .get(peer_id)
            .map(|s| s.state)
            .unwrap_or(SessionState::Uninitialized)
    }

    /// Begin a handshake because we have an outgoing DM and no session.
    ///
    /// Returns `Some(message)` to send as a `NOISE_HANDSHAKE` packet if the
    /// tie-break makes us the initiator, or `None` if we should instead
    /// wait for the peer's first message.
    pub fn begin_handshake(&mut self, peer_id: PeerId) -> Result<Option<Vec<u8>>> {
        if should_initiate(&self.local_peer_id, &peer_id) {
            let mut handshake = noise::build_initiator(&self.local_static_private)
                .map_err(|e| SessionError::HandshakeFail(e.to_string()))?;
            let msg1 = noise::write_handshake_message(&mut handshake, &[])
                .map_err(|e| SessionError::HandshakeFail(e.to_string()))?;
            self.sessions.insert(
                peer_id,
                PeerSession {
                    state: SessionState::Handshaking,
                    role: Role::Initiator,
                    handshake: Some(handshake),
                    transport: None,
                },
            );
            Ok(Some(msg1))
        } else {
            self.sessions.insert(peer_id, PeerSession::uninitialized());
            self.sessions.get_mut(&peer_id).expect("just inserted").state =
                SessionState::Handshaking;
            Ok(None)
        }
    }

    /// Handle an inbound `NOISE_HANDSHAKE` message. Returns the response
    /// bytes to send back, if any, once this step is processed.
    pub fn handle_inbound_handshake(
        &mut self,
        peer_id: PeerId,
        message: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let needs_fresh_responder = match self.sessions.get(&peer_id) {
            None => true,
            Some(session) => {
                matches!(session.state, SessionState::Failed | SessionState::Established)
            }
        };

        if needs_fresh_responder {
            return self.start_fresh_responder(peer_id, message);
        }

        let session = self.sessions.get_mut(&peer_id).expect("checked above");
        match session.role {
            Role::Responder => {
                // This is message 3 (s, se): completes the handshake.
                let handshake = session.handshake.as_mut().ok_or_else(|| {
                    SessionError::HandshakeFail("responder missing handshake state".into())
                })?;
                if let Err(e) = noise::read_handshake_message(handshake, message) {
                    session.state = SessionState::Failed;
                    return Err(SessionError::HandshakeFail(e.to_string()));
                }
                let handshake = session.handshake.take().expect("checked above");
                match noise::into_transport(handshake) {
                    Ok(transport) => {
                        session.transport = Some(transport);
                        session.state = SessionState::Established;
                        Ok(None)
                    }
                    Err(e) => {
                        session.state = SessionState::Failed;
                        Err(SessionError::HandshakeFail(e.to_string()))
                    }
                }
            }
            Role::Initiator => {
                // This is message 2 (e, ee, s, es): we reply with message 3.
                let handshake = session.handshake.as_mut().ok_or_else(|| {
                    SessionError::HandshakeFail("initiator missing handshake state".into())
                })?;
                if let Err(e) = noise::read_handshake_message(handshake, message) {
                    session.state = SessionState::Failed;
                    return Err(SessionError::HandshakeFail(e.to_string()));
                }
                let msg3 = match noise::write_handshake_message(handshake, &[]) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        session.state = SessionState::Failed;
                        return Err(SessionError::HandshakeFail(e.to_string()));
                    }
                };
                let handshake = session.handshake.take().expect("checked above");
                match noise::into_transport(handshake) {
                    Ok(transport) => {
                        session.transport = Some(transport);
                        session.state = SessionState::Established;
                        Ok(Some(msg3))
                    }
                    Err(e) => {
                        session.state = SessionState::Failed;
                        Err(SessionError::HandshakeFail(e.to_string()))
                    }
                }
            }
        }
    }

    fn start_fresh_responder(&mut self, peer_id: PeerId, message: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut handshake = noise::build_responder(&self.local_static_private)
            .map_err(|e| SessionError::HandshakeFail(e.to_string()))?;
        if let Err(e) = noise::read_handshake_message(&mut handshake, message) {
            return Err(SessionError::HandshakeFail(e.to_string()));
        }
        let msg2 = noise::write_handshake_message(&mut handshake, &[])
            .map_err(|e| SessionError::HandshakeFail(e.to_string()))?;
        self.sessions.insert(
            peer_id,
            PeerSession {
                state: SessionState::Handshaking,
                role: Role::Responder,
                handshake: Some(handshake),
                transport: None,
            },
        );
        Ok(Some(msg2))
    }

    /// Encrypt a plaintext for a peer with an `ESTABLISHED` session.
    pub fn encrypt(&mut self, peer_id: &PeerId, plaintext: &[u8]) -> Result<Vec<u8>> {
        let session = self.sessions.get_mut(peer_id).ok_or(SessionError::NoSession)?;
        if session.state != SessionState::Established {
            return Err(SessionError::NoSession);
        }
        let transport = session.transport.as_mut().ok_or(SessionError::NoSession)?;
        noise::encrypt(transport, plaintext).map_err(|_| SessionError::DecryptFail)
    }

    /// Decrypt a ciphertext from a peer with an `ESTABLISHED` session.
    pub fn decrypt(&mut self, peer_id: &PeerId, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let session = self.sessions.get_mut(peer_id).ok_or(SessionError::NoSession)?;
        if session.state != SessionState::Established {
            return Err(SessionError::NoSession);
        }
        let transport = session.transport.as_mut().ok_or(SessionError::NoSession)?;
        noise::decrypt(transport, ciphertext).map_err(|_| SessionError::DecryptFail)
    }

    /// The peer's Noise static public key, once revealed by a completed handshake.
    pub fn remote_static_public_key(&self, peer_id: &PeerId) -> Option<[u8; 32]> {
        let transport = self.sessions.get(peer_id)?.transport.as_ref()?;
        noise::remote_static_public_key(transport)
    }

    /// Force a session to `FAILED`, clearing its key material. Can be
    /// restarted with [`begin_handshake`](Self::begin_handshake).
    pub fn fail_session(&mut self, peer_id: &PeerId) {
        if let Some(session) = self.sessions.get_mut(peer_id) {
            session.state = SessionState::Failed;
            session.handshake = None;
            session.transport = None;
        }
    }
}
