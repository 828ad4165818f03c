//! Inbound packet handling (design spec §4.6 Packet Processor, §4.7
//! Message Handler): the daemon-side half of ingress — signature
//! verification against the Peer Registry, then per-type handling. The
//! ingress decision itself ([`raven_session::dispatch::process_inbound`])
//! lives in `raven-session`, which has no access to signing keys.

use raven_crypto::ed25519::{Signature, VerifyingKey};
use raven_types::events::CoreEvent;
use raven_types::packet::{Packet, PacketType, ProtocolVersion};
use raven_types::payload::NoisePayload;
use raven_types::PeerId;

use crate::DaemonState;

/// One packet, already decrypted/decoded/encrypted by its own handler, to
/// be sent back out (e.g. a handshake reply, a DELIVERED ack, or a
/// freshly composed outgoing message). Deliberately carries no
/// `sender_id`/`ttl`/`timestamp`/`signature` — [`finalize_outbound`] fills
/// those in just before the packet reaches the transport, since every
/// caller that builds one of these already knows its own identity.
pub struct OutboundPacket {
    pub recipient: Option<PeerId>,
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

/// Stamp sender identity, a fresh full-hop TTL and timestamp, and our
/// signature onto an [`OutboundPacket`], producing the wire-ready
/// [`Packet`] a transport adapter actually sends.
pub fn finalize_outbound(state: &DaemonState, outbound: OutboundPacket, now_ms: u64) -> Packet {
    let identity = state.identity.lock().expect("identity mutex poisoned");
    let mut packet = Packet {
        version: ProtocolVersion::V1,
        packet_type: outbound.packet_type,
        ttl: raven_types::MAX_TTL,
        timestamp: now_ms,
        sender_id: identity.peer_id,
        recipient_id: outbound.recipient,
        payload: outbound.payload,
        signature: None,
    };
    let signing_bytes = raven_codec::wire::to_bytes_for_signing(&packet).expect("freshly built packet always encodes");
    packet.signature = Some(identity.signing.signing_key.sign(&signing_bytes).to_bytes());
    packet
}

/// Handle one inbound packet read off the mesh transport. Returns any
/// packets that should be sent back out (handshake replies, relays).
pub fn handle_inbound(state: &DaemonState, packet: Packet, now_ms: u64) -> Vec<OutboundPacket> {
    let local_peer_id = state.identity.lock().expect("identity mutex poisoned").peer_id;

    let dispatch = {
        let mut dedup = state.dedup.lock().expect("dedup mutex poisoned");
        raven_session::dispatch::process_inbound(packet, &local_peer_id, &mut dedup, now_ms)
    };

    let (packet, relay) = match dispatch {
        raven_session::dispatch::Dispatch::Drop(reason) => {
            tracing::debug!(?reason, "dropping inbound packet");
            return Vec::new();
        }
        raven_session::dispatch::Dispatch::Handle { packet, relay } => (packet, relay),
    };

    if !verify_signature(state, &packet) {
        tracing::warn!(sender = ?packet.sender_id, "dropping packet with invalid signature");
        return Vec::new();
    }

    state.seen.lock().expect("seen mutex poisoned").record(&packet);

    let mut outbound = match packet.packet_type {
        PacketType::Announce => handle_announce(state, &packet, now_ms),
        PacketType::Leave => handle_leave(state, &packet),
        PacketType::Message => handle_message(state, &packet),
        PacketType::NoiseHandshake => handle_noise_handshake(state, &packet),
        PacketType::NoiseEncrypted => handle_noise_encrypted(state, &packet),
        PacketType::Fragment => handle_fragment(state, &packet, now_ms),
        PacketType::DeliveryAck => handle_delivery_ack(state, &packet),
        PacketType::ReadReceipt => handle_read_receipt(state, &packet),
        PacketType::RequestSync => handle_request_sync(state, &packet, now_ms),
        PacketType::FileTransfer => Vec::new(),
    };

    if relay {
        outbound.push(OutboundPacket { recipient: packet.recipient_id, packet_type: packet.packet_type, payload: packet.payload });
    }

    outbound
}

/// Packets whose signature isn't yet verifiable (first-ever announce from
/// a peer with no registry entry) are allowed through unverified; the
/// registry records them as unverified until a later, confirmed announce.
fn verify_signature(state: &DaemonState, packet: &Packet) -> bool {
    let Some(signature) = packet.signature else {
        return packet.packet_type == PacketType::Announce;
    };
    let peers = state.peers.lock().expect("peers mutex poisoned");
    let Some(peer) = peers.get(&packet.sender_id) else {
        return true;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&peer.signing_pub) else {
        return false;
    };
    let Ok(signing_bytes) = raven_codec::wire::to_bytes_for_signing(packet) else {
        return false;
    };
    verifying_key.verify(&signing_bytes, &Signature::from_bytes(&signature)).is_ok()
}

fn handle_announce(state: &DaemonState, packet: &Packet, now_ms: u64) -> Vec<OutboundPacket> {
    let announcement = match raven_codec::payload::decode_announcement(&packet.payload) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(?e, "malformed announce payload");
            return Vec::new();
        }
    };

    let outcome = state.peers.lock().expect("peers mutex poisoned").handle_announce(
        packet.sender_id,
        &announcement.nickname,
        announcement.noise_static_pub,
        announcement.signing_pub,
        now_ms,
    );
    state.peers.lock().expect("peers mutex poisoned").set_direct(&packet.sender_id, true);
    state.favorites.lock().expect("favorites mutex poisoned").bind_peer(packet.sender_id, &announcement.noise_static_pub);

    match outcome {
        raven_peers::registry::AnnounceOutcome::Rotated { old_id } => {
            state.sync_scheduler.lock().expect("sync_scheduler mutex poisoned").forget(&old_id);
            state.event_bus.emit(CoreEvent::PeerRotated { old_id, new_id: packet.sender_id });
        }
        raven_peers::registry::AnnounceOutcome::New => {
            state.event_bus.emit(CoreEvent::PeerAppeared {
                peer_id: packet.sender_id,
                nickname: announcement.nickname,
                is_direct: true,
            });
        }
        raven_peers::registry::AnnounceOutcome::Updated => {
            state.event_bus.emit(CoreEvent::PeerUpdated { peer_id: packet.sender_id, nickname: announcement.nickname });
        }
    }

    state.sync_scheduler.lock().expect("sync_scheduler mutex poisoned").schedule_initial_sync(packet.sender_id, now_ms);

    let identity = state.identity.lock().expect("identity mutex poisoned");
    let local_peer_id = identity.peer_id;
    let first_time = state.peers.lock().expect("peers mutex poisoned").mark_announced_to(&packet.sender_id, local_peer_id);
    if !first_time {
        return Vec::new();
    }

    let our_announcement = raven_types::payload::IdentityAnnouncement {
        nickname: state.nickname.lock().expect("nickname mutex poisoned").clone(),
        noise_static_pub: raven_crypto::x25519::basepoint_mult(&identity.noise_static_private),
        signing_pub: identity.signing.verifying_key.to_bytes(),
    };
    drop(identity);

    match raven_codec::payload::encode_announcement(&our_announcement) {
        Ok(payload) => vec![OutboundPacket {
            recipient: Some(packet.sender_id),
            packet_type: PacketType::Announce,
            payload,
        }],
        Err(e) => {
            tracing::warn!(?e, "failed to encode our own announcement");
            Vec::new()
        }
    }
}

fn handle_leave(state: &DaemonState, packet: &Packet) -> Vec<OutboundPacket> {
    state.peers.lock().expect("peers mutex poisoned").remove(&packet.sender_id);
    state.sync_scheduler.lock().expect("sync_scheduler mutex poisoned").forget(&packet.sender_id);
    state.event_bus.emit(CoreEvent::PeerRemoved { peer_id: packet.sender_id });
    Vec::new()
}

/// Broadcast `MESSAGE` packets are either plaintext public chat or, for a
/// named channel with a password, AES-GCM under a key derived from that
/// password (design spec §4.7/§4.8).
fn handle_message(state: &DaemonState, packet: &Packet) -> Vec<OutboundPacket> {
    let body = match raven_codec::payload::decode_message_body(&packet.payload) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(?e, "malformed message payload");
            return Vec::new();
        }
    };

    let Some(channel) = &body.channel else {
        let content = match String::from_utf8(body.content_bytes) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(?e, "public message payload is not valid utf-8");
                return Vec::new();
            }
        };
        state.event_bus.emit(CoreEvent::MessageReceived { sender: packet.sender_id, content, message_id: [0u8; 16] });
        return Vec::new();
    };

    let record = crate::commands::channel::load(state, channel);
    let plaintext = match record.as_ref().and_then(|r| r.channel_key) {
        Some(key) => match raven_crypto::aesgcm::decrypt(&key, &body.content_bytes) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(?e, channel, "failed to decrypt channel message");
                return Vec::new();
            }
        },
        None => body.content_bytes,
    };

    let content = match String::from_utf8(plaintext) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(?e, channel, "channel message payload is not valid utf-8");
            return Vec::new();
        }
    };
    state.event_bus.emit(CoreEvent::ChannelMessageReceived { channel: channel.clone(), sender: packet.sender_id, content });
    Vec::new()
}

fn handle_noise_handshake(state: &DaemonState, packet: &Packet) -> Vec<OutboundPacket> {
    let reply = state
        .security
        .lock()
        .expect("security mutex poisoned")
        .handle_inbound_handshake(packet.sender_id, &packet.payload);

    let state_now = state.security.lock().expect("security mutex poisoned").session_state(&packet.sender_id);
    state.event_bus.emit(CoreEvent::HandshakeStateChanged { peer_id: packet.sender_id, state: state_now });

    match reply {
        Ok(Some(message)) => vec![OutboundPacket {
            recipient: Some(packet.sender_id),
            packet_type: PacketType::NoiseHandshake,
            payload: message,
        }],
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(?e, sender = ?packet.sender_id, "handshake failed");
            state.security.lock().expect("security mutex poisoned").fail_session(&packet.sender_id);
            Vec::new()
        }
    }
}

fn handle_noise_encrypted(state: &DaemonState, packet: &Packet) -> Vec<OutboundPacket> {
    let plaintext = match state.security.lock().expect("security mutex poisoned").decrypt(&packet.sender_id, &packet.payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(?e, sender = ?packet.sender_id, "failed to decrypt inbound message");
            return Vec::new();
        }
    };

    let inner = match raven_codec::payload::decode_noise_payload(&plaintext) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(?e, "malformed noise payload");
            return Vec::new();
        }
    };

    match inner {
        NoisePayload::PrivateMessage(msg) => {
            let message_id = msg.message_id;
            state.event_bus.emit(CoreEvent::MessageReceived {
                sender: packet.sender_id,
                content: msg.content,
                message_id,
            });
            return deliver_ack(state, &packet.sender_id, message_id);
        }
        NoisePayload::Delivered { message_id } => {
            state.event_bus.emit(CoreEvent::Delivered { message_id });
        }
        NoisePayload::ReadReceipt { message_id } => {
            state.event_bus.emit(CoreEvent::ReadReceiptReceived { message_id });
        }
        NoisePayload::FileTransfer(file) => {
            state.event_bus.emit(CoreEvent::MessageReceived {
                sender: packet.sender_id,
                content: format!("[file: {} ({} bytes)]", file.file_name, file.file_size),
                message_id: [0u8; 16],
            });
        }
    }

    Vec::new()
}

/// Build the `NOISE_ENCRYPTED`-wrapped `DELIVERED` ack for a just-received
/// private message (design spec §4.7: "PRIVATE_MESSAGE (deliver + emit
/// DELIVERED ack)").
fn deliver_ack(state: &DaemonState, sender_id: &PeerId, message_id: [u8; 16]) -> Vec<OutboundPacket> {
    let ack = match raven_codec::payload::encode_noise_payload(&NoisePayload::Delivered { message_id }) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(?e, "failed to encode delivery ack");
            return Vec::new();
        }
    };
    match state.security.lock().expect("security mutex poisoned").encrypt(sender_id, &ack) {
        Ok(ciphertext) => {
            vec![OutboundPacket { recipient: Some(*sender_id), packet_type: PacketType::NoiseEncrypted, payload: ciphertext }]
        }
        Err(e) => {
            tracing::warn!(?e, sender = ?sender_id, "failed to encrypt delivery ack");
            Vec::new()
        }
    }
}

fn handle_fragment(state: &DaemonState, packet: &Packet, now_ms: u64) -> Vec<OutboundPacket> {
    let fragment: raven_types::fragment::Fragment = match raven_codec::cbor::from_slice(&packet.payload) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(?e, "malformed fragment payload");
            return Vec::new();
        }
    };

    let reassembled =
        state.reassembler.lock().expect("reassembler mutex poisoned").ingest(fragment, now_ms);

    match reassembled {
        Ok(Some(payload)) => {
            let reassembled_packet = Packet { payload, ..packet.clone() };
            handle_inbound_same_type(state, reassembled_packet)
        }
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(?e, "fragment reassembly failed");
            Vec::new()
        }
    }
}

/// Re-dispatch a reassembled packet by the packet type its payload
/// actually encodes, rather than looping back through fragment handling.
fn handle_inbound_same_type(state: &DaemonState, packet: Packet) -> Vec<OutboundPacket> {
    match packet.packet_type {
        PacketType::Message => handle_message(state, &packet),
        PacketType::NoiseEncrypted => handle_noise_encrypted(state, &packet),
        _ => Vec::new(),
    }
}

fn handle_delivery_ack(state: &DaemonState, packet: &Packet) -> Vec<OutboundPacket> {
    if let Ok(message_id) = raven_codec::cbor::from_slice::<[u8; 16]>(&packet.payload) {
        state.event_bus.emit(CoreEvent::Delivered { message_id });
    }
    Vec::new()
}

fn handle_read_receipt(state: &DaemonState, packet: &Packet) -> Vec<OutboundPacket> {
    if let Ok(message_id) = raven_codec::cbor::from_slice::<[u8; 16]>(&packet.payload) {
        state.event_bus.emit(CoreEvent::ReadReceiptReceived { message_id });
    }
    Vec::new()
}

/// Respond to a peer's GCS filter with the hashes of our own seen packets
/// it's missing (design spec §4.9 Gossip Sync fill-in).
fn handle_request_sync(state: &DaemonState, packet: &Packet, now_ms: u64) -> Vec<OutboundPacket> {
    use raven_gossip::sync::SyncDirection;

    let allowed = state.sync_scheduler.lock().expect("sync_scheduler mutex poisoned").try_allow(
        packet.sender_id,
        SyncDirection::Inbound,
        now_ms,
    );
    if !allowed {
        return Vec::new();
    }

    let request = match raven_codec::payload::decode_request_sync(&packet.payload) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(?e, "malformed request_sync payload");
            return Vec::new();
        }
    };

    let filter = match raven_gossip::gcs::GcsFilter::from_bytes(&request.filter_bytes) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(?e, "malformed gcs filter");
            return Vec::new();
        }
    };

    // Their filter tells us which of our seen packets they're missing; the
    // actual re-send of those packets happens at the outbox/relay layer,
    // which holds the packet bodies this module only has hashes for.
    let missing: Vec<_> =
        state.seen.lock().expect("seen mutex poisoned").hashes().into_iter().filter(|h| !filter.contains(h)).collect();
    tracing::debug!(count = missing.len(), peer = ?packet.sender_id, "peer is missing packets after sync");
    Vec::new()
}
