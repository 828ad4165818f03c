//! Handlers for [`ControlIntent`] (design spec §6 "Control intents"):
//! the UI's only way to drive the core. Each handler updates persisted
//! state in [`crate::DaemonState::kv`], updates in-memory collaborators,
//! and emits [`CoreEvent`]s describing what happened.

use raven_types::events::CoreEvent;
use raven_types::intents::{ControlIntent, IntentResult};
use raven_types::packet::PacketType;
use raven_types::payload::{NoisePayload, PrivateMessagePacket};
use raven_types::PeerId;

use super::channel;
use super::mesh::OutboundPacket;
use crate::DaemonState;

fn block_key(peer_id: &PeerId) -> String {
    format!("block.{}", raven_types::peer_id_hex(peer_id))
}

fn favorite_key(noise_pub_hex: &str) -> String {
    format!("fav.{noise_pub_hex}")
}

/// Execute one control intent, returning its outcome.
pub async fn execute(state: &DaemonState, intent: ControlIntent) -> IntentResult {
    match intent {
        ControlIntent::JoinChannel { name, password } => join_channel(state, &name, password),
        ControlIntent::LeaveChannel { name } => leave_channel(state, &name),
        ControlIntent::SwitchChannel { name } => switch_channel(state, name),
        ControlIntent::SendPublic { content, mentions, channel } => {
            send_public(state, &content, &mentions, channel)
        }
        ControlIntent::SendPrivate { content, peer_id, message_id } => {
            send_private(state, &content, peer_id, message_id)
        }
        ControlIntent::StartPrivate { peer_id } => start_private(state, peer_id),
        ControlIntent::ToggleFavorite { peer_id } => toggle_favorite(state, peer_id),
        ControlIntent::SetNickname { nickname } => set_nickname(state, nickname),
        ControlIntent::TeleportToGeohash { geohash } => teleport_to_geohash(state, geohash),
        ControlIntent::Block { peer_id } => block(state, peer_id),
        ControlIntent::Unblock { peer_id } => unblock(state, peer_id),
        ControlIntent::PanicClearAll => panic_clear_all(state),
    }
}

fn join_channel(state: &DaemonState, name: &str, password: Option<String>) -> IntentResult {
    if name.is_empty() {
        return IntentResult::err("channel name must not be empty");
    }
    let is_creator = channel::load(state, name).is_none();
    let channel_key = password.as_deref().map(|p| raven_crypto::pbkdf2::derive_channel_key(p, name));
    let record = channel::ChannelRecord { has_password: password.is_some(), is_creator, channel_key };
    match channel::save(state, name, &record) {
        Ok(()) => {
            state.event_bus.emit(CoreEvent::ChannelJoined { name: name.to_string() });
            IntentResult::ok()
        }
        Err(e) => IntentResult::err(e.to_string()),
    }
}

fn leave_channel(state: &DaemonState, name: &str) -> IntentResult {
    match state.kv.delete(&channel::key(name)) {
        Ok(()) => {
            let mut current = state.current_channel.lock().expect("current_channel mutex poisoned");
            if current.as_deref() == Some(name) {
                *current = None;
            }
            state.event_bus.emit(CoreEvent::ChannelLeft { name: name.to_string() });
            IntentResult::ok()
        }
        Err(e) => IntentResult::err(e.to_string()),
    }
}

fn switch_channel(state: &DaemonState, name: Option<String>) -> IntentResult {
    if let Some(name) = &name {
        match channel::load(state, name) {
            Some(record) => {
                if record.has_password {
                    state.event_bus.emit(CoreEvent::ShowPasswordPrompt { channel: name.clone() });
                }
            }
            None => return IntentResult::err("not a member of that channel"),
        }
    }
    *state.current_channel.lock().expect("current_channel mutex poisoned") = name;
    IntentResult::ok()
}

/// Assemble a public chat/channel message and hand it to
/// [`DaemonState::outbound_tx`] for broadcast (design spec §4.6). Mentions
/// ride along as plain text within `content`, not as a separate field on
/// the wire; they only drive local notification matching.
fn send_public(state: &DaemonState, content: &str, _mentions: &[String], target_channel: Option<String>) -> IntentResult {
    if content.is_empty() {
        return IntentResult::err("message content must not be empty");
    }

    let content_bytes = match &target_channel {
        Some(name) => match channel::load(state, name) {
            Some(channel::ChannelRecord { channel_key: Some(key), .. }) => {
                match raven_crypto::aesgcm::encrypt(&key, content.as_bytes()) {
                    Ok(ciphertext) => ciphertext,
                    Err(e) => return IntentResult::err(e.to_string()),
                }
            }
            Some(_) => content.as_bytes().to_vec(),
            None => return IntentResult::err("not a member of that channel"),
        },
        None => content.as_bytes().to_vec(),
    };

    let body = raven_codec::payload::MessageBody { content_bytes, channel: target_channel };
    let payload = match raven_codec::payload::encode_message_body(&body) {
        Ok(bytes) => bytes,
        Err(e) => return IntentResult::err(e.to_string()),
    };

    let outbound = OutboundPacket { recipient: None, packet_type: PacketType::Message, payload };
    if state.outbound_tx.send(outbound).is_err() {
        return IntentResult::err("outbound transport task is not running");
    }
    IntentResult::ok()
}

/// Assemble a Noise-encrypted direct message and hand it to
/// [`DaemonState::outbound_tx`] for delivery (design spec §4.7). Requires an
/// established session with `peer_id`; use [`start_private`] first.
fn send_private(state: &DaemonState, content: &str, peer_id: PeerId, message_id: Option<[u8; 16]>) -> IntentResult {
    if content.is_empty() {
        return IntentResult::err("message content must not be empty");
    }
    let message_id = message_id.unwrap_or_else(|| {
        let now = state.clock.now_ms().to_be_bytes();
        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&now);
        id[8..].copy_from_slice(&peer_id);
        id
    });

    let payload = NoisePayload::PrivateMessage(PrivateMessagePacket { message_id, content: content.to_string() });
    let plaintext = match raven_codec::payload::encode_noise_payload(&payload) {
        Ok(bytes) => bytes,
        Err(e) => return IntentResult::err(e.to_string()),
    };

    let ciphertext = {
        let mut security = state.security.lock().expect("security mutex poisoned");
        match security.encrypt(&peer_id, &plaintext) {
            Ok(bytes) => bytes,
            Err(e) => return IntentResult::err(e.to_string()),
        }
    };

    let outbound = OutboundPacket { recipient: Some(peer_id), packet_type: PacketType::NoiseEncrypted, payload: ciphertext };
    if state.outbound_tx.send(outbound).is_err() {
        return IntentResult::err("outbound transport task is not running");
    }

    state.event_bus.emit(CoreEvent::MessageSent { message_id });
    IntentResult::ok()
}

fn start_private(state: &DaemonState, peer_id: PeerId) -> IntentResult {
    let already_established =
        state.security.lock().expect("security mutex poisoned").session_state(&peer_id)
            == raven_types::session::SessionState::Established;
    if already_established {
        return IntentResult::ok();
    }
    match state.security.lock().expect("security mutex poisoned").begin_handshake(peer_id) {
        Ok(_) => IntentResult::ok(),
        Err(e) => IntentResult::err(e.to_string()),
    }
}

fn toggle_favorite(state: &DaemonState, peer_id: PeerId) -> IntentResult {
    let Some(peer) = state.peers.lock().expect("peers mutex poisoned").get(&peer_id).cloned() else {
        return IntentResult::err("unknown peer");
    };
    let noise_pub_hex = peer.noise_static_pub_hex();

    let mut favorites = state.favorites.lock().expect("favorites mutex poisoned");
    let is_favorite_now = !favorites.get(&noise_pub_hex).is_some_and(|r| r.we_favorite);
    if is_favorite_now {
        favorites.record_favorited(&noise_pub_hex);
    } else {
        favorites.record_unfavorited(&noise_pub_hex);
    }
    let is_mutual = favorites.is_mutual(&peer_id);
    drop(favorites);

    if let Err(e) = state.kv.set(&favorite_key(&noise_pub_hex), &[is_favorite_now as u8]) {
        return IntentResult::err(e.to_string());
    }

    state.event_bus.emit(CoreEvent::FavoriteChanged { peer_id, is_favorite: is_favorite_now, is_mutual });
    IntentResult::ok()
}

fn set_nickname(state: &DaemonState, nickname: String) -> IntentResult {
    if nickname.trim().is_empty() {
        return IntentResult::err("nickname must not be empty");
    }
    *state.nickname.lock().expect("nickname mutex poisoned") = nickname;
    IntentResult::ok()
}

fn teleport_to_geohash(_state: &DaemonState, geohash: String) -> IntentResult {
    match raven_nostr::geohash::decode(&geohash) {
        Ok(_) => IntentResult::ok(),
        Err(e) => IntentResult::err(e.to_string()),
    }
}

fn block(state: &DaemonState, peer_id: PeerId) -> IntentResult {
    match state.kv.set(&block_key(&peer_id), &[1]) {
        Ok(()) => IntentResult::ok(),
        Err(e) => IntentResult::err(e.to_string()),
    }
}

fn unblock(state: &DaemonState, peer_id: PeerId) -> IntentResult {
    match state.kv.delete(&block_key(&peer_id)) {
        Ok(()) => IntentResult::ok(),
        Err(e) => IntentResult::err(e.to_string()),
    }
}

/// Wipe every namespace and regenerate a fresh identity (design spec §6:
/// "clearing all data wipes every namespace except re-derivable identity,
/// which is regenerated").
fn panic_clear_all(state: &DaemonState) -> IntentResult {
    if let Err(e) = state.kv.clear_all() {
        return IntentResult::err(e.to_string());
    }

    let fresh_identity = match crate::identity::load_or_generate(state.kv.as_ref()) {
        Ok(identity) => identity,
        Err(e) => return IntentResult::err(e.to_string()),
    };

    *state.peers.lock().expect("peers mutex poisoned") = raven_peers::registry::PeerRegistry::new();
    *state.dedup.lock().expect("dedup mutex poisoned") = raven_session::dedup::Deduplicator::default();
    *state.seen.lock().expect("seen mutex poisoned") = raven_gossip::seen::SeenSet::new(state.config.gossip.capacity);
    *state.favorites.lock().expect("favorites mutex poisoned") = raven_router::favorites::FavoritesIndex::new();
    *state.outbox.lock().expect("outbox mutex poisoned") = raven_router::outbox::InMemoryOutbox::new();
    *state.reassembler.lock().expect("reassembler mutex poisoned") =
        raven_codec::fragment::Reassembler::new(raven_codec::fragment::DEFAULT_REASSEMBLY_DEADLINE_MS);
    *state.current_channel.lock().expect("current_channel mutex poisoned") = None;
    *state.security.lock().expect("security mutex poisoned") =
        raven_session::handshake::SecurityCore::new(fresh_identity.noise_static_private, fresh_identity.peer_id);
    *state.identity.lock().expect("identity mutex poisoned") = fresh_identity;

    IntentResult::ok()
}

/// `list_peers` RPC method: a snapshot of the active peer table.
pub fn list_peers(state: &DaemonState) -> serde_json::Value {
    let peers = state.peers.lock().expect("peers mutex poisoned");
    let favorites = state.favorites.lock().expect("favorites mutex poisoned");
    let entries: Vec<_> = peers
        .all_active()
        .map(|peer| {
            serde_json::json!({
                "peer_id": raven_types::peer_id_hex(&peer.peer_id),
                "nickname": peer.nickname,
                "is_direct": peer.is_direct,
                "is_mutual_favorite": favorites.is_mutual(&peer.peer_id),
            })
        })
        .collect();
    serde_json::json!(entries)
}

/// `list_channels` RPC method: not yet implemented as a prefix scan since
/// that needs the `ch.` namespace's key suffixes, not their contents;
/// exposed here for UI symmetry with [`list_peers`].
pub fn list_channels(state: &DaemonState) -> serde_json::Value {
    match state.kv.scan_prefix("ch.") {
        Ok(entries) => {
            let names: Vec<String> = entries.into_iter().map(|(key, _)| key["ch.".len()..].to_string()).collect();
            serde_json::json!(names)
        }
        Err(_) => serde_json::json!([]),
    }
}
