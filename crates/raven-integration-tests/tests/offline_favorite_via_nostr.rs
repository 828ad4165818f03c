//! Integration test: private message to an offline mutual favorite,
//! delivered over Nostr instead of the mesh.
//!
//! When a favorite peer isn't reachable over BLE, a private message still
//! needs to reach them. Mutual favorites exchange Nostr pubkeys out of band;
//! this test builds a mesh-format packet, confirms the relationship is
//! mutual before sending, gift-wraps the packet as a NIP-17 DM, and unwraps
//! it on the other side exactly as a relay subscriber would.

use raven_codec::{payload, wire};
use raven_crypto::secp::NostrKeyPair;
use raven_nostr::giftwrap;
use raven_router::favorites::FavoritesIndex;
use raven_types::packet::{Packet, PacketType, ProtocolVersion};
use raven_types::payload::{NoisePayload, PrivateMessagePacket};

fn private_message_packet(sender_id: [u8; 8], message_id: [u8; 16], content: &str) -> Packet {
    let inner = NoisePayload::PrivateMessage(PrivateMessagePacket { message_id, content: content.to_string() });
    let plaintext = payload::encode_noise_payload(&inner).expect("encode noise payload");
    Packet {
        version: ProtocolVersion::V1,
        packet_type: PacketType::NoiseEncrypted,
        ttl: 0,
        timestamp: 0,
        sender_id,
        recipient_id: None,
        payload: plaintext,
        signature: None,
    }
}

#[tokio::test]
async fn mutual_favorite_message_reaches_offline_peer_via_giftwrap() {
    let alice_noise_pub = [9u8; 32];
    let bob_noise_pub = [8u8; 32];

    let mut favorites = FavoritesIndex::new();
    favorites.record_favorited(&hex::encode(bob_noise_pub));
    favorites.record_they_favorited(&hex::encode(bob_noise_pub), None);

    let bob_id = raven_types::peer_id_from_fingerprint(&raven_crypto::sha256::hash(&bob_noise_pub));
    favorites.bind_peer(bob_id, &bob_noise_pub);
    assert!(favorites.is_mutual(&bob_id), "must be a mutual favorite before falling back to nostr");

    let alice_id = raven_types::peer_id_from_fingerprint(&raven_crypto::sha256::hash(&alice_noise_pub));
    let packet = private_message_packet(alice_id, [3u8; 16], "bob's BLE radio is out of range, try this");
    let packet_bytes = wire::to_bytes(&packet).expect("encode packet");

    // out-of-band exchanged nostr identities, independent of the mesh keys
    let alice_nostr = NostrKeyPair::generate();
    let bob_nostr = NostrKeyPair::generate();

    let wrap = giftwrap::wrap_packet(&alice_nostr, &bob_nostr.pubkey_hex(), &packet_bytes, 1_000_000)
        .expect("wrap for offline delivery");

    // the relay only ever sees the gift wrap's ephemeral identity
    assert_ne!(wrap.pubkey, alice_nostr.pubkey_hex());

    let unwrapped_bytes = giftwrap::unwrap_packet(&bob_nostr, &wrap, 1_000_000).expect("bob unwraps on reconnect");
    let unwrapped_packet = wire::from_bytes(&unwrapped_bytes).expect("decode packet");

    assert_eq!(unwrapped_packet.sender_id, alice_id);
    let NoisePayload::PrivateMessage(msg) =
        payload::decode_noise_payload(&unwrapped_packet.payload).expect("decode noise payload")
    else {
        panic!("expected a private message payload");
    };
    assert_eq!(msg.content, "bob's BLE radio is out of range, try this");
    assert_eq!(msg.message_id, [3u8; 16]);
}

#[tokio::test]
async fn non_mutual_favorite_is_not_eligible_for_giftwrap_fallback() {
    let mut favorites = FavoritesIndex::new();
    favorites.record_favorited(&hex::encode([5u8; 32]));
    // bob never favorited alice back
    let bob_id = raven_types::peer_id_from_fingerprint(&raven_crypto::sha256::hash(&[5u8; 32]));
    favorites.bind_peer(bob_id, &[5u8; 32]);

    assert!(!favorites.is_mutual(&bob_id), "one-sided favorites must not use the nostr fallback");
}
