//! Integration test: peer-id rotation mid-conversation.
//!
//! A BLE device address rotation gives a peer a new `PeerId` without
//! changing its stable Noise static key. The registry must migrate the
//! existing record, the favorites index must keep tracking the same
//! relationship under the new id, and the dedup/ingress layer must not
//! treat the peer's next packet as a duplicate just because its sender
//! id changed.

use raven_peers::registry::{AnnounceOutcome, PeerRegistry};
use raven_router::favorites::FavoritesIndex;
use raven_session::dedup::Deduplicator;
use raven_session::dispatch::{self, Dispatch};
use raven_types::packet::{Packet, PacketType, ProtocolVersion};

fn announce(sender: [u8; 8], timestamp: u64, text: &str) -> Packet {
    Packet {
        version: ProtocolVersion::V1,
        packet_type: PacketType::Message,
        ttl: 3,
        timestamp,
        sender_id: sender,
        recipient_id: None,
        payload: text.as_bytes().to_vec(),
        signature: None,
    }
}

#[tokio::test]
async fn rotating_peer_id_preserves_registry_and_favorite_state() {
    let noise_pub = [42u8; 32];
    let fingerprint = raven_crypto::sha256::hash(&noise_pub);
    let old_id = raven_types::peer_id_from_fingerprint(&fingerprint);

    let mut registry = PeerRegistry::new();
    let outcome = registry.handle_announce(old_id, "nomad", noise_pub, [1u8; 32], 0);
    assert_eq!(outcome, AnnounceOutcome::New);

    let mut favorites = FavoritesIndex::new();
    favorites.bind_peer(old_id, &noise_pub);
    favorites.record_favorited(&hex::encode(noise_pub));
    favorites.record_they_favorited(&hex::encode(noise_pub), None);
    assert!(favorites.is_mutual(&old_id), "should be mutual before rotation");

    // Device address rotates; same static key, new peer_id.
    let new_id = {
        let mut id = old_id;
        id[0] ^= 0xFF;
        id
    };
    let outcome = registry.handle_announce(new_id, "nomad", noise_pub, [1u8; 32], 5_000);
    assert_eq!(outcome, AnnounceOutcome::Rotated { old_id });
    assert!(registry.get(&old_id).is_none(), "old record should be migrated, not duplicated");
    assert_eq!(registry.get(&new_id).unwrap().nickname, "nomad");

    favorites.bind_peer(new_id, &noise_pub);
    assert!(favorites.is_mutual(&new_id), "mutual favorite status must survive rotation");
    assert!(!favorites.is_mutual(&old_id), "the old id is no longer a valid lookup key");

    // The peer's next packet under its new id must not be mistaken for a
    // duplicate of anything sent under the old id.
    let mut dedup = Deduplicator::default();
    let first_under_old_id = announce(old_id, 1_000, "hey");
    let dispatch = dispatch::process_inbound(first_under_old_id, &[0xAA; 8], &mut dedup, 1_000);
    assert!(matches!(dispatch, Dispatch::Handle { relay: true, .. }));

    let first_under_new_id = announce(new_id, 6_000, "hey");
    let dispatch = dispatch::process_inbound(first_under_new_id, &[0xAA; 8], &mut dedup, 6_000);
    assert!(
        matches!(dispatch, Dispatch::Handle { relay: true, .. }),
        "a genuinely new packet from the rotated id must not be dropped as a duplicate"
    );
}
