//! Local identity bootstrap (design spec §6 persisted state: `id.*`).
//!
//! Three secrets live under the `id.` namespace: the Noise XX static
//! keypair (mesh transport security), the Ed25519 signing keypair
//! (packet authentication), and the Nostr master secret the per-geohash
//! and main Nostr identities are derived from (design spec §4.10). All
//! three are generated together on first run and regenerated together
//! whenever `PanicClearAll` wipes the `id.` namespace.

use raven_crypto::{ed25519, x25519};
use raven_db::kv::KeyValueStore;
use raven_types::{peer_id_from_fingerprint, PeerId};

const KEY_NOISE_STATIC: &str = "id.noise_static_private";
const KEY_SIGNING: &str = "id.signing_private";
const KEY_NOSTR_MASTER: &str = "id.nostr_master_secret";

/// The local device's full set of derived keys.
pub struct LocalIdentity {
    pub peer_id: PeerId,
    pub noise_static_private: [u8; 32],
    pub signing: ed25519::KeyPair,
    pub nostr_master_secret: [u8; 32],
}

/// Load the persisted identity, generating and persisting a fresh one if
/// the `id.` namespace is empty (first run, or just after a panic clear).
pub fn load_or_generate(store: &dyn KeyValueStore) -> raven_db::Result<LocalIdentity> {
    let noise_static_private =
        load_or_generate_32(store, KEY_NOISE_STATIC, || x25519::X25519StaticSecret::random().to_bytes())?;
    let signing_private = load_or_generate_32(store, KEY_SIGNING, || ed25519::KeyPair::generate().signing_key.to_bytes())?;
    let nostr_master_secret =
        load_or_generate_32(store, KEY_NOSTR_MASTER, || x25519::X25519StaticSecret::random().to_bytes())?;

    let noise_static_public = x25519::basepoint_mult(&noise_static_private);
    let fingerprint = raven_crypto::sha256::hash(&noise_static_public);
    let peer_id = peer_id_from_fingerprint(&fingerprint);
    let signing = ed25519::KeyPair::from_bytes(&signing_private);

    Ok(LocalIdentity { peer_id, noise_static_private, signing, nostr_master_secret })
}

fn load_or_generate_32(
    store: &dyn KeyValueStore,
    key: &str,
    generate: impl FnOnce() -> [u8; 32],
) -> raven_db::Result<[u8; 32]> {
    if let Some(bytes) = store.get(key)? {
        if bytes.len() == 32 {
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes);
            return Ok(out);
        }
        tracing::warn!(key, "stored identity key has the wrong length, regenerating");
    }

    let fresh = generate();
    store.set(key, &fresh)?;
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_db::kv::InMemoryStore;

    #[test]
    fn first_run_generates_and_persists_identity() {
        let store = InMemoryStore::new();
        let identity = load_or_generate(&store).expect("generate");
        assert!(store.get(KEY_NOISE_STATIC).unwrap().is_some());
        assert!(store.get(KEY_SIGNING).unwrap().is_some());
        assert!(store.get(KEY_NOSTR_MASTER).unwrap().is_some());
        assert_eq!(identity.peer_id.len(), 8);
    }

    #[test]
    fn reloading_returns_the_same_identity() {
        let store = InMemoryStore::new();
        let first = load_or_generate(&store).expect("generate");
        let second = load_or_generate(&store).expect("reload");
        assert_eq!(first.peer_id, second.peer_id);
        assert_eq!(first.noise_static_private, second.noise_static_private);
    }

    #[test]
    fn clearing_the_identity_namespace_yields_a_new_identity() {
        let store = InMemoryStore::new();
        let first = load_or_generate(&store).expect("generate");
        store.clear_namespace("id.").expect("clear");
        let second = load_or_generate(&store).expect("regenerate");
        assert_ne!(first.peer_id, second.peer_id);
    }
}
