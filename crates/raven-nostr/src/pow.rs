//! NIP-13 proof-of-work mining and verification (design spec §4.10).
//!
//! Difficulty is the number of leading zero bits required in an event's id.
//! The miner appends a `["nonce", "<value>", "<difficulty>"]` tag and tries
//! successive nonce values until the resulting id clears the target.

use raven_crypto::secp::NostrKeyPair;
use raven_crypto::sha256::leading_zero_bits;

use crate::event::{self, NostrEvent};
use crate::{NostrError, Result};

/// Upper bound on mining attempts before giving up, guarding against a
/// misconfigured difficulty that would otherwise loop forever.
pub const MAX_MINING_ATTEMPTS: u64 = 10_000_000;

/// Mine and sign an event whose id has at least `difficulty` leading zero
/// bits, per NIP-13. `tags` must not already contain a `"nonce"` tag.
pub fn mine_event(
    keypair: &NostrKeyPair,
    created_at: u64,
    kind: u32,
    mut tags: Vec<Vec<String>>,
    content: String,
    difficulty: u32,
) -> Result<NostrEvent> {
    if tags.iter().any(|t| t.first().map(|s| s.as_str()) == Some("nonce")) {
        return Err(NostrError::InvalidEvent("tags already contain a nonce tag".into()));
    }
    tags.push(vec!["nonce".to_string(), "0".to_string(), difficulty.to_string()]);
    let nonce_idx = tags.len() - 1;

    for nonce in 0..MAX_MINING_ATTEMPTS {
        tags[nonce_idx][1] = nonce.to_string();
        let pubkey_hex = keypair.pubkey_hex();
        let id = event::compute_id(&pubkey_hex, created_at, kind, &tags, &content)?;
        if leading_zero_bits(&id) >= difficulty {
            let sig = keypair.sign_event_id(&id);
            return Ok(NostrEvent {
                id: hex::encode(id),
                pubkey: pubkey_hex,
                created_at,
                kind,
                tags,
                content,
                sig: hex::encode(sig.as_ref().to_vec()),
            });
        }
    }

    Err(NostrError::InsufficientPow { got: 0, need: difficulty })
}

/// The number of leading zero bits an already-built event's id has.
pub fn event_difficulty(event: &NostrEvent) -> Result<u32> {
    let id_bytes = hex::decode(&event.id).map_err(|e| NostrError::InvalidEvent(e.to_string()))?;
    let id: [u8; 32] = id_bytes
        .try_into()
        .map_err(|_| NostrError::InvalidEvent("event id must be 32 bytes".into()))?;
    Ok(leading_zero_bits(&id))
}

/// Reject events below `minimum_difficulty`. Receivers apply this before
/// relaying or surfacing an event, independent of whatever difficulty the
/// event's own `nonce` tag claims.
pub fn check_minimum_difficulty(event: &NostrEvent, minimum_difficulty: u32) -> Result<()> {
    let got = event_difficulty(event)?;
    if got < minimum_difficulty {
        return Err(NostrError::InsufficientPow { got, need: minimum_difficulty });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_zero_mines_immediately() {
        let kp = NostrKeyPair::generate();
        let event = mine_event(&kp, 1_000, 1, vec![], "hi".into(), 0).expect("mine");
        assert!(event_difficulty(&event).expect("difficulty") >= 0);
    }

    #[test]
    fn mined_event_meets_requested_difficulty() {
        let kp = NostrKeyPair::generate();
        let event = mine_event(&kp, 1_000, 1, vec![], "hi".into(), 8).expect("mine");
        assert!(event_difficulty(&event).expect("difficulty") >= 8);
    }

    #[test]
    fn mined_event_still_verifies() {
        let kp = NostrKeyPair::generate();
        let event = mine_event(&kp, 1_000, 1, vec![], "hi".into(), 4).expect("mine");
        event::verify_event(&event).expect("verify");
    }

    #[test]
    fn minimum_difficulty_rejects_low_pow() {
        let kp = NostrKeyPair::generate();
        let event = mine_event(&kp, 1_000, 1, vec![], "hi".into(), 0).expect("mine");
        assert!(check_minimum_difficulty(&event, 30).is_err());
    }

    #[test]
    fn rejects_preexisting_nonce_tag() {
        let kp = NostrKeyPair::generate();
        let result = mine_event(
            &kp,
            1_000,
            1,
            vec![vec!["nonce".into(), "0".into(), "0".into()]],
            "hi".into(),
            0,
        );
        assert!(result.is_err());
    }
}
