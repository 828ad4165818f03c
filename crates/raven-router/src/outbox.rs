//! Per-recipient store-and-forward outbox (design spec §4.8, §4.11).
//!
//! Packets destined for a mesh peer that is known but not yet session-
//! established are queued here, keyed by `(peer_id, noise_static_pub_hex)`
//! rather than `peer_id` alone so a rotated peer-ID on the same static key
//! still finds its queue. Flushed by [`crate::router::MessageRouter`] on
//! `ON_SESSION_ESTABLISHED`.

use raven_types::PeerId;
use std::collections::HashMap;

/// Maximum number of queued entries per recipient.
pub const MAX_ENTRIES_PER_RECIPIENT: usize = 100;

/// Maximum total queued bytes per recipient.
pub const MAX_BYTES_PER_RECIPIENT: usize = 1_048_576;

/// Entries older than this are dropped on the next prune pass.
pub const ENTRY_TTL_MS: u64 = 72 * 60 * 60 * 1000;

/// Identifies an outbox queue. Keyed on the peer's stable Noise static
/// public key, not its rotating `PeerId`, so a handshake completing under
/// a new peer-ID still flushes packets enqueued under the old one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutboxKey {
    pub peer_id: PeerId,
    pub noise_static_pub_hex: String,
}

/// A single queued packet.
#[derive(Clone, Debug)]
pub struct OutboxEntry {
    pub packet: Vec<u8>,
    pub enqueued_at_ms: u64,
}

/// The outbox's external storage boundary, mirroring [`crate::ports::MeshPort`]
/// in shape: the router only ever calls through this trait, so a daemon can
/// later swap in a persistent-backed implementation without touching the
/// routing logic. The default `InMemoryOutbox` below has no cross-restart
/// persistence, per design spec §4.8.
pub trait OutboxPort: Send + Sync {
    /// Queue `packet` for `key`, evicting the oldest entry first if the
    /// per-recipient caps would otherwise be exceeded.
    fn enqueue(&mut self, key: OutboxKey, packet: Vec<u8>, now_ms: u64);

    /// Remove and return all queued entries for `key`, oldest first.
    fn drain(&mut self, key: &OutboxKey) -> Vec<OutboxEntry>;

    /// Drop entries older than [`ENTRY_TTL_MS`] across all recipients.
    fn prune_expired(&mut self, now_ms: u64);

    /// Number of queued entries for `key`.
    fn len(&self, key: &OutboxKey) -> usize;
}

/// The default, process-lifetime-only outbox implementation.
#[derive(Default)]
pub struct InMemoryOutbox {
    queues: HashMap<OutboxKey, Vec<OutboxEntry>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_bytes(entries: &[OutboxEntry]) -> usize {
        entries.iter().map(|e| e.packet.len()).sum()
    }
}

impl OutboxPort for InMemoryOutbox {
    fn enqueue(&mut self, key: OutboxKey, packet: Vec<u8>, now_ms: u64) {
        let entries = self.queues.entry(key).or_default();

        let incoming_len = packet.len();
        entries.push(OutboxEntry { packet, enqueued_at_ms: now_ms });

        while entries.len() > MAX_ENTRIES_PER_RECIPIENT
            || Self::queue_bytes(entries) > MAX_BYTES_PER_RECIPIENT.max(incoming_len)
        {
            if entries.len() <= 1 {
                break;
            }
            entries.remove(0);
        }
    }

    fn drain(&mut self, key: &OutboxKey) -> Vec<OutboxEntry> {
        self.queues.remove(key).unwrap_or_default()
    }

    fn prune_expired(&mut self, now_ms: u64) {
        self.queues.retain(|_, entries| {
            entries.retain(|e| now_ms.saturating_sub(e.enqueued_at_ms) < ENTRY_TTL_MS);
            !entries.is_empty()
        });
    }

    fn len(&self, key: &OutboxKey) -> usize {
        self.queues.get(key).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> OutboxKey {
        OutboxKey { peer_id: [n; 8], noise_static_pub_hex: format!("pub{n}") }
    }

    #[test]
    fn enqueue_and_drain_preserves_order() {
        let mut outbox = InMemoryOutbox::new();
        outbox.enqueue(key(1), b"first".to_vec(), 100);
        outbox.enqueue(key(1), b"second".to_vec(), 200);

        let drained = outbox.drain(&key(1));
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].packet, b"first");
        assert_eq!(drained[1].packet, b"second");
        assert_eq!(outbox.len(&key(1)), 0);
    }

    #[test]
    fn separate_keys_have_separate_queues() {
        let mut outbox = InMemoryOutbox::new();
        outbox.enqueue(key(1), b"a".to_vec(), 0);
        outbox.enqueue(key(2), b"b".to_vec(), 0);

        assert_eq!(outbox.len(&key(1)), 1);
        assert_eq!(outbox.len(&key(2)), 1);
    }

    #[test]
    fn entry_count_cap_evicts_oldest() {
        let mut outbox = InMemoryOutbox::new();
        for i in 0..(MAX_ENTRIES_PER_RECIPIENT + 10) {
            outbox.enqueue(key(1), vec![i as u8], i as u64);
        }
        assert_eq!(outbox.len(&key(1)), MAX_ENTRIES_PER_RECIPIENT);

        let drained = outbox.drain(&key(1));
        // the oldest 10 were evicted, so the first surviving entry's byte is 10
        assert_eq!(drained[0].packet, vec![10u8]);
    }

    #[test]
    fn byte_cap_evicts_oldest() {
        let mut outbox = InMemoryOutbox::new();
        let big = vec![0u8; MAX_BYTES_PER_RECIPIENT / 2 + 1];
        outbox.enqueue(key(1), big.clone(), 0);
        outbox.enqueue(key(1), big.clone(), 1);
        outbox.enqueue(key(1), big, 2);

        // each push over budget evicts the oldest until under budget again
        assert!(outbox.len(&key(1)) <= 2);
    }

    #[test]
    fn prune_expired_drops_stale_entries() {
        let mut outbox = InMemoryOutbox::new();
        outbox.enqueue(key(1), b"stale".to_vec(), 0);
        outbox.enqueue(key(1), b"fresh".to_vec(), ENTRY_TTL_MS - 1);

        outbox.prune_expired(ENTRY_TTL_MS);

        let drained = outbox.drain(&key(1));
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].packet, b"fresh");
    }

    #[test]
    fn prune_expired_removes_empty_queues() {
        let mut outbox = InMemoryOutbox::new();
        outbox.enqueue(key(1), b"stale".to_vec(), 0);

        outbox.prune_expired(ENTRY_TTL_MS + 1);

        assert_eq!(outbox.len(&key(1)), 0);
    }

    #[test]
    fn drain_on_missing_key_is_empty() {
        let mut outbox = InMemoryOutbox::new();
        assert!(outbox.drain(&key(9)).is_empty());
    }
}
