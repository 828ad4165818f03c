//! Inbound duplicate-packet detector (design spec §4.3).
//!
//! Non-`ANNOUNCE` packets are keyed by `(timestamp, sender_id,
//! hash(payload_head))`; `ANNOUNCE` packets are never deduplicated here —
//! they are idempotent and must be able to bind a first-announce on a new
//! device connection.

use lru::LruCache;
use raven_types::packet::{Packet, PacketType};
use raven_types::PeerId;
use std::num::NonZeroUsize;

/// Default bound on the number of tracked seen-keys.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default time a seen-key is considered a live duplicate.
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Number of leading payload bytes folded into the dedup key.
const PAYLOAD_HEAD_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct DedupKey {
    timestamp: u64,
    sender_id: PeerId,
    payload_head_hash: [u8; 8],
}

fn payload_head_hash(payload: &[u8]) -> [u8; 8] {
    let head = &payload[..payload.len().min(PAYLOAD_HEAD_LEN)];
    let digest = raven_crypto::sha256::hash(head);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Bounded, TTL'd filter for packets already processed once.
pub struct Deduplicator {
    seen: LruCache<DedupKey, u64>,
    ttl_ms: u64,
}

impl Deduplicator {
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        Self {
            seen: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            ttl_ms,
        }
    }

    /// Check whether `packet` has already been seen (within the TTL
    /// window) and record it if not. `ANNOUNCE` packets always return
    /// `false` and are never recorded.
    pub fn check_and_record(&mut self, packet: &Packet, now_ms: u64) -> bool {
        if packet.packet_type == PacketType::Announce {
            return false;
        }

        let key = DedupKey {
            timestamp: packet.timestamp,
            sender_id: packet.sender_id,
            payload_head_hash: payload_head_hash(&packet.payload),
        };

        if let Some(&inserted_at) = self.seen.get(&key) {
            if now_ms.saturating_sub(inserted_at) <= self.ttl_ms {
                return true;
            }
        }

        self.seen.put(key, now_ms);
        false
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_types::packet::ProtocolVersion;

    fn packet(packet_type: PacketType, timestamp: u64, payload: &[u8]) -> Packet {
        Packet {
            version: ProtocolVersion::V1,
            packet_type,
            ttl: 3,
            timestamp,
            sender_id: [1, 2, 3, 4, 5, 6, 7, 8],
            recipient_id: None,
            payload: payload.to_vec(),
            signature: None,
        }
    }

    #[test]
    fn first_sighting_is_not_a_duplicate() {
        let mut dedup = Deduplicator::default();
        let pkt = packet(PacketType::Message, 1000, b"hi");
        assert!(!dedup.check_and_record(&pkt, 0));
    }

    #[test]
    fn repeat_within_ttl_is_a_duplicate() {
        let mut dedup = Deduplicator::default();
        let pkt = packet(PacketType::Message, 1000, b"hi");
        assert!(!dedup.check_and_record(&pkt, 0));
        assert!(dedup.check_and_record(&pkt, 1000));
    }

    #[test]
    fn repeat_after_ttl_is_not_a_duplicate() {
        let mut dedup = Deduplicator::new(DEFAULT_CAPACITY, 1_000);
        let pkt = packet(PacketType::Message, 1000, b"hi");
        assert!(!dedup.check_and_record(&pkt, 0));
        assert!(!dedup.check_and_record(&pkt, 5_000));
    }

    #[test]
    fn announce_packets_are_never_deduplicated() {
        let mut dedup = Deduplicator::default();
        let pkt = packet(PacketType::Announce, 1000, b"announce");
        assert!(!dedup.check_and_record(&pkt, 0));
        assert!(!dedup.check_and_record(&pkt, 1));
        assert!(!dedup.check_and_record(&pkt, 2));
    }

    #[test]
    fn different_payloads_are_distinct() {
        let mut dedup = Deduplicator::default();
        let pkt_a = packet(PacketType::Message, 1000, b"alpha");
        let pkt_b = packet(PacketType::Message, 1000, b"beta");
        assert!(!dedup.check_and_record(&pkt_a, 0));
        assert!(!dedup.check_and_record(&pkt_b, 0));
    }
}
