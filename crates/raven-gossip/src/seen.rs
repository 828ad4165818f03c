//! Bounded LRU of recently observed public packets (design spec §4.9).
//!
//! Only broadcast MESSAGE, ANNOUNCE and FRAGMENT packets are "public" in
//! the sense gossip sync cares about; callers decide which packets to
//! feed in, this set just bounds and hashes them.

use std::num::NonZeroUsize;

use lru::LruCache;
use raven_types::packet::Packet;

/// Default capacity of the seen-packet LRU.
pub const DEFAULT_CAPACITY: usize = 500;

/// Identity of a packet in the seen set: SHA-256 over its sender, and the
/// start of its payload (the same "head" used for dedup in raven-session,
/// so the two bounded sets agree on what counts as the same packet).
pub type PacketHash = [u8; 32];

pub fn packet_hash(packet: &Packet) -> PacketHash {
    let mut input = Vec::with_capacity(8 + 8 + packet.payload.len().min(256));
    input.extend_from_slice(&packet.timestamp.to_be_bytes());
    input.extend_from_slice(&packet.sender_id);
    input.extend_from_slice(&packet.payload[..packet.payload.len().min(256)]);
    raven_crypto::sha256::hash(&input)
}

/// Bounded set of packet hashes already observed and relayed.
pub struct SeenSet {
    seen: LruCache<PacketHash, ()>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self { seen: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)) }
    }

    /// Record `packet`, returning `true` if it was not already present.
    pub fn record(&mut self, packet: &Packet) -> bool {
        let hash = packet_hash(packet);
        if self.seen.contains(&hash) {
            false
        } else {
            self.seen.put(hash, ());
            true
        }
    }

    pub fn contains_hash(&self, hash: &PacketHash) -> bool {
        self.seen.contains(hash)
    }

    /// All currently retained hashes, for building a GCS filter.
    pub fn hashes(&self) -> Vec<PacketHash> {
        self.seen.iter().map(|(h, _)| *h).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_types::packet::{PacketType, ProtocolVersion};

    fn packet(sender: u8, timestamp: u64, payload: &[u8]) -> Packet {
        Packet {
            version: ProtocolVersion::V1,
            packet_type: PacketType::Message,
            ttl: 3,
            timestamp,
            sender_id: [sender; 8],
            recipient_id: None,
            payload: payload.to_vec(),
            signature: None,
        }
    }

    #[test]
    fn first_sighting_records_as_new() {
        let mut set = SeenSet::default();
        assert!(set.record(&packet(1, 1000, b"hi")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn repeat_sighting_is_not_new() {
        let mut set = SeenSet::default();
        let pkt = packet(1, 1000, b"hi");
        assert!(set.record(&pkt));
        assert!(!set.record(&pkt));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut set = SeenSet::new(2);
        set.record(&packet(1, 1, b"a"));
        set.record(&packet(2, 2, b"b"));
        set.record(&packet(3, 3, b"c"));
        assert_eq!(set.len(), 2);
        assert!(!set.contains_hash(&packet_hash(&packet(1, 1, b"a"))));
    }

    #[test]
    fn hashes_lists_all_retained() {
        let mut set = SeenSet::default();
        set.record(&packet(1, 1, b"a"));
        set.record(&packet(2, 2, b"b"));
        assert_eq!(set.hashes().len(), 2);
    }
}
