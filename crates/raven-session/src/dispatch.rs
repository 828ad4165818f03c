//! Packet Processor ingress dispatch (design spec §4.6): the single
//! decision point every inbound packet passes through before a type-
//! specific handler ever sees it. Signature verification and per-type
//! handling need the Peer Registry and so live in the daemon layer that
//! calls this; this module owns what the Security Core already has the
//! state for — the self-sent short-circuit, duplicate suppression, and
//! the ttl-decrement/relay decision.

use raven_types::packet::Packet;
use raven_types::PeerId;

use crate::dedup::Deduplicator;

/// Why an inbound packet was dropped before reaching a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The packet's sender is us; mesh broadcast echoed back.
    SelfSent,
    /// Already processed within the dedup window.
    Duplicate,
}

/// Outcome of [`process_inbound`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Drop the packet without invoking any handler.
    Drop(DropReason),
    /// Hand the packet to its type-specific handler, and relay it
    /// unchanged (decremented ttl, same signature) to other direct
    /// peers first if `relay` is set.
    Handle { packet: Packet, relay: bool },
}

/// Run a freshly received packet through the ingress pipeline.
///
/// `packet.ttl` is consumed: the returned packet (inside `Dispatch::Handle`)
/// carries the decremented value, which is what gets relayed.
pub fn process_inbound(mut packet: Packet, local_peer_id: &PeerId, dedup: &mut Deduplicator, now_ms: u64) -> Dispatch {
    if &packet.sender_id == local_peer_id {
        return Dispatch::Drop(DropReason::SelfSent);
    }

    if dedup.check_and_record(&packet, now_ms) {
        return Dispatch::Drop(DropReason::Duplicate);
    }

    packet.ttl = packet.ttl.saturating_sub(1);
    let uniquely_addressed = packet.addressed_to(local_peer_id);
    let relay = packet.ttl > 0 && !uniquely_addressed;

    Dispatch::Handle { packet, relay }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_types::packet::{PacketType, ProtocolVersion};

    fn packet(sender: PeerId, recipient: Option<PeerId>, ttl: u8) -> Packet {
        Packet {
            version: ProtocolVersion::V1,
            packet_type: PacketType::Message,
            ttl,
            timestamp: 1_000,
            sender_id: sender,
            recipient_id: recipient,
            payload: b"hi".to_vec(),
            signature: None,
        }
    }

    #[test]
    fn self_sent_packet_is_dropped() {
        let mut dedup = Deduplicator::default();
        let local = [1; 8];
        let dispatch = process_inbound(packet(local, None, 3), &local, &mut dedup, 0);
        assert_eq!(dispatch, Dispatch::Drop(DropReason::SelfSent));
    }

    #[test]
    fn duplicate_packet_is_dropped() {
        let mut dedup = Deduplicator::default();
        let local = [1; 8];
        let pkt = packet([2; 8], None, 3);
        let _ = process_inbound(pkt.clone(), &local, &mut dedup, 0);
        let dispatch = process_inbound(pkt, &local, &mut dedup, 100);
        assert_eq!(dispatch, Dispatch::Drop(DropReason::Duplicate));
    }

    #[test]
    fn broadcast_with_ttl_remaining_is_relayed() {
        let mut dedup = Deduplicator::default();
        let local = [1; 8];
        let dispatch = process_inbound(packet([2; 8], None, 3), &local, &mut dedup, 0);
        match dispatch {
            Dispatch::Handle { packet, relay } => {
                assert!(relay);
                assert_eq!(packet.ttl, 2);
            }
            _ => panic!("expected Handle"),
        }
    }

    #[test]
    fn expired_ttl_is_handled_but_not_relayed() {
        let mut dedup = Deduplicator::default();
        let local = [1; 8];
        let dispatch = process_inbound(packet([2; 8], None, 1), &local, &mut dedup, 0);
        match dispatch {
            Dispatch::Handle { packet, relay } => {
                assert!(!relay);
                assert_eq!(packet.ttl, 0);
            }
            _ => panic!("expected Handle"),
        }
    }

    #[test]
    fn packet_uniquely_addressed_to_us_is_not_relayed() {
        let mut dedup = Deduplicator::default();
        let local = [1; 8];
        let dispatch = process_inbound(packet([2; 8], Some(local), 5), &local, &mut dedup, 0);
        match dispatch {
            Dispatch::Handle { relay, .. } => assert!(!relay),
            _ => panic!("expected Handle"),
        }
    }
}
