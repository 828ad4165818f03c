//! Integration test: large-payload fragmentation and reassembly.
//!
//! A 40 KiB payload (comfortably over any single BLE MTU) is split into
//! `FRAGMENT` packets and fed back through a `Reassembler` out of order,
//! with a duplicate and a deadline eviction mixed in.

use raven_codec::fragment::{self, Reassembler, DEFAULT_REASSEMBLY_DEADLINE_MS};

const FRAGMENT_MTU: usize = 480;

fn payload_of(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

#[tokio::test]
async fn forty_kib_payload_round_trips_through_fragmentation() {
    let payload = payload_of(40 * 1024);
    let fragments = fragment::split(&payload, FRAGMENT_MTU);
    assert!(fragments.len() > 1, "a 40 KiB payload must split into more than one fragment");
    assert!(fragments.iter().all(|f| f.bytes.len() <= FRAGMENT_MTU));

    let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);

    // Deliver out of order, as the mesh would.
    let mut shuffled = fragments.clone();
    let shuffled_len = shuffled.len();
    shuffled.swap(0, shuffled_len - 1);
    if shuffled_len > 2 {
        shuffled.swap(1, shuffled_len / 2);
    }

    let mut result = None;
    for fragment in shuffled {
        result = reassembler.ingest(fragment, 0).expect("ingest");
    }

    let reassembled = result.expect("payload should be complete after the last fragment");
    assert_eq!(reassembled, payload);
}

#[tokio::test]
async fn duplicate_fragment_delivery_is_idempotent() {
    let payload = payload_of(2 * FRAGMENT_MTU + 17);
    let fragments = fragment::split(&payload, FRAGMENT_MTU);
    let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);

    assert!(reassembler.ingest(fragments[0].clone(), 0).unwrap().is_none());
    // redelivering the same fragment must not error or disturb the buffer
    assert!(reassembler.ingest(fragments[0].clone(), 1).unwrap().is_none());
    assert!(reassembler.ingest(fragments[1].clone(), 2).unwrap().is_none());
    let reassembled = reassembler.ingest(fragments[2].clone(), 3).unwrap().expect("complete");
    assert_eq!(reassembled, payload);
}

#[tokio::test]
async fn stale_transfer_is_evicted_after_the_deadline() {
    let payload = payload_of(FRAGMENT_MTU * 3);
    let fragments = fragment::split(&payload, FRAGMENT_MTU);
    let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);

    reassembler.ingest(fragments[0].clone(), 0).unwrap();
    let evicted = reassembler.evict_expired(DEFAULT_REASSEMBLY_DEADLINE_MS + 1);
    assert_eq!(evicted, vec![fragments[0].transfer_id]);

    // the rest of the transfer never completes: its buffer is gone
    assert!(reassembler.ingest(fragments[1].clone(), DEFAULT_REASSEMBLY_DEADLINE_MS + 2).unwrap().is_none());
    assert!(reassembler.ingest(fragments[2].clone(), DEFAULT_REASSEMBLY_DEADLINE_MS + 3).unwrap().is_none());
}
