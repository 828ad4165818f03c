//! Splits oversized packets into `FRAGMENT`-type packets and reassembles
//! them on the receive side (design spec §4.2).
//!
//! Time is supplied by the caller (`now_ms`, usually from a
//! `raven_types::ClockSource`) rather than read internally, so reassembly
//! deadlines are deterministic under test.

use std::collections::HashMap;

use raven_types::fragment::Fragment;
use raven_types::TransferId;

use crate::{CodecError, Result};

/// Default reassembly deadline, per design spec §4.2.
pub const DEFAULT_REASSEMBLY_DEADLINE_MS: u64 = 60_000;

/// Split `payload` into fragments of at most `max_fragment_len` bytes each,
/// sharing a fresh random `transfer_id`.
pub fn split(payload: &[u8], max_fragment_len: usize) -> Vec<Fragment> {
    assert!(max_fragment_len > 0, "max_fragment_len must be positive");

    let mut transfer_id: TransferId = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut transfer_id);

    let chunks: Vec<&[u8]> = payload.chunks(max_fragment_len).collect();
    let total = chunks.len().max(1) as u16;

    if payload.is_empty() {
        return vec![Fragment {
            transfer_id,
            index: 0,
            total: 1,
            bytes: Vec::new(),
        }];
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, bytes)| Fragment {
            transfer_id,
            index: index as u16,
            total,
            bytes: bytes.to_vec(),
        })
        .collect()
}

struct ReassemblyBuffer {
    total: u16,
    parts: HashMap<u16, Vec<u8>>,
    started_at_ms: u64,
}

/// Owns in-flight reassembly buffers, one per `transfer_id`.
#[derive(Default)]
pub struct Reassembler {
    buffers: HashMap<TransferId, ReassemblyBuffer>,
    deadline_ms: u64,
}

impl Reassembler {
    pub fn new(deadline_ms: u64) -> Self {
        Self {
            buffers: HashMap::new(),
            deadline_ms,
        }
    }

    /// Ingest one fragment. Returns the reassembled bytes once every index
    /// up to `total` has arrived.
    pub fn ingest(&mut self, fragment: Fragment, now_ms: u64) -> Result<Option<Vec<u8>>> {
        let buffer = self.buffers.entry(fragment.transfer_id).or_insert_with(|| ReassemblyBuffer {
            total: fragment.total,
            parts: HashMap::new(),
            started_at_ms: now_ms,
        });

        if buffer.total != fragment.total {
            return Err(CodecError::SizeMismatch);
        }

        match buffer.parts.get(&fragment.index) {
            Some(existing) if existing == &fragment.bytes => {}
            Some(_) => return Err(CodecError::FragmentOverlap(fragment.index)),
            None => {
                buffer.parts.insert(fragment.index, fragment.bytes);
            }
        }

        if buffer.parts.len() < buffer.total as usize {
            return Ok(None);
        }

        let buffer = self.buffers.remove(&fragment.transfer_id).expect("just inserted");
        let mut out = Vec::new();
        for index in 0..buffer.total {
            let part = buffer
                .parts
                .get(&index)
                .ok_or(CodecError::SizeMismatch)?;
            out.extend_from_slice(part);
        }
        Ok(Some(out))
    }

    /// Drop a reassembly buffer, e.g. on explicit cancellation.
    pub fn cancel(&mut self, transfer_id: &TransferId) {
        self.buffers.remove(transfer_id);
    }

    /// Evict and return the transfer ids of any buffer older than the
    /// configured deadline.
    pub fn evict_expired(&mut self, now_ms: u64) -> Vec<TransferId> {
        let deadline_ms = self.deadline_ms;
        let expired: Vec<TransferId> = self
            .buffers
            .iter()
            .filter(|(_, buf)| now_ms.saturating_sub(buf.started_at_ms) > deadline_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.buffers.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_reassemble_roundtrip() {
        let payload = vec![7u8; 1000];
        let fragments = split(&payload, 300);
        assert_eq!(fragments.len(), 4);

        let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);
        let mut result = None;
        for fragment in fragments {
            result = reassembler.ingest(fragment, 0).expect("ingest");
        }
        assert_eq!(result, Some(payload));
    }

    #[test]
    fn out_of_order_fragments_reassemble_correctly() {
        let payload = b"the quick brown fox jumps".to_vec();
        let mut fragments = split(&payload, 5);
        fragments.reverse();

        let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);
        let mut result = None;
        for fragment in fragments {
            result = reassembler.ingest(fragment, 0).expect("ingest");
        }
        assert_eq!(result, Some(payload));
    }

    #[test]
    fn duplicate_identical_fragment_is_ignored() {
        let payload = b"duplicate me".to_vec();
        let fragments = split(&payload, 4);
        let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);

        reassembler.ingest(fragments[0].clone(), 0).expect("ingest");
        reassembler
            .ingest(fragments[0].clone(), 0)
            .expect("duplicate identical fragment should not error");

        let mut result = None;
        for fragment in fragments.into_iter().skip(1) {
            result = reassembler.ingest(fragment, 0).expect("ingest");
        }
        assert_eq!(result, Some(payload));
    }

    #[test]
    fn conflicting_duplicate_index_is_rejected() {
        let payload = b"conflict me please".to_vec();
        let fragments = split(&payload, 4);
        let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);

        reassembler.ingest(fragments[0].clone(), 0).expect("ingest");

        let mut conflicting = fragments[0].clone();
        conflicting.bytes = vec![0xFF; conflicting.bytes.len()];
        assert!(matches!(
            reassembler.ingest(conflicting, 0),
            Err(CodecError::FragmentOverlap(0))
        ));
    }

    #[test]
    fn expired_buffers_are_evicted() {
        let payload = vec![1u8; 20];
        let fragments = split(&payload, 4);
        let mut reassembler = Reassembler::new(1_000);
        reassembler.ingest(fragments[0].clone(), 0).expect("ingest");

        let expired = reassembler.evict_expired(2_000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0], fragments[0].transfer_id);
    }

    #[test]
    fn cancel_drops_in_progress_buffer() {
        let payload = vec![1u8; 20];
        let fragments = split(&payload, 4);
        let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_DEADLINE_MS);
        reassembler.ingest(fragments[0].clone(), 0).expect("ingest");

        reassembler.cancel(&fragments[0].transfer_id);
        assert!(reassembler.evict_expired(u64::MAX).is_empty());
    }
}
