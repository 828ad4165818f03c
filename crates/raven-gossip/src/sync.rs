//! REQUEST_SYNC scheduling and per-(peer, direction) rate limiting
//! (design spec §4.9).

use std::collections::HashMap;

use raven_types::PeerId;
use tracing::debug;

/// Interval between periodic sync rounds with each directly connected peer.
pub const PERIODIC_SYNC_INTERVAL_MS: u64 = 20_000;

/// Delay before the first sync round with a newly direct neighbor.
pub const INITIAL_SYNC_DELAY_MS: u64 = 1_000;

/// Which side of a REQUEST_SYNC exchange is being rate-limited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    /// We are sending a REQUEST_SYNC to this peer.
    Outbound,
    /// This peer sent us a REQUEST_SYNC.
    Inbound,
}

/// Tracks when each directly connected peer is next due for a sync round,
/// and rate-limits REQUEST_SYNC traffic per (peer, direction).
#[derive(Default)]
pub struct SyncScheduler {
    next_due_ms: HashMap<PeerId, u64>,
    last_request_ms: HashMap<(PeerId, SyncDirection), u64>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the bootstrap sync for a newly direct neighbor, firing
    /// [`INITIAL_SYNC_DELAY_MS`] from now rather than waiting a full
    /// periodic interval.
    pub fn schedule_initial_sync(&mut self, peer_id: PeerId, now_ms: u64) {
        debug!(peer_id = ?peer_id, "scheduling initial sync");
        self.next_due_ms.insert(peer_id, now_ms + INITIAL_SYNC_DELAY_MS);
    }

    /// Peers whose sync round is due at `now_ms`. Each returned peer is
    /// immediately rescheduled for the next periodic interval.
    pub fn due_peers(&mut self, now_ms: u64) -> Vec<PeerId> {
        let due: Vec<PeerId> =
            self.next_due_ms.iter().filter(|(_, &due_at)| now_ms >= due_at).map(|(peer, _)| *peer).collect();
        for peer_id in &due {
            self.next_due_ms.insert(*peer_id, now_ms + PERIODIC_SYNC_INTERVAL_MS);
        }
        due
    }

    /// Drop scheduling state for a peer that disconnected.
    pub fn forget(&mut self, peer_id: &PeerId) {
        self.next_due_ms.remove(peer_id);
        self.last_request_ms.retain(|(p, _), _| p != peer_id);
    }

    /// Whether a REQUEST_SYNC in `direction` with `peer_id` is allowed at
    /// `now_ms`, given the minimum spacing between rounds. If allowed,
    /// records the attempt.
    pub fn try_allow(&mut self, peer_id: PeerId, direction: SyncDirection, now_ms: u64) -> bool {
        let key = (peer_id, direction);
        let allowed = match self.last_request_ms.get(&key) {
            Some(&last) => now_ms.saturating_sub(last) >= PERIODIC_SYNC_INTERVAL_MS,
            None => true,
        };
        if allowed {
            self.last_request_ms.insert(key, now_ms);
        }
        allowed
    }
}
