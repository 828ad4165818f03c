//! `RelayClient`: the external WebSocket publish/subscribe boundary, and a
//! per-relay connection state machine with backoff, subscription
//! persistence, and periodic drift repair (design spec §4.10).

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::event::NostrEvent;
use crate::{NostrError, Result};

/// Delay before the first reconnect attempt against a relay.
pub const RETRY_BASE_MS: u64 = 1_000;

/// Upper bound on reconnect backoff.
pub const RETRY_MAX_MS: u64 = 60_000;

/// Interval between subscription-drift consistency checks.
pub const CONSISTENCY_CHECK_INTERVAL_MS: u64 = 30_000;

/// Bound on the cross-relay event-id deduplicator.
pub const SEEN_EVENT_CAPACITY: usize = 2_000;

/// The WebSocket-level collaborator. Implementors own the actual relay
/// connections; `RelayManager` only tracks state and decides when to call
/// these.
pub trait RelayClient: Send + Sync {
    fn connect(&self, url: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn disconnect(&self, url: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn publish(&self, url: &str, event: &NostrEvent) -> impl std::future::Future<Output = Result<()>> + Send;
    fn subscribe(
        &self,
        url: &str,
        sub_id: &str,
        filter_json: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn unsubscribe(&self, url: &str, sub_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A relay connection's lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

struct RelayState {
    state: ConnectionState,
    attempt: u32,
    next_retry_at_ms: u64,
    /// Set once a DNS failure makes this relay permanently unreachable;
    /// `due_for_retry` will never surface it again.
    terminal: bool,
    /// sub_id -> filter JSON, restored on every reconnect.
    subscriptions: HashMap<String, String>,
}

impl RelayState {
    fn new() -> Self {
        Self { state: ConnectionState::Disconnected, attempt: 0, next_retry_at_ms: 0, terminal: false, subscriptions: HashMap::new() }
    }

    fn backoff_ms(attempt: u32) -> u64 {
        RETRY_BASE_MS.saturating_mul(1u64 << attempt.min(6)).min(RETRY_MAX_MS)
    }
}

/// Tracks every configured relay's connection state and subscriptions, and
/// deduplicates events seen across all of them.
pub struct RelayManager<C: RelayClient> {
    client: C,
    relays: HashMap<String, RelayState>,
    seen_events: LruCache<String, ()>,
    last_consistency_check_ms: u64,
}

impl<C: RelayClient> RelayManager<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            relays: HashMap::new(),
            seen_events: LruCache::new(NonZeroUsize::new(SEEN_EVENT_CAPACITY).expect("capacity is nonzero")),
            last_consistency_check_ms: 0,
        }
    }

    /// Register a relay without connecting to it yet.
    pub fn add_relay(&mut self, url: &str) {
        self.relays.entry(url.to_string()).or_insert_with(RelayState::new);
    }

    pub fn remove_relay(&mut self, url: &str) {
        self.relays.remove(url);
    }

    pub fn state(&self, url: &str) -> Option<ConnectionState> {
        self.relays.get(url).map(|r| r.state)
    }

    pub fn configured_relays(&self) -> Vec<String> {
        self.relays.keys().cloned().collect()
    }

    /// Attempt to connect to `url`. On success, restores any subscriptions
    /// recorded from before a prior disconnect. A DNS failure is terminal:
    /// the relay is marked and never surfaced by [`Self::due_for_retry`]
    /// again.
    pub async fn connect(&mut self, url: &str, now_ms: u64) -> Result<()> {
        self.add_relay(url);
        let relay = self.relays.get_mut(url).expect("just inserted");
        relay.state = ConnectionState::Connecting;

        match self.client.connect(url).await {
            Ok(()) => {
                let relay = self.relays.get_mut(url).expect("still present");
                relay.state = ConnectionState::Connected;
                relay.attempt = 0;
                let subs: Vec<(String, String)> =
                    relay.subscriptions.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                for (sub_id, filter_json) in subs {
                    self.client.subscribe(url, &sub_id, &filter_json).await?;
                }
                Ok(())
            }
            Err(err) => {
                let relay = self.relays.get_mut(url).expect("still present");
                relay.state = ConnectionState::Disconnected;
                if matches!(err, NostrError::RelayDns(_)) {
                    debug!(url = %url, "relay DNS resolution failed, marking terminal");
                    relay.terminal = true;
                } else {
                    relay.attempt += 1;
                    relay.next_retry_at_ms = now_ms + RelayState::backoff_ms(relay.attempt);
                    debug!(url = %url, attempt = relay.attempt, error = %err, "relay connect failed, scheduling retry");
                }
                Err(err)
            }
        }
    }

    /// Relays that are disconnected, non-terminal, and due for a retry.
    pub fn due_for_retry(&self, now_ms: u64) -> Vec<String> {
        self.relays
            .iter()
            .filter(|(_, r)| r.state == ConnectionState::Disconnected && !r.terminal && now_ms >= r.next_retry_at_ms)
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub async fn disconnect(&mut self, url: &str) -> Result<()> {
        if let Some(relay) = self.relays.get_mut(url) {
            relay.state = ConnectionState::Disconnecting;
        }
        self.client.disconnect(url).await?;
        if let Some(relay) = self.relays.get_mut(url) {
            relay.state = ConnectionState::Disconnected;
        }
        Ok(())
    }

    /// Record a subscription and, if connected, install it immediately.
    /// Persisted in memory so a later reconnect restores it automatically.
    pub async fn subscribe(&mut self, url: &str, sub_id: &str, filter_json: &str) -> Result<()> {
        self.add_relay(url);
        let relay = self.relays.get_mut(url).expect("just inserted");
        relay.subscriptions.insert(sub_id.to_string(), filter_json.to_string());
        if relay.state == ConnectionState::Connected {
            self.client.subscribe(url, sub_id, filter_json).await?;
        }
        Ok(())
    }

    pub async fn unsubscribe(&mut self, url: &str, sub_id: &str) -> Result<()> {
        let connected = self.relays.get(url).map(|r| r.state == ConnectionState::Connected).unwrap_or(false);
        if let Some(relay) = self.relays.get_mut(url) {
            relay.subscriptions.remove(sub_id);
        }
        if connected {
            self.client.unsubscribe(url, sub_id).await?;
        }
        Ok(())
    }

    pub async fn publish(&mut self, url: &str, event: &NostrEvent) -> Result<()> {
        self.client.publish(url, event).await
    }

    /// Record that `event_id` was seen on some relay. Returns `true` the
    /// first time an id is seen, `false` for a duplicate delivered by
    /// another relay or a repeat subscription match.
    pub fn record_event_seen(&mut self, event_id: &str) -> bool {
        if self.seen_events.contains(event_id) {
            false
        } else {
            self.seen_events.put(event_id.to_string(), ());
            true
        }
    }

    pub fn consistency_check_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_consistency_check_ms) >= CONSISTENCY_CHECK_INTERVAL_MS
    }

    /// Re-install every recorded subscription on every connected relay,
    /// repairing drift between what we think is subscribed and what the
    /// relay actually has active.
    pub async fn repair_subscriptions(&mut self, now_ms: u64) -> Result<()> {
        let connected: Vec<(String, Vec<(String, String)>)> = self
            .relays
            .iter()
            .filter(|(_, r)| r.state == ConnectionState::Connected)
            .map(|(url, r)| (url.clone(), r.subscriptions.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
            .collect();

        for (url, subs) in connected {
            for (sub_id, filter_json) in subs {
                self.client.subscribe(&url, &sub_id, &filter_json).await?;
            }
        }
        self.last_consistency_check_ms = now_ms;
        Ok(())
    }
}

#[cfg(test)]
pub use mock::MockRelayClient;

#[cfg(test)]
mod mock {
    use super::*;
    use std::sync::Mutex;

    /// In-memory `RelayClient` double. `fail_dns` and `fail_connect` name
    /// relay URLs that should fail connect() in the respective way.
    #[derive(Default)]
    pub struct MockRelayClient {
        pub published: Mutex<Vec<(String, String)>>,
        pub subscribed: Mutex<Vec<(String, String, String)>>,
        pub unsubscribed: Mutex<Vec<(String, String)>>,
        pub fail_dns: Mutex<Vec<String>>,
        pub fail_connect: Mutex<Vec<String>>,
    }

    impl MockRelayClient {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl RelayClient for MockRelayClient {
        async fn connect(&self, url: &str) -> Result<()> {
            if self.fail_dns.lock().unwrap().iter().any(|u| u == url) {
                return Err(NostrError::RelayDns(url.to_string()));
            }
            if self.fail_connect.lock().unwrap().iter().any(|u| u == url) {
                return Err(NostrError::Relay(format!("simulated failure connecting to {url}")));
            }
            Ok(())
        }

        async fn disconnect(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn publish(&self, url: &str, event: &NostrEvent) -> Result<()> {
            self.published.lock().unwrap().push((url.to_string(), event.id.clone()));
            Ok(())
        }

        async fn subscribe(&self, url: &str, sub_id: &str, filter_json: &str) -> Result<()> {
            self.subscribed.lock().unwrap().push((url.to_string(), sub_id.to_string(), filter_json.to_string()));
            Ok(())
        }

        async fn unsubscribe(&self, url: &str, sub_id: &str) -> Result<()> {
            self.unsubscribed.lock().unwrap().push((url.to_string(), sub_id.to_string()));
            Ok(())
        }
    }
}
