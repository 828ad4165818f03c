//! raven-daemon: the mesh/Nostr chat core process.
//!
//! Single OS process running a Tokio async runtime. A thin external UI
//! communicates with it via JSON-RPC over a Unix socket, driving it
//! exclusively through [`raven_types::intents::ControlIntent`] and
//! observing it exclusively through [`raven_types::events::CoreEvent`]
//! (design spec §9 Design Notes).

mod commands;
mod config;
mod events;
mod identity;
mod rpc;
mod transport;

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use commands::mesh::OutboundPacket;
use config::DaemonConfig;
use events::EventBus;
use raven_ble::manager::ConnectionManager;
use raven_db::kv::{KeyValueStore, SqliteStore};
use raven_gossip::seen::SeenSet;
use raven_gossip::sync::SyncScheduler;
use raven_nostr::relay::RelayManager;
use raven_router::favorites::FavoritesIndex;
use raven_router::outbox::InMemoryOutbox;
use raven_session::dedup::Deduplicator;
use raven_session::handshake::SecurityCore;
use raven_types::clock::{ClockSource, SystemClock};
use rpc::RpcServer;
use transport::{UnavailableBleAdapter, UnavailableRelayClient};

/// Daemon-wide shared state. Most mutable collaborators are guarded by a
/// plain [`Mutex`]; none of them perform I/O while holding it, so nothing
/// there is ever held across an `.await`. `ble` and `relays` are the
/// exception: sending/connecting through a transport is itself the I/O,
/// so those two use [`tokio::sync::Mutex`] and are held across their
/// `.await`s in [`drain_outbound`].
pub struct DaemonState {
    pub config: DaemonConfig,
    pub kv: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn ClockSource>,
    pub identity: Mutex<identity::LocalIdentity>,
    pub nickname: Mutex<String>,
    pub current_channel: Mutex<Option<String>>,
    pub peers: Mutex<raven_peers::registry::PeerRegistry>,
    pub security: Mutex<SecurityCore>,
    pub dedup: Mutex<Deduplicator>,
    pub seen: Mutex<SeenSet>,
    pub sync_scheduler: Mutex<SyncScheduler>,
    pub favorites: Mutex<FavoritesIndex>,
    pub outbox: Mutex<InMemoryOutbox>,
    pub reassembler: Mutex<raven_codec::fragment::Reassembler>,
    pub event_bus: EventBus,
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
    pub ble: tokio::sync::Mutex<ConnectionManager<UnavailableBleAdapter>>,
    pub relays: tokio::sync::Mutex<RelayManager<UnavailableRelayClient>>,
    /// Packets produced by a control-intent or inbound handler, drained by
    /// the outbound task in [`main`] into [`DaemonState::ble`].
    pub outbound_tx: tokio::sync::mpsc::UnboundedSender<OutboundPacket>,
    /// Raw packets handed off by a transport's receive path, drained by
    /// the inbound task in [`main`] into [`commands::mesh::handle_inbound`].
    pub inbound_tx: tokio::sync::mpsc::UnboundedSender<raven_types::packet::Packet>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("raven=info".parse()?),
        )
        .init();

    info!("raven daemon starting");

    let config = DaemonConfig::load()?;
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let db_path = data_dir.join("raven.db");
    let conn = raven_db::open(&db_path)?;
    let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(conn));

    let identity = identity::load_or_generate(kv.as_ref())?;
    info!(peer_id = %raven_types::peer_id_hex(&identity.peer_id), "identity loaded");

    let security = SecurityCore::new(identity.noise_static_private, identity.peer_id);

    let event_bus = EventBus::new(events::DEFAULT_CAPACITY);
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel(1);

    let ble_caps = raven_ble::connection::ConnectionCaps {
        max_overall: config.ble.max_overall as usize,
        max_client: config.ble.max_client as usize,
        max_server: config.ble.max_server as usize,
    };
    let mut ble = ConnectionManager::new(UnavailableBleAdapter, ble_caps);
    let mut relays = RelayManager::new(UnavailableRelayClient);
    for url in &config.nostr.relays {
        relays.add_relay(url);
    }

    let mut degraded_reasons = Vec::new();
    if let Err(e) = ble.start().await {
        degraded_reasons.push(format!("BLE: {e}"));
    }
    for url in &config.nostr.relays {
        if let Err(e) = relays.connect(url, 0).await {
            degraded_reasons.push(format!("relay {url}: {e}"));
        }
    }

    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::unbounded_channel::<OutboundPacket>();
    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel::<raven_types::packet::Packet>();

    let state = Arc::new(DaemonState {
        peers: Mutex::new(raven_peers::registry::PeerRegistry::new()),
        security: Mutex::new(security),
        dedup: Mutex::new(Deduplicator::default()),
        seen: Mutex::new(SeenSet::new(config.gossip.capacity)),
        sync_scheduler: Mutex::new(SyncScheduler::new()),
        favorites: Mutex::new(FavoritesIndex::new()),
        outbox: Mutex::new(InMemoryOutbox::new()),
        reassembler: Mutex::new(raven_codec::fragment::Reassembler::new(
            raven_codec::fragment::DEFAULT_REASSEMBLY_DEADLINE_MS,
        )),
        clock: Arc::new(SystemClock),
        config,
        kv,
        nickname: Mutex::new(format!("anon{}", hex::encode(&identity.peer_id[..2]))),
        current_channel: Mutex::new(None),
        identity: Mutex::new(identity),
        event_bus,
        shutdown_tx: shutdown_tx.clone(),
        ble: tokio::sync::Mutex::new(ble),
        relays: tokio::sync::Mutex::new(relays),
        outbound_tx,
        inbound_tx,
    });

    for reason in degraded_reasons {
        warn!(%reason, "transport unavailable at startup");
        state.event_bus.emit(raven_types::events::CoreEvent::Degraded { reason });
    }

    let socket_path = state.config.data_dir().join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!(socket = ?socket_path, "starting JSON-RPC server");

    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {e}");
            }
        }
        _ = drain_outbound(state.clone(), outbound_rx) => {
            warn!("outbound transport task ended");
        }
        _ = drain_inbound(state.clone(), inbound_rx) => {
            warn!("inbound transport task ended");
        }
        _ = shutdown_rx.recv() => {
            info!("shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    info!("daemon shutting down gracefully");
    let _ = std::fs::remove_file(&socket_path);
    info!("daemon stopped");
    Ok(())
}

/// Drain packets produced by a control-intent or inbound handler and push
/// them onto the transport they're addressed to: BLE broadcast/unicast for
/// mesh traffic, otherwise the packet is dropped (there is no second
/// transport below the Noise layer in this daemon yet — Nostr delivery is
/// driven by [`raven_nostr::relay::RelayManager::publish`] directly from
/// the intent handlers, not through this queue). A send failure is logged
/// and otherwise swallowed; the sender already has its own delivery-ack
/// path for anything that needs confirmation.
async fn drain_outbound(
    state: Arc<DaemonState>,
    mut outbound_rx: tokio::sync::mpsc::UnboundedReceiver<OutboundPacket>,
) {
    while let Some(outbound) = outbound_rx.recv().await {
        let now_ms = state.clock.now_ms();
        let recipient = outbound.recipient;
        let packet = commands::mesh::finalize_outbound(&state, outbound, now_ms);

        let bytes = match raven_codec::wire::to_bytes(&packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(?e, "failed to encode outbound packet");
                continue;
            }
        };

        let ble = state.ble.lock().await;
        let result = match recipient {
            Some(peer_id) => ble.send_to_peer(&peer_id, &bytes).await,
            None => ble.broadcast(&bytes).await,
        };
        if let Err(e) = result {
            warn!(?e, "failed to hand outbound packet to BLE transport");
        }
    }
}

/// Drain raw packets handed off by a transport's receive path through
/// [`commands::mesh::handle_inbound`], re-enqueuing whatever it produces
/// (replies, delivery acks, rebroadcasts) back onto [`DaemonState::outbound_tx`].
async fn drain_inbound(state: Arc<DaemonState>, mut inbound_rx: tokio::sync::mpsc::UnboundedReceiver<raven_types::packet::Packet>) {
    while let Some(packet) = inbound_rx.recv().await {
        let now_ms = state.clock.now_ms();
        for outbound in commands::mesh::handle_inbound(&state, packet, now_ms) {
            let _ = state.outbound_tx.send(outbound);
        }
    }
}
