//! JSON-RPC server over Unix socket (design spec §6 external interfaces:
//! the UI drives the core through control intents and observes it
//! through the event stream).
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! JSON-RPC method calls to the appropriate command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use raven_types::events::CoreEvent;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC success or error response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object. `kind` carries the protocol error kinds from
/// design spec §7 (`TRUNCATED`, `NO_SESSION`, `UNREACHABLE`, ...); the
/// numeric `code` is JSON-RPC's own envelope, kept distinct from `kind`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A server-initiated push, unsolicited by any request. Carries no `id`,
/// distinguishing it on the wire from a [`RpcResponse`].
#[derive(Debug, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }
}

impl RpcNotification {
    fn event(event: &CoreEvent) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "event".to_string(),
            params: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        }
    }
}

impl RpcError {
    pub fn parse_error() -> Self {
        Self { code: -32700, kind: "PARSE_ERROR".to_string(), message: "malformed JSON-RPC request".to_string(), data: None }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            kind: "UNKNOWN_TYPE".to_string(),
            message: format!("unknown method: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self { code: -32602, kind: "TRUNCATED".to_string(), message: detail.to_string(), data: None }
    }

    /// Build an error response from a protocol error kind (design spec
    /// §7), e.g. `RpcError::kind("NO_SESSION", "no established session")`.
    pub fn kind(kind: &str, message: impl Into<String>) -> Self {
        Self { code: -32000, kind: kind.to_string(), message: message.into(), data: None }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = ?self.socket_path, "IPC server listening");

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("connection error: {e}");
                        }
                    });
                }
                Err(e) => error!("accept error: {e}"),
            }
        }
    }
}

/// One connection's lifetime: a line-delimited JSON-RPC request/response
/// loop that, once the client calls `subscribe_events`, also interleaves
/// unsolicited [`RpcNotification`]s for every [`CoreEvent`] emitted from
/// then on. A lagged subscriber (events dropped under backpressure) gets
/// an `event_stream_lagged` notification instead of silently missing a
/// gap.
async fn handle_connection(state: Arc<DaemonState>, stream: tokio::net::UnixStream) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut subscription: Option<broadcast::Receiver<CoreEvent>> = None;

    loop {
        tokio::select! {
            read = read_request_line(&mut reader, &mut line) => {
                if read? == 0 {
                    break;
                }

                let response = match serde_json::from_str::<RpcRequest>(&line) {
                    Ok(request) => dispatch_request(&state, request, &mut subscription).await,
                    Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
                };
                write_line(&mut writer, &response).await?;
            }
            event = next_subscribed_event(&mut subscription) => {
                match event {
                    Some(event) => write_line(&mut writer, &RpcNotification::event(&event)).await?,
                    None => {}
                }
            }
        }
    }

    Ok(())
}

async fn read_request_line<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut String,
) -> anyhow::Result<usize> {
    line.clear();
    Ok(reader.read_line(line).await?)
}

async fn write_line(writer: &mut (impl AsyncWriteExt + Unpin), value: &impl Serialize) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Await the next event on a live subscription, skipping the `Closed`
/// case (the bus outlives every connection) and surfacing a lag marker
/// instead of silently resuming after dropped events. Never resolves if
/// there's no subscription yet, so it composes as a `tokio::select!` arm
/// alongside the request-read loop.
async fn next_subscribed_event(subscription: &mut Option<broadcast::Receiver<CoreEvent>>) -> Option<CoreEvent> {
    let rx = subscription.as_mut()?;
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => {
                warn!("event subscriber lagged, some events were dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Dispatch a JSON-RPC request to the appropriate command handler. Most
/// methods deserialize their params as a [`raven_types::intents::ControlIntent`]
/// variant and run through [`commands::intents::execute`]; a handful of
/// read-only/diagnostic methods sit outside that enum. `subscribe_events`
/// is the one method that mutates this connection's own state rather than
/// the daemon's.
async fn dispatch_request(
    state: &Arc<DaemonState>,
    request: RpcRequest,
    subscription: &mut Option<broadcast::Receiver<CoreEvent>>,
) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    debug!(method, "dispatching RPC method");

    let result: Result<serde_json::Value, RpcError> = match method {
        "send_intent" => match serde_json::from_value(request.params.clone()) {
            Ok(intent) => Ok(serde_json::to_value(commands::intents::execute(state, intent).await)
                .unwrap_or(serde_json::Value::Null)),
            Err(e) => Err(RpcError::invalid_params(&e.to_string())),
        },
        "list_peers" => Ok(commands::intents::list_peers(state)),
        "list_channels" => Ok(commands::intents::list_channels(state)),
        "subscribe_events" => {
            *subscription = Some(state.event_bus.subscribe());
            Ok(serde_json::json!({"subscribed": true}))
        }
        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
