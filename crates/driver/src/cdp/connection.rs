//! Command/reply correlation over the DevTools websocket.
//!
//! One background task drains the socket and completes pending commands by
//! id; a second owns the write half behind an unbounded channel so
//! concurrent callers never contend on the sink. Protocol events (frames
//! without an `id`) are logged at trace level and otherwise ignored: the
//! driver observes the page by polling, not by event subscription.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, trace, warn};

use crate::error::{DriverError, Result};

/// Reply frame for a previously issued command.
#[derive(Debug, Deserialize)]
struct CommandReply {
	id: u64,
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<CommandError>,
}

#[derive(Debug, Deserialize)]
struct CommandError {
	code: i64,
	message: String,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// A live DevTools connection to one page target.
pub struct CdpConnection {
	next_id: AtomicU64,
	pending: PendingMap,
	outbound: mpsc::UnboundedSender<WsMessage>,
}

impl CdpConnection {
	/// Connects to a page target's websocket debugger URL.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		let (socket, _) = connect_async(ws_url).await?;
		let (mut sink, mut stream) = socket.split();

		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
		tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(err) = sink.send(message).await {
					warn!(target = "sb.cdp", error = %err, "websocket send failed");
					break;
				}
			}
		});

		let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
		let reader_pending = Arc::clone(&pending);
		tokio::spawn(async move {
			while let Some(frame) = stream.next().await {
				match frame {
					Ok(WsMessage::Text(text)) => dispatch(&reader_pending, &text),
					Ok(_) => {}
					Err(err) => {
						warn!(target = "sb.cdp", error = %err, "websocket read failed");
						break;
					}
				}
			}
			// Dropping the senders fails anything still in flight with
			// ChannelClosed on the caller side.
			reader_pending.lock().clear();
			debug!(target = "sb.cdp", "reader loop ended");
		});

		Ok(Self { next_id: AtomicU64::new(1), pending, outbound })
	}

	/// Sends one command and awaits its correlated reply.
	pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		let payload = json!({ "id": id, "method": method, "params": params });
		if self.outbound.send(WsMessage::Text(payload.to_string())).is_err() {
			self.pending.lock().remove(&id);
			return Err(DriverError::ChannelClosed);
		}

		rx.await.map_err(|_| DriverError::ChannelClosed).and_then(|reply| reply)
	}
}

fn dispatch(pending: &PendingMap, raw: &str) {
	let reply: CommandReply = match serde_json::from_str(raw) {
		Ok(reply) => reply,
		Err(_) => {
			trace!(target = "sb.cdp", frame = raw, "protocol event");
			return;
		}
	};

	let Some(tx) = pending.lock().remove(&reply.id) else {
		debug!(target = "sb.cdp", id = reply.id, "reply for unknown command id");
		return;
	};

	let outcome = match reply.error {
		Some(error) => Err(DriverError::Protocol(format!("{} (code {})", error.message, error.code))),
		None => Ok(reply.result.unwrap_or(Value::Null)),
	};
	let _ = tx.send(outcome);
}
