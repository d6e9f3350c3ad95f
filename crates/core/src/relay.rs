//! Pub/sub seam between a session's detection loop and its peer's
//! reactions.
//!
//! One handler slot per event variant, set once during session setup;
//! registering again replaces the previous handler. `publish` awaits the
//! handler inline, so the publishing loop resumes only after the peer's
//! reaction has completed — this is what guarantees messages arrive at the
//! peer in detection order.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

/// Events exchanged between paired sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
	/// A novel stranger message to forward verbatim.
	Message(String),
	/// The local chat ended; the peer should wind down its own room.
	Disconnect,
}

type MessageHandler = Box<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;
type DisconnectHandler = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Relay channel with exactly one handler slot per event variant.
#[derive(Default)]
pub struct RelayChannel {
	on_message: Mutex<Option<MessageHandler>>,
	on_disconnect: Mutex<Option<DisconnectHandler>>,
}

impl RelayChannel {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers the message handler; the last registration wins.
	pub fn on_message<F>(&self, handler: F)
	where
		F: Fn(String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
	{
		*self.on_message.lock() = Some(Box::new(handler));
	}

	/// Registers the disconnect handler; the last registration wins.
	pub fn on_disconnect<F>(&self, handler: F)
	where
		F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
	{
		*self.on_disconnect.lock() = Some(Box::new(handler));
	}

	/// Invokes the handler registered for `event`, if any, and awaits it.
	pub async fn publish(&self, event: RelayEvent) {
		match event {
			RelayEvent::Message(text) => {
				let future = self.on_message.lock().as_ref().map(|handler| handler(text));
				match future {
					Some(future) => future.await,
					None => debug!(target = "sb.relay", "no message handler registered"),
				}
			}
			RelayEvent::Disconnect => {
				let future = self.on_disconnect.lock().as_ref().map(|handler| handler());
				match future {
					Some(future) => future.await,
					None => debug!(target = "sb.relay", "no disconnect handler registered"),
				}
			}
		}
	}
}
