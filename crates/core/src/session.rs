//! Per-session state machine: human gates, the room loop, and the
//! peer-invoked outbound actions.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use sb_driver::{ClickOptions, PageDriver, TypeOptions, WaitOptions, WaitOutcome};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::markup;
use crate::message::{Message, MessageStore};
use crate::relay::{RelayChannel, RelayEvent};
use crate::state::SessionPhase;

/// The peer-facing operation set.
///
/// A session only ever sees its peer through this trait; no internal
/// field crosses the boundary. Both operations are best-effort: failures
/// on the callee side never propagate back to the caller.
#[async_trait]
pub trait PeerLink: Send + Sync {
	/// Forwards a stranger message into this session's own room.
	async fn deliver_message(&self, text: String);

	/// Asks this session to wind down its own room.
	async fn request_disconnect(&self);
}

struct SessionState {
	phase: SessionPhase,
	/// Whether the remote stranger is still believed present. Selects the
	/// leave branch: new-chat affordance when the stranger ended the
	/// chat, escape sequence for a local leave.
	stranger_present: bool,
	captcha_resolved: bool,
	store: MessageStore,
}

/// One automated party in the bridge.
///
/// Created with an empty message log and the captcha gate unresolved,
/// cross-wired to its peer via [`pair`], then driven by [`Session::run`]
/// for the rest of the process lifetime.
pub struct Session<D> {
	identity: String,
	config: SessionConfig,
	driver: D,
	relay: RelayChannel,
	state: Mutex<SessionState>,
}

/// Cross-wires two sessions as each other's peer.
///
/// Peer handles are non-owning; dropping one session turns the other's
/// relay reactions into no-ops instead of keeping it alive.
pub fn pair<A, B>(a: &Arc<Session<A>>, b: &Arc<Session<B>>)
where
	A: PageDriver + 'static,
	B: PageDriver + 'static,
{
	let b_dyn: Arc<dyn PeerLink> = b.clone();
	let a_dyn: Arc<dyn PeerLink> = a.clone();
	let to_b: Weak<dyn PeerLink> = Arc::downgrade(&b_dyn);
	let to_a: Weak<dyn PeerLink> = Arc::downgrade(&a_dyn);
	a.bind_peer(to_b);
	b.bind_peer(to_a);
}

impl<D: PageDriver + 'static> Session<D> {
	pub fn new(identity: impl Into<String>, config: SessionConfig, driver: D) -> Arc<Self> {
		Arc::new(Self {
			identity: identity.into(),
			config,
			driver,
			relay: RelayChannel::new(),
			state: Mutex::new(SessionState {
				phase: SessionPhase::Initializing,
				stranger_present: false,
				captcha_resolved: false,
				store: MessageStore::new(),
			}),
		})
	}

	pub fn identity(&self) -> &str {
		&self.identity
	}

	pub fn phase(&self) -> SessionPhase {
		self.state.lock().phase
	}

	pub fn captcha_resolved(&self) -> bool {
		self.state.lock().captcha_resolved
	}

	/// The most recently accepted stranger message.
	pub fn last_seen(&self) -> Option<Message> {
		self.state.lock().store.last_seen().cloned()
	}

	pub fn message_count(&self) -> usize {
		self.state.lock().store.len()
	}

	/// Subscribes this session's relay events to `peer`'s outbound
	/// actions: novel messages are forwarded verbatim, and a local chat
	/// end asks the peer — after a grace delay — to leave its own room.
	pub fn bind_peer(&self, peer: Weak<dyn PeerLink>) {
		let forward = peer.clone();
		self.relay.on_message(move |text| {
			let forward = forward.clone();
			async move {
				if let Some(peer) = forward.upgrade() {
					peer.deliver_message(text).await;
				}
			}
			.boxed()
		});

		let grace = self.config.disconnect_grace;
		self.relay.on_disconnect(move || {
			let peer = peer.clone();
			async move {
				sleep(grace).await;
				if let Some(peer) = peer.upgrade() {
					peer.request_disconnect().await;
				}
			}
			.boxed()
		});
	}

	/// Drives the session end to end: navigation, the human gates, then
	/// the room loop for the rest of the process lifetime.
	///
	/// Returns early — without error — when the captcha gate reports
	/// unresolved; this session then simply never relays. `Err` means a
	/// fatal driver failure escalated out of the room loop.
	pub async fn run(&self) -> Result<()> {
		info!(target = "sb.session", identity = %self.identity, url = %self.config.url, "session starting");
		self.driver.navigate(&self.config.url).await?;

		self.pass_consent_gate().await?;

		if !self.pass_captcha_gate().await {
			warn!(target = "sb.session", identity = %self.identity, "captcha unresolved; session will never relay");
			self.set_phase(SessionPhase::Failed);
			return Ok(());
		}

		self.room_loop().await
	}

	/// Waits for the consent prompt and accepts it. The prompt is always
	/// expected, so the wait is unbounded and there is no retry.
	async fn pass_consent_gate(&self) -> Result<()> {
		self.set_phase(SessionPhase::AwaitingConsent);
		self.driver
			.wait_for_element(markup::CONSENT_ROOT, WaitOptions::unbounded().must_be_visible())
			.await?;
		if let Some(accept) = self.driver.query(markup::CONSENT_ACCEPT).await? {
			self.driver.click(&accept, ClickOptions::default()).await?;
		}
		Ok(())
	}

	/// Watches for the captcha challenge; if it shows up, blocks until a
	/// human clears it out-of-band. Returns whether relaying may begin.
	///
	/// The challenge is too hard for automation, so resolution is purely
	/// observational: the frame disappearing from the page.
	async fn pass_captcha_gate(&self) -> bool {
		self.set_phase(SessionPhase::AwaitingCaptcha);

		let detection = WaitOptions::bounded(self.config.captcha_detection_window).must_be_visible();
		let appeared = match self.driver.wait_for_element(markup::CAPTCHA_FRAME, detection).await {
			Ok(outcome) => outcome,
			Err(err) => {
				debug!(target = "sb.session", identity = %self.identity, error = %err, "captcha detection failed");
				return false;
			}
		};

		if appeared.timed_out() {
			// No challenge within the detection window: already passed.
			self.state.lock().captcha_resolved = true;
			return true;
		}

		info!(target = "sb.session", identity = %self.identity, "captcha visible; waiting for a manual solve");
		match self.driver.wait_for_condition(markup::CAPTCHA_CLEARED_EXPR, WaitOptions::unbounded()).await {
			Ok(WaitOutcome::Satisfied(())) => {
				self.state.lock().captcha_resolved = true;
				true
			}
			Ok(WaitOutcome::TimedOut) => false,
			Err(err) => {
				debug!(target = "sb.session", identity = %self.identity, error = %err, "captcha resolution read failed");
				false
			}
		}
	}

	/// `AwaitingRoom → Connected → AwaitingRoom`, forever.
	///
	/// The bounded chat-end probe is the loop's cadence: its timeout
	/// means "nothing happened this tick". Every other driver failure in
	/// here is fatal for the session.
	async fn room_loop(&self) -> Result<()> {
		loop {
			self.set_phase(SessionPhase::AwaitingRoom);
			self.driver.wait_for_element(markup::SEND_ENABLED, WaitOptions::unbounded()).await?;

			info!(target = "sb.session", identity = %self.identity, "paired into a room");
			self.set_phase(SessionPhase::Connected);
			self.state.lock().stranger_present = true;

			while self.phase().is_connected() {
				self.relay_new_message().await?;

				let probe = self
					.driver
					.wait_for_element(markup::SEND_DISABLED, WaitOptions::bounded(self.config.probe_timeout))
					.await?;
				if probe.timed_out() {
					continue;
				}

				if self.phase().is_connected() {
					info!(target = "sb.session", identity = %self.identity, "stranger left the room");
					self.relay.publish(RelayEvent::Disconnect).await;
					self.leave_room().await;
					break;
				}
			}
		}
	}

	/// One poller tick: read the newest stranger message and publish it
	/// when novel.
	async fn relay_new_message(&self) -> Result<()> {
		let Some(message) = self.poll_latest_message().await? else {
			return Ok(());
		};

		if !self.state.lock().store.accept(message.clone()) {
			return Ok(());
		}

		info!(target = "sb.session", identity = %self.identity, sent_at = message.sent_at, text = %message.text, "stranger message");
		self.relay.publish(RelayEvent::Message(message.text)).await;
		Ok(())
	}

	/// Reads the last entry of the stranger-message list together with
	/// its server-assigned timestamp.
	///
	/// The room UI only exposes the newest message at this position, so
	/// polling plus timestamp comparison is the sole dedup mechanism; a
	/// message skipped between two polls is unrecoverable.
	async fn poll_latest_message(&self) -> Result<Option<Message>> {
		let entries = self.driver.query_all(markup::STRANGER_MESSAGE).await?;
		let Some(newest) = entries.last() else {
			return Ok(None);
		};

		let raw = self.driver.evaluate_on(newest, markup::READ_MESSAGE_FN).await?;
		let text = raw["text"].as_str().unwrap_or_default().to_string();
		let sent_at = match &raw["sentAt"] {
			Value::Number(number) => number.as_u64(),
			Value::String(attr) => attr.parse().ok(),
			_ => None,
		};

		let Some(sent_at) = sent_at else {
			debug!(target = "sb.session", identity = %self.identity, "message row without a readable timestamp");
			return Ok(None);
		};

		Ok(Some(Message { text, sent_at }))
	}

	/// Winds down the current room, best-effort. Remote endings go
	/// through the new-chat affordance after a grace pause; local ones
	/// use the escape sequence.
	async fn leave_room(&self) {
		self.set_phase(SessionPhase::LeavingRoom);

		let stranger_present = self.state.lock().stranger_present;
		let outcome = if stranger_present { self.leave_via_new_talk().await } else { self.press_escape().await };
		if let Err(err) = outcome {
			debug!(target = "sb.session", identity = %self.identity, error = %err, "leave interaction failed");
		}

		self.state.lock().stranger_present = false;
	}

	/// Remote-ended leave: wait for the new-chat affordance, let the UI
	/// settle, then trigger it.
	async fn leave_via_new_talk(&self) -> sb_driver::Result<()> {
		let outcome = self
			.driver
			.wait_for_element(markup::NEW_TALK, WaitOptions::unbounded().must_be_visible())
			.await?;
		if let Some(new_talk) = outcome.satisfied() {
			sleep(self.config.leave_grace).await;
			self.driver.click(&new_talk, ClickOptions::default()).await?;
		}
		Ok(())
	}

	/// Local leave: repeated presses of the escape control.
	async fn press_escape(&self) -> sb_driver::Result<()> {
		let Some(escape) = self.driver.query(markup::ESCAPE).await? else {
			return Ok(());
		};
		self.driver
			.click(&escape, ClickOptions { presses: self.config.escape_presses, delay: self.config.escape_press_delay })
			.await
	}

	/// Types `text` into the composer and clicks send.
	async fn send_outgoing(&self, text: &str) -> sb_driver::Result<()> {
		let Some(composer) = self.driver.query(markup::COMPOSER).await? else {
			return Ok(());
		};
		self.driver.type_text(&composer, text, TypeOptions { delay: self.config.type_delay }).await?;

		let Some(send) = self.driver.query(markup::SEND_ENABLED).await? else {
			return Ok(());
		};
		self.driver.click(&send, ClickOptions::default()).await
	}

	fn set_phase(&self, phase: SessionPhase) {
		let mut state = self.state.lock();
		if state.phase != phase {
			debug!(target = "sb.session", identity = %self.identity, from = %state.phase, to = %phase, "phase change");
			state.phase = phase;
		}
	}
}

#[async_trait]
impl<D: PageDriver + 'static> PeerLink for Session<D> {
	async fn deliver_message(&self, text: String) {
		if !self.phase().is_connected() {
			debug!(target = "sb.session", identity = %self.identity, "dropping forward; not in a room");
			return;
		}
		if let Err(err) = self.send_outgoing(&text).await {
			debug!(target = "sb.session", identity = %self.identity, error = %err, "forward failed");
		}
	}

	async fn request_disconnect(&self) {
		if !self.phase().is_connected() {
			debug!(target = "sb.session", identity = %self.identity, "disconnect request ignored; not in a room");
			return;
		}
		info!(target = "sb.session", identity = %self.identity, "peer asked us to leave");
		self.state.lock().stranger_present = false;
		self.leave_room().await;
	}
}
