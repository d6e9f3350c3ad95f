//! Session tuning knobs.

use std::time::Duration;

use crate::markup;

/// Construction-time settings for one session.
///
/// The defaults match the site's observed pacing; tests shrink them to
/// keep scenarios fast.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Room address to join.
	pub url: String,
	/// How long to watch for the captcha frame before treating the gate
	/// as already passed.
	pub captcha_detection_window: Duration,
	/// Bounded timeout of the chat-end probe; this is what gives the
	/// room loop its polling cadence.
	pub probe_timeout: Duration,
	/// Pause before asking the peer to wind down after a disconnect.
	pub disconnect_grace: Duration,
	/// Pause before triggering the new-chat affordance, letting the UI
	/// settle.
	pub leave_grace: Duration,
	/// Per-character delay while typing a forwarded message.
	pub type_delay: Duration,
	/// Number of escape presses used for a local leave.
	pub escape_presses: u32,
	/// Pause between escape presses.
	pub escape_press_delay: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			url: markup::SITE_URL.to_string(),
			captcha_detection_window: Duration::from_secs(10),
			probe_timeout: Duration::from_millis(1000),
			disconnect_grace: Duration::from_millis(3500),
			leave_grace: Duration::from_millis(5000),
			type_delay: Duration::from_millis(1),
			escape_presses: 3,
			escape_press_delay: Duration::from_millis(5),
		}
	}
}

impl SessionConfig {
	/// Default settings against a different room address.
	pub fn with_url(url: impl Into<String>) -> Self {
		Self { url: url.into(), ..Self::default() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_target_the_site_with_a_one_second_probe() {
		let config = SessionConfig::default();
		assert_eq!(config.url, markup::SITE_URL);
		assert_eq!(config.probe_timeout, Duration::from_millis(1000));
		assert_eq!(config.escape_presses, 3);
	}

	#[test]
	fn with_url_overrides_only_the_address() {
		let config = SessionConfig::with_url("http://127.0.0.1:8080/room");
		assert_eq!(config.url, "http://127.0.0.1:8080/room");
		assert_eq!(config.disconnect_grace, SessionConfig::default().disconnect_grace);
	}
}
