//! Selector catalogue for the target site's chat markup.
//!
//! Everything the sessions touch on the page lives here, so a site markup
//! change is a one-file fix.

/// Default pairing-room address.
pub const SITE_URL: &str = "https://6obcy.org/rozmowa";

/// Cookie-consent prompt root.
pub const CONSENT_ROOT: &str = ".fc-consent-root";

/// Consent accept button.
pub const CONSENT_ACCEPT: &str = ".fc-primary-button";

/// Captcha challenge frame.
pub const CAPTCHA_FRAME: &str = ".sd-unit";

/// Truthy once the captcha frame has been removed from the page.
pub const CAPTCHA_CLEARED_EXPR: &str = "document.querySelector('.sd-unit') === null";

/// Message composer input.
pub const COMPOSER: &str = "#box-interface-input";

/// Send control while a chat is live.
pub const SEND_ENABLED: &str = ".o-send.enabled";

/// Send control once the chat has ended.
pub const SEND_DISABLED: &str = ".o-send.disabled";

/// Affordance that starts the next pairing after a chat ends.
pub const NEW_TALK: &str = ".o-new-talk";

/// Control that leaves the current room.
pub const ESCAPE: &str = ".o-esc";

/// Text nodes of messages typed by the remote stranger, in render order.
pub const STRANGER_MESSAGE: &str = ".log-stranger span.log-msg-text";

/// Reads a stranger message node: its text plus the server-assigned
/// timestamp carried on the enclosing row.
pub const READ_MESSAGE_FN: &str = "function() {
	const row = this.closest('.inner.tipsy-active');
	return {
		text: this.textContent || '',
		sentAt: row ? row.getAttribute('data-tipsy-time') : null,
	};
}";
