//! Driver error taxonomy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

/// Failures raised by a page driver.
///
/// Bounded waits that merely run out of time are not errors; they surface
/// as [`crate::WaitOutcome::TimedOut`] so callers choose whether to
/// continue or escalate.
#[derive(Debug, Error)]
pub enum DriverError {
	/// The browser endpoint could not be reached or yielded no usable target.
	#[error("failed to reach browser endpoint: {0}")]
	Connect(String),

	/// The websocket transport failed.
	#[error("websocket transport error: {0}")]
	Transport(#[from] tokio_tungstenite::tungstenite::Error),

	/// The browser rejected a protocol command.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// Script evaluation threw inside the page.
	#[error("page evaluation failed: {0}")]
	Evaluate(String),

	/// The connection closed before a response arrived.
	#[error("connection closed before a response arrived")]
	ChannelClosed,
}
