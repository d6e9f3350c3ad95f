//! Fatal session failures.
//!
//! Everything expected — probe timeouts, failed forwards, failed leave
//! clicks — is handled inside the loop or explicitly discarded at the
//! call site; only driver failures that escalate out of the room loop
//! reach this type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
	/// A page-driver failure that is not part of the loop's cadence.
	#[error("page driver failure: {0}")]
	Driver(#[from] sb_driver::DriverError),
}
