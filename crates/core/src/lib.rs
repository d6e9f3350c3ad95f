//! Two-party bridge between anonymous chat sessions.
//!
//! Two [`Session`]s are cross-wired as peers with [`session::pair`]; each
//! puppets its own room through a [`sb_driver::PageDriver`] and forwards
//! whatever its stranger types into the other session's room, so two
//! independent random pairings read as one conversation.

pub mod config;
pub mod error;
pub mod markup;
pub mod message;
pub mod relay;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use error::{BridgeError, Result};
pub use message::{Message, MessageStore};
pub use relay::{RelayChannel, RelayEvent};
pub use session::{PeerLink, Session, pair};
pub use state::SessionPhase;
