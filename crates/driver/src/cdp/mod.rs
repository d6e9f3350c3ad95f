//! DevTools-protocol driver: endpoint discovery, command correlation, and
//! the [`CdpDriver`] page implementation.

mod connection;
mod discover;
mod driver;

pub use connection::CdpConnection;
pub use discover::{TargetInfo, VersionInfo, fetch_version, first_page_target};
pub use driver::CdpDriver;
