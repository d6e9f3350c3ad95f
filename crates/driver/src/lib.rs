//! Page-driver layer for puppeted chat sessions.
//!
//! The session core drives its room exclusively through the [`PageDriver`]
//! trait. Two implementations live here: [`cdp::CdpDriver`], which attaches
//! to a running Chromium over the DevTools protocol, and [`fake::FakeDriver`],
//! a scripted in-memory page for tests.

pub mod cdp;
pub mod error;
pub mod fake;
mod page;

pub use error::{DriverError, Result};
pub use page::{ClickOptions, ElementHandle, PageDriver, TypeOptions, WaitOptions, WaitOutcome};
