//! Abstract page surface consumed by the session layer.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Opaque handle to an element inside the driven page.
///
/// The backing identifier is driver-specific: a remote object id for the
/// DevTools driver, a scripted id for the fake one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
	id: String,
}

impl ElementHandle {
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into() }
	}

	pub fn id(&self) -> &str {
		&self.id
	}
}

/// Outcome of a wait: the condition was met, or the clock ran out.
///
/// `TimedOut` is deliberately not an error. Callers decide whether it
/// means "nothing happened yet, keep looping" or something fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
	Satisfied(T),
	TimedOut,
}

impl<T> WaitOutcome<T> {
	/// The satisfied value, if any.
	pub fn satisfied(self) -> Option<T> {
		match self {
			WaitOutcome::Satisfied(value) => Some(value),
			WaitOutcome::TimedOut => None,
		}
	}

	pub fn timed_out(&self) -> bool {
		matches!(self, WaitOutcome::TimedOut)
	}
}

/// Options for element and condition waits.
///
/// `timeout: None` waits indefinitely; the wait then only ever resolves
/// `Satisfied` or fails with a driver error.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitOptions {
	pub visible: bool,
	pub timeout: Option<Duration>,
}

impl WaitOptions {
	/// Wait forever for the condition.
	pub fn unbounded() -> Self {
		Self { visible: false, timeout: None }
	}

	/// Give up after `timeout`, resolving `TimedOut`.
	pub fn bounded(timeout: Duration) -> Self {
		Self { visible: false, timeout: Some(timeout) }
	}

	/// Additionally require the element to be rendered visible.
	pub fn must_be_visible(mut self) -> Self {
		self.visible = true;
		self
	}
}

/// Options for clicking an element.
#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
	/// Number of consecutive presses.
	pub presses: u32,
	/// Pause between presses.
	pub delay: Duration,
}

impl Default for ClickOptions {
	fn default() -> Self {
		Self { presses: 1, delay: Duration::ZERO }
	}
}

/// Options for typing into an element.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeOptions {
	/// Pause between characters.
	pub delay: Duration,
}

/// One driven browser page.
///
/// All methods take `&self`; implementations carry their own interior
/// state so a session task and a peer-invoked action can share the handle.
#[async_trait]
pub trait PageDriver: Send + Sync {
	/// Navigates the page to `url`.
	async fn navigate(&self, url: &str) -> Result<()>;

	/// Waits for an element matching `selector` per `opts`.
	async fn wait_for_element(&self, selector: &str, opts: WaitOptions) -> Result<WaitOutcome<ElementHandle>>;

	/// Waits until `expression` evaluates truthy in the page.
	async fn wait_for_condition(&self, expression: &str, opts: WaitOptions) -> Result<WaitOutcome<()>>;

	/// Returns the first element matching `selector`, if any.
	async fn query(&self, selector: &str) -> Result<Option<ElementHandle>>;

	/// Returns every element matching `selector`, in render order.
	async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

	/// Clicks `element`, repeating per `opts.presses`.
	async fn click(&self, element: &ElementHandle, opts: ClickOptions) -> Result<()>;

	/// Types `text` into `element` one character at a time.
	async fn type_text(&self, element: &ElementHandle, text: &str, opts: TypeOptions) -> Result<()>;

	/// Evaluates a page-level expression and returns its JSON value.
	async fn evaluate(&self, expression: &str) -> Result<Value>;

	/// Calls a JS function with `element` bound as `this`.
	async fn evaluate_on(&self, element: &ElementHandle, function: &str) -> Result<Value>;
}
