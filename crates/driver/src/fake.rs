//! Scripted in-memory driver for exercising sessions without a browser.
//!
//! [`FakeDriverBuilder::build`] returns the driver plus a
//! [`FakeDriverController`] that mutates the scripted page (which selectors
//! match, what element reads return) and inspects what the session did
//! (navigations, clicks, typed text). Waits poll the shared state on a
//! short interval, so bounded timeouts behave like the real driver's.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::error::{DriverError, Result};
use crate::page::{ClickOptions, ElementHandle, PageDriver, TypeOptions, WaitOptions, WaitOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A click the session performed, labeled by the element's selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClick {
	pub selector: String,
	pub presses: u32,
}

/// Text the session typed, labeled by the element's selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedType {
	pub selector: String,
	pub text: String,
}

#[derive(Debug, Clone)]
struct ScriptedElement {
	id: String,
	visible: bool,
	/// What `evaluate_on` returns for this element.
	payload: Value,
}

#[derive(Default)]
struct PageState {
	next_id: u64,
	/// Selector -> scripted matches, in render order.
	elements: HashMap<String, Vec<ScriptedElement>>,
	/// Element id -> the selector it was scripted under. Survives removal
	/// so interactions with stale handles still record.
	selector_by_id: HashMap<String, String>,
	/// Page-level expression -> scripted evaluation result.
	evaluations: HashMap<String, Value>,
	/// Selectors whose lookups fail with a scripted driver error.
	failing_selectors: HashSet<String>,
	/// Expressions whose evaluation fails with a scripted driver error.
	failing_expressions: HashSet<String>,
	navigations: Vec<String>,
	clicks: Vec<RecordedClick>,
	typed: Vec<RecordedType>,
	/// Selectors passed to `query_all`, in call order.
	list_queries: Vec<String>,
}

/// Builder for a scripted driver/controller pair.
pub struct FakeDriverBuilder {
	// Nothing to configure yet; mirrors the driver construction seam.
}

impl FakeDriverBuilder {
	pub fn new() -> Self {
		Self {}
	}

	pub fn build(self) -> (FakeDriver, FakeDriverController) {
		let state = Arc::new(Mutex::new(PageState::default()));
		(FakeDriver { state: Arc::clone(&state) }, FakeDriverController { state })
	}
}

impl Default for FakeDriverBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Controller for scripting page state and inspecting interactions.
pub struct FakeDriverController {
	state: Arc<Mutex<PageState>>,
}

impl FakeDriverController {
	/// Adds a visible element matching `selector`; reads return `Null`.
	pub fn add_element(&self, selector: &str) -> ElementHandle {
		self.add_element_with_payload(selector, Value::Null)
	}

	/// Adds a visible element whose `evaluate_on` result is `payload`.
	pub fn add_element_with_payload(&self, selector: &str, payload: Value) -> ElementHandle {
		let mut state = self.state.lock();
		let id = format!("el-{}", state.next_id);
		state.next_id += 1;
		state.selector_by_id.insert(id.clone(), selector.to_string());
		state
			.elements
			.entry(selector.to_string())
			.or_default()
			.push(ScriptedElement { id: id.clone(), visible: true, payload });
		ElementHandle::new(id)
	}

	/// Removes every element scripted under `selector`.
	pub fn remove_elements(&self, selector: &str) {
		self.state.lock().elements.remove(selector);
	}

	/// Scripts the result of a page-level expression.
	pub fn set_evaluation(&self, expression: &str, value: Value) {
		self.state.lock().evaluations.insert(expression.to_string(), value);
	}

	/// Makes lookups of `selector` fail with a driver error.
	pub fn fail_selector(&self, selector: &str) {
		self.state.lock().failing_selectors.insert(selector.to_string());
	}

	/// Makes evaluation of `expression` fail with a driver error.
	pub fn fail_expression(&self, expression: &str) {
		self.state.lock().failing_expressions.insert(expression.to_string());
	}

	pub fn navigations(&self) -> Vec<String> {
		self.state.lock().navigations.clone()
	}

	pub fn clicks(&self) -> Vec<RecordedClick> {
		self.state.lock().clicks.clone()
	}

	/// Clicks recorded against `selector`.
	pub fn clicks_on(&self, selector: &str) -> Vec<RecordedClick> {
		self.clicks().into_iter().filter(|click| click.selector == selector).collect()
	}

	pub fn typed(&self) -> Vec<RecordedType> {
		self.state.lock().typed.clone()
	}

	/// Selectors the session listed via `query_all`, in call order.
	pub fn list_queries(&self) -> Vec<String> {
		self.state.lock().list_queries.clone()
	}
}

/// Scripted [`PageDriver`] implementation.
pub struct FakeDriver {
	state: Arc<Mutex<PageState>>,
}

impl FakeDriver {
	fn check_selector(state: &PageState, selector: &str) -> Result<()> {
		if state.failing_selectors.contains(selector) {
			return Err(DriverError::Evaluate(format!("scripted failure for selector {selector}")));
		}
		Ok(())
	}

	fn selector_of(state: &PageState, element: &ElementHandle) -> String {
		state
			.selector_by_id
			.get(element.id())
			.cloned()
			.unwrap_or_else(|| format!("unknown:{}", element.id()))
	}
}

#[async_trait]
impl PageDriver for FakeDriver {
	async fn navigate(&self, url: &str) -> Result<()> {
		self.state.lock().navigations.push(url.to_string());
		Ok(())
	}

	async fn wait_for_element(&self, selector: &str, opts: WaitOptions) -> Result<WaitOutcome<ElementHandle>> {
		let deadline = opts.timeout.map(|timeout| Instant::now() + timeout);
		loop {
			{
				let state = self.state.lock();
				Self::check_selector(&state, selector)?;
				let found = state
					.elements
					.get(selector)
					.and_then(|matches| matches.iter().find(|element| !opts.visible || element.visible));
				if let Some(element) = found {
					return Ok(WaitOutcome::Satisfied(ElementHandle::new(element.id.clone())));
				}
			}
			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					return Ok(WaitOutcome::TimedOut);
				}
			}
			sleep(POLL_INTERVAL).await;
		}
	}

	async fn wait_for_condition(&self, expression: &str, opts: WaitOptions) -> Result<WaitOutcome<()>> {
		let deadline = opts.timeout.map(|timeout| Instant::now() + timeout);
		loop {
			{
				let state = self.state.lock();
				if state.failing_expressions.contains(expression) {
					return Err(DriverError::Evaluate(format!("scripted failure for expression {expression}")));
				}
				let satisfied = state
					.evaluations
					.get(expression)
					.is_some_and(|value| value.as_bool().unwrap_or(!value.is_null()));
				if satisfied {
					return Ok(WaitOutcome::Satisfied(()));
				}
			}
			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					return Ok(WaitOutcome::TimedOut);
				}
			}
			sleep(POLL_INTERVAL).await;
		}
	}

	async fn query(&self, selector: &str) -> Result<Option<ElementHandle>> {
		let state = self.state.lock();
		Self::check_selector(&state, selector)?;
		Ok(state
			.elements
			.get(selector)
			.and_then(|matches| matches.first())
			.map(|element| ElementHandle::new(element.id.clone())))
	}

	async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
		let mut state = self.state.lock();
		state.list_queries.push(selector.to_string());
		Self::check_selector(&state, selector)?;
		Ok(state
			.elements
			.get(selector)
			.map(|matches| matches.iter().map(|element| ElementHandle::new(element.id.clone())).collect())
			.unwrap_or_default())
	}

	async fn click(&self, element: &ElementHandle, opts: ClickOptions) -> Result<()> {
		let mut state = self.state.lock();
		let selector = Self::selector_of(&state, element);
		state.clicks.push(RecordedClick { selector, presses: opts.presses });
		Ok(())
	}

	async fn type_text(&self, element: &ElementHandle, text: &str, _opts: TypeOptions) -> Result<()> {
		let mut state = self.state.lock();
		let selector = Self::selector_of(&state, element);
		state.typed.push(RecordedType { selector, text: text.to_string() });
		Ok(())
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		let state = self.state.lock();
		if state.failing_expressions.contains(expression) {
			return Err(DriverError::Evaluate(format!("scripted failure for expression {expression}")));
		}
		Ok(state.evaluations.get(expression).cloned().unwrap_or(Value::Null))
	}

	async fn evaluate_on(&self, element: &ElementHandle, _function: &str) -> Result<Value> {
		let state = self.state.lock();
		let payload = state
			.elements
			.values()
			.flatten()
			.find(|candidate| candidate.id == element.id())
			.map(|candidate| candidate.payload.clone());
		Ok(payload.unwrap_or(Value::Null))
	}
}
