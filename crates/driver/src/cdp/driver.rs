//! [`PageDriver`] backed by the Chrome DevTools Protocol.
//!
//! Element handles are `Runtime` remote-object ids. Waits are poll loops
//! against `Runtime.evaluate`; the page under automation renders slowly
//! compared to the default 250 ms interval.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};

use super::connection::CdpConnection;
use super::discover;
use crate::error::{DriverError, Result};
use crate::page::{ClickOptions, ElementHandle, PageDriver, TypeOptions, WaitOptions, WaitOutcome};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const CLICK_FN: &str = "function() { this.click(); }";
const FOCUS_FN: &str = "function() { this.focus(); }";
const VISIBLE_FN: &str = "function() { return !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length); }";

/// DevTools-protocol page driver attached to one browser tab.
pub struct CdpDriver {
	connection: CdpConnection,
	poll_interval: Duration,
}

impl CdpDriver {
	/// Attaches to the first debuggable page on a local debug `port`.
	pub async fn attach(port: u16) -> Result<Self> {
		let ws_url = discover::first_page_target(port).await?;
		Self::connect(&ws_url).await
	}

	/// Connects directly to a page target's websocket debugger URL.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		let connection = CdpConnection::connect(ws_url).await?;
		connection.send_command("Page.enable", json!({})).await?;
		connection.send_command("Runtime.enable", json!({})).await?;
		Ok(Self { connection, poll_interval: DEFAULT_POLL_INTERVAL })
	}

	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	async fn evaluate_raw(&self, expression: &str, by_value: bool) -> Result<Value> {
		let reply = self
			.connection
			.send_command(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": by_value,
				}),
			)
			.await?;
		if let Some(details) = reply.get("exceptionDetails") {
			return Err(DriverError::Evaluate(exception_text(details)));
		}
		Ok(reply["result"].clone())
	}

	async fn call_on(&self, element: &ElementHandle, function: &str) -> Result<Value> {
		let reply = self
			.connection
			.send_command(
				"Runtime.callFunctionOn",
				json!({
					"objectId": element.id(),
					"functionDeclaration": function,
					"returnByValue": true,
				}),
			)
			.await?;
		if let Some(details) = reply.get("exceptionDetails") {
			return Err(DriverError::Evaluate(exception_text(details)));
		}
		Ok(reply["result"]["value"].clone())
	}

	async fn is_visible(&self, element: &ElementHandle) -> Result<bool> {
		Ok(self.call_on(element, VISIBLE_FN).await?.as_bool().unwrap_or(false))
	}
}

#[async_trait]
impl PageDriver for CdpDriver {
	async fn navigate(&self, url: &str) -> Result<()> {
		let reply = self.connection.send_command("Page.navigate", json!({ "url": url })).await?;
		if let Some(error_text) = reply["errorText"].as_str() {
			if !error_text.is_empty() {
				return Err(DriverError::Protocol(format!("navigation to {url} failed: {error_text}")));
			}
		}
		Ok(())
	}

	async fn wait_for_element(&self, selector: &str, opts: WaitOptions) -> Result<WaitOutcome<ElementHandle>> {
		let deadline = opts.timeout.map(|timeout| Instant::now() + timeout);
		loop {
			if let Some(element) = self.query(selector).await? {
				if !opts.visible || self.is_visible(&element).await? {
					return Ok(WaitOutcome::Satisfied(element));
				}
			}
			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					return Ok(WaitOutcome::TimedOut);
				}
			}
			sleep(self.poll_interval).await;
		}
	}

	async fn wait_for_condition(&self, expression: &str, opts: WaitOptions) -> Result<WaitOutcome<()>> {
		let deadline = opts.timeout.map(|timeout| Instant::now() + timeout);
		loop {
			if is_truthy(&self.evaluate(expression).await?) {
				return Ok(WaitOutcome::Satisfied(()));
			}
			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					return Ok(WaitOutcome::TimedOut);
				}
			}
			sleep(self.poll_interval).await;
		}
	}

	async fn query(&self, selector: &str) -> Result<Option<ElementHandle>> {
		let expression = format!("document.querySelector({})", js_string(selector));
		let result = self.evaluate_raw(&expression, false).await?;
		if result["subtype"].as_str() == Some("null") {
			return Ok(None);
		}
		Ok(result["objectId"].as_str().map(ElementHandle::new))
	}

	async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
		let expression = format!("Array.from(document.querySelectorAll({}))", js_string(selector));
		let result = self.evaluate_raw(&expression, false).await?;
		let Some(array_id) = result["objectId"].as_str() else {
			return Ok(Vec::new());
		};

		let reply = self
			.connection
			.send_command(
				"Runtime.getProperties",
				json!({
					"objectId": array_id,
					"ownProperties": true,
				}),
			)
			.await?;

		let mut indexed: Vec<(usize, ElementHandle)> = Vec::new();
		for property in reply["result"].as_array().into_iter().flatten() {
			let Some(index) = property["name"].as_str().and_then(|name| name.parse::<usize>().ok()) else {
				continue;
			};
			let Some(object_id) = property["value"]["objectId"].as_str() else {
				continue;
			};
			indexed.push((index, ElementHandle::new(object_id)));
		}
		indexed.sort_by_key(|(index, _)| *index);

		// The array wrapper is only needed for the property walk.
		let _ = self.connection.send_command("Runtime.releaseObject", json!({ "objectId": array_id })).await;

		Ok(indexed.into_iter().map(|(_, handle)| handle).collect())
	}

	async fn click(&self, element: &ElementHandle, opts: ClickOptions) -> Result<()> {
		for press in 0..opts.presses {
			self.call_on(element, CLICK_FN).await?;
			if press + 1 < opts.presses && !opts.delay.is_zero() {
				sleep(opts.delay).await;
			}
		}
		Ok(())
	}

	async fn type_text(&self, element: &ElementHandle, text: &str, opts: TypeOptions) -> Result<()> {
		self.call_on(element, FOCUS_FN).await?;
		for character in text.chars() {
			self.connection
				.send_command("Input.insertText", json!({ "text": character.to_string() }))
				.await?;
			if !opts.delay.is_zero() {
				sleep(opts.delay).await;
			}
		}
		Ok(())
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		Ok(self.evaluate_raw(expression, true).await?["value"].clone())
	}

	async fn evaluate_on(&self, element: &ElementHandle, function: &str) -> Result<Value> {
		self.call_on(element, function).await
	}
}

/// Quotes `value` as a JS string literal.
fn js_string(value: &str) -> String {
	Value::String(value.to_owned()).to_string()
}

/// JS truthiness over a by-value evaluation result.
fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(flag) => *flag,
		Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
		Value::String(text) => !text.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

fn exception_text(details: &Value) -> String {
	details["exception"]["description"]
		.as_str()
		.or_else(|| details["text"].as_str())
		.unwrap_or("unknown page exception")
		.to_string()
}
