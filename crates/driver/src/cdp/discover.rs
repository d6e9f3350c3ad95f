//! DevTools endpoint discovery over the browser's debug HTTP server.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{DriverError, Result};

/// `/json/version` response subset.
#[derive(Debug, Deserialize)]
pub struct VersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
}

/// One entry from `/json/list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	#[serde(rename = "type")]
	pub kind: String,
	pub url: String,
	#[serde(default)]
	pub web_socket_debugger_url: Option<String>,
}

async fn fetch_json<T: DeserializeOwned>(port: u16, path: &str) -> Result<T> {
	let client = reqwest::Client::builder()
		.timeout(Duration::from_millis(400))
		.build()
		.map_err(|e| DriverError::Connect(format!("failed to create HTTP client: {e}")))?;
	let mut last_error = "no response".to_string();

	for url in [
		format!("http://127.0.0.1:{port}{path}"),
		format!("http://localhost:{port}{path}"),
		format!("http://[::1]:{port}{path}"),
	] {
		let response = match client.get(&url).send().await {
			Ok(response) => response,
			Err(err) => {
				last_error = err.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		return response
			.json()
			.await
			.map_err(|e| DriverError::Connect(format!("failed to parse response from {url}: {e}")));
	}

	Err(DriverError::Connect(format!("failed to connect to port {port}: {last_error}")))
}

/// Resolves browser metadata from `/json/version` on `port`.
pub async fn fetch_version(port: u16) -> Result<VersionInfo> {
	fetch_json(port, "/json/version").await
}

/// Returns the websocket debugger URL of the first page target on `port`.
pub async fn first_page_target(port: u16) -> Result<String> {
	let targets: Vec<TargetInfo> = fetch_json(port, "/json/list").await?;
	targets
		.into_iter()
		.find(|target| target.kind == "page" && target.web_socket_debugger_url.is_some())
		.and_then(|target| target.web_socket_debugger_url)
		.ok_or_else(|| DriverError::Connect(format!("no debuggable page target on port {port}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn target_list_parses_devtools_shape() {
		let raw = r#"[
			{"type": "iframe", "url": "about:blank"},
			{"type": "page", "url": "https://example.com", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/AB12"}
		]"#;
		let targets: Vec<TargetInfo> = serde_json::from_str(raw).unwrap();
		assert_eq!(targets.len(), 2);
		assert_eq!(targets[0].kind, "iframe");
		assert!(targets[0].web_socket_debugger_url.is_none());
		assert_eq!(targets[1].web_socket_debugger_url.as_deref(), Some("ws://127.0.0.1:9222/devtools/page/AB12"));
	}

	#[test]
	fn version_info_parses_devtools_shape() {
		let raw = r#"{"Browser": "Chrome/131.0.0.0", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/CD34"}"#;
		let version: VersionInfo = serde_json::from_str(raw).unwrap();
		assert_eq!(version.browser.as_deref(), Some("Chrome/131.0.0.0"));
		assert_eq!(version.web_socket_debugger_url, "ws://127.0.0.1:9222/devtools/browser/CD34");
	}
}
