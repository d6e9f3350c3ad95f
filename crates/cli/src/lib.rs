//! Bridge bootstrap: attach two browsers, cross-wire two sessions, run
//! both to completion on one cooperative runtime.

pub mod cli;
pub mod logging;

use anyhow::Context;
use sb::{Session, SessionConfig, pair};
use sb_driver::cdp::{CdpDriver, fetch_version};
use tracing::{debug, info};

use crate::cli::Cli;

/// Runs the bridge described by `cli` until both sessions stop.
///
/// Each session normally loops forever; returning means a captcha gate
/// aborted a session or a fatal driver failure ended one.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
	let config = match &cli.url {
		Some(url) => SessionConfig::with_url(url),
		None => SessionConfig::default(),
	};

	for port in [cli.left_port, cli.right_port] {
		if let Ok(version) = fetch_version(port).await {
			debug!(target = "sb", port, browser = version.browser.as_deref().unwrap_or("unknown"), "debug endpoint up");
		}
	}

	let left_driver = CdpDriver::attach(cli.left_port)
		.await
		.with_context(|| format!("attaching to the left browser on port {}", cli.left_port))?;
	let right_driver = CdpDriver::attach(cli.right_port)
		.await
		.with_context(|| format!("attaching to the right browser on port {}", cli.right_port))?;

	let left = Session::new(cli.left_name, config.clone(), left_driver);
	let right = Session::new(cli.right_name, config, right_driver);
	pair(&left, &right);

	info!(target = "sb", left = left.identity(), right = right.identity(), "bridge up");
	let (left_outcome, right_outcome) = tokio::join!(left.run(), right.run());
	left_outcome?;
	right_outcome?;
	Ok(())
}
