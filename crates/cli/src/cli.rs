use clap::Parser;

/// Bridges two anonymous chat sessions through two locally running
/// Chromium instances started with remote debugging enabled.
#[derive(Debug, Parser)]
#[command(name = "sb", version, about)]
pub struct Cli {
	/// Debug port of the first session's browser.
	#[arg(long, default_value_t = 9222)]
	pub left_port: u16,

	/// Debug port of the second session's browser.
	#[arg(long, default_value_t = 9223)]
	pub right_port: u16,

	/// Display name of the first session, used for log attribution only.
	#[arg(long, default_value = "left")]
	pub left_name: String,

	/// Display name of the second session, used for log attribution only.
	#[arg(long, default_value = "right")]
	pub right_name: String,

	/// Room address to join instead of the default site.
	#[arg(long)]
	pub url: Option<String>,

	/// Increase log verbosity (-v, -vv).
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
}
