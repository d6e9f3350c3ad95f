use clap::Parser;
use sb_cli::{cli::Cli, logging};
use tracing::error;

// Both sessions share one cooperative thread; all cross-session calls
// stay on the publisher's own execution context.
#[tokio::main(flavor = "current_thread")]
async fn main() {
	let cli = Cli::parse();
	logging::init(cli.verbose);

	if let Err(err) = sb_cli::run(cli).await {
		error!(target = "sb", error = %err, "bridge failed");
		std::process::exit(1);
	}
}
