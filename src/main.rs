mod bank;
mod config;
mod ledger;
mod sync;
mod utils;

use chrono::Local;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::bank::{FinTsClient, TerminalChallenge};
use crate::config::Cli;
use crate::ledger::FireflyClient;
use crate::sync::{SyncError, SyncOrchestrator, SyncWindow};

/// Run completed but some transactions or statements failed.
const EXIT_PARTIAL_FAILURE: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	let dotenv = dotenvy::dotenv();
	let cli = Cli::parse();

	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::builder()
				.with_default_directive(tracing::Level::INFO.into())
				.from_env_lossy(),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	if let Err(e) = dotenv {
		if !e.not_found() {
			warn!("Failed to load .env file: {}", e);
		}
	}

	let (ledger_config, bank_config) = match (cli.ledger_config(), cli.bank_config()) {
		(Ok(ledger), Ok(bank)) => (ledger, bank),
		(Err(e), _) | (_, Err(e)) => {
			error!("Invalid configuration: {}", e);
			return ExitCode::FAILURE;
		}
	};

	let ledger = match FireflyClient::new(ledger_config.url, ledger_config.access_token) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create ledger client: {}", e);
			return ExitCode::FAILURE;
		}
	};
	let bank = match FinTsClient::new(bank_config, TerminalChallenge) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create bank client: {}", e);
			return ExitCode::FAILURE;
		}
	};

	let window = SyncWindow::trailing(cli.days, Local::now().date_naive());
	info!(
		"Starting sync of transactions from {} to {}",
		window.start, window.end
	);

	let mut orchestrator = SyncOrchestrator::new(ledger, bank);
	match orchestrator.run(window).await {
		Ok(report) if report.has_failures() => {
			warn!("Sync completed with failures");
			ExitCode::from(EXIT_PARTIAL_FAILURE)
		}
		Ok(_) => ExitCode::SUCCESS,
		Err(e @ SyncError::Setup(_)) => {
			error!("Sync aborted before contacting the bank: {}", e);
			ExitCode::FAILURE
		}
		Err(e @ SyncError::Bank(_)) => {
			error!("Sync aborted: {}", e);
			ExitCode::FAILURE
		}
	}
}
