// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod auth;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use asc_cli_auth::{AuthError, Authenticator};
use asc_cli_credentials::CredentialError;

use crate::auth::AuthCommand;

const DEFAULT_LOG_FILTER: &str = "asc=warn";

#[derive(Debug, Parser)]
#[command(name = "asc", version, about = "App Store Connect command-line client")]
struct Cli {
	/// Log filter, e.g. `debug` or `asc_cli_credentials=trace`. Overrides RUST_LOG.
	#[arg(long, global = true, value_name = "FILTER")]
	log_level: Option<String>,

	/// Emit logs as JSON lines on stderr.
	#[arg(long, global = true)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Manage API credentials.
	Auth {
		#[command(subcommand)]
		command: AuthCommand,
	},
}

fn init_logging(level: Option<&str>, json: bool) -> Result<()> {
	let filter = match level {
		Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{level}'"))?,
		None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
	};

	let registry = tracing_subscriber::registry().with(filter);
	if json {
		registry
			.with(fmt::layer().json().with_writer(io::stderr))
			.try_init()
			.context("failed to install log subscriber")?;
	} else {
		registry
			.with(fmt::layer().compact().with_writer(io::stderr))
			.try_init()
			.context("failed to install log subscriber")?;
	}
	Ok(())
}

/// 2 for configuration problems the user can fix by storing or naming a
/// credential, 3 for unusable key material, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> u8 {
	let credential = err.downcast_ref::<CredentialError>().or_else(|| {
		match err.downcast_ref::<AuthError>() {
			Some(AuthError::Credential(e)) => Some(e),
			_ => None,
		}
	});
	if let Some(e) = credential {
		return match e {
			CredentialError::NotFound(_)
			| CredentialError::Incomplete { .. }
			| CredentialError::Ambiguous(_)
			| CredentialError::InvalidName(_) => 2,
			_ => 1,
		};
	}
	if matches!(err.downcast_ref::<AuthError>(), Some(AuthError::Key(_))) {
		return 3;
	}
	1
}

async fn run(cli: Cli) -> Result<()> {
	match cli.command {
		Command::Auth { command } => {
			let authenticator =
				Authenticator::from_env().context("failed to initialise credential storage")?;
			debug!(
				config = %authenticator.credentials().config_store().path().display(),
				"credential storage ready"
			);
			let mut stdout = io::stdout().lock();
			auth::run(&authenticator, command, &mut stdout).await
		}
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	if let Err(e) = init_logging(cli.log_level.as_deref(), cli.json_logs) {
		eprintln!("Error: {e:#}");
		return ExitCode::from(1);
	}

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("Error: {e:#}");
			ExitCode::from(exit_code(&e))
		}
	}
}
