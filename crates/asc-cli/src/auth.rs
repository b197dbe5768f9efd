// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::{info, instrument};

use asc_cli_auth::{key, Authenticator};
use asc_cli_credentials::{Credential, CredentialPayload, CredentialSource};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
	/// Store an API key and make it the default.
	Login {
		/// Name to store the credential under.
		#[arg(long)]
		name: String,
		#[arg(long)]
		key_id: String,
		#[arg(long)]
		issuer_id: String,
		/// Path to the `.p8` private key file.
		#[arg(long, value_name = "PATH")]
		private_key: PathBuf,
	},
	/// List stored credentials.
	List {
		#[arg(long)]
		json: bool,
	},
	/// Make a stored credential the default.
	Switch {
		#[arg(long)]
		name: String,
	},
	/// Show the credential this invocation would use.
	Status {
		#[arg(long)]
		name: Option<String>,
	},
	/// Print a signed bearer token.
	Token {
		#[arg(long)]
		name: Option<String>,
	},
	/// Remove one credential, or all of them.
	Logout {
		#[arg(long, conflicts_with = "all")]
		name: Option<String>,
		/// Remove every credential (the default when no name is given).
		#[arg(long)]
		all: bool,
	},
	/// Check keyring access, the config file and every stored key.
	Doctor,
}

pub async fn run(auth: &Authenticator, command: AuthCommand, out: &mut impl Write) -> Result<()> {
	match command {
		AuthCommand::Login {
			name,
			key_id,
			issuer_id,
			private_key,
		} => login(auth, &name, key_id, issuer_id, private_key, out).await,
		AuthCommand::List { json } => list(auth, json, out).await,
		AuthCommand::Switch { name } => switch(auth, &name, out).await,
		AuthCommand::Status { name } => status(auth, name.as_deref(), out).await,
		AuthCommand::Token { name } => token(auth, name.as_deref(), out).await,
		AuthCommand::Logout { name, .. } => logout(auth, name.as_deref(), out).await,
		AuthCommand::Doctor => doctor(auth, out).await,
	}
}

/// Relative key paths are stored absolute so later invocations from another
/// directory still find the file.
fn absolute_key_path(path: PathBuf) -> PathBuf {
	if path.is_absolute() {
		return path;
	}
	match std::env::current_dir() {
		Ok(cwd) => cwd.join(path),
		Err(_) => path,
	}
}

#[instrument(skip_all, fields(name = %name))]
async fn login(
	auth: &Authenticator,
	name: &str,
	key_id: String,
	issuer_id: String,
	private_key: PathBuf,
	out: &mut impl Write,
) -> Result<()> {
	let payload = CredentialPayload::new(key_id, issuer_id, absolute_key_path(private_key));
	let source = auth
		.store_credential(name, &payload)
		.await
		.with_context(|| format!("failed to store credential '{name}'"))?;

	info!(source = %source, "login complete");
	match source {
		CredentialSource::Keyring => writeln!(out, "Stored credential '{name}' in the system keyring")?,
		_ => writeln!(
			out,
			"Stored credential '{name}' in {} (system keyring unavailable)",
			auth.credentials().config_store().path().display()
		)?,
	}
	writeln!(out, "'{name}' is now the default credential")?;
	Ok(())
}

fn render_table(credentials: &[Credential]) -> String {
	let width = credentials
		.iter()
		.map(|c| c.name.len())
		.max()
		.unwrap_or(0)
		.max("NAME".len());

	let mut table = format!("  {:width$}  {:12}  {:12}  {}\n", "NAME", "KEY ID", "SOURCE", "KEY PATH");
	for c in credentials {
		let marker = if c.is_default { '*' } else { ' ' };
		table.push_str(&format!(
			"{marker} {:width$}  {:12}  {:12}  {}\n",
			c.name,
			c.key_id,
			c.source.to_string(),
			c.private_key_path.display()
		));
	}
	table
}

async fn list(auth: &Authenticator, json: bool, out: &mut impl Write) -> Result<()> {
	let credentials = auth
		.credentials()
		.list()
		.await
		.context("failed to list credentials")?;

	if json {
		serde_json::to_writer_pretty(&mut *out, &credentials)?;
		writeln!(out)?;
		return Ok(());
	}

	if credentials.is_empty() {
		writeln!(out, "No credentials stored. Run `asc auth login` to add one.")?;
		return Ok(());
	}
	write!(out, "{}", render_table(&credentials))?;
	Ok(())
}

async fn switch(auth: &Authenticator, name: &str, out: &mut impl Write) -> Result<()> {
	auth
		.credentials()
		.set_default(name)
		.await
		.with_context(|| format!("failed to switch to '{name}'"))?;
	writeln!(out, "Default credential is now '{name}'")?;
	Ok(())
}

async fn status(auth: &Authenticator, name: Option<&str>, out: &mut impl Write) -> Result<()> {
	let credential = auth
		.resolve_active(name)
		.await
		.context("no usable credential")?;

	writeln!(out, "Credential:  {}", credential.name)?;
	writeln!(out, "Key ID:      {}", credential.key_id)?;
	writeln!(out, "Issuer ID:   {}", credential.issuer_id)?;
	writeln!(out, "Private key: {}", credential.private_key_path.display())?;
	writeln!(out, "Source:      {}", credential.source)?;
	writeln!(out, "Default:     {}", if credential.is_default { "yes" } else { "no" })?;
	Ok(())
}

async fn token(auth: &Authenticator, name: Option<&str>, out: &mut impl Write) -> Result<()> {
	let (_, token) = auth.token(name).await.context("failed to issue token")?;
	writeln!(out, "{}", token.expose())?;
	Ok(())
}

async fn logout(auth: &Authenticator, name: Option<&str>, out: &mut impl Write) -> Result<()> {
	match name {
		Some(name) => {
			auth
				.credentials()
				.remove(name)
				.await
				.with_context(|| format!("failed to remove '{name}'"))?;
			writeln!(out, "Removed credential '{name}'")?;
		}
		None => {
			auth
				.credentials()
				.remove_all()
				.await
				.context("failed to remove credentials")?;
			writeln!(out, "Removed all credentials")?;
		}
	}
	Ok(())
}

#[cfg(unix)]
fn config_mode_problem(path: &Path) -> Option<String> {
	use std::os::unix::fs::PermissionsExt;

	let mode = std::fs::metadata(path).ok()?.permissions().mode() & 0o777;
	(mode & 0o077 != 0).then(|| format!("config file mode is {mode:04o}, expected 0600"))
}

#[cfg(not(unix))]
fn config_mode_problem(_path: &Path) -> Option<String> {
	None
}

async fn doctor(auth: &Authenticator, out: &mut impl Write) -> Result<()> {
	let manager = auth.credentials();
	let config_path = manager.config_store().path();
	let mut problems = 0;

	if manager.keyring_available().await {
		writeln!(out, "[ok]   system keyring is available")?;
	} else {
		writeln!(out, "[warn] system keyring is unavailable; credentials are kept in the config file")?;
	}

	if config_path.exists() {
		writeln!(out, "[ok]   config file: {}", config_path.display())?;
		if let Some(problem) = config_mode_problem(config_path) {
			problems += 1;
			writeln!(out, "[fail] {problem}")?;
		}
	} else {
		writeln!(out, "[ok]   config file: {} (not created yet)", config_path.display())?;
	}

	let credentials = match manager.list().await {
		Ok(credentials) => credentials,
		Err(e) => {
			writeln!(out, "[fail] cannot list credentials: {e}")?;
			bail!("doctor found problems");
		}
	};
	if credentials.is_empty() {
		writeln!(out, "[warn] no credentials stored")?;
	}
	for credential in &credentials {
		let path = credential.private_key_path.clone();
		let checked = tokio::task::spawn_blocking(move || key::validate(&path))
			.await
			.context("key check task failed")?;
		match checked {
			Ok(()) => writeln!(out, "[ok]   '{}': private key is valid", credential.name)?,
			Err(e) => {
				problems += 1;
				writeln!(out, "[fail] '{}': {e}", credential.name)?;
			}
		}
	}

	match manager.resolve(None).await {
		Ok(credential) => writeln!(out, "[ok]   default credential: '{}'", credential.name)?,
		Err(e) if !credentials.is_empty() => {
			problems += 1;
			writeln!(out, "[fail] default credential: {e}")?;
		}
		Err(_) => {}
	}

	if problems > 0 {
		bail!("doctor found {problems} problem(s)");
	}
	Ok(())
}
