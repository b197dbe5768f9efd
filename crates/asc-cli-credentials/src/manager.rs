// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Orchestration across the keyring and the config file.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

#[cfg(feature = "keyring")]
use crate::env::EnvOverrides;
use crate::error::CredentialError;
use crate::store::CredentialBackend;
use crate::store_config::ConfigFileStore;
use crate::value::{Credential, CredentialPayload, CredentialSource};

/// Sole writer of stored credentials.
///
/// The keyring is authoritative whenever it is available. The config file is
/// used only when the keyring reports `Unavailable`, or when the keyring is
/// reachable but empty. A credential newly written to the keyring is cleared
/// from the config file in the same operation.
#[derive(Debug, Clone)]
pub struct CredentialManager {
	keyring: Arc<dyn CredentialBackend>,
	legacy: Arc<dyn CredentialBackend>,
	config: ConfigFileStore,
}

fn validate_name(name: &str) -> Result<(), CredentialError> {
	if name.trim().is_empty() || name.trim() != name {
		return Err(CredentialError::InvalidName(name.to_string()));
	}
	Ok(())
}

/// Set `is_default` from the pointer. With no pointer, a lone credential is
/// the default.
fn mark_default(credentials: &mut [Credential], pointer: Option<&str>) {
	match pointer {
		Some(pointer) => {
			for credential in credentials.iter_mut() {
				credential.is_default = credential.name == pointer;
			}
		}
		None => {
			let lone = credentials.len() == 1;
			for credential in credentials.iter_mut() {
				credential.is_default = lone;
			}
		}
	}
}

impl CredentialManager {
	pub fn new(
		keyring: Arc<dyn CredentialBackend>,
		legacy: Arc<dyn CredentialBackend>,
		config: ConfigFileStore,
	) -> Self {
		Self {
			keyring,
			legacy,
			config,
		}
	}

	/// Build the production manager: OS keyring (current and legacy
	/// namespaces) plus the config file at the resolved path.
	#[cfg(feature = "keyring")]
	pub fn from_env(env: &EnvOverrides) -> Result<Self, CredentialError> {
		use crate::store_keyring::{KeyringBackend, LEGACY_NAMESPACE, NAMESPACE};

		let path = asc_cli_config::paths::resolve_config_path_from(
			env.config_path.clone().map(Into::into),
			dirs::home_dir(),
		)?;
		if env.bypass_keyring {
			debug!("keyring bypassed by environment");
		}

		Ok(Self::new(
			Arc::new(KeyringBackend::new(NAMESPACE).disabled(env.bypass_keyring)),
			Arc::new(KeyringBackend::new(LEGACY_NAMESPACE).disabled(env.bypass_keyring)),
			ConfigFileStore::new(path),
		))
	}

	pub fn config_store(&self) -> &ConfigFileStore {
		&self.config
	}

	/// Whether the keyring can hold credentials on this host.
	pub async fn keyring_available(&self) -> bool {
		match self.keyring.health_check().await {
			Ok(()) => true,
			Err(e) => {
				debug!(error = %e, "keyring health check failed");
				false
			}
		}
	}

	/// Persist a credential and make it the default. Returns where it landed.
	#[instrument(skip_all, fields(name = %name))]
	pub async fn store(
		&self,
		name: &str,
		payload: &CredentialPayload,
	) -> Result<CredentialSource, CredentialError> {
		validate_name(name)?;
		payload.ensure_complete(name)?;

		match self.keyring.put(name, payload).await {
			Ok(()) => {
				// The keyring copy is authoritative; a stale file copy is
				// tolerated if it cannot be cleared.
				if let Err(e) = self.config.hand_over_to_keyring(name).await {
					warn!(error = %e, "failed to clear credential from config file after keyring store");
				}
				info!("credential stored in keyring");
				Ok(CredentialSource::Keyring)
			}
			Err(e) if e.is_unavailable() => {
				debug!(error = %e, "keyring unavailable, storing in config file");
				self.config.put(name, payload).await?;
				info!(path = %self.config.path().display(), "credential stored in config file");
				Ok(CredentialSource::ConfigFile)
			}
			Err(e) => Err(e),
		}
	}

	/// Move entries from the legacy keyring namespace into the current one.
	///
	/// Entries whose name already exists in the current namespace are not
	/// copied; every legacy entry seen is removed afterwards. Returns the
	/// number of entries written.
	#[instrument(skip_all)]
	pub async fn migrate_legacy(&self) -> Result<usize, CredentialError> {
		let legacy = match self.legacy.list().await {
			Ok(legacy) if legacy.is_empty() => return Ok(0),
			Ok(legacy) => legacy,
			Err(e) if e.is_unavailable() || e.is_not_found() => return Ok(0),
			Err(e) => return Err(e),
		};

		let current: BTreeSet<String> = match self.keyring.list().await {
			Ok(current) => current.into_iter().map(|c| c.name).collect(),
			Err(e) if e.is_unavailable() => return Ok(0),
			Err(e) => return Err(e),
		};

		let mut migrated = 0;
		for credential in legacy {
			if !current.contains(&credential.name) {
				self.keyring.put(&credential.name, &credential.payload()).await?;
				migrated += 1;
				info!(name = %credential.name, "migrated credential from legacy keyring namespace");
			}
			if let Err(e) = self.legacy.remove(&credential.name).await {
				warn!(name = %credential.name, error = %e, "failed to remove legacy keyring entry");
			}
		}
		Ok(migrated)
	}

	async fn list_config(&self) -> Result<Vec<Credential>, CredentialError> {
		match self.config.list().await {
			Err(e) if e.is_not_found() => Ok(Vec::new()),
			other => other,
		}
	}

	async fn list_with_pointer(
		&self,
	) -> Result<(Vec<Credential>, Option<String>), CredentialError> {
		let from_keyring = match self.migrate_legacy().await {
			Ok(_) => self.keyring.list().await,
			Err(e) => Err(e),
		};

		let mut credentials = match from_keyring {
			Ok(credentials) if !credentials.is_empty() => credentials,
			Ok(_) => self.list_config().await?,
			Err(e) if e.is_unavailable() => {
				debug!(error = %e, "keyring unavailable, listing config file");
				self.list_config().await?
			}
			Err(e) => return Err(e),
		};

		let pointer = self.config.default_name().await?;
		mark_default(&mut credentials, pointer.as_deref());
		Ok((credentials, pointer))
	}

	/// Every stored credential from the authoritative store, with
	/// `is_default` filled in.
	#[instrument(skip_all)]
	pub async fn list(&self) -> Result<Vec<Credential>, CredentialError> {
		Ok(self.list_with_pointer().await?.0)
	}

	/// Resolve a credential by explicit name, or the default when `name` is
	/// `None`. The result is always complete.
	///
	/// The default never falls back to a guess: a pointer naming a missing
	/// credential is `NotFound`, and several credentials with no pointer is
	/// `Ambiguous`.
	#[instrument(skip_all, fields(name = ?name))]
	pub async fn resolve(&self, name: Option<&str>) -> Result<Credential, CredentialError> {
		let (credentials, pointer) = self.list_with_pointer().await?;

		let credential = match (name, pointer) {
			(Some(name), _) => credentials
				.into_iter()
				.find(|c| c.name == name)
				.ok_or_else(|| CredentialError::NotFound(format!("credential '{name}'")))?,
			(None, Some(pointer)) => credentials
				.into_iter()
				.find(|c| c.name == pointer)
				.ok_or_else(|| {
					CredentialError::NotFound(format!("default credential '{pointer}' is not stored"))
				})?,
			(None, None) => match credentials.len() {
				0 => {
					return Err(CredentialError::NotFound(
						"no credentials configured".to_string(),
					))
				}
				1 => credentials.into_iter().next().ok_or_else(|| {
					CredentialError::NotFound("no credentials configured".to_string())
				})?,
				_ => {
					return Err(CredentialError::Ambiguous(
						credentials.into_iter().map(|c| c.name).collect(),
					))
				}
			},
		};

		credential.ensure_complete()?;
		debug!(name = %credential.name, source = %credential.source, "resolved credential");
		Ok(credential)
	}

	/// Point the default at an existing credential.
	#[instrument(skip_all, fields(name = %name))]
	pub async fn set_default(&self, name: &str) -> Result<(), CredentialError> {
		let credentials = self.list().await?;
		if !credentials.iter().any(|c| c.name == name) {
			return Err(CredentialError::NotFound(format!("credential '{name}'")));
		}
		self.config.set_default_name(Some(name)).await
	}

	/// Remove one credential, clearing the default pointer if it named it.
	#[instrument(skip_all, fields(name = %name))]
	pub async fn remove(&self, name: &str) -> Result<(), CredentialError> {
		let removed = match self.keyring.remove(name).await {
			Ok(()) => true,
			Err(e) if e.is_unavailable() => {
				debug!(error = %e, "keyring unavailable, removing from config file");
				// The file's label is the pointer, so this clears both.
				return self.config.remove(name).await;
			}
			Err(e) if e.is_not_found() => match self.config.remove(name).await {
				Ok(()) => true,
				Err(e) if e.is_not_found() => false,
				Err(e) => return Err(e),
			},
			Err(e) => return Err(e),
		};

		let removed_legacy = match self.legacy.remove(name).await {
			Ok(()) => true,
			Err(e) if e.is_not_found() || e.is_unavailable() => false,
			Err(e) => {
				warn!(error = %e, "failed to purge legacy keyring entry");
				false
			}
		};

		if !removed && !removed_legacy {
			return Err(CredentialError::NotFound(format!("credential '{name}'")));
		}

		if self.config.default_name().await?.as_deref() == Some(name) {
			self.config.set_default_name(None).await?;
		}
		info!("credential removed");
		Ok(())
	}

	/// Remove every credential from every store and clear the default.
	#[instrument(skip_all)]
	pub async fn remove_all(&self) -> Result<(), CredentialError> {
		match self.keyring.remove_all().await {
			Ok(()) => {
				if let Err(e) = self.legacy.remove_all().await {
					if !e.is_unavailable() {
						warn!(error = %e, "failed to purge legacy keyring namespace");
					}
				}
			}
			Err(e) if e.is_unavailable() => {
				debug!(error = %e, "keyring unavailable, clearing config file only");
			}
			Err(e) => return Err(e),
		}

		self.config.clear_credentials().await?;
		info!("all credentials removed");
		Ok(())
	}
}
