// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Config-file backend: the store of last resort.
//!
//! The config file holds at most one credential. Its name is the file's
//! `default_key_name`, which doubles as the default pointer for the keyring.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use asc_cli_config::ConfigFile;

use crate::error::CredentialError;
use crate::store::CredentialBackend;
use crate::value::{Credential, CredentialPayload, CredentialSource};

/// Name reported for a file credential that has no `default_key_name`.
const UNLABELED_NAME: &str = "default";

fn label(config: &ConfigFile) -> &str {
	if config.default_key_name.is_empty() {
		UNLABELED_NAME
	} else {
		&config.default_key_name
	}
}

fn payload(config: &ConfigFile) -> CredentialPayload {
	CredentialPayload::new(
		config.key_id.clone(),
		config.issuer_id.clone(),
		config.private_key_path.clone(),
	)
}

#[derive(Debug, Clone)]
pub struct ConfigFileStore {
	path: PathBuf,
}

impl ConfigFileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn load(&self) -> Result<ConfigFile, CredentialError> {
		Ok(ConfigFile::load(&self.path).await?)
	}

	/// The default-name pointer. A missing file or empty value is `None`.
	pub async fn default_name(&self) -> Result<Option<String>, CredentialError> {
		let config = ConfigFile::load_or_default(&self.path).await?;
		Ok(Some(config.default_key_name).filter(|name| !name.is_empty()))
	}

	/// Move or clear the default-name pointer.
	pub async fn set_default_name(&self, name: Option<&str>) -> Result<(), CredentialError> {
		let mut config = ConfigFile::load_or_default(&self.path).await?;
		let name = name.unwrap_or_default();
		if config.default_key_name == name {
			return Ok(());
		}
		config.default_key_name = name.to_string();
		config.save(&self.path).await?;
		debug!(path = %self.path.display(), default = %name, "default credential pointer updated");
		Ok(())
	}

	/// Drop the key id, issuer id and key path, and point the default at
	/// `name`, in a single write. Used once the keyring holds `name`, so the
	/// file keeps no duplicate of a keyring credential.
	pub async fn hand_over_to_keyring(&self, name: &str) -> Result<(), CredentialError> {
		let mut config = ConfigFile::load_or_default(&self.path).await?;
		if !config.has_credentials() && config.default_key_name == name {
			return Ok(());
		}
		config.key_id.clear();
		config.issuer_id.clear();
		config.private_key_path.clear();
		config.default_key_name = name.to_string();
		config.save(&self.path).await?;
		debug!(path = %self.path.display(), default = %name, "config file handed credential over to keyring");
		Ok(())
	}

	/// Sign out: zero every credential field and the default pointer while
	/// leaving all other settings in the file as they were.
	pub async fn clear_credentials(&self) -> Result<(), CredentialError> {
		let mut config = match self.load().await {
			Ok(config) => config,
			Err(e) if e.is_not_found() => return Ok(()),
			Err(e) => return Err(e),
		};
		if !config.has_credentials() && config.default_key_name.is_empty() {
			return Ok(());
		}
		config.clear_credentials();
		config.save(&self.path).await?;
		debug!(path = %self.path.display(), "cleared credentials from config file");
		Ok(())
	}
}

#[async_trait]
impl CredentialBackend for ConfigFileStore {
	fn source(&self) -> CredentialSource {
		CredentialSource::ConfigFile
	}

	async fn put(&self, name: &str, payload: &CredentialPayload) -> Result<(), CredentialError> {
		let mut config = ConfigFile::load_or_default(&self.path).await?;
		config.key_id = payload.key_id.clone();
		config.issuer_id = payload.issuer_id.clone();
		config.private_key_path = payload.private_key_path.to_string_lossy().into_owned();
		config.default_key_name = name.to_string();
		config.save(&self.path).await?;
		debug!(path = %self.path.display(), name = %name, "stored credential in config file");
		Ok(())
	}

	async fn get(&self, name: &str) -> Result<CredentialPayload, CredentialError> {
		let config = self.load().await?;
		if config.has_credentials() && label(&config) == name {
			Ok(payload(&config))
		} else {
			Err(CredentialError::NotFound(name.to_string()))
		}
	}

	/// A missing file is `NotFound`; a file without credentials is an
	/// empty list.
	async fn list(&self) -> Result<Vec<Credential>, CredentialError> {
		let config = self.load().await?;
		if !config.has_credentials() {
			return Ok(Vec::new());
		}
		Ok(vec![Credential::new(
			label(&config),
			payload(&config),
			CredentialSource::ConfigFile,
		)])
	}

	async fn remove(&self, name: &str) -> Result<(), CredentialError> {
		let config = match self.load().await {
			Ok(config) => config,
			Err(e) if e.is_not_found() => return Err(CredentialError::NotFound(name.to_string())),
			Err(e) => return Err(e),
		};
		if !config.has_credentials() || label(&config) != name {
			return Err(CredentialError::NotFound(name.to_string()));
		}
		self.clear_credentials().await
	}

	async fn remove_all(&self) -> Result<(), CredentialError> {
		self.clear_credentials().await
	}
}
