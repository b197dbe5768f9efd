// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The on-disk config file.

use std::path::Path;

use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::ConfigError;

const KEY_ID: &str = "key_id";
const ISSUER_ID: &str = "issuer_id";
const PRIVATE_KEY_PATH: &str = "private_key_path";
const DEFAULT_KEY_NAME: &str = "default_key_name";

/// Persisted CLI configuration.
///
/// Only the credential fields are typed. Every other top-level key (timeouts,
/// retry tuning, default app id, ...) is carried through `settings` untouched,
/// in its original order and, for numbers, with its original text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
	pub key_id: String,
	pub issuer_id: String,
	pub private_key_path: String,

	/// Name of the default credential. Also labels the credential held in
	/// this file, if any.
	pub default_key_name: String,

	pub settings: Map<String, Value>,
}

/// Remove a typed string field. Absent and `null` read as empty.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<String, serde_json::Error> {
	match map.shift_remove(key) {
		None | Some(Value::Null) => Ok(String::new()),
		Some(value) => serde_json::from_value(value),
	}
}

impl ConfigFile {
	/// Read the config file. A missing file is [`ConfigError::NotFound`].
	pub async fn load(path: &Path) -> Result<Self, ConfigError> {
		let contents = match fs::read_to_string(path).await {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::NotFound(path.to_path_buf()));
			}
			Err(e) => return Err(e.into()),
		};

		Self::parse(&contents).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}

	fn parse(contents: &str) -> Result<Self, serde_json::Error> {
		let mut settings: Map<String, Value> = serde_json::from_str(contents)?;
		Ok(Self {
			key_id: take_string(&mut settings, KEY_ID)?,
			issuer_id: take_string(&mut settings, ISSUER_ID)?,
			private_key_path: take_string(&mut settings, PRIVATE_KEY_PATH)?,
			default_key_name: take_string(&mut settings, DEFAULT_KEY_NAME)?,
			settings,
		})
	}

	/// The typed fields first, omitted when empty, then every other setting
	/// as it was read.
	fn to_map(&self) -> Map<String, Value> {
		let mut map = Map::new();
		for (key, value) in [
			(KEY_ID, &self.key_id),
			(ISSUER_ID, &self.issuer_id),
			(PRIVATE_KEY_PATH, &self.private_key_path),
			(DEFAULT_KEY_NAME, &self.default_key_name),
		] {
			if !value.is_empty() {
				map.insert(key.to_string(), Value::String(value.clone()));
			}
		}
		for (key, value) in &self.settings {
			map.insert(key.clone(), value.clone());
		}
		map
	}

	/// Read the config file, treating a missing file as empty.
	pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
		match Self::load(path).await {
			Err(ConfigError::NotFound(_)) => Ok(Self::default()),
			other => other,
		}
	}

	/// Write the config file atomically with owner-only permissions.
	///
	/// Content goes to a sibling temp file first, which is synced and then
	/// renamed over the target.
	pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			if fs::metadata(parent).await.is_err() {
				debug!(path = %parent.display(), "creating config directory");
				fs::create_dir_all(parent).await?;
				#[cfg(unix)]
				{
					use std::os::unix::fs::PermissionsExt;
					fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).await?;
				}
			}
		}

		let contents = serde_json::to_string_pretty(&self.to_map())?;

		let temp_path = path.with_extension("json.tmp");
		let mut options = fs::OpenOptions::new();
		options.write(true).create(true).truncate(true);
		#[cfg(unix)]
		options.mode(0o600);

		let mut file = options.open(&temp_path).await?;
		file.write_all(contents.as_bytes()).await?;
		file.write_all(b"\n").await?;
		file.sync_all().await?;
		drop(file);

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
		}

		fs::rename(&temp_path, path).await?;

		debug!(path = %path.display(), "config file written");
		Ok(())
	}

	/// Whether any credential field is populated.
	pub fn has_credentials(&self) -> bool {
		!self.key_id.is_empty() || !self.issuer_id.is_empty() || !self.private_key_path.is_empty()
	}

	/// Zero the credential fields and the default pointer, leaving every
	/// other setting alone.
	pub fn clear_credentials(&mut self) {
		self.key_id.clear();
		self.issuer_id.clear();
		self.private_key_path.clear();
		self.default_key_name.clear();
	}
}
