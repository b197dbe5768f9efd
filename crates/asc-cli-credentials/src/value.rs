// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential value types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
	Keyring,
	ConfigFile,
	Environment,
}

impl fmt::Display for CredentialSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Keyring => f.write_str("keyring"),
			Self::ConfigFile => f.write_str("config file"),
			Self::Environment => f.write_str("environment"),
		}
	}
}

/// The three fields a backend stores for one name.
///
/// The private key itself is never stored, only its path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPayload {
	pub key_id: String,
	pub issuer_id: String,
	pub private_key_path: PathBuf,
}

impl CredentialPayload {
	pub fn new(
		key_id: impl Into<String>,
		issuer_id: impl Into<String>,
		private_key_path: impl Into<PathBuf>,
	) -> Self {
		Self {
			key_id: key_id.into(),
			issuer_id: issuer_id.into(),
			private_key_path: private_key_path.into(),
		}
	}

	/// Names of the required fields that are empty.
	pub fn missing_fields(&self) -> Vec<&'static str> {
		let mut missing = Vec::new();
		if self.key_id.trim().is_empty() {
			missing.push("key_id");
		}
		if self.issuer_id.trim().is_empty() {
			missing.push("issuer_id");
		}
		if self.private_key_path.as_os_str().is_empty() {
			missing.push("private_key_path");
		}
		missing
	}

	pub fn ensure_complete(&self, name: &str) -> Result<(), CredentialError> {
		let missing = self.missing_fields();
		if missing.is_empty() {
			Ok(())
		} else {
			Err(CredentialError::Incomplete {
				name: name.to_string(),
				missing,
			})
		}
	}
}

/// Serialized keyring entry value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCredential {
	pub key_id: String,
	pub issuer_id: String,
	pub private_key_path: String,
	/// Display label for OS keychain UIs.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub label: String,
}

impl PersistedCredential {
	pub fn new(name: &str, payload: &CredentialPayload) -> Self {
		Self {
			key_id: payload.key_id.clone(),
			issuer_id: payload.issuer_id.clone(),
			private_key_path: payload.private_key_path.to_string_lossy().into_owned(),
			label: format!("App Store Connect API Key ({name})"),
		}
	}
}

impl From<PersistedCredential> for CredentialPayload {
	fn from(persisted: PersistedCredential) -> Self {
		CredentialPayload {
			key_id: persisted.key_id,
			issuer_id: persisted.issuer_id,
			private_key_path: PathBuf::from(persisted.private_key_path),
		}
	}
}

/// A named credential as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
	pub name: String,
	pub key_id: String,
	pub issuer_id: String,
	pub private_key_path: PathBuf,
	/// Computed from the default-name pointer, never stored per record.
	pub is_default: bool,
	pub source: CredentialSource,
}

impl Credential {
	pub fn new(name: impl Into<String>, payload: CredentialPayload, source: CredentialSource) -> Self {
		Self {
			name: name.into(),
			key_id: payload.key_id,
			issuer_id: payload.issuer_id,
			private_key_path: payload.private_key_path,
			is_default: false,
			source,
		}
	}

	pub fn payload(&self) -> CredentialPayload {
		CredentialPayload {
			key_id: self.key_id.clone(),
			issuer_id: self.issuer_id.clone(),
			private_key_path: self.private_key_path.clone(),
		}
	}

	pub fn ensure_complete(&self) -> Result<(), CredentialError> {
		self.payload().ensure_complete(&self.name)
	}
}
