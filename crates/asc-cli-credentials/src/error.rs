// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential error types.

use asc_cli_config::ConfigError;

/// Errors that can occur during credential operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialError {
	/// The backend does not exist on this host. Callers fall back on this,
	/// they never retry it.
	#[error("Credential backend unavailable: {0}")]
	Unavailable(String),

	#[error("Credential not found: {0}")]
	NotFound(String),

	#[error("Credential '{name}' is incomplete: missing {}", .missing.join(", "))]
	Incomplete {
		name: String,
		missing: Vec<&'static str>,
	},

	#[error("No default credential set and several are stored ({}); pick one by name", .0.join(", "))]
	Ambiguous(Vec<String>),

	#[error("Corrupt credential entry '{name}': {message}")]
	Corrupt { name: String, message: String },

	#[error("Invalid credential name: {0:?}")]
	InvalidName(String),

	#[error("{op} failed: {message}")]
	Backend { op: &'static str, message: String },

	#[error("IO error: {0}")]
	Io(String),

	#[error("Serialization error: {0}")]
	Serde(String),

	#[error("Config error: {0}")]
	Config(String),
}

impl CredentialError {
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Self::Unavailable(_))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}

	pub(crate) fn backend(op: &'static str, message: impl ToString) -> Self {
		Self::Backend {
			op,
			message: message.to_string(),
		}
	}
}

impl From<std::io::Error> for CredentialError {
	fn from(err: std::io::Error) -> Self {
		CredentialError::Io(err.to_string())
	}
}

impl From<serde_json::Error> for CredentialError {
	fn from(err: serde_json::Error) -> Self {
		CredentialError::Serde(err.to_string())
	}
}

impl From<ConfigError> for CredentialError {
	fn from(err: ConfigError) -> Self {
		match err {
			ConfigError::NotFound(path) => {
				CredentialError::NotFound(format!("no config file at {}", path.display()))
			}
			ConfigError::Io(e) => CredentialError::Io(e.to_string()),
			other => CredentialError::Config(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn test_missing_config_maps_to_not_found() {
		let err: CredentialError = ConfigError::NotFound(PathBuf::from("/x/config.json")).into();
		assert!(err.is_not_found());
		assert!(err.to_string().contains("/x/config.json"));
	}

	#[test]
	fn test_incomplete_lists_missing_fields() {
		let err = CredentialError::Incomplete {
			name: "work".to_string(),
			missing: vec!["key_id", "private_key_path"],
		};
		assert_eq!(
			err.to_string(),
			"Credential 'work' is incomplete: missing key_id, private_key_path"
		);
	}

	#[test]
	fn test_backend_error_names_operation() {
		let err = CredentialError::backend("keyring put", "locked");
		assert_eq!(err.to_string(), "keyring put failed: locked");
		assert!(!err.is_unavailable());
	}
}
