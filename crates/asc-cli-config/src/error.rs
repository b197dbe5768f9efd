// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

/// Errors that can occur while reading or writing the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// I/O error reading or writing the config file
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON parsing error
	#[error("JSON parse error in {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	/// JSON serialization error
	#[error("Serialization error: {0}")]
	Serialize(#[from] serde_json::Error),

	/// No config file at the resolved path
	#[error("Config file not found: {}", .0.display())]
	NotFound(PathBuf),

	/// Home directory not found
	#[error("Could not determine home directory")]
	HomeDirNotFound,
}

impl ConfigError {
	/// Whether this error means the file simply does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}
}
