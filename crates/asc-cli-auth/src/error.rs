// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for key loading and token signing.

use std::path::PathBuf;

use asc_cli_credentials::CredentialError;

/// Invalid key material. Always fatal, never retried.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
	#[error("Private key not found: {}", .0.display())]
	NotFound(PathBuf),

	#[error("Private key path is a directory: {}", .0.display())]
	IsDirectory(PathBuf),

	#[error("Private key {} is accessible by group or others (mode {mode:04o}); run chmod 600", .path.display())]
	InsecurePermissions { path: PathBuf, mode: u32 },

	#[error("No PEM block found in {}", .0.display())]
	NoPemBlock(PathBuf),

	#[error("Expected exactly one PEM block in {}, found {count}", .path.display())]
	MultiplePemBlocks { path: PathBuf, count: usize },

	#[error("Malformed PEM in {}: {message}", .path.display())]
	MalformedPem { path: PathBuf, message: String },

	#[error("Private key is not ECDSA (found {0})")]
	NotEcdsa(String),

	#[error("Unsupported EC private key: {0}")]
	UnsupportedCurve(String),

	#[error("Malformed private key: {0}")]
	Malformed(String),

	#[error("IO error reading {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
	#[error("JWT error: {0}")]
	Jwt(String),

	#[error("Token lifetime must be between 1 second and {max} seconds, got {got}")]
	InvalidLifetime { got: u64, max: u64 },

	#[error("System time error: {0}")]
	Clock(String),
}

/// Errors from the authentication entry points.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error(transparent)]
	Credential(#[from] CredentialError),

	#[error(transparent)]
	Key(#[from] KeyError),

	#[error(transparent)]
	Token(#[from] TokenError),
}
