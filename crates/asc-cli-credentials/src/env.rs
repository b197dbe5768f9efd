// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment variable overrides.

use std::path::PathBuf;

use tracing::trace;

use asc_cli_config::CONFIG_PATH_ENV;

use crate::error::CredentialError;
use crate::value::{Credential, CredentialPayload, CredentialSource};

/// Truthy value forces the keyring backend to report `Unavailable`.
pub const BYPASS_KEYRING_ENV: &str = "ASC_BYPASS_KEYCHAIN";

/// Credential name to resolve when none is passed explicitly.
pub const PROFILE_ENV: &str = "ASC_PROFILE";

pub const KEY_ID_ENV: &str = "ASC_KEY_ID";
pub const ISSUER_ID_ENV: &str = "ASC_ISSUER_ID";
pub const PRIVATE_KEY_PATH_ENV: &str = "ASC_PRIVATE_KEY_PATH";

/// Name given to a credential supplied through the environment.
const ENV_CREDENTIAL_NAME: &str = "environment";

fn is_truthy(value: &str) -> bool {
	matches!(
		value.trim().to_ascii_lowercase().as_str(),
		"1" | "true" | "yes" | "on"
	)
}

/// Snapshot of the environment variables this crate honours.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
	pub config_path: Option<PathBuf>,
	pub bypass_keyring: bool,
	pub profile: Option<String>,
	pub key_id: Option<String>,
	pub issuer_id: Option<String>,
	pub private_key_path: Option<String>,
}

impl EnvOverrides {
	/// Read the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Build from an arbitrary lookup. Empty values count as unset.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let get = |key: &str| {
			lookup(key)
				.map(|v| v.trim().to_string())
				.filter(|v| !v.is_empty())
		};

		let overrides = Self {
			config_path: get(CONFIG_PATH_ENV).map(PathBuf::from),
			bypass_keyring: get(BYPASS_KEYRING_ENV).is_some_and(|v| is_truthy(&v)),
			profile: get(PROFILE_ENV),
			key_id: get(KEY_ID_ENV),
			issuer_id: get(ISSUER_ID_ENV),
			private_key_path: get(PRIVATE_KEY_PATH_ENV),
		};
		trace!(?overrides, "loaded environment overrides");
		overrides
	}

	/// The credential supplied through `ASC_KEY_ID`, `ASC_ISSUER_ID` and
	/// `ASC_PRIVATE_KEY_PATH`.
	///
	/// `None` when none of them is set. A partial set is `Incomplete`
	/// rather than being mixed with stored values.
	pub fn credential(&self) -> Result<Option<Credential>, CredentialError> {
		if self.key_id.is_none() && self.issuer_id.is_none() && self.private_key_path.is_none() {
			return Ok(None);
		}

		let payload = CredentialPayload::new(
			self.key_id.clone().unwrap_or_default(),
			self.issuer_id.clone().unwrap_or_default(),
			self.private_key_path.clone().unwrap_or_default(),
		);
		payload.ensure_complete(ENV_CREDENTIAL_NAME)?;

		let mut credential =
			Credential::new(ENV_CREDENTIAL_NAME, payload, CredentialSource::Environment);
		credential.is_default = true;
		Ok(Some(credential))
	}
}
