// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Config file path resolution.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::ConfigError;

/// Environment variable that forces the config file location.
pub const CONFIG_PATH_ENV: &str = "ASC_CONFIG_PATH";

/// Directory under `$HOME` holding the config file.
pub const CONFIG_DIR_NAME: &str = ".asc";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Resolve the config file path.
///
/// A non-empty `override_path` (the value of `ASC_CONFIG_PATH`) wins;
/// otherwise the file lives at `<home>/.asc/config.json`.
pub fn resolve_config_path_from(
	override_path: Option<OsString>,
	home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
	if let Some(path) = override_path.filter(|p| !p.is_empty()) {
		let path = PathBuf::from(path);
		tracing::debug!(path = %path.display(), "config path overridden by {CONFIG_PATH_ENV}");
		return Ok(path);
	}

	let home = home.ok_or(ConfigError::HomeDirNotFound)?;
	Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_override_wins() {
		let path = resolve_config_path_from(
			Some(OsString::from("/tmp/custom.json")),
			Some(PathBuf::from("/home/user")),
		)
		.unwrap();
		assert_eq!(path, PathBuf::from("/tmp/custom.json"));
	}

	#[test]
	fn test_empty_override_is_ignored() {
		let path =
			resolve_config_path_from(Some(OsString::new()), Some(PathBuf::from("/home/user"))).unwrap();
		assert_eq!(path, PathBuf::from("/home/user/.asc/config.json"));
	}

	#[test]
	fn test_home_default() {
		let path = resolve_config_path_from(None, Some(PathBuf::from("/home/user"))).unwrap();
		assert!(path.ends_with(".asc/config.json"));
	}

	#[test]
	fn test_missing_home_is_an_error() {
		let result = resolve_config_path_from(None, None);
		assert!(matches!(result, Err(ConfigError::HomeDirNotFound)));
	}
}
