// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use asc_cli_credentials::{
	Credential, CredentialManager, CredentialPayload, CredentialSource, EnvOverrides,
};

use crate::error::{AuthError, KeyError};
use crate::jwt::{AuthToken, Es256TokenIssuer, TokenIssuer};
use crate::key::{self, PrivateKey};

/// Load and check a key file off the async runtime.
async fn load_key(path: &Path) -> Result<PrivateKey, AuthError> {
	let path = path.to_path_buf();
	let task_path = path.clone();
	let loaded = tokio::task::spawn_blocking(move || key::load(&task_path))
		.await
		.map_err(|e| KeyError::Io {
			path,
			source: std::io::Error::other(e),
		})?;
	Ok(loaded?)
}

/// The entry points commands use to authenticate: store a credential,
/// resolve the active one, and produce a token for an API call.
#[derive(Debug, Clone)]
pub struct Authenticator {
	credentials: CredentialManager,
	issuer: Arc<dyn TokenIssuer>,
	env: EnvOverrides,
}

impl Authenticator {
	pub fn new(credentials: CredentialManager, issuer: Arc<dyn TokenIssuer>, env: EnvOverrides) -> Self {
		Self {
			credentials,
			issuer,
			env,
		}
	}

	/// Production wiring from the process environment.
	#[cfg(feature = "keyring")]
	pub fn from_env() -> Result<Self, AuthError> {
		let env = EnvOverrides::from_env();
		let credentials = CredentialManager::from_env(&env)?;
		Ok(Self::new(
			credentials,
			Arc::new(Es256TokenIssuer::default()),
			env,
		))
	}

	/// Same as [`Authenticator::new`] with the default ES256 issuer.
	pub fn with_default_issuer(credentials: CredentialManager, env: EnvOverrides) -> Self {
		Self::new(credentials, Arc::new(Es256TokenIssuer::default()), env)
	}

	pub fn credentials(&self) -> &CredentialManager {
		&self.credentials
	}

	/// Validate the key file, then persist the credential as the default.
	#[instrument(skip_all, fields(name = %name))]
	pub async fn store_credential(
		&self,
		name: &str,
		payload: &CredentialPayload,
	) -> Result<CredentialSource, AuthError> {
		payload.ensure_complete(name)?;
		load_key(&payload.private_key_path).await?;
		Ok(self.credentials.store(name, payload).await?)
	}

	/// The credential for this invocation, with its key file validated.
	///
	/// Order: the explicit name, then a credential supplied through the
	/// environment, then `ASC_PROFILE`, then the stored default.
	#[instrument(skip_all, fields(name = ?name))]
	pub async fn resolve_active(&self, name: Option<&str>) -> Result<Credential, AuthError> {
		let credential = self.resolve_unchecked(name).await?;
		load_key(&credential.private_key_path).await?;
		Ok(credential)
	}

	/// Resolve the active credential and sign a token with its key.
	#[instrument(skip_all, fields(name = ?name))]
	pub async fn token(&self, name: Option<&str>) -> Result<(Credential, AuthToken), AuthError> {
		let credential = self.resolve_unchecked(name).await?;
		let private_key = load_key(&credential.private_key_path).await?;
		let token = self
			.issuer
			.issue(&credential.key_id, &credential.issuer_id, &private_key)?;
		debug!(credential = %credential.name, source = %credential.source, "issued token");
		Ok((credential, token))
	}

	async fn resolve_unchecked(&self, name: Option<&str>) -> Result<Credential, AuthError> {
		if let Some(name) = name {
			return Ok(self.credentials.resolve(Some(name)).await?);
		}
		if let Some(credential) = self.env.credential()? {
			debug!("using credential from environment");
			return Ok(credential);
		}
		if let Some(profile) = self.env.profile.as_deref() {
			return Ok(self.credentials.resolve(Some(profile)).await?);
		}
		Ok(self.credentials.resolve(None).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TokenError;
	use crate::key::test_support::{generate, pkcs8_pem, write_key};
	use asc_cli_credentials::{ConfigFileStore, CredentialError, MemoryBackend};
	use std::sync::Mutex;
	use std::time::SystemTime;
	use tempfile::TempDir;

	#[derive(Debug, Default)]
	struct FakeIssuer {
		calls: Mutex<Vec<(String, String)>>,
	}

	impl TokenIssuer for FakeIssuer {
		fn issue(
			&self,
			key_id: &str,
			issuer_id: &str,
			_key: &PrivateKey,
		) -> Result<AuthToken, TokenError> {
			self
				.calls
				.lock()
				.unwrap()
				.push((key_id.to_string(), issuer_id.to_string()));
			Ok(AuthToken::new(format!("fake.{key_id}"), SystemTime::now()))
		}
	}

	struct Fixture {
		dir: TempDir,
		keyring: Arc<MemoryBackend>,
		issuer: Arc<FakeIssuer>,
	}

	impl Fixture {
		fn new() -> Self {
			Self {
				dir: tempfile::tempdir().unwrap(),
				keyring: Arc::new(MemoryBackend::new()),
				issuer: Arc::new(FakeIssuer::default()),
			}
		}

		fn key(&self, name: &str, mode: u32) -> std::path::PathBuf {
			write_key(self.dir.path(), name, &pkcs8_pem(&generate()), mode)
		}

		fn authenticator(&self, env: EnvOverrides) -> Authenticator {
			let manager = CredentialManager::new(
				self.keyring.clone(),
				Arc::new(MemoryBackend::new()),
				ConfigFileStore::new(self.dir.path().join("config.json")),
			);
			Authenticator::new(manager, self.issuer.clone(), env)
		}
	}

	fn payload(key_id: &str, path: &Path) -> CredentialPayload {
		CredentialPayload::new(key_id, "ISS1", path)
	}

	#[tokio::test]
	async fn test_store_then_token_uses_default() {
		let fx = Fixture::new();
		let auth = fx.authenticator(EnvOverrides::default());
		let key = fx.key("work.p8", 0o600);

		let source = auth.store_credential("work", &payload("KEY1", &key)).await.unwrap();
		assert_eq!(source, CredentialSource::Keyring);

		let (credential, token) = auth.token(None).await.unwrap();
		assert_eq!(credential.name, "work");
		assert_eq!(token.expose(), "fake.KEY1");
		assert_eq!(
			fx.issuer.calls.lock().unwrap().as_slice(),
			[("KEY1".to_string(), "ISS1".to_string())]
		);
	}

	#[tokio::test]
	async fn test_store_rejects_invalid_key_before_writing() {
		let fx = Fixture::new();
		let auth = fx.authenticator(EnvOverrides::default());
		let missing = fx.dir.path().join("missing.p8");

		let err = auth
			.store_credential("work", &payload("KEY1", &missing))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::Key(KeyError::NotFound(_))));
		assert_eq!(fx.keyring.writes(), 0);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_resolve_fails_closed_on_loosened_permissions() {
		let fx = Fixture::new();
		let auth = fx.authenticator(EnvOverrides::default());
		let key = fx.key("work.p8", 0o600);
		auth.store_credential("work", &payload("KEY1", &key)).await.unwrap();

		{
			use std::os::unix::fs::PermissionsExt;
			std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o644)).unwrap();
		}

		let err = auth.resolve_active(None).await.unwrap_err();
		assert!(matches!(err, AuthError::Key(KeyError::InsecurePermissions { .. })));
		assert!(auth.token(None).await.is_err());
		assert!(fx.issuer.calls.lock().unwrap().is_empty());
	}

	#[tokio::test(flavor = "current_thread")]
	async fn test_key_checks_run_on_single_threaded_runtime() {
		let fx = Fixture::new();
		let auth = fx.authenticator(EnvOverrides::default());
		let key = fx.key("work.p8", 0o600);
		auth.store_credential("work", &payload("KEY1", &key)).await.unwrap();

		let directory = fx.dir.path().to_path_buf();
		let err = auth
			.store_credential("bad", &payload("KEY2", &directory))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::Key(KeyError::IsDirectory(_))));

		let (credential, _) = auth.token(Some("work")).await.unwrap();
		assert_eq!(credential.name, "work");
	}

	#[tokio::test]
	async fn test_explicit_name_beats_environment() {
		let fx = Fixture::new();
		let work = fx.key("work.p8", 0o600);
		let env_key = fx.key("env.p8", 0o600);
		let env = EnvOverrides {
			key_id: Some("ENVKEY".into()),
			issuer_id: Some("ENVISS".into()),
			private_key_path: Some(env_key.to_string_lossy().into_owned()),
			..Default::default()
		};
		let auth = fx.authenticator(env);
		auth.store_credential("work", &payload("KEY1", &work)).await.unwrap();

		let from_env = auth.resolve_active(None).await.unwrap();
		assert_eq!(from_env.source, CredentialSource::Environment);
		assert_eq!(from_env.key_id, "ENVKEY");

		let explicit = auth.resolve_active(Some("work")).await.unwrap();
		assert_eq!(explicit.key_id, "KEY1");
	}

	#[tokio::test]
	async fn test_profile_selects_named_credential() {
		let fx = Fixture::new();
		let work = fx.key("work.p8", 0o600);
		let personal = fx.key("personal.p8", 0o600);
		let env = EnvOverrides {
			profile: Some("personal".into()),
			..Default::default()
		};
		let auth = fx.authenticator(env);
		auth.store_credential("personal", &payload("KEY2", &personal)).await.unwrap();
		auth.store_credential("work", &payload("KEY1", &work)).await.unwrap();

		let credential = auth.resolve_active(None).await.unwrap();
		assert_eq!(credential.name, "personal");
		assert!(!credential.is_default);
	}

	#[tokio::test]
	async fn test_nothing_stored_is_not_found() {
		let fx = Fixture::new();
		let auth = fx.authenticator(EnvOverrides::default());
		let err = auth.token(None).await.unwrap_err();
		assert!(matches!(err, AuthError::Credential(ref e) if e.is_not_found()));
	}

	#[tokio::test]
	async fn test_partial_environment_is_incomplete() {
		let fx = Fixture::new();
		let env = EnvOverrides {
			key_id: Some("ENVKEY".into()),
			..Default::default()
		};
		let auth = fx.authenticator(env);
		let err = auth.resolve_active(None).await.unwrap_err();
		assert!(matches!(
			err,
			AuthError::Credential(CredentialError::Incomplete { .. })
		));
	}
}
