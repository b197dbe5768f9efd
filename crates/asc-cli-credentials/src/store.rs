// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential storage backends.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CredentialError;
use crate::value::{Credential, CredentialPayload, CredentialSource};

/// Trait for credential storage backends.
///
/// A backend is a name-to-payload map. `get` and `remove` report
/// [`CredentialError::NotFound`] for absent names; a backend that does not
/// exist on this host reports [`CredentialError::Unavailable`] from every
/// operation.
#[async_trait]
pub trait CredentialBackend: Send + Sync + std::fmt::Debug {
	/// Which source credentials from this backend are tagged with.
	fn source(&self) -> CredentialSource;

	/// Check that the backend can hold entries on this host.
	async fn health_check(&self) -> Result<(), CredentialError> {
		self.list().await.map(|_| ())
	}

	/// Store a payload under `name`, replacing any existing entry.
	async fn put(&self, name: &str, payload: &CredentialPayload) -> Result<(), CredentialError>;

	/// Load the payload stored under `name`.
	async fn get(&self, name: &str) -> Result<CredentialPayload, CredentialError>;

	/// Every credential in this backend, sorted by name. `is_default` is left
	/// unset; the manager fills it in.
	async fn list(&self) -> Result<Vec<Credential>, CredentialError>;

	/// Delete the entry stored under `name`.
	async fn remove(&self, name: &str) -> Result<(), CredentialError>;

	/// Delete every entry in this backend.
	async fn remove_all(&self) -> Result<(), CredentialError>;
}

/// In-memory backend for testing.
///
/// Can be switched into an unavailable mode to stand in for a host without
/// an OS secret store, made to fail every call with a given error, and
/// counts successful writes.
#[derive(Debug)]
pub struct MemoryBackend {
	credentials: tokio::sync::RwLock<BTreeMap<String, CredentialPayload>>,
	available: AtomicBool,
	failure: Mutex<Option<CredentialError>>,
	writes: AtomicUsize,
}

impl Default for MemoryBackend {
	fn default() -> Self {
		Self {
			credentials: tokio::sync::RwLock::new(BTreeMap::new()),
			available: AtomicBool::new(true),
			failure: Mutex::new(None),
			writes: AtomicUsize::new(0),
		}
	}
}

impl MemoryBackend {
	/// Create a new empty in-memory backend.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a backend that reports [`CredentialError::Unavailable`].
	pub fn unavailable() -> Self {
		let backend = Self::default();
		backend.set_available(false);
		backend
	}

	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	/// Fail every subsequent call with `error`, or stop failing with `None`.
	pub fn fail_with(&self, error: Option<CredentialError>) {
		if let Ok(mut failure) = self.failure.lock() {
			*failure = error;
		}
	}

	/// Number of successful `put` calls so far.
	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	pub async fn contains(&self, name: &str) -> bool {
		self.credentials.read().await.contains_key(name)
	}

	fn check_available(&self) -> Result<(), CredentialError> {
		if let Some(error) = self.failure.lock().ok().and_then(|f| f.clone()) {
			return Err(error);
		}
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(CredentialError::Unavailable(
				"in-memory backend disabled".to_string(),
			))
		}
	}
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
	fn source(&self) -> CredentialSource {
		CredentialSource::Keyring
	}

	async fn put(&self, name: &str, payload: &CredentialPayload) -> Result<(), CredentialError> {
		self.check_available()?;
		let mut store = self.credentials.write().await;
		store.insert(name.to_string(), payload.clone());
		self.writes.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn get(&self, name: &str) -> Result<CredentialPayload, CredentialError> {
		self.check_available()?;
		let store = self.credentials.read().await;
		store
			.get(name)
			.cloned()
			.ok_or_else(|| CredentialError::NotFound(name.to_string()))
	}

	async fn list(&self) -> Result<Vec<Credential>, CredentialError> {
		self.check_available()?;
		let store = self.credentials.read().await;
		Ok(store
			.iter()
			.map(|(name, payload)| Credential::new(name.clone(), payload.clone(), self.source()))
			.collect())
	}

	async fn remove(&self, name: &str) -> Result<(), CredentialError> {
		self.check_available()?;
		let mut store = self.credentials.write().await;
		store
			.remove(name)
			.map(|_| ())
			.ok_or_else(|| CredentialError::NotFound(name.to_string()))
	}

	async fn remove_all(&self) -> Result<(), CredentialError> {
		self.check_available()?;
		self.credentials.write().await.clear();
		Ok(())
	}
}
