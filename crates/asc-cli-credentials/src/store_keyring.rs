// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OS secret store backend.
//!
//! Entries are keyed `"<namespace>:credential:<name>"`. OS keyrings cannot
//! enumerate their entries, so each namespace also keeps an index entry
//! `"<namespace>:index"` holding the JSON array of stored names.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::CredentialError;
use crate::store::CredentialBackend;
use crate::value::{Credential, CredentialPayload, CredentialSource, PersistedCredential};

/// Namespace for credentials written by this tool.
pub const NAMESPACE: &str = "asc";

/// Namespace used by earlier releases; only read for migration.
pub const LEGACY_NAMESPACE: &str = "asc-cli";

pub(crate) fn entry_key(namespace: &str, name: &str) -> String {
	format!("{namespace}:credential:{name}")
}

pub(crate) fn index_key(namespace: &str) -> String {
	format!("{namespace}:index")
}

fn scratch_key(namespace: &str) -> String {
	format!("{namespace}:health")
}

/// Parse a stored entry. Garbled data is an error, never skipped.
pub(crate) fn decode_entry(name: &str, data: &str) -> Result<CredentialPayload, CredentialError> {
	let persisted: PersistedCredential =
		serde_json::from_str(data).map_err(|e| CredentialError::Corrupt {
			name: name.to_string(),
			message: e.to_string(),
		})?;
	Ok(CredentialPayload::from(persisted))
}

pub(crate) fn decode_index(namespace: &str, data: &str) -> Result<BTreeSet<String>, CredentialError> {
	serde_json::from_str(data).map_err(|e| CredentialError::Corrupt {
		name: index_key(namespace),
		message: e.to_string(),
	})
}

fn map_keyring_error(op: &'static str, err: keyring::Error) -> CredentialError {
	match err {
		keyring::Error::NoStorageAccess(e) => CredentialError::Unavailable(format!("{op}: {e}")),
		keyring::Error::PlatformFailure(e) => CredentialError::Unavailable(format!("{op}: {e}")),
		other => CredentialError::backend(op, other),
	}
}

/// A write cannot miss an entry, so `NoEntry` here means the store has no
/// keyring to write into (e.g. keyutils without a session keyring).
fn map_write_error(op: &'static str, err: keyring::Error) -> CredentialError {
	match err {
		keyring::Error::NoEntry => {
			CredentialError::Unavailable(format!("{op}: no keyring available to hold the entry"))
		}
		other => map_keyring_error(op, other),
	}
}

/// Run a blocking keyring call off the async runtime.
async fn blocking<T, F>(op: &'static str, f: F) -> Result<T, CredentialError>
where
	T: Send + 'static,
	F: FnOnce() -> Result<T, CredentialError> + Send + 'static,
{
	tokio::task::spawn_blocking(f)
		.await
		.map_err(|e| CredentialError::backend(op, e))?
}

/// Blocking key/value access to one keyring service.
trait SecretStore {
	fn read(&self, op: &'static str, key: &str) -> Result<Option<String>, CredentialError>;

	fn write(&self, op: &'static str, key: &str, data: &str) -> Result<(), CredentialError>;

	/// Returns `false` when there was nothing to delete.
	fn delete(&self, op: &'static str, key: &str) -> Result<bool, CredentialError>;
}

struct OsKeyring<'a> {
	service: &'a str,
}

impl OsKeyring<'_> {
	fn entry(&self, op: &'static str, key: &str) -> Result<keyring::Entry, CredentialError> {
		keyring::Entry::new(self.service, key).map_err(|e| map_keyring_error(op, e))
	}
}

impl SecretStore for OsKeyring<'_> {
	fn read(&self, op: &'static str, key: &str) -> Result<Option<String>, CredentialError> {
		match self.entry(op, key)?.get_password() {
			Ok(data) => Ok(Some(data)),
			Err(keyring::Error::NoEntry) => Ok(None),
			Err(e) => Err(map_keyring_error(op, e)),
		}
	}

	/// Write and read back through a fresh handle. A store that does not
	/// persist across handles (mock or locked backend) counts as unavailable.
	fn write(&self, op: &'static str, key: &str, data: &str) -> Result<(), CredentialError> {
		self
			.entry(op, key)?
			.set_password(data)
			.map_err(|e| map_write_error(op, e))?;

		match self.read(op, key)? {
			Some(stored) if stored == data => Ok(()),
			Some(_) => Err(CredentialError::backend(
				op,
				"keyring verification failed: stored data mismatch",
			)),
			None => Err(CredentialError::Unavailable(format!(
				"{op}: keyring did not persist the entry"
			))),
		}
	}

	fn delete(&self, op: &'static str, key: &str) -> Result<bool, CredentialError> {
		match self.entry(op, key)?.delete_credential() {
			Ok(()) => Ok(true),
			Err(keyring::Error::NoEntry) => Ok(false),
			Err(e) => Err(map_keyring_error(op, e)),
		}
	}
}

fn read_index(store: &impl SecretStore, namespace: &str) -> Result<BTreeSet<String>, CredentialError> {
	match store.read("keyring list", &index_key(namespace))? {
		Some(data) => decode_index(namespace, &data),
		None => Ok(BTreeSet::new()),
	}
}

fn write_index(
	store: &impl SecretStore,
	namespace: &str,
	names: &BTreeSet<String>,
) -> Result<(), CredentialError> {
	let key = index_key(namespace);
	if names.is_empty() {
		store.delete("keyring index", &key)?;
		return Ok(());
	}
	let data = serde_json::to_string(names)?;
	store.write("keyring index", &key, &data)
}

/// Write an entry and list it in the index. A newly created entry is deleted
/// again if the index cannot be updated, so the namespace never holds an
/// entry that `list` and `remove_all` cannot see.
fn put_entry(
	store: &impl SecretStore,
	namespace: &str,
	name: &str,
	data: &str,
) -> Result<(), CredentialError> {
	const OP: &str = "keyring put";
	let key = entry_key(namespace, name);
	let existed = store.read(OP, &key)?.is_some();
	store.write(OP, &key, data)?;

	let indexed = read_index(store, namespace).and_then(|mut names| {
		if names.insert(name.to_string()) {
			write_index(store, namespace, &names)?;
		}
		Ok(())
	});

	if let Err(e) = indexed {
		if !existed {
			if let Err(rollback) = store.delete(OP, &key) {
				warn!(namespace = %namespace, name = %name, error = %rollback, "failed to roll back unindexed keyring entry");
			}
		}
		return Err(e);
	}
	Ok(())
}

fn list_entries(store: &impl SecretStore, namespace: &str) -> Result<Vec<Credential>, CredentialError> {
	let names = read_index(store, namespace)?;
	let mut credentials = Vec::with_capacity(names.len());
	for name in names {
		match store.read("keyring list", &entry_key(namespace, &name))? {
			Some(data) => {
				let payload = decode_entry(&name, &data)?;
				credentials.push(Credential::new(name, payload, CredentialSource::Keyring));
			}
			None => {
				warn!(namespace = %namespace, name = %name, "keyring index names a missing entry, skipping");
			}
		}
	}
	Ok(credentials)
}

fn remove_entry(store: &impl SecretStore, namespace: &str, name: &str) -> Result<(), CredentialError> {
	let existed = store.delete("keyring remove", &entry_key(namespace, name))?;

	let mut names = read_index(store, namespace)?;
	if names.remove(name) {
		write_index(store, namespace, &names)?;
	}

	if existed {
		Ok(())
	} else {
		Err(CredentialError::NotFound(name.to_string()))
	}
}

fn remove_entries(store: &impl SecretStore, namespace: &str) -> Result<usize, CredentialError> {
	let names = read_index(store, namespace)?;
	for name in &names {
		store.delete("keyring remove all", &entry_key(namespace, name))?;
	}
	store.delete("keyring remove all", &index_key(namespace))?;
	Ok(names.len())
}

#[derive(Debug, Clone)]
pub struct KeyringBackend {
	namespace: String,
	disabled: bool,
}

impl KeyringBackend {
	pub fn new(namespace: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			disabled: false,
		}
	}

	/// A disabled backend reports `Unavailable` without touching the OS.
	pub fn disabled(mut self, disabled: bool) -> Self {
		self.disabled = disabled;
		self
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	fn check_enabled(&self) -> Result<(), CredentialError> {
		if self.disabled {
			Err(CredentialError::Unavailable(format!(
				"keyring bypassed via {}",
				crate::env::BYPASS_KEYRING_ENV
			)))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl CredentialBackend for KeyringBackend {
	fn source(&self) -> CredentialSource {
		CredentialSource::Keyring
	}

	/// Reading an absent index succeeds even where nothing can be stored,
	/// so the check writes, verifies and deletes a scratch entry.
	async fn health_check(&self) -> Result<(), CredentialError> {
		self.check_enabled()?;
		let namespace = self.namespace.clone();

		blocking("keyring health check", move || {
			let store = OsKeyring { service: &namespace };
			let key = scratch_key(&namespace);
			store.write("keyring health check", &key, "ok")?;
			store.delete("keyring health check", &key)?;
			Ok(())
		})
		.await
	}

	async fn put(&self, name: &str, payload: &CredentialPayload) -> Result<(), CredentialError> {
		self.check_enabled()?;
		let namespace = self.namespace.clone();
		let name = name.to_string();
		let data = serde_json::to_string(&PersistedCredential::new(&name, payload))?;

		blocking("keyring put", move || {
			put_entry(&OsKeyring { service: &namespace }, &namespace, &name, &data)?;
			debug!(namespace = %namespace, name = %name, "stored credential in keyring");
			Ok(())
		})
		.await
	}

	async fn get(&self, name: &str) -> Result<CredentialPayload, CredentialError> {
		self.check_enabled()?;
		let namespace = self.namespace.clone();
		let name = name.to_string();

		blocking("keyring get", move || {
			let store = OsKeyring { service: &namespace };
			match store.read("keyring get", &entry_key(&namespace, &name))? {
				Some(data) => decode_entry(&name, &data),
				None => Err(CredentialError::NotFound(name)),
			}
		})
		.await
	}

	async fn list(&self) -> Result<Vec<Credential>, CredentialError> {
		self.check_enabled()?;
		let namespace = self.namespace.clone();

		blocking("keyring list", move || {
			list_entries(&OsKeyring { service: &namespace }, &namespace)
		})
		.await
	}

	async fn remove(&self, name: &str) -> Result<(), CredentialError> {
		self.check_enabled()?;
		let namespace = self.namespace.clone();
		let name = name.to_string();

		blocking("keyring remove", move || {
			remove_entry(&OsKeyring { service: &namespace }, &namespace, &name)?;
			debug!(namespace = %namespace, name = %name, "removed credential from keyring");
			Ok(())
		})
		.await
	}

	async fn remove_all(&self) -> Result<(), CredentialError> {
		self.check_enabled()?;
		let namespace = self.namespace.clone();

		blocking("keyring remove all", move || {
			let count = remove_entries(&OsKeyring { service: &namespace }, &namespace)?;
			debug!(namespace = %namespace, count = count, "removed all credentials from keyring");
			Ok(())
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::BTreeMap;
	use std::sync::Mutex;

	/// Keyring stand-in whose writes to one key can be made to fail.
	#[derive(Default)]
	struct FakeKeyring {
		entries: Mutex<BTreeMap<String, String>>,
		fail_writes_to: Option<String>,
	}

	impl FakeKeyring {
		fn failing_writes_to(key: String) -> Self {
			Self {
				fail_writes_to: Some(key),
				..Default::default()
			}
		}

		fn has(&self, key: &str) -> bool {
			self.entries.lock().unwrap().contains_key(key)
		}
	}

	impl SecretStore for FakeKeyring {
		fn read(&self, _op: &'static str, key: &str) -> Result<Option<String>, CredentialError> {
			Ok(self.entries.lock().unwrap().get(key).cloned())
		}

		fn write(&self, op: &'static str, key: &str, data: &str) -> Result<(), CredentialError> {
			if self.fail_writes_to.as_deref() == Some(key) {
				return Err(CredentialError::Unavailable(format!("{op}: locked")));
			}
			self.entries.lock().unwrap().insert(key.to_string(), data.to_string());
			Ok(())
		}

		fn delete(&self, _op: &'static str, key: &str) -> Result<bool, CredentialError> {
			Ok(self.entries.lock().unwrap().remove(key).is_some())
		}
	}

	fn persisted(key_id: &str) -> String {
		let payload = CredentialPayload::new(key_id, "ISS1", "/secure/key.p8");
		serde_json::to_string(&PersistedCredential::new("work", &payload)).unwrap()
	}

	#[test]
	fn test_entry_key_format() {
		assert_eq!(entry_key(NAMESPACE, "work"), "asc:credential:work");
		assert_eq!(index_key(LEGACY_NAMESPACE), "asc-cli:index");
	}

	#[test]
	fn test_decode_entry() {
		let data = r#"{"key_id":"KEY1","issuer_id":"ISS1","private_key_path":"/secure/key.p8","label":"x"}"#;
		let payload = decode_entry("work", data).unwrap();
		assert_eq!(payload, CredentialPayload::new("KEY1", "ISS1", "/secure/key.p8"));
	}

	#[test]
	fn test_corrupt_entry_surfaces_error() {
		let err = decode_entry("work", "not json at all").unwrap_err();
		assert!(matches!(err, CredentialError::Corrupt { ref name, .. } if name == "work"));
	}

	#[test]
	fn test_corrupt_index_surfaces_error() {
		let err = decode_index(NAMESPACE, "{\"oops\": 1}").unwrap_err();
		assert!(matches!(err, CredentialError::Corrupt { ref name, .. } if name == "asc:index"));
	}

	#[test]
	fn test_no_storage_access_is_unavailable() {
		let err = map_keyring_error(
			"keyring put",
			keyring::Error::NoStorageAccess(Box::new(std::io::Error::other("no daemon"))),
		);
		assert!(err.is_unavailable());

		let err = map_keyring_error("keyring put", keyring::Error::TooLong("user".into(), 255));
		assert!(!err.is_unavailable());
	}

	#[test]
	fn test_no_entry_on_write_is_unavailable() {
		let err = map_write_error("keyring put", keyring::Error::NoEntry);
		assert!(err.is_unavailable(), "unexpected error: {err}");

		let err = map_write_error("keyring put", keyring::Error::TooLong("user".into(), 255));
		assert!(matches!(err, CredentialError::Backend { op: "keyring put", .. }));
	}

	#[test]
	fn test_put_list_remove_maintain_index() {
		let store = FakeKeyring::default();
		put_entry(&store, NAMESPACE, "work", &persisted("KEY1")).unwrap();
		put_entry(&store, NAMESPACE, "personal", &persisted("KEY2")).unwrap();

		let names: Vec<String> = list_entries(&store, NAMESPACE)
			.unwrap()
			.into_iter()
			.map(|c| c.name)
			.collect();
		assert_eq!(names, ["personal", "work"]);

		remove_entry(&store, NAMESPACE, "work").unwrap();
		assert!(remove_entry(&store, NAMESPACE, "work").unwrap_err().is_not_found());
		assert_eq!(list_entries(&store, NAMESPACE).unwrap().len(), 1);

		assert_eq!(remove_entries(&store, NAMESPACE).unwrap(), 1);
		assert!(store.entries.lock().unwrap().is_empty());
	}

	#[test]
	fn test_failed_index_write_rolls_back_new_entry() {
		let store = FakeKeyring::failing_writes_to(index_key(NAMESPACE));

		let err = put_entry(&store, NAMESPACE, "work", &persisted("KEY1")).unwrap_err();
		assert!(err.is_unavailable());
		assert!(!store.has(&entry_key(NAMESPACE, "work")));
		assert!(list_entries(&store, NAMESPACE).unwrap().is_empty());
	}

	#[test]
	fn test_failed_index_write_keeps_existing_entry() {
		let store = FakeKeyring::failing_writes_to(index_key(NAMESPACE));
		let key = entry_key(NAMESPACE, "work");
		store.entries.lock().unwrap().insert(key.clone(), persisted("OLD"));

		assert!(put_entry(&store, NAMESPACE, "work", &persisted("KEY1")).is_err());
		assert!(store.has(&key));
	}

	#[test]
	fn test_index_naming_missing_entry_is_skipped() {
		let store = FakeKeyring::default();
		put_entry(&store, NAMESPACE, "work", &persisted("KEY1")).unwrap();
		store.entries.lock().unwrap().remove(&entry_key(NAMESPACE, "work"));

		assert!(list_entries(&store, NAMESPACE).unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_disabled_backend_is_unavailable() {
		let backend = KeyringBackend::new(NAMESPACE).disabled(true);
		let payload = CredentialPayload::new("KEY1", "ISS1", "/secure/key.p8");

		assert!(backend.health_check().await.unwrap_err().is_unavailable());
		assert!(backend.put("work", &payload).await.unwrap_err().is_unavailable());
		assert!(backend.list().await.unwrap_err().is_unavailable());
		assert!(backend.remove_all().await.unwrap_err().is_unavailable());
	}

	#[tokio::test]
	async fn test_non_persisting_keyring_is_unavailable() {
		// The mock builder keeps secrets per handle, like a store that
		// accepts writes but cannot persist them.
		keyring::set_default_credential_builder(keyring::mock::default_credential_builder());

		let backend = KeyringBackend::new("asc-test-mock");
		let payload = CredentialPayload::new("KEY1", "ISS1", "/secure/key.p8");

		let err = backend.put("work", &payload).await.unwrap_err();
		assert!(err.is_unavailable(), "unexpected error: {err}");
		assert!(backend.health_check().await.unwrap_err().is_unavailable());
	}

	proptest! {
		#[test]
		fn entry_keys_stay_in_namespace(name in "[a-zA-Z0-9_.-]{1,40}") {
			let key = entry_key(NAMESPACE, &name);
			prop_assert!(key.starts_with("asc:credential:"));
			prop_assert!(key.ends_with(&name));
		}

		#[test]
		fn namespaces_never_collide(name in "[a-zA-Z0-9_.-]{1,40}") {
			prop_assert_ne!(entry_key(NAMESPACE, &name), entry_key(LEGACY_NAMESPACE, &name));
			prop_assert_ne!(entry_key(NAMESPACE, &name), index_key(NAMESPACE));
			prop_assert_ne!(entry_key(NAMESPACE, &name), scratch_key(NAMESPACE));
		}
	}
}
