// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential storage and resolution for the asc CLI.
//!
//! A credential is a named App Store Connect API key: key id, issuer id and
//! the path of the `.p8` private key. Credentials live in exactly one of two
//! places:
//!
//! - **KeyringBackend**: the OS secret store, scoped by a namespace prefix
//! - **ConfigFileStore**: the owner-only JSON config file, used when the
//!   keyring is unavailable
//!
//! [`CredentialManager`] decides which one is authoritative, migrates entries
//! out of the legacy keyring namespace and tracks the default credential.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use asc_cli_credentials::{
//!     ConfigFileStore, CredentialManager, CredentialPayload, MemoryBackend,
//! };
//!
//! # tokio_test::block_on(async {
//! let manager = CredentialManager::new(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(MemoryBackend::new()),
//!     ConfigFileStore::new("/tmp/asc/config.json"),
//! );
//!
//! let payload = CredentialPayload::new("KEY1", "ISS1", "/secure/key.p8");
//! manager.store("work", &payload).await.unwrap();
//!
//! let active = manager.resolve(None).await.unwrap();
//! assert_eq!(active.name, "work");
//! # });
//! ```

mod env;
mod error;
mod manager;
mod store;
mod store_config;
#[cfg(feature = "keyring")]
mod store_keyring;
mod value;

pub use env::{
	EnvOverrides, BYPASS_KEYRING_ENV, ISSUER_ID_ENV, KEY_ID_ENV, PRIVATE_KEY_PATH_ENV, PROFILE_ENV,
};
pub use error::CredentialError;
pub use manager::CredentialManager;
pub use store::{CredentialBackend, MemoryBackend};
pub use store_config::ConfigFileStore;
#[cfg(feature = "keyring")]
pub use store_keyring::{KeyringBackend, LEGACY_NAMESPACE, NAMESPACE};
pub use value::{Credential, CredentialPayload, CredentialSource, PersistedCredential};
