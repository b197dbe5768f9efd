// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ES256 bearer tokens for App Store Connect API requests.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use zeroize::Zeroize;

use crate::error::TokenError;
use crate::key::PrivateKey;

/// Audience claim expected by the API.
pub const AUDIENCE: &str = "appstoreconnect-v1";

pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// Tokens with a longer lifetime are rejected by the API.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
	pub iss: String,
	pub iat: u64,
	pub exp: u64,
	pub aud: String,
}

/// A signed bearer token. The value is wiped from memory on drop.
pub struct AuthToken {
	value: String,
	expires_at: SystemTime,
}

impl AuthToken {
	pub fn new(value: impl Into<String>, expires_at: SystemTime) -> Self {
		Self {
			value: value.into(),
			expires_at,
		}
	}

	/// The raw token, for the `Authorization: Bearer` header.
	pub fn expose(&self) -> &str {
		&self.value
	}

	pub fn expires_at(&self) -> SystemTime {
		self.expires_at
	}

	pub fn is_expired(&self) -> bool {
		SystemTime::now() >= self.expires_at
	}
}

impl fmt::Debug for AuthToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuthToken")
			.field("value", &"[REDACTED]")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

impl fmt::Display for AuthToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("[REDACTED]")
	}
}

impl Drop for AuthToken {
	fn drop(&mut self) {
		self.value.zeroize();
	}
}

/// Signs tokens for one API call. Swappable so credential tests never
/// depend on real signing.
pub trait TokenIssuer: Send + Sync + fmt::Debug {
	fn issue(&self, key_id: &str, issuer_id: &str, key: &PrivateKey)
		-> Result<AuthToken, TokenError>;
}

#[derive(Debug, Clone)]
pub struct Es256TokenIssuer {
	lifetime: Duration,
}

impl Default for Es256TokenIssuer {
	fn default() -> Self {
		Self {
			lifetime: DEFAULT_TOKEN_LIFETIME,
		}
	}
}

impl Es256TokenIssuer {
	/// Issuer with a custom lifetime, between one second and
	/// [`MAX_TOKEN_LIFETIME`].
	pub fn with_lifetime(lifetime: Duration) -> Result<Self, TokenError> {
		if lifetime.as_secs() == 0 || lifetime > MAX_TOKEN_LIFETIME {
			return Err(TokenError::InvalidLifetime {
				got: lifetime.as_secs(),
				max: MAX_TOKEN_LIFETIME.as_secs(),
			});
		}
		Ok(Self { lifetime })
	}

	pub fn lifetime(&self) -> Duration {
		self.lifetime
	}
}

impl TokenIssuer for Es256TokenIssuer {
	#[instrument(skip(self, key), fields(lifetime_secs = self.lifetime.as_secs()))]
	fn issue(
		&self,
		key_id: &str,
		issuer_id: &str,
		key: &PrivateKey,
	) -> Result<AuthToken, TokenError> {
		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|e| TokenError::Clock(e.to_string()))?;

		let iat = now.as_secs();
		let exp = iat + self.lifetime.as_secs();

		let claims = Claims {
			iss: issuer_id.to_string(),
			iat,
			exp,
			aud: AUDIENCE.to_string(),
		};

		let mut header = Header::new(Algorithm::ES256);
		header.kid = Some(key_id.to_string());
		header.typ = Some("JWT".to_string());

		let der = key
			.to_pkcs8_der()
			.map_err(|e| TokenError::Jwt(format!("Failed to encode signing key: {e}")))?;
		let encoding_key = EncodingKey::from_ec_der(der.as_bytes());

		let token = encode(&header, &claims, &encoding_key)
			.map_err(|e| TokenError::Jwt(format!("Failed to encode JWT: {e}")))?;

		debug!(key_id = %key_id, exp = exp, "Generated API token");

		Ok(AuthToken::new(token, UNIX_EPOCH + Duration::from_secs(exp)))
	}
}
