// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication for App Store Connect API calls.
//!
//! - [`key`]: validates and loads the `.p8` ECDSA private key from disk
//! - [`jwt`]: signs short-lived ES256 bearer tokens
//! - [`Authenticator`]: the three entry points the rest of the CLI uses
//!   (store a credential, resolve the active one, produce a token)

mod authenticator;
mod error;
pub mod jwt;
pub mod key;

pub use authenticator::Authenticator;
pub use error::{AuthError, KeyError, TokenError};
pub use jwt::{AuthToken, Es256TokenIssuer, TokenIssuer};
pub use key::{KeyEncoding, PrivateKey};
