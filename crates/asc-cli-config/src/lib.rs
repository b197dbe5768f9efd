// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration file handling for the asc CLI.
//!
//! This crate provides:
//! - Config path resolution (`ASC_CONFIG_PATH` override, then `<home>/.asc/config.json`)
//! - A JSON config model that keeps unknown settings intact across rewrites
//! - Atomic, owner-only writes

pub mod error;
pub mod file;
pub mod paths;

pub use error::ConfigError;
pub use file::ConfigFile;
pub use paths::{resolve_config_path_from, CONFIG_PATH_ENV};
