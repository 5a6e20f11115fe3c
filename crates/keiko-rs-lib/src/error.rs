//! Library error type.
//!
//! Only run-fatal problems end up here, per-package failures are reported inside
//! [`crate::resolver::ResolutionResult`].

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("reqwest error: {0}")]
	Reqwest(#[from] reqwest::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("TOML error: {0}")]
	Toml(#[from] toml_edit::TomlError),
	#[error("parsing error: {0}")]
	Parse(#[from] crate::package::ParseError),
	#[error("registry error: {0}")]
	Registry(#[from] crate::registry::RegistryError),
	#[error("manifest error: {0}")]
	Manifest(String),
	#[error("config error: {0}")]
	Config(String),
}
