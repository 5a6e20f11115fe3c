//! Package metadata the resolver consumes.
//!
//! The resolver only knows the [`Registry`] trait. [`PypiRegistry`] is the network implementation,
//! [`MetadataCache`] wraps any registry for the duration of a single resolution run.

use async_trait::async_trait;

use crate::package::*;

mod pypi;
pub use pypi::PypiRegistry;
pub use pypi::DEFAULT_INDEX_URL;

mod cache;
pub use cache::MetadataCache;

/// Registry layer failures. These are recorded against a single package and never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	#[error("package `{0}` not found in the registry")]
	PackageNotFound(CanonicalName),
	#[error("metadata for `{name}` unavailable: {reason}")]
	MetadataUnavailable {
		name: CanonicalName,
		/// `None` when the version list itself couldn't be fetched.
		version: Option<Version>,
		reason: String,
	},
}

/// Source of published versions and their declared dependencies.
#[async_trait]
pub trait Registry: Send + Sync {
	/// Every published version of `name` in ascending order.
	async fn list_versions(&self, name: &CanonicalName) -> Result<Vec<Version>, RegistryError>;

	/// The dependencies declared by exactly `version` of `name`.
	async fn get_dependencies(&self, name: &CanonicalName, version: &Version) -> Result<Vec<Requirement>, RegistryError>;
}
