use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::*;

type VersionsEntry = Result<Arc<[Version]>, RegistryError>;
type DependenciesEntry = Result<Arc<[Requirement]>, RegistryError>;

/// Memoizes registry responses, failures included, for one resolution run.
///
/// Owned by whoever drives the run and dropped with it, nothing is shared between runs.
pub struct MetadataCache<'r, R: Registry + ?Sized> {
	registry: &'r R,
	versions: Mutex<HashMap<CanonicalName, VersionsEntry>>,
	dependencies: Mutex<HashMap<(CanonicalName, Version), DependenciesEntry>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
	/* The maps are only ever inserted into, a poisoned one is still consistent */
	m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<'r, R: Registry + ?Sized> MetadataCache<'r, R> {
	pub fn new(registry: &'r R) -> Self {
		Self {
			registry,
			versions: Default::default(),
			dependencies: Default::default(),
		}
	}

	pub async fn versions(&self, name: &CanonicalName) -> VersionsEntry {
		let cached = lock(&self.versions).get(name).cloned();
		if let Some(hit) = cached {
			log::debug!("Version list of {} served from cache", name);
			return hit;
		}

		let fetched = self.registry.list_versions(name).await.map(Arc::from);
		lock(&self.versions).insert(name.clone(), fetched.clone());
		fetched
	}

	pub async fn dependencies(&self, name: &CanonicalName, version: &Version) -> DependenciesEntry {
		let key = (name.clone(), version.clone());
		let cached = lock(&self.dependencies).get(&key).cloned();
		if let Some(hit) = cached {
			log::debug!("Dependencies of {} {} served from cache", name, version);
			return hit;
		}

		let fetched = self.registry.get_dependencies(name, version).await.map(Arc::from);
		lock(&self.dependencies).insert(key, fetched.clone());
		fetched
	}
}
