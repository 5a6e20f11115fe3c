//! Various helpers for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use keiko_rs::package::*;
use keiko_rs::registry::*;

#[derive(Debug, Default)]
struct MockPackage {
	releases: BTreeMap<Version, Result<Vec<Requirement>, String>>,
	versions_failure: Option<String>,
	delay: Option<Duration>,
}

/// In-memory [`Registry`] that records every call made to it.
#[derive(Debug, Default)]
pub struct MockRegistry {
	packages: HashMap<CanonicalName, MockPackage>,
	version_calls: Mutex<HashMap<CanonicalName, usize>>,
	dependency_calls: Mutex<HashMap<(CanonicalName, Version), usize>>,
}

impl MockRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Publishes `version` of `name` declaring `dependencies`.
	pub fn add_release(&mut self, name: &str, version: &str, dependencies: &[&str]) -> Result<&mut Self, ParseError> {
		let version = Version::parse(version)?;
		let dependencies = dependencies.iter()
			.map(|d| Requirement::parse(d))
			.collect::<Result<Vec<_>, _>>()?;
		self.package(name).releases.insert(version, Ok(dependencies));
		Ok(self)
	}

	/// Publishes several dependency free versions of `name`.
	pub fn add_versions(&mut self, name: &str, versions: &[&str]) -> Result<&mut Self, ParseError> {
		for version in versions {
			self.add_release(name, version, &[])?;
		}
		Ok(self)
	}

	/// Makes the version list of `name` fail as if the index was unreachable.
	pub fn fail_versions(&mut self, name: &str, reason: &str) -> &mut Self {
		self.package(name).versions_failure = Some(reason.to_string());
		self
	}

	/// Publishes `version` of `name` but makes its dependency metadata unavailable.
	pub fn fail_dependencies(&mut self, name: &str, version: &str, reason: &str) -> Result<&mut Self, ParseError> {
		let version = Version::parse(version)?;
		self.package(name).releases.insert(version, Err(reason.to_string()));
		Ok(self)
	}

	/// Delays every response about `name`, to shuffle completion order.
	pub fn delay(&mut self, name: &str, delay: Duration) -> &mut Self {
		self.package(name).delay = Some(delay);
		self
	}

	pub fn version_calls(&self, name: &str) -> usize {
		lock(&self.version_calls).get(&normalize(name)).copied().unwrap_or(0)
	}

	pub fn dependency_calls(&self, name: &str, version: &str) -> usize {
		let Ok(version) = Version::parse(version) else { return 0 };
		lock(&self.dependency_calls).get(&(normalize(name), version)).copied().unwrap_or(0)
	}

	/// Largest number of times any single question was asked.
	pub fn max_repeated_calls(&self) -> usize {
		let versions = lock(&self.version_calls).values().copied().max().unwrap_or(0);
		let dependencies = lock(&self.dependency_calls).values().copied().max().unwrap_or(0);
		versions.max(dependencies)
	}

	/// Every package the registry was asked about.
	pub fn requested_packages(&self) -> HashSet<CanonicalName> {
		lock(&self.version_calls).keys().cloned().collect()
	}

	fn package(&mut self, name: &str) -> &mut MockPackage {
		self.packages.entry(normalize(name)).or_default()
	}

	async fn wait(&self, name: &CanonicalName) {
		if let Some(delay) = self.packages.get(name).and_then(|p| p.delay) {
			tokio::time::sleep(delay).await;
		}
	}
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl Registry for MockRegistry {
	async fn list_versions(&self, name: &CanonicalName) -> Result<Vec<Version>, RegistryError> {
		*lock(&self.version_calls).entry(name.clone()).or_default() += 1;
		self.wait(name).await;

		let package = self.packages.get(name).ok_or_else(|| RegistryError::PackageNotFound(name.clone()))?;
		if let Some(reason) = &package.versions_failure {
			return Err(RegistryError::MetadataUnavailable { name: name.clone(), version: None, reason: reason.clone() });
		}
		Ok(package.releases.keys().cloned().collect())
	}

	async fn get_dependencies(&self, name: &CanonicalName, version: &Version) -> Result<Vec<Requirement>, RegistryError> {
		*lock(&self.dependency_calls).entry((name.clone(), version.clone())).or_default() += 1;
		self.wait(name).await;

		let unavailable = |reason: &str| RegistryError::MetadataUnavailable { name: name.clone(), version: Some(version.clone()), reason: reason.to_string() };
		match self.packages.get(name).and_then(|p| p.releases.get(version)) {
			Some(Ok(dependencies)) => Ok(dependencies.clone()),
			Some(Err(reason)) => Err(unavailable(reason)),
			None => Err(unavailable("release not found")),
		}
	}
}

/// Writes `contents` to a `pyproject.toml` inside a fresh temporary directory.
///
/// The directory is removed when the returned handle is dropped.
pub fn write_manifest(contents: &str) -> std::io::Result<(tempfile::TempDir, PathBuf)> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("pyproject.toml");
	std::fs::write(&path, contents)?;
	Ok((dir, path))
}
