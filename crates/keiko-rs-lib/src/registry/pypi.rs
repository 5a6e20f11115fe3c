//! PyPI's JSON API.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::*;

use super::*;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

/// [`Registry`] backed by a PyPI compatible JSON index.
#[derive(Debug, Clone)]
pub struct PypiRegistry {
	client: reqwest::Client,
	index_url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectDocument {
	info: ProjectInfo,
	/// Only present on the project document, not on a single release.
	#[serde(default)]
	releases: HashMap<String, Vec<ReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
	#[serde(default)]
	requires_dist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
	#[serde(default)]
	yanked: bool,
}

impl PypiRegistry {
	pub fn new(options: &crate::KeikoOptions) -> crate::Result<Self> {
		let client = reqwest::Client::builder()
			.user_agent(options.user_agent())
			.timeout(options.timeout())
			.https_only(options.https_only())
			.build()?;
		Ok(Self::with_client(client, options.index_url()))
	}

	pub fn with_client(client: reqwest::Client, index_url: &str) -> Self {
		Self { client, index_url: index_url.trim_end_matches('/').to_string() }
	}

	pub fn index_url(&self) -> &str {
		&self.index_url
	}

	async fn fetch_document(&self, url: &str, name: &CanonicalName, version: Option<&Version>) -> Result<ProjectDocument, RegistryError> {
		let unavailable = |reason: String| RegistryError::MetadataUnavailable { name: name.clone(), version: version.cloned(), reason };

		log::debug!("Fetching {}", url);
		let response = self.client.get(url).send().await.map_err(|e| unavailable(e.to_string()))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(match version {
				None => RegistryError::PackageNotFound(name.clone()),
				Some(_) => unavailable("release not found".to_string()),
			});
		}

		let bytes = response
			.error_for_status()
			.map_err(|e| unavailable(e.to_string()))?
			.bytes()
			.await
			.map_err(|e| unavailable(e.to_string()))?;

		serde_json::from_slice::<ProjectDocument>(&bytes).map_err(|e| unavailable(e.to_string()))
	}
}

#[async_trait]
impl Registry for PypiRegistry {
	async fn list_versions(&self, name: &CanonicalName) -> Result<Vec<Version>, RegistryError> {
		let url = format!("{}/{}/json", self.index_url, name);
		let document = self.fetch_document(&url, name, None).await?;
		Ok(versions_from_document(name, &document))
	}

	async fn get_dependencies(&self, name: &CanonicalName, version: &Version) -> Result<Vec<Requirement>, RegistryError> {
		let url = format!("{}/{}/{}/json", self.index_url, name, version);
		let document = self.fetch_document(&url, name, Some(version)).await?;
		Ok(dependencies_from_document(name, &document))
	}
}

/// Releases that still have at least one file which isn't yanked, ascending.
fn versions_from_document(name: &CanonicalName, document: &ProjectDocument) -> Vec<Version> {
	let mut versions: Vec<Version> = document.releases.iter()
		.filter(|(_, files)| files.iter().any(|f| !f.yanked))
		.filter_map(|(text, _)| match Version::parse(text) {
			Ok(v) => Some(v),
			Err(e) => {
				log::debug!("Skipping release of {}: {}", name, e);
				None
			},
		})
		.collect();

	/* Releases are a map, tie-break on spelling so `1.0`/`1.0.0` duplicates always collapse the same way */
	versions.sort_by(|a, b| a.cmp(b).then_with(|| a.to_string().cmp(&b.to_string())));
	versions.dedup();
	versions
}

fn dependencies_from_document(name: &CanonicalName, document: &ProjectDocument) -> Vec<Requirement> {
	document.info.requires_dist.iter()
		.flatten()
		.filter_map(|text| match Requirement::parse(text) {
			Ok(r) => Some(r),
			Err(e) => {
				log::warn!("Ignoring dependency of {}: {}", name, e);
				None
			},
		})
		.collect()
}
