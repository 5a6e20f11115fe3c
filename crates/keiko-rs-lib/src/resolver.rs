//! Finds the newest mutually compatible version of every package reachable from a list of requirements.
//!
//! # Usage
//! 1. Create a [`ResolverBuilder`] around a [`Registry`].
//! 1. Use the builder to add the top-level requirements, each tagged with the manifest section it came from.
//! 1. [`ResolverBuilder::build()`] to get a [`Resolver`].
//! 1. [`Resolver::resolve()`] to walk the dependency graph and pick versions.
//! 1. Query the returned [`ResolutionResult`] for updated and unresolved requirements.
//!
//! Failures that concern a single package never abort the run, they are recorded as a [`Reason`]
//! on that package and every other package is still resolved.

use serde::*;

use crate::package::*;
use crate::registry::*;

mod dependency_graph;
pub use dependency_graph::DependencyGraph;
pub use dependency_graph::PackageNode;
pub use dependency_graph::NodeStatus;

mod resolver_builder;
pub use resolver_builder::ResolverBuilder;
mod graph_builder;
pub use graph_builder::GraphBuilder;
pub use graph_builder::ResolutionWarning;
mod version_selector;
pub use version_selector::VersionSelector;
mod update_plan;
pub use update_plan::ResolutionResult;
pub use update_plan::UpdateEntry;
pub use update_plan::UpdateStatus;
pub use update_plan::declared_version;
pub use update_plan::rewrite_constraint;

/// Why a requirement or package was left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
	InvalidVersion,
	InvalidConstraint,
	InvalidRequirement,
	PackageNotFound,
	MetadataUnavailable,
	NoCompatibleVersion,
}

impl std::fmt::Display for Reason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			Reason::InvalidVersion => "invalid version",
			Reason::InvalidConstraint => "invalid constraint",
			Reason::InvalidRequirement => "invalid requirement",
			Reason::PackageNotFound => "package not found",
			Reason::MetadataUnavailable => "metadata unavailable",
			Reason::NoCompatibleVersion => "no compatible version",
		};
		f.write_str(s)
	}
}

impl From<&ParseError> for Reason {
	fn from(e: &ParseError) -> Self {
		match e {
			ParseError::InvalidVersion(_) => Reason::InvalidVersion,
			ParseError::InvalidConstraint { .. } => Reason::InvalidConstraint,
			ParseError::InvalidRequirement { .. } => Reason::InvalidRequirement,
		}
	}
}

impl From<&RegistryError> for Reason {
	fn from(e: &RegistryError) -> Self {
		match e {
			RegistryError::PackageNotFound(_) => Reason::PackageNotFound,
			RegistryError::MetadataUnavailable { .. } => Reason::MetadataUnavailable,
		}
	}
}

/// A requirement string as read from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLevelRequirement {
	/// Manifest section, `project.dependencies` for example.
	pub section: String,
	pub text: String,
}

impl TopLevelRequirement {
	pub fn new(section: impl Into<String>, text: impl Into<String>) -> Self {
		Self { section: section.into(), text: text.into() }
	}
}

/// A configured resolution run, see the module docs.
pub struct Resolver<'r, R: Registry + ?Sized> {
	registry: &'r R,
	requirements: Vec<TopLevelRequirement>,
	concurrency: usize,
	allow_prereleases: bool,
}

impl<'r, R: Registry + ?Sized> Resolver<'r, R> {
	pub fn requirements(&self) -> &[TopLevelRequirement] {
		&self.requirements
	}

	/// Resolves every requirement.
	///
	/// Registry responses are cached for the length of this call only, so every run sees fresh metadata.
	pub async fn resolve(&self) -> ResolutionResult {
		let parsed: Vec<Result<Requirement, ParseError>> = self.requirements.iter()
			.map(|top| {
				let requirement = Requirement::parse(&top.text);
				if let Err(e) = &requirement {
					log::warn!("Skipping requirement in {}: {}", top.section, e);
				}
				requirement
			})
			.collect();

		let roots: Vec<Requirement> = parsed.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
		log::info!("Resolving {} requirement(s)", roots.len());

		let cache = MetadataCache::new(self.registry);
		let (mut graph, warnings) = GraphBuilder::new(&cache, self.concurrency, self.allow_prereleases)
			.build(&roots)
			.await;
		log::debug!("Dependency graph holds {} package(s)", graph.package_count());

		VersionSelector::new(self.allow_prereleases).select(&mut graph);

		update_plan::assemble(&self.requirements, &parsed, &graph, warnings)
	}
}
