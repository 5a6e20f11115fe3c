//! Walks requirements outward from the top level, fetching metadata in waves.
//!
//! Only the coordinator touches the graph. Each wave drains the queue of discovered requirements,
//! schedules every newly seen package for expansion and then fetches their metadata concurrently.
//! Results are applied in the order the packages were scheduled, so the finished graph does not
//! depend on which response came back first.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use petgraph::prelude::*;
use serde::*;

use super::dependency_graph::*;
use super::Reason;
use crate::package::*;
use crate::registry::*;

/// A package level problem that was recorded and worked around.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionWarning {
	pub package: CanonicalName,
	pub reason: Reason,
	pub message: String,
}

struct Fetched {
	versions: Result<Arc<[Version]>, RegistryError>,
	expansion: Option<(Version, Result<Arc<[Requirement]>, RegistryError>)>,
}

pub struct GraphBuilder<'c, 'r, R: Registry + ?Sized> {
	cache: &'c MetadataCache<'r, R>,
	concurrency: usize,
	allow_prereleases: bool,
}

impl<'c, 'r, R: Registry + ?Sized> GraphBuilder<'c, 'r, R> {
	pub fn new(cache: &'c MetadataCache<'r, R>, concurrency: usize, allow_prereleases: bool) -> Self {
		Self { cache, concurrency: concurrency.max(1), allow_prereleases }
	}

	/// Builds the graph for `requirements`, which hang off the meta node.
	pub async fn build(&self, requirements: &[Requirement]) -> (DependencyGraph, Vec<ResolutionWarning>) {
		let mut graph = DependencyGraph::default();
		let mut warnings = Vec::new();
		let mut queue: VecDeque<(NodeIndex, Requirement)> = requirements.iter()
			.map(|r| (graph.meta_node, r.clone()))
			.collect();

		let mut wave_number = 0;
		loop {
			let mut wave = Vec::<(NodeIndex, CanonicalName)>::new();

			while let Some((source, requirement)) = queue.pop_front() {
				let target = graph.get_or_add_node_index(&requirement.name);
				log::trace!("{} -> {}{}", graph.describe_source(source), requirement.name, requirement.constraint);
				graph.add_requirement_edge(source, target, requirement.constraint.clone());

				let Some(node) = graph.package_mut(target) else { continue };
				node.extras.extend(requirement.extras.iter().cloned());
				match node.expansion {
					Expansion::NotStarted => {
						node.expansion = Expansion::Scheduled;
						wave.push((target, node.name.clone()));
					},
					/* New extras are picked up when the fetch is applied */
					Expansion::Scheduled => {},
					Expansion::Done => {
						for dependency in node.take_pending_dependencies() {
							queue.push_back((target, dependency));
						}
					},
				}
			}

			if wave.is_empty() {
				break;
			}
			wave_number += 1;
			log::debug!("Wave {}: expanding {} package(s)", wave_number, wave.len());

			let fetched: Vec<(NodeIndex, Fetched)> = futures::stream::iter(wave)
				.map(|(i, name)| async move { (i, self.fetch(&name).await) })
				.buffered(self.concurrency)
				.collect()
				.await;

			for (i, fetched) in fetched {
				let Some(node) = graph.package_mut(i) else { continue };
				node.expansion = Expansion::Done;

				match fetched.versions {
					Ok(versions) => node.available_versions = Some(versions),
					Err(e) => {
						log::warn!("{}", e);
						warnings.push(ResolutionWarning { package: node.name.clone(), reason: Reason::from(&e), message: e.to_string() });
						node.mark_unresolved(Reason::from(&e));
						continue;
					},
				}

				if let Some((version, dependencies)) = fetched.expansion {
					match dependencies {
						Ok(dependencies) => node.dependencies = Some(dependencies),
						Err(e) => {
							log::warn!("Not following dependencies of {} {}: {}", node.name, version, e);
							warnings.push(ResolutionWarning { package: node.name.clone(), reason: Reason::from(&e), message: e.to_string() });
							node.dependency_error = Some(e);
						},
					}
					node.expanded_version = Some(version);
				}

				for dependency in node.take_pending_dependencies() {
					queue.push_back((i, dependency));
				}
			}
		}

		(graph, warnings)
	}

	async fn fetch(&self, name: &CanonicalName) -> Fetched {
		let versions = self.cache.versions(name).await;
		let expansion = match &versions {
			Ok(versions) => match expansion_version(versions, self.allow_prereleases) {
				Some(version) => {
					let dependencies = self.cache.dependencies(name, &version).await;
					Some((version, dependencies))
				},
				None => None,
			},
			Err(_) => None,
		};
		Fetched { versions, expansion }
	}
}

/// The release whose dependencies stand in for the package while the graph is walked.
///
/// The newest final release, or the newest of any kind when there is no final release.
pub(super) fn expansion_version(versions: &[Version], allow_prereleases: bool) -> Option<Version> {
	versions.iter()
		.rev()
		.find(|v| allow_prereleases || !v.is_prerelease())
		.or_else(|| versions.last())
		.cloned()
}
