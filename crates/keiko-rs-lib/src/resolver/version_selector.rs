use petgraph::prelude::*;

use super::dependency_graph::*;
use super::Reason;
use crate::package::*;

/// Picks the newest version of every package that satisfies all constraints placed on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionSelector {
	allow_prereleases: bool,
}

impl VersionSelector {
	pub fn new(allow_prereleases: bool) -> Self {
		Self { allow_prereleases }
	}

	/// Decides every pending package in name order.
	///
	/// Packages whose version list never arrived keep their failure reason from the graph builder.
	pub fn select(&self, graph: &mut DependencyGraph) {
		let indices: Vec<NodeIndex> = graph.packages().map(|(i, _)| i).collect();

		for i in indices {
			let effective = Constraint::intersect_all(graph.incoming_constraints(i).into_iter().map(|(_, c)| c));

			let Some(node) = graph.package_mut(i) else { continue };
			if node.status() != &NodeStatus::Pending {
				continue;
			}
			let Some(available) = node.available_versions.clone() else { continue };

			match self.newest_satisfying(&available, &effective) {
				Some(version) => {
					log::info!("Selected {} {}", node.name, version);
					node.select(version);
				},
				None => {
					log::warn!("No version of {} satisfies `{}`", node.name, effective);
					node.mark_unresolved(Reason::NoCompatibleVersion);
				},
			}
		}
	}

	/// Scans `available` from newest to oldest for the first version allowed by `constraint`.
	///
	/// Pre-releases only qualify when allowed, when the constraint names one, or when nothing else was published.
	pub fn newest_satisfying(&self, available: &[Version], constraint: &Constraint) -> Option<Version> {
		let prereleases_eligible = self.allow_prereleases
			|| constraint.mentions_prerelease()
			|| available.iter().all(Version::is_prerelease);

		available.iter()
			.rev()
			.filter(|v| prereleases_eligible || !v.is_prerelease())
			.find(|v| constraint.satisfies(v))
			.cloned()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn versions(list: &[&str]) -> Vec<Version> {
		list.iter().map(|v| Version::parse(v).unwrap()).collect()
	}

	fn newest(selector: VersionSelector, list: &[&str], constraint: &str) -> Option<String> {
		selector.newest_satisfying(&versions(list), &Constraint::parse(constraint).unwrap()).map(|v| v.to_string())
	}

	#[test]
	fn selector_picks_newest_match() {
		let s = VersionSelector::default();
		assert_eq!(newest(s, &["1.0.0", "1.5.0", "2.0.0", "2.5.0", "3.0.0"], ">=2.0,<3.0").as_deref(), Some("2.5.0"));
		assert_eq!(newest(s, &["1.0.0", "1.1.0", "2.0.0"], "~=1.0").as_deref(), Some("1.1.0"));
		assert_eq!(newest(s, &["1.0.0"], ">=2").as_deref(), None);
		assert_eq!(newest(s, &[], "").as_deref(), None);
	}

	#[test]
	fn selector_skips_prereleases_by_default() {
		assert_eq!(newest(VersionSelector::default(), &["1.0", "2.0rc1"], "").as_deref(), Some("1.0"));
		assert_eq!(newest(VersionSelector::new(true), &["1.0", "2.0rc1"], "").as_deref(), Some("2.0rc1"));
	}

	#[test]
	fn selector_prerelease_named_in_constraint() {
		assert_eq!(newest(VersionSelector::default(), &["1.0", "2.0b1", "2.0rc1"], ">=2.0b1").as_deref(), Some("2.0rc1"));
	}

	#[test]
	fn selector_only_prereleases_published() {
		assert_eq!(newest(VersionSelector::default(), &["0.1a1", "0.1a2"], "").as_deref(), Some("0.1a2"));
	}
}
