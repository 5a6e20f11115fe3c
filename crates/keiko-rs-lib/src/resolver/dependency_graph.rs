//! The per-run dependency graph, an arena of package nodes indexed by canonical name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use petgraph::prelude::*;

use crate::package::*;
use crate::registry::RegistryError;
use super::Reason;

#[derive(Debug, Clone)]
pub enum NodeData {
	/// Control node giving the top-level requirements a presence in the graph.
	Meta,
	Package(PackageNode),
}

/// A requirement edge, carrying the constraint the source places on the target.
#[derive(Debug, Clone)]
pub struct EdgeData {
	pub constraint: Constraint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeStatus {
	/// Not decided yet.
	Pending,
	Selected(Version),
	Unresolved(Reason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Expansion {
	NotStarted,
	/// Metadata fetch in flight.
	Scheduled,
	Done,
}

/// Resolution state of one package.
#[derive(Debug, Clone)]
pub struct PackageNode {
	pub name: CanonicalName,
	/// Union of the extras every incoming requirement asked for.
	pub extras: BTreeSet<String>,
	/// Fetched once per run, ascending.
	pub available_versions: Option<Arc<[Version]>>,
	/// The release whose dependencies were walked.
	pub expanded_version: Option<Version>,
	pub dependencies: Option<Arc<[Requirement]>>,
	/// Set when the dependencies couldn't be fetched. The node itself is still resolvable.
	pub dependency_error: Option<RegistryError>,
	status: NodeStatus,
	pub(super) expansion: Expansion,
	base_enqueued: bool,
	enqueued_extras: BTreeSet<String>,
}

impl PackageNode {
	fn new(name: CanonicalName) -> Self {
		Self {
			name,
			extras: Default::default(),
			available_versions: None,
			expanded_version: None,
			dependencies: None,
			dependency_error: None,
			status: NodeStatus::Pending,
			expansion: Expansion::NotStarted,
			base_enqueued: false,
			enqueued_extras: Default::default(),
		}
	}

	pub fn status(&self) -> &NodeStatus {
		&self.status
	}

	pub fn selected_version(&self) -> Option<&Version> {
		if let NodeStatus::Selected(v) = &self.status { Some(v) } else { None }
	}

	pub fn is_expanded(&self) -> bool {
		self.expansion == Expansion::Done
	}

	/// A decision is final, later calls on a decided node are ignored.
	pub(super) fn select(&mut self, version: Version) {
		if self.status == NodeStatus::Pending {
			self.status = NodeStatus::Selected(version);
		} else {
			log::warn!("Ignoring second decision for {}", self.name);
		}
	}

	pub(super) fn mark_unresolved(&mut self, reason: Reason) {
		if self.status == NodeStatus::Pending {
			self.status = NodeStatus::Unresolved(reason);
		} else {
			log::warn!("Ignoring second decision for {}", self.name);
		}
	}

	/// Dependencies of the expanded release not handed out yet.
	///
	/// Plain dependencies are handed out once, dependencies gated on an extra once that extra has been requested.
	pub(super) fn take_pending_dependencies(&mut self) -> Vec<Requirement> {
		let dependencies = match &self.dependencies {
			Some(d) => d.clone(),
			None => return Vec::new(),
		};

		let include_base = !self.base_enqueued;
		let new_extras: BTreeSet<String> = self.extras.difference(&self.enqueued_extras).cloned().collect();

		let pending = dependencies.iter()
			.filter(|dep| match dep.marker_extra() {
				None => include_base,
				Some(extra) => new_extras.contains(&extra),
			})
			.cloned()
			.collect();

		self.base_enqueued = true;
		self.enqueued_extras.extend(new_extras);
		pending
	}
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
	pub graph: StableDiGraph<NodeData, EdgeData>,
	pub meta_node: NodeIndex,
	/// Ordered so that walking packages is deterministic.
	index: BTreeMap<CanonicalName, NodeIndex>,
}

impl Default for DependencyGraph {
	fn default() -> Self {
		let mut graph = StableDiGraph::<NodeData, EdgeData>::default();
		let meta_node = graph.add_node(NodeData::Meta);
		Self { graph, meta_node, index: Default::default() }
	}
}

impl DependencyGraph {
	pub fn get_node_index(&self, name: &CanonicalName) -> Option<NodeIndex> {
		self.index.get(name).copied()
	}

	/// Returns the index of the existing node or a fresh one for `name`.
	pub(super) fn get_or_add_node_index(&mut self, name: &CanonicalName) -> NodeIndex {
		if let Some(i) = self.get_node_index(name) {
			return i;
		}
		let i = self.graph.add_node(NodeData::Package(PackageNode::new(name.clone())));
		self.index.insert(name.clone(), i);
		i
	}

	pub fn package(&self, i: NodeIndex) -> Option<&PackageNode> {
		if let Some(NodeData::Package(node)) = self.graph.node_weight(i) { Some(node) } else { None }
	}

	pub(super) fn package_mut(&mut self, i: NodeIndex) -> Option<&mut PackageNode> {
		if let Some(NodeData::Package(node)) = self.graph.node_weight_mut(i) { Some(node) } else { None }
	}

	pub fn get_package(&self, name: &CanonicalName) -> Option<&PackageNode> {
		self.get_node_index(name).and_then(|i| self.package(i))
	}

	/// Every package node in name order.
	pub fn packages(&self) -> impl Iterator<Item = (NodeIndex, &PackageNode)> + '_ {
		self.index.values().filter_map(|i| self.package(*i).map(|node| (*i, node)))
	}

	pub fn package_count(&self) -> usize {
		self.index.len()
	}

	pub(super) fn add_requirement_edge(&mut self, source: NodeIndex, target: NodeIndex, constraint: Constraint) {
		self.graph.add_edge(source, target, EdgeData { constraint });
	}

	/// Constraints placed on `target` with the node that placed them, in the order they were added.
	pub fn incoming_constraints(&self, target: NodeIndex) -> Vec<(NodeIndex, &Constraint)> {
		let mut edges: Vec<_> = self.graph.edges_directed(target, Incoming)
			.map(|e| (e.id(), e.source(), &e.weight().constraint))
			.collect();
		/* Edges are never removed so their indices follow insertion order */
		edges.sort_by_key(|(id, _, _)| *id);
		edges.into_iter().map(|(_, source, constraint)| (source, constraint)).collect()
	}

	/// Name of a requiring node for reports, the meta node reads as the manifest.
	pub fn describe_source(&self, source: NodeIndex) -> String {
		match self.package(source) {
			Some(node) => node.name.to_string(),
			None => "manifest".to_string(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn r(s: &str) -> Requirement { Requirement::parse(s).unwrap() }

	#[test]
	fn graph_one_node_per_name() {
		let mut graph = DependencyGraph::default();
		let a = graph.get_or_add_node_index(&"Foo_Bar".into());
		let b = graph.get_or_add_node_index(&"foo-bar".into());
		assert_eq!(a, b);
		assert_eq!(graph.package_count(), 1);
	}

	#[test]
	fn graph_incoming_constraints_keep_insertion_order() {
		let mut graph = DependencyGraph::default();
		let x = graph.get_or_add_node_index(&"x".into());
		let y = graph.get_or_add_node_index(&"y".into());
		graph.add_requirement_edge(graph.meta_node, x, Constraint::parse(">=1").unwrap());
		graph.add_requirement_edge(y, x, Constraint::parse("<3").unwrap());
		graph.add_requirement_edge(graph.meta_node, x, Constraint::parse("!=2").unwrap());

		let incoming = graph.incoming_constraints(x);
		let texts: Vec<String> = incoming.iter().map(|(_, c)| c.to_string()).collect();
		assert_eq!(texts, [">=1", "<3", "!=2"]);
		assert_eq!(graph.describe_source(incoming[0].0), "manifest");
		assert_eq!(graph.describe_source(incoming[1].0), "y");
	}

	#[test]
	fn node_pending_dependencies_follow_extras() {
		let mut node = PackageNode::new("fastapi".into());
		node.dependencies = Some(Arc::from(vec![
			r("starlette>=0.29"),
			r("uvicorn>=0.12; extra == \"standard\""),
			r("orjson>=3.2; extra == \"all\""),
		]));

		let first: Vec<String> = node.take_pending_dependencies().iter().map(|d| d.name.to_string()).collect();
		assert_eq!(first, ["starlette"]);
		assert!(node.take_pending_dependencies().is_empty());

		node.extras.insert("standard".to_string());
		let second: Vec<String> = node.take_pending_dependencies().iter().map(|d| d.name.to_string()).collect();
		assert_eq!(second, ["uvicorn"]);
		assert!(node.take_pending_dependencies().is_empty());
	}

	#[test]
	fn node_decision_is_final() {
		let mut node = PackageNode::new("x".into());
		node.select(Version::parse("1.0").unwrap());
		node.mark_unresolved(Reason::NoCompatibleVersion);
		node.select(Version::parse("2.0").unwrap());
		assert_eq!(node.selected_version(), Some(&Version::parse("1.0").unwrap()));
	}
}
