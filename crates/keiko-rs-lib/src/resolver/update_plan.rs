//! Turns the decided graph into one entry per top-level requirement.

use std::collections::{BTreeMap, BTreeSet};

use serde::*;

use super::dependency_graph::*;
use super::{Reason, ResolutionWarning, TopLevelRequirement};
use crate::package::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
	/// A newer version was selected and the requirement gets rewritten.
	Updated,
	/// The declared version is already the newest compatible one, or nothing was decided.
	Unchanged,
	Unresolved(Reason),
}

/// What happens to one requirement of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateEntry {
	/// Position in the input list.
	pub position: usize,
	pub section: String,
	/// Name and extras as written. The whole text when it couldn't be parsed.
	pub identity: String,
	pub name: Option<CanonicalName>,
	pub extras: BTreeSet<String>,
	pub old_requirement: String,
	pub old_constraint: String,
	/// The lower bound the manifest declares, if any.
	pub old_version: Option<Version>,
	pub new_version: Option<Version>,
	pub new_requirement: Option<String>,
	pub status: UpdateStatus,
	pub detail: Option<String>,
}

impl UpdateEntry {
	pub fn is_updated(&self) -> bool {
		self.status == UpdateStatus::Updated
	}

	pub fn unresolved_reason(&self) -> Option<Reason> {
		if let UpdateStatus::Unresolved(reason) = self.status { Some(reason) } else { None }
	}
}

/// Outcome of a resolution run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionResult {
	/// One per top-level requirement, in input order.
	pub entries: Vec<UpdateEntry>,
	/// Every package that got a version, transitive ones included.
	pub selected: BTreeMap<CanonicalName, Version>,
	pub warnings: Vec<ResolutionWarning>,
}

impl ResolutionResult {
	pub fn updated(&self) -> impl Iterator<Item = &UpdateEntry> {
		self.entries.iter().filter(|e| e.is_updated())
	}

	pub fn unresolved(&self) -> impl Iterator<Item = &UpdateEntry> {
		self.entries.iter().filter(|e| e.unresolved_reason().is_some())
	}

	/// Selected version of a package, transitive or not.
	pub fn get_selected(&self, name: &CanonicalName) -> Option<&Version> {
		self.selected.get(name)
	}

	/// Requirement identity to new version, for every top-level requirement that will be rewritten.
	pub fn version_map(&self) -> BTreeMap<String, Version> {
		self.updated()
			.filter_map(|e| e.new_version.clone().map(|v| (e.identity.clone(), v)))
			.collect()
	}
}

pub(super) fn assemble(
	requirements: &[TopLevelRequirement],
	parsed: &[Result<Requirement, ParseError>],
	graph: &DependencyGraph,
	warnings: Vec<ResolutionWarning>,
) -> ResolutionResult {
	let entries = requirements.iter()
		.zip(parsed)
		.enumerate()
		.map(|(position, (top, parsed))| match parsed {
			Ok(requirement) => entry_for(position, top, requirement, graph, &warnings),
			Err(e) => UpdateEntry {
				position,
				section: top.section.clone(),
				identity: top.text.trim().to_string(),
				name: None,
				extras: Default::default(),
				old_requirement: top.text.clone(),
				old_constraint: String::new(),
				old_version: None,
				new_version: None,
				new_requirement: None,
				status: UpdateStatus::Unresolved(Reason::from(e)),
				detail: Some(e.to_string()),
			},
		})
		.collect();

	let selected = graph.packages()
		.filter_map(|(_, node)| node.selected_version().map(|v| (node.name.clone(), v.clone())))
		.collect();

	ResolutionResult { entries, selected, warnings }
}

fn entry_for(
	position: usize,
	top: &TopLevelRequirement,
	requirement: &Requirement,
	graph: &DependencyGraph,
	warnings: &[ResolutionWarning],
) -> UpdateEntry {
	let old_version = declared_version(requirement.constraint_text());
	let mut entry = UpdateEntry {
		position,
		section: top.section.clone(),
		identity: requirement.identity().to_string(),
		name: Some(requirement.name.clone()),
		extras: requirement.extras.clone(),
		old_requirement: top.text.clone(),
		old_constraint: requirement.constraint_text().to_string(),
		old_version: old_version.clone(),
		new_version: None,
		new_requirement: None,
		status: UpdateStatus::Unchanged,
		detail: None,
	};

	let Some(i) = graph.get_node_index(&requirement.name) else { return entry };
	let Some(node) = graph.package(i) else { return entry };

	match node.status() {
		NodeStatus::Pending => {},
		NodeStatus::Unresolved(reason) => {
			entry.status = UpdateStatus::Unresolved(*reason);
			entry.detail = match reason {
				Reason::NoCompatibleVersion => Some(describe_conflict(graph, i)),
				_ => warnings.iter().find(|w| w.package == node.name).map(|w| w.message.clone()),
			};
		},
		NodeStatus::Selected(version) => {
			entry.new_version = Some(version.clone());
			if old_version.as_ref() != Some(version) {
				let constraint = rewrite_constraint(requirement.constraint_text(), version);
				let new_requirement = rewrite_requirement(&top.text, requirement, &constraint);
				/* `~=7.2` with 7.2.6 selected rewrites to itself */
				if new_requirement != top.text {
					entry.new_requirement = Some(new_requirement);
					entry.status = UpdateStatus::Updated;
				}
			}
		},
	}
	entry
}

/// Every constraint on the package and who placed it.
fn describe_conflict(graph: &DependencyGraph, i: petgraph::prelude::NodeIndex) -> String {
	let parts: Vec<String> = graph.incoming_constraints(i)
		.into_iter()
		.map(|(source, constraint)| {
			let constraint = if constraint.is_any() { "any".to_string() } else { constraint.to_string() };
			format!("{} (from {})", constraint, graph.describe_source(source))
		})
		.collect();
	format!("conflicting constraints: {}", parts.join(", "))
}

fn strip_parens(text: &str) -> (&str, bool) {
	let text = text.trim();
	match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
		Some(inner) => (inner.trim(), true),
		None => (text, false),
	}
}

/// The first clause that puts a floor under the version, with its operator token.
fn lower_bound(clauses: &[&str]) -> Option<(usize, &'static str, Version)> {
	clauses.iter().enumerate().find_map(|(i, clause)| {
		let (token, operand) = split_operator(clause)?;
		let is_floor = match token {
			">=" | ">" | "~=" | "===" => true,
			"==" => !operand.ends_with(".*"),
			_ => false,
		};
		if !is_floor {
			return None;
		}
		Version::parse(operand).ok().map(|v| (i, token, v))
	})
}

/// The version a constraint declares as its lower bound, `>=2.0,<3` declares `2.0`.
pub fn declared_version(constraint_text: &str) -> Option<Version> {
	let (inner, _) = strip_parens(constraint_text);
	let clauses: Vec<&str> = inner.split(',').map(str::trim).collect();
	lower_bound(&clauses).map(|(_, _, v)| v)
}

/// Raises the lower bound of `constraint_text` to `new_version`, keeping every other clause.
///
/// `>=` and `>` become `>=NEW`. `~=` keeps its operator and number of release segments
/// as long as the result still admits `new_version`.
/// Without a lower bound `>=NEW` is put in front.
pub fn rewrite_constraint(constraint_text: &str, new_version: &Version) -> String {
	let (inner, parenthesized) = strip_parens(constraint_text);
	let mut clauses: Vec<String> = if inner.is_empty() {
		Vec::new()
	} else {
		inner.split(',').map(|c| c.trim().to_string()).collect()
	};

	let borrowed: Vec<&str> = clauses.iter().map(String::as_str).collect();
	match lower_bound(&borrowed) {
		Some((i, token, old)) => {
			clauses[i] = match token {
				"~=" => compatible_release(new_version, old.release().len()),
				"==" | "===" => format!("{}{}", token, new_version),
				_ => format!(">={}", new_version),
			};
		},
		None => clauses.insert(0, format!(">={}", new_version)),
	}

	let joined = clauses.join(",");
	if parenthesized { format!("({})", joined) } else { joined }
}

/// `~=` over `segments` release numbers of `new_version`.
///
/// Truncating drops pre-release and dev suffixes, when that would exclude `new_version` the
/// clause is spelled out as `>=NEW,==PREFIX.*` instead.
fn compatible_release(new_version: &Version, segments: usize) -> String {
	let floor = new_version.truncated(segments);
	if floor <= *new_version {
		format!("~={}", floor)
	} else {
		format!(">={},=={}.*", new_version, new_version.truncated(segments.saturating_sub(1)))
	}
}

/// Replaces the constraint inside the original text, leaving name, extras, marker and spacing alone.
fn rewrite_requirement(text: &str, requirement: &Requirement, new_constraint: &str) -> String {
	let identity = requirement.identity();
	let old = requirement.constraint_text();

	let start = text.find(identity).and_then(|at| {
		let after_identity = at + identity.len();
		if old.is_empty() {
			Some(after_identity)
		} else {
			text[after_identity..].find(old).map(|offset| after_identity + offset)
		}
	});

	match start {
		Some(start) => format!("{}{}{}", &text[..start], new_constraint, &text[start + old.len()..]),
		None => match &requirement.marker {
			Some(marker) => format!("{}{}; {}", identity, new_constraint, marker),
			None => format!("{}{}", identity, new_constraint),
		},
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn v(s: &str) -> Version { Version::parse(s).unwrap() }

	fn rewrite(text: &str, new: &str) -> String {
		let requirement = Requirement::parse(text).unwrap();
		let constraint = rewrite_constraint(requirement.constraint_text(), &v(new));
		rewrite_requirement(text, &requirement, &constraint)
	}

	#[test]
	fn declared_version_is_first_floor() {
		assert_eq!(declared_version(">=2.0,<3"), Some(v("2.0")));
		assert_eq!(declared_version("<3, >1.5"), Some(v("1.5")));
		assert_eq!(declared_version("~=1.4.2"), Some(v("1.4.2")));
		assert_eq!(declared_version("==1.0.*"), None);
		assert_eq!(declared_version("<3"), None);
		assert_eq!(declared_version(""), None);
	}

	#[test]
	fn rewrite_raises_lower_bound() {
		assert_eq!(rewrite("requests>=2.25.0", "2.31.0"), "requests>=2.31.0");
		assert_eq!(rewrite("django>=3.2,<5", "4.2.7"), "django>=4.2.7,<5");
		assert_eq!(rewrite("attrs>21", "23.1.0"), "attrs>=23.1.0");
	}

	#[test]
	fn rewrite_compatible_release_keeps_segments() {
		assert_eq!(rewrite("pkgb~=2.0", "2.5.0"), "pkgb~=2.5");
		assert_eq!(rewrite("pkgb~=2.0.0", "2.5.3"), "pkgb~=2.5.3");
	}

	#[test]
	fn rewrite_compatible_release_keeps_prerelease_selectable() {
		assert_eq!(rewrite("pkgb~=2.0", "2.1rc1"), "pkgb>=2.1rc1,==2.*");
		assert_eq!(rewrite("pkgb~=2.0.0", "2.0.4.dev1"), "pkgb>=2.0.4.dev1,==2.0.*");

		let constraint = Constraint::parse(&rewrite_constraint("~=2.0", &v("2.1rc1"))).unwrap();
		assert!(constraint.satisfies(&v("2.1rc1")));
		assert_eq!(declared_version(">=2.1rc1,==2.*"), Some(v("2.1rc1")));
	}

	#[test]
	fn rewrite_without_lower_bound_prepends() {
		assert_eq!(rewrite("numpy", "1.26.2"), "numpy>=1.26.2");
		assert_eq!(rewrite("numpy<2", "1.26.2"), "numpy>=1.26.2,<2");
	}

	#[test]
	fn unresolved_status_serializes_snake_case() {
		let status = UpdateStatus::Unresolved(Reason::NoCompatibleVersion);
		assert_eq!(serde_json::to_string(&status).unwrap(), r#"{"unresolved":"no_compatible_version"}"#);
		assert_eq!(serde_json::to_string(&UpdateStatus::Updated).unwrap(), r#""updated""#);
	}

	#[test]
	fn rewrite_keeps_extras_marker_and_spacing() {
		assert_eq!(rewrite("fastapi[standard]>=0.100.0", "0.104.1"), "fastapi[standard]>=0.104.1");
		assert_eq!(
			rewrite("tomli >= 1.1 ; python_version < \"3.11\"", "2.0.1"),
			"tomli >=2.0.1 ; python_version < \"3.11\"",
		);
		assert_eq!(rewrite("colorama ; sys_platform == 'win32'", "0.4.6"), "colorama>=0.4.6 ; sys_platform == 'win32'");
		assert_eq!(rewrite("charset_normalizer (>=2,<4)", "3.3.2"), "charset_normalizer (>=3.3.2,<4)");
	}
}
