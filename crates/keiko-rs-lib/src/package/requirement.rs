use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::*;

use super::Constraint;
use super::ParseError;

/// A registry package name after normalization.
///
/// Two spellings denote the same package if and only if they normalize identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
	pub fn new(name: &str) -> Self {
		normalize(name)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for CanonicalName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl AsRef<str> for CanonicalName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for CanonicalName {
	fn from(value: &str) -> Self {
		normalize(value)
	}
}

/// Lowercases and collapses every run of `-`, `_` and `.` into a single `-`.
pub fn normalize(name: &str) -> CanonicalName {
	let mut out = String::with_capacity(name.len());
	let mut in_separator_run = false;
	for c in name.trim().chars() {
		if matches!(c, '-' | '_' | '.') {
			if !in_separator_run {
				out.push('-');
			}
			in_separator_run = true;
		} else {
			out.extend(c.to_lowercase());
			in_separator_run = false;
		}
	}
	CanonicalName(out)
}

fn requirement_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| {
		Regex::new(r"^(?P<head>(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\[\]]*)\])?)(?P<rest>.*)$")
			.expect("requirement pattern is valid")
	})
}

fn name_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| {
		Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("name pattern is valid")
	})
}

fn extra_marker_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| {
		Regex::new(r#"\bextra\s*==\s*["']([^"']+)["']"#).expect("extra marker pattern is valid")
	})
}

/// A declared dependency: package name, requested extras and a version constraint.
///
/// Requirements are immutable once parsed. Their resolution target is `(name, extras)`,
/// the constraint text may differ between requirements for the same target.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
	pub name: CanonicalName,
	pub extras: BTreeSet<String>,
	pub constraint: Constraint,
	/// Environment marker following `;`, kept verbatim.
	pub marker: Option<String>,
	/// Name and extras exactly as written, `FastAPI[standard]` for example.
	identity: String,
	/// Constraint exactly as written.
	constraint_text: String,
}

impl Requirement {
	/// Parses `name[extra,...]constraint ; marker`.
	pub fn parse(text: &str) -> Result<Self, ParseError> {
		let invalid = |reason: &str| ParseError::InvalidRequirement { text: text.trim().to_string(), reason: reason.to_string() };

		let (body, marker) = match text.split_once(';') {
			Some((body, marker)) => (body.trim(), Some(marker.trim()).filter(|m| !m.is_empty()).map(str::to_string)),
			None => (text.trim(), None),
		};
		if body.is_empty() {
			return Err(invalid("missing package name"));
		}

		let captures = requirement_pattern().captures(body).ok_or_else(|| invalid("malformed package name"))?;
		let head = captures.name("head").map_or("", |m| m.as_str()).trim();
		let name = captures.name("name").map_or("", |m| m.as_str());
		let rest = captures.name("rest").map_or("", |m| m.as_str()).trim();

		if rest.starts_with('@') {
			return Err(invalid("direct references are not supported"));
		}
		if rest.starts_with('[') {
			return Err(invalid("malformed extras"));
		}

		let mut extras = BTreeSet::new();
		if let Some(list) = captures.name("extras") {
			let list = list.as_str().trim();
			if !list.is_empty() {
				for extra in list.split(',') {
					let extra = extra.trim();
					if !name_pattern().is_match(extra) {
						return Err(invalid("malformed extra name"));
					}
					extras.insert(normalize(extra).0);
				}
			}
		}

		let constraint = Constraint::parse(rest)?;

		Ok(Self {
			name: normalize(name),
			extras,
			constraint,
			marker,
			identity: head.to_string(),
			constraint_text: rest.to_string(),
		})
	}

	/// Name and extras as they were written.
	pub fn identity(&self) -> &str {
		&self.identity
	}

	/// Constraint as it was written.
	pub fn constraint_text(&self) -> &str {
		&self.constraint_text
	}

	/// The extra of the parent this requirement is gated on, from an `extra == "name"` marker.
	pub fn marker_extra(&self) -> Option<String> {
		let marker = self.marker.as_deref()?;
		extra_marker_pattern().captures(marker)
			.and_then(|c| c.get(1))
			.map(|m| normalize(m.as_str()).0)
	}

	/// Both requirements resolve the same `(name, extras)` target.
	pub fn same_target(&self, other: &Requirement) -> bool {
		self.name == other.name && self.extras == other.extras
	}

	/// Combines two requirements on the same package.
	///
	/// Constraints are intersected and extras unioned. `None` if the packages differ.
	pub fn merge(&self, other: &Requirement) -> Option<Requirement> {
		if self.name != other.name {
			return None;
		}
		let mut merged = self.clone();
		merged.extras.extend(other.extras.iter().cloned());
		merged.constraint = self.constraint.intersect(&other.constraint);
		merged.constraint_text = merged.constraint.to_string();
		Some(merged)
	}
}

impl std::fmt::Display for Requirement {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}{}", self.identity, self.constraint_text)?;
		if let Some(marker) = &self.marker {
			write!(f, "; {}", marker)?;
		}
		Ok(())
	}
}

impl std::str::FromStr for Requirement {
	type Err = ParseError;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::Version;

	fn r(s: &str) -> Requirement { Requirement::parse(s).unwrap() }

	#[test] fn normalize_lowercases() { assert_eq!(normalize("Django").as_str(), "django") }
	#[test] fn normalize_collapses_separator_runs() { assert_eq!(normalize("zope._-interface").as_str(), "zope-interface") }
	#[test] fn normalize_spellings_are_equal() { assert_eq!(normalize("typing_extensions"), normalize("Typing.Extensions")) }

	#[test]
	fn requirement_splits_name_extras_constraint() {
		let req = r("FastAPI[standard]>=0.100.0");
		assert_eq!(req.name.as_str(), "fastapi");
		assert_eq!(req.extras.iter().collect::<Vec<_>>(), ["standard"]);
		assert_eq!(req.identity(), "FastAPI[standard]");
		assert_eq!(req.constraint_text(), ">=0.100.0");
		assert!(req.constraint.satisfies(&Version::parse("0.104.1").unwrap()));
	}

	#[test]
	fn requirement_bare_name_is_any() {
		let req = r("requests");
		assert!(req.constraint.is_any());
		assert!(req.extras.is_empty());
		assert_eq!(req.identity(), "requests");
	}

	#[test]
	fn requirement_keeps_marker() {
		let req = r("colorama>=0.4; sys_platform == \"win32\"");
		assert_eq!(req.marker.as_deref(), Some("sys_platform == \"win32\""));
		assert_eq!(req.marker_extra(), None);
	}

	#[test]
	fn requirement_marker_extra() {
		let req = r("uvicorn[standard] (>=0.12.0) ; extra == 'Standard_Extra'");
		assert_eq!(req.marker_extra().as_deref(), Some("standard-extra"));
		assert_eq!(req.constraint_text(), "(>=0.12.0)");
	}

	#[test]
	fn requirement_extras_are_unordered_and_normalized() {
		assert_eq!(r("pkg[B,a]").extras, r("pkg[a, b]").extras);
		assert!(r("pkg[B,a]").same_target(&r("PKG[a,b]>=2")));
	}

	#[test]
	fn requirement_rejects_malformed() {
		for bad in ["", "   ", "-pkg", "pkg @ https://example.com/pkg.whl", "pkg[a,,b]", "pkg>=", "pkg[a]]", "pkg 1.0"] {
			assert!(Requirement::parse(bad).is_err(), "accepted `{}`", bad);
		}
	}

	#[test]
	fn requirement_bad_constraint_is_invalid_constraint() {
		assert!(matches!(Requirement::parse("pkg=>1.0"), Err(ParseError::InvalidConstraint { .. })));
	}

	#[test]
	fn requirement_merge_intersects_and_unions() {
		let merged = r("pkg[a]>=1.0").merge(&r("Pkg[b]<2")).unwrap();
		assert_eq!(merged.extras.len(), 2);
		assert!(merged.constraint.satisfies(&Version::parse("1.5").unwrap()));
		assert!(!merged.constraint.satisfies(&Version::parse("2.0").unwrap()));
		assert!(r("pkg").merge(&r("other")).is_none());
	}

	#[test]
	fn requirement_display_round_trips() {
		assert_eq!(r("pkg[x]>=1.0; python_version < \"3.12\"").to_string(), "pkg[x]>=1.0; python_version < \"3.12\"");
	}
}
