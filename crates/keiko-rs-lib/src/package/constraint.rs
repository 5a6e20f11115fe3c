use super::ParseError;
use super::Version;

/// A comparison operator of a single clause.
///
/// The compatible release operator `~=` never appears here, it is expanded while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
	Equal,
	NotEqual,
	GreaterEqual,
	Greater,
	LessEqual,
	Less,
	/// `===`, compares the literal version text.
	Arbitrary,
}

impl Operator {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operator::Equal => "==",
			Operator::NotEqual => "!=",
			Operator::GreaterEqual => ">=",
			Operator::Greater => ">",
			Operator::LessEqual => "<=",
			Operator::Less => "<",
			Operator::Arbitrary => "===",
		}
	}
}

impl std::fmt::Display for Operator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// Operator tokens in the order they have to be tried, longest first.
const OPERATOR_TOKENS: [&str; 8] = ["===", "~=", "==", "!=", "<=", ">=", "<", ">"];

/// Splits a clause like `>= 1.0` into its operator token and the trimmed remainder.
pub(crate) fn split_operator(clause: &str) -> Option<(&'static str, &str)> {
	let clause = clause.trim();
	OPERATOR_TOKENS.iter()
		.find(|token| clause.starts_with(**token))
		.map(|token| (*token, clause[token.len()..].trim()))
}

/// A single comparison against a version.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
	pub operator: Operator,
	pub version: Version,
	/// `==1.0.*` style prefix match. Only valid with `==` and `!=`.
	pub wildcard: bool,
}

impl Clause {
	pub fn is_satisfied_by(&self, candidate: &Version) -> bool {
		let target = &self.version;
		match self.operator {
			Operator::Equal if self.wildcard => prefix_matches(target, candidate),
			Operator::NotEqual if self.wildcard => !prefix_matches(target, candidate),
			Operator::Equal => candidate == target,
			Operator::NotEqual => candidate != target,
			Operator::GreaterEqual => candidate >= target,
			Operator::LessEqual => candidate <= target,
			/* `>1.7` doesn't admit `1.7.post1` */
			Operator::Greater => {
				candidate > target
					&& !(candidate.is_postrelease() && !target.is_postrelease() && candidate.same_release(target) && candidate.pre() == target.pre())
			},
			/* `<2.0` doesn't admit `2.0rc1` */
			Operator::Less => {
				candidate < target
					&& !(candidate.is_prerelease() && !target.is_prerelease() && candidate.same_release(target))
			},
			Operator::Arbitrary => candidate.to_string().eq_ignore_ascii_case(&target.to_string()),
		}
	}
}

fn prefix_matches(prefix: &Version, candidate: &Version) -> bool {
	prefix.epoch() == candidate.epoch()
		&& prefix.release().iter()
			.enumerate()
			.all(|(i, n)| candidate.release().get(i).copied().unwrap_or(0) == *n)
}

impl std::fmt::Display for Clause {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}{}", self.operator, self.version)?;
		if self.wildcard {
			write!(f, ".*")?;
		}
		Ok(())
	}
}

/// A conjunction of clauses.
///
/// An empty constraint admits every version. Constraints are only ever tested against a
/// concrete version, an unsatisfiable constraint is not detected on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraint {
	clauses: Vec<Clause>,
}

impl Constraint {
	/// The always satisfied constraint.
	pub fn any() -> Self {
		Self::default()
	}

	/// Parses a comma separated list of clauses, for example `>=1.0, <2, !=1.3.*`.
	///
	/// Wrapping parentheses are accepted.
	pub fn parse(text: &str) -> Result<Self, ParseError> {
		let invalid = |reason: &str| ParseError::InvalidConstraint { text: text.trim().to_string(), reason: reason.to_string() };

		let mut inner = text.trim();
		if let Some(stripped) = inner.strip_prefix('(') {
			inner = stripped.strip_suffix(')').ok_or_else(|| invalid("unbalanced parenthesis"))?.trim();
		}
		if inner.is_empty() {
			return Ok(Self::any());
		}

		let mut clauses = Vec::new();
		for raw in inner.split(',') {
			let raw = raw.trim();
			if raw.is_empty() {
				return Err(invalid("empty clause"));
			}
			let (token, operand) = split_operator(raw).ok_or_else(|| invalid("missing comparison operator"))?;
			if operand.is_empty() {
				return Err(invalid("missing version"));
			}

			let (operand, wildcard) = match operand.strip_suffix(".*") {
				Some(prefix) => (prefix, true),
				None => (operand, false),
			};
			if wildcard && token != "==" && token != "!=" {
				return Err(invalid("wildcards are only allowed with == and !="));
			}

			let version = Version::parse(operand).map_err(|e| invalid(&e.to_string()))?;
			if wildcard && (version.is_prerelease() || version.is_postrelease()) {
				return Err(invalid("wildcard prefix must be a plain release"));
			}

			let operator = match token {
				"===" => Operator::Arbitrary,
				"==" => Operator::Equal,
				"!=" => Operator::NotEqual,
				">=" => Operator::GreaterEqual,
				"<=" => Operator::LessEqual,
				">" => Operator::Greater,
				"<" => Operator::Less,
				"~=" => {
					/* `~=X.Y.Z` is `>=X.Y.Z, ==X.Y.*` */
					let release = version.release();
					if release.len() < 2 {
						return Err(invalid("compatible release needs at least two release segments"));
					}
					let prefix = Version::from_release(version.epoch(), release[..release.len() - 1].to_vec());
					clauses.push(Clause { operator: Operator::GreaterEqual, version, wildcard: false });
					clauses.push(Clause { operator: Operator::Equal, version: prefix, wildcard: true });
					continue;
				},
				_ => return Err(invalid("missing comparison operator")),
			};
			clauses.push(Clause { operator, version, wildcard });
		}

		Ok(Self { clauses })
	}

	pub fn clauses(&self) -> &[Clause] {
		&self.clauses
	}

	pub fn is_any(&self) -> bool {
		self.clauses.is_empty()
	}

	/// Logical AND of both constraints.
	pub fn intersect(&self, other: &Constraint) -> Constraint {
		let mut clauses = self.clauses.clone();
		clauses.extend(other.clauses.iter().cloned());
		Constraint { clauses }
	}

	/// Logical AND of every constraint, starting from [`Constraint::any`].
	pub fn intersect_all<'a>(constraints: impl IntoIterator<Item = &'a Constraint>) -> Constraint {
		constraints.into_iter().fold(Constraint::any(), |acc, c| acc.intersect(c))
	}

	pub fn satisfies(&self, version: &Version) -> bool {
		self.clauses.iter().all(|c| c.is_satisfied_by(version))
	}

	/// Whether a clause explicitly asks for a pre-release, `>=2.0b1` for example.
	pub fn mentions_prerelease(&self) -> bool {
		self.clauses.iter().any(|c| c.operator != Operator::NotEqual && c.version.is_prerelease())
	}
}

impl std::fmt::Display for Constraint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let joined = self.clauses.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",");
		write!(f, "{}", joined)
	}
}

impl std::str::FromStr for Constraint {
	type Err = ParseError;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}
