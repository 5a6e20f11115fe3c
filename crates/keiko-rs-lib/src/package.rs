//! Versions, constraints and requirements.
//!
//! Everything the resolver works with is parsed up front into the types of this module,
//! raw requirement text never travels further than [`Requirement::parse`].

mod version;
pub use version::Version;
pub use version::PreRelease;

mod constraint;
pub use constraint::Constraint;
pub use constraint::Clause;
pub use constraint::Operator;
pub(crate) use constraint::split_operator;

mod requirement;
pub use requirement::Requirement;
pub use requirement::CanonicalName;
pub use requirement::normalize;

/// Malformed input. Only ever fatal for the single requirement it came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
	#[error("invalid version `{0}`")]
	InvalidVersion(String),
	#[error("invalid constraint `{text}`: {reason}")]
	InvalidConstraint { text: String, reason: String },
	#[error("invalid requirement `{text}`: {reason}")]
	InvalidRequirement { text: String, reason: String },
}
