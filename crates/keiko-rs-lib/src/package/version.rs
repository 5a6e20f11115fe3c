use std::cmp::Ordering;
use serde::*;

use super::ParseError;

/// The kind of a pre-release marker, ordered `a < b < rc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
	Alpha,
	Beta,
	ReleaseCandidate,
}

impl std::fmt::Display for PreRelease {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PreRelease::Alpha => write!(f, "a"),
			PreRelease::Beta => write!(f, "b"),
			PreRelease::ReleaseCandidate => write!(f, "rc"),
		}
	}
}

/// A single concrete release of a package.
///
/// Release segments are compared numerically with missing trailing segments treated as zero,
/// so `1.0` and `1.0.0` denote the same release and compare equal.
/// Within a release the order is `dev < pre-release < final < post-release`.
#[derive(Debug, Clone)]
pub struct Version {
	epoch: u64,
	release: Vec<u64>,
	pre: Option<(PreRelease, u64)>,
	post: Option<u64>,
	dev: Option<u64>,
	/// Spelling as it was given, used for display.
	text: String,
}

impl Version {
	/// Parses a dotted numeric release with optional epoch, pre, post and dev suffixes.
	pub fn parse(text: &str) -> Result<Self, ParseError> {
		scan(text).ok_or_else(|| ParseError::InvalidVersion(text.trim().to_string()))
	}

	/// Creates a final release with no suffixes.
	pub fn from_release(epoch: u64, release: Vec<u64>) -> Self {
		let joined = release.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(".");
		let text = if epoch > 0 { format!("{}!{}", epoch, joined) } else { joined };
		Self { epoch, release, pre: None, post: None, dev: None, text }
	}

	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	pub fn release(&self) -> &[u64] {
		&self.release
	}

	pub fn pre(&self) -> Option<(PreRelease, u64)> {
		self.pre
	}

	pub fn post(&self) -> Option<u64> {
		self.post
	}

	pub fn dev(&self) -> Option<u64> {
		self.dev
	}

	/// Pre-releases and development releases.
	pub fn is_prerelease(&self) -> bool {
		self.pre.is_some() || self.dev.is_some()
	}

	pub fn is_postrelease(&self) -> bool {
		self.post.is_some()
	}

	/// Checks that both versions share epoch and release segments, ignoring any suffixes.
	pub fn same_release(&self, other: &Version) -> bool {
		self.epoch == other.epoch && cmp_release(&self.release, &other.release) == Ordering::Equal
	}

	/// The final release with `segments` release numbers, padding with zeros or dropping trailing segments.
	pub fn truncated(&self, segments: usize) -> Version {
		let mut release = self.release.clone();
		release.resize(segments.max(1), 0);
		Version::from_release(self.epoch, release)
	}

	/* Keys compared after epoch and release, see `Ord` */

	fn pre_key(&self) -> (u8, Option<PreRelease>, u64) {
		match (self.pre, self.post, self.dev) {
			/* `1.0.dev1` sorts before `1.0a1` */
			(None, None, Some(_)) => (0, None, 0),
			(Some((kind, n)), _, _) => (1, Some(kind), n),
			(None, _, _) => (2, None, 0),
		}
	}

	fn post_key(&self) -> (u8, u64) {
		match self.post {
			None => (0, 0),
			Some(n) => (1, n),
		}
	}

	fn dev_key(&self) -> (u8, u64) {
		match self.dev {
			Some(n) => (0, n),
			None => (1, 0),
		}
	}
}

fn cmp_release(lhs: &[u64], rhs: &[u64]) -> Ordering {
	let len = lhs.len().max(rhs.len());
	(0..len)
		.map(|i| lhs.get(i).copied().unwrap_or(0).cmp(&rhs.get(i).copied().unwrap_or(0)))
		.find(|ord| ord.is_ne())
		.unwrap_or(Ordering::Equal)
}

impl Ord for Version {
	fn cmp(&self, other: &Self) -> Ordering {
		self.epoch.cmp(&other.epoch)
			.then_with(|| cmp_release(&self.release, &other.release))
			.then_with(|| self.pre_key().cmp(&other.pre_key()))
			.then_with(|| self.post_key().cmp(&other.post_key()))
			.then_with(|| self.dev_key().cmp(&other.dev_key()))
	}
}

impl PartialOrd for Version {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for Version {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Version {}

impl std::hash::Hash for Version {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		/* Must agree with `Eq`, trailing zeros don't change the release */
		let significant = self.release.iter().rposition(|n| *n != 0).map_or(0, |i| i + 1);
		self.epoch.hash(state);
		self.release[..significant].hash(state);
		self.pre.hash(state);
		self.post.hash(state);
		self.dev.hash(state);
	}
}

impl std::fmt::Display for Version {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.text)
	}
}

impl std::str::FromStr for Version {
	type Err = ParseError;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<&str> for Version {
	type Error = ParseError;
	fn try_from(value: &str) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl Serialize for Version {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Version {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		Version::parse(&s).map_err(de::Error::custom)
	}
}

/* Parsing */

struct Scanner<'a> {
	s: &'a [u8],
	pos: usize,
	/// Set when a number didn't fit, the whole version is then rejected.
	overflow: bool,
}

impl<'a> Scanner<'a> {
	fn peek_at(&self, offset: usize) -> Option<u8> {
		self.s.get(self.pos + offset).copied()
	}

	fn is_done(&self) -> bool {
		self.pos >= self.s.len()
	}

	fn eat(&mut self, word: &str) -> bool {
		if self.s[self.pos..].starts_with(word.as_bytes()) {
			self.pos += word.len();
			true
		} else {
			false
		}
	}

	fn separator(&mut self) {
		if matches!(self.peek_at(0), Some(b'.' | b'-' | b'_')) {
			self.pos += 1;
		}
	}

	fn number(&mut self) -> Option<u64> {
		let start = self.pos;
		while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
			self.pos += 1;
		}
		if start == self.pos {
			return None;
		}
		let digits = std::str::from_utf8(&self.s[start..self.pos]).ok()?;
		match digits.parse::<u64>() {
			Ok(n) => Some(n),
			Err(_) => {
				self.overflow = true;
				Some(0)
			}
		}
	}

	/// An optionally separated number following a suffix word, `0` when absent.
	fn implicit_number(&mut self) -> u64 {
		let before = self.pos;
		self.separator();
		match self.number() {
			Some(n) => n,
			None => {
				self.pos = before;
				0
			}
		}
	}

	fn pre_release(&mut self) -> Option<(PreRelease, u64)> {
		const WORDS: [(&str, PreRelease); 8] = [
			("alpha", PreRelease::Alpha),
			("a", PreRelease::Alpha),
			("beta", PreRelease::Beta),
			("b", PreRelease::Beta),
			("preview", PreRelease::ReleaseCandidate),
			("pre", PreRelease::ReleaseCandidate),
			("rc", PreRelease::ReleaseCandidate),
			("c", PreRelease::ReleaseCandidate),
		];
		let start = self.pos;
		self.separator();
		for (word, kind) in WORDS {
			if self.eat(word) {
				return Some((kind, self.implicit_number()));
			}
		}
		self.pos = start;
		None
	}

	fn post_release(&mut self) -> Option<u64> {
		let start = self.pos;
		/* `1.0-1` is an implicit post release */
		if self.peek_at(0) == Some(b'-') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
			self.pos += 1;
			return self.number();
		}
		self.separator();
		for word in ["post", "rev", "r"] {
			if self.eat(word) {
				return Some(self.implicit_number());
			}
		}
		self.pos = start;
		None
	}

	fn dev_release(&mut self) -> Option<u64> {
		let start = self.pos;
		self.separator();
		if self.eat("dev") {
			return Some(self.implicit_number());
		}
		self.pos = start;
		None
	}
}

fn scan(text: &str) -> Option<Version> {
	let trimmed = text.trim();
	let lower = trimmed.to_ascii_lowercase();
	let mut sc = Scanner { s: lower.as_bytes(), pos: 0, overflow: false };

	sc.eat("v");
	let mut epoch = 0;
	let mut release = vec![sc.number()?];
	if sc.eat("!") {
		epoch = release[0];
		release = vec![sc.number()?];
	}
	while sc.peek_at(0) == Some(b'.') && sc.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
		sc.pos += 1;
		release.push(sc.number()?);
	}

	let pre = sc.pre_release();
	let post = sc.post_release();
	let dev = sc.dev_release();

	/* Anything left over, local labels included, is not a version we handle */
	if !sc.is_done() || sc.overflow {
		return None;
	}

	Some(Version { epoch, release, pre, post, dev, text: trimmed.to_string() })
}
