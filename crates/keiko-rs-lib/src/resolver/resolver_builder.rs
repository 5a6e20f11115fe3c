use super::Resolver;
use super::TopLevelRequirement;
use crate::registry::Registry;

pub struct ResolverBuilder<'r, R: Registry + ?Sized> {
	registry: &'r R,
	requirements: Vec<TopLevelRequirement>,
	concurrency: usize,
	allow_prereleases: bool,
}

impl<'r, R: Registry + ?Sized> ResolverBuilder<'r, R> {
	pub fn new(registry: &'r R) -> Self {
		let defaults = crate::KeikoOptions::default();
		Self {
			registry,
			requirements: Default::default(),
			concurrency: defaults.concurrency(),
			allow_prereleases: defaults.allow_prereleases(),
		}
	}

	/// Takes the concurrency limit and pre-release policy from `options`.
	pub fn options(mut self, options: &crate::KeikoOptions) -> Self {
		self.concurrency = options.concurrency();
		self.allow_prereleases = options.allow_prereleases();
		self
	}

	pub fn add_requirements(mut self, requirements: impl IntoIterator<Item = TopLevelRequirement>) -> Self {
		for requirement in requirements {
			self.requirements.push(requirement);
		}
		self
	}

	/// Adds every string in `texts` as belonging to `section`.
	pub fn add_section<S: Into<String>>(self, section: &str, texts: impl IntoIterator<Item = S>) -> Self {
		self.add_requirements(texts.into_iter().map(|t| TopLevelRequirement::new(section, t)))
	}

	/// Upper bound on metadata fetches in flight. Zero is treated as one.
	pub fn concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency.max(1);
		self
	}

	pub fn allow_prereleases(mut self, allow: bool) -> Self {
		self.allow_prereleases = allow;
		self
	}

	pub fn build(self) -> Resolver<'r, R> {
		Resolver {
			registry: self.registry,
			requirements: self.requirements,
			concurrency: self.concurrency.max(1),
			allow_prereleases: self.allow_prereleases,
		}
	}
}
