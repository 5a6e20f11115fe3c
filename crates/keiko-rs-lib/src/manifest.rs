//! Reading and rewriting the requirement lists of a `pyproject.toml`.
//!
//! The document is edited in place with [`toml_edit`], so comments, ordering and whitespace
//! survive an update. Only the strings of updated requirements are replaced.

use std::path::{Path, PathBuf};

use toml_edit::{Array, DocumentMut, Item};

use crate::resolver::{ResolutionResult, TopLevelRequirement};

/// A requirement list inside the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
	/// `project.dependencies`
	Project,
	/// `project.optional-dependencies.<group>`
	Optional(String),
	/// `dependency-groups.<group>`
	Group(String),
}

impl std::fmt::Display for Section {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Section::Project => write!(f, "project.dependencies"),
			Section::Optional(group) => write!(f, "project.optional-dependencies.{}", group),
			Section::Group(group) => write!(f, "dependency-groups.{}", group),
		}
	}
}

/// Where a requirement string sits in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
	section: Section,
	/// Index in the TOML array, non string entries included.
	index: usize,
	text: String,
}

#[derive(Debug, Clone)]
pub struct Manifest {
	path: PathBuf,
	document: DocumentMut,
	locations: Vec<Location>,
}

impl Manifest {
	pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		log::debug!("Reading manifest {}", path.display());
		let contents = std::fs::read_to_string(path)?;
		Self::parse(path, &contents)
	}

	/// Parses `contents` as the manifest that lives at `path`.
	pub fn parse(path: impl Into<PathBuf>, contents: &str) -> crate::Result<Self> {
		let document: DocumentMut = contents.parse()?;
		let locations = collect_locations(&document);
		Ok(Self { path: path.into(), document, locations })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Every requirement string in document order, tagged with its section.
	pub fn requirements(&self) -> Vec<TopLevelRequirement> {
		self.locations.iter()
			.map(|l| TopLevelRequirement::new(l.section.to_string(), l.text.clone()))
			.collect()
	}

	/// Writes the new requirement text of every updated entry into the document.
	///
	/// `result` must come from resolving [`Manifest::requirements`]. Returns how many strings changed,
	/// entries whose new text matches the current one don't count.
	pub fn apply(&mut self, result: &ResolutionResult) -> crate::Result<usize> {
		let mut changed = 0;
		for entry in result.updated() {
			let Some(new_requirement) = &entry.new_requirement else { continue };
			let location = self.locations.get(entry.position)
				.filter(|l| l.text == entry.old_requirement && l.section.to_string() == entry.section)
				.cloned()
				.ok_or_else(|| crate::Error::Manifest(format!("`{}` is not part of {}", entry.old_requirement, self.path.display())))?;
			if *new_requirement == location.text {
				continue;
			}

			let array = section_array_mut(&mut self.document, &location.section)
				.ok_or_else(|| crate::Error::Manifest(format!("section {} disappeared", location.section)))?;
			if location.index >= array.len() {
				return Err(crate::Error::Manifest(format!("{} has no entry {}", location.section, location.index)));
			}

			log::debug!("{}: `{}` -> `{}`", location.section, location.text, new_requirement);
			array.replace(location.index, new_requirement.as_str());
			if let Some(l) = self.locations.get_mut(entry.position) {
				l.text = new_requirement.clone();
			}
			changed += 1;
		}
		Ok(changed)
	}

	/// Path the backup copy is written to, `pyproject.toml.backup` next to the manifest.
	pub fn backup_path(&self) -> PathBuf {
		let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "pyproject.toml".into());
		name.push(".backup");
		self.path.with_file_name(name)
	}

	/// Copies the file currently on disk to [`Manifest::backup_path`].
	pub fn backup(&self) -> crate::Result<PathBuf> {
		let backup = self.backup_path();
		std::fs::copy(&self.path, &backup)?;
		log::info!("Backed up {} to {}", self.path.display(), backup.display());
		Ok(backup)
	}

	pub fn save(&self) -> crate::Result<()> {
		std::fs::write(&self.path, self.document.to_string())?;
		log::info!("Wrote {}", self.path.display());
		Ok(())
	}
}

impl std::fmt::Display for Manifest {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.document)
	}
}

fn collect_locations(document: &DocumentMut) -> Vec<Location> {
	let mut locations = Vec::new();
	let mut push_array = |section: Section, array: &Array| {
		for (index, value) in array.iter().enumerate() {
			/* `{ include-group = "..." }` and friends are left alone */
			if let Some(text) = value.as_str() {
				locations.push(Location { section: section.clone(), index, text: text.to_string() });
			}
		}
	};

	let project = document.get("project").and_then(Item::as_table_like);
	if let Some(array) = project.and_then(|p| p.get("dependencies")).and_then(Item::as_array) {
		push_array(Section::Project, array);
	}
	if let Some(groups) = project.and_then(|p| p.get("optional-dependencies")).and_then(Item::as_table_like) {
		for (group, item) in groups.iter() {
			if let Some(array) = item.as_array() {
				push_array(Section::Optional(group.to_string()), array);
			}
		}
	}
	if let Some(groups) = document.get("dependency-groups").and_then(Item::as_table_like) {
		for (group, item) in groups.iter() {
			if let Some(array) = item.as_array() {
				push_array(Section::Group(group.to_string()), array);
			}
		}
	}
	locations
}

fn section_array_mut<'a>(document: &'a mut DocumentMut, section: &Section) -> Option<&'a mut Array> {
	let item = match section {
		Section::Project => document.get_mut("project")?.as_table_like_mut()?.get_mut("dependencies")?,
		Section::Optional(group) => document.get_mut("project")?
			.as_table_like_mut()?
			.get_mut("optional-dependencies")?
			.as_table_like_mut()?
			.get_mut(group)?,
		Section::Group(group) => document.get_mut("dependency-groups")?.as_table_like_mut()?.get_mut(group)?,
	};
	item.as_array_mut()
}
