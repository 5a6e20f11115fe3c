//! One call that loads a manifest, resolves it and writes the newer requirements back.

use std::path::{Path, PathBuf};

use crate::manifest::Manifest;
use crate::registry::Registry;
use crate::resolver::{ResolutionResult, ResolverBuilder};

#[derive(Debug, Clone)]
pub struct UpdateReport {
	pub result: ResolutionResult,
	/// `false` for dry runs and when nothing needed changing.
	pub written: bool,
	pub backup_path: Option<PathBuf>,
}

/// Updates every requirement of the manifest at `path` to its newest compatible version.
///
/// All sections are resolved together so a package shared between them gets one version.
/// Only fatal problems like an unreadable manifest are errors, per-package failures are part of the report.
pub async fn update_manifest<R: Registry + ?Sized>(
	options: &crate::KeikoOptions,
	registry: &R,
	path: impl AsRef<Path>,
	dry_run: bool,
) -> crate::Result<UpdateReport> {
	let mut manifest = Manifest::load(path)?;
	let requirements = manifest.requirements();
	if requirements.is_empty() {
		log::info!("No requirements found in {}", manifest.path().display());
		return Ok(UpdateReport { result: ResolutionResult::default(), written: false, backup_path: None });
	}

	let result = ResolverBuilder::new(registry)
		.options(options)
		.add_requirements(requirements)
		.build()
		.resolve()
		.await;

	let changed = manifest.apply(&result)?;
	if dry_run || changed == 0 {
		log::info!("Leaving {} untouched ({} change(s))", manifest.path().display(), changed);
		return Ok(UpdateReport { result, written: false, backup_path: None });
	}

	let backup_path = if options.backup() { Some(manifest.backup()?) } else { None };
	manifest.save()?;

	Ok(UpdateReport { result, written: true, backup_path })
}
