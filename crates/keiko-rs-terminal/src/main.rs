use std::path::PathBuf;
use std::process::ExitCode;

use keiko_rs::resolver::UpdateEntry;
use keiko_rs::updater::UpdateReport;

#[tokio::main]
async fn main() -> ExitCode {
	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",        "Show help");
		opts.optflag( "v", "verbose",     "Increased verbosity");
		opts.optflag( "",  "dry-run",     "Resolve and report without writing the manifest");
		opts.optflag( "",  "no-backup",   "Don't copy the manifest to pyproject.toml.backup before writing");
		opts.optflag( "",  "pre",         "Allow pre-release versions");
		opts.optflag( "",  "json",        "Print the resolution result as JSON");
		opts.optopt(  "",  "pyproject",   "Manifest to update", "PATH");
		opts.optopt(  "",  "config",      "Options file", "PATH");
		opts.optopt(  "",  "concurrency", "Metadata requests in flight", "N");
		opts.optopt(  "",  "index-url",   "Package index JSON API", "URL");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { eprintln!("Unable to parse options: {}", e); return ExitCode::FAILURE }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage("Usage: keiko-rs-terminal [options]"));
			return ExitCode::SUCCESS;
		}

		parsed_options
	};

	let level = if parsed_options.opt_present("v") { "info" } else { "warn" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

	match run(&parsed_options).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			log::error!("{}", e);
			eprintln!("error: {}", e);
			ExitCode::FAILURE
		},
	}
}

async fn run(parsed_options: &getopts::Matches) -> Result<(), Error> {
	let mut options = load_options(parsed_options.opt_str("config"))?;

	if let Some(n) = parsed_options.opt_str("concurrency") {
		let n = n.parse::<usize>().map_err(|_| Error::InvalidArgument(format!("concurrency `{}` is not a number", n)))?;
		if !options.set_concurrency(n) {
			return Err(Error::InvalidArgument("concurrency must be at least 1".to_string()));
		}
	}
	if let Some(url) = parsed_options.opt_str("index-url") {
		if !options.set_index_url(&url) {
			return Err(Error::InvalidArgument(format!("index url `{}` is not allowed", url)));
		}
	}
	if parsed_options.opt_present("pre") {
		options.set_allow_prereleases(true);
	}
	if parsed_options.opt_present("no-backup") {
		options.set_backup(false);
	}

	let path = parsed_options.opt_str("pyproject").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("pyproject.toml"));
	let dry_run = parsed_options.opt_present("dry-run");

	let registry = keiko_rs::PypiRegistry::new(&options)?;
	let report = keiko_rs::update_manifest(&options, &registry, &path, dry_run).await?;

	if parsed_options.opt_present("json") {
		println!("{}", serde_json::to_string_pretty(&report.result)?);
	} else {
		print_report(&report, &path, dry_run);
	}
	Ok(())
}

/// An explicit path has to load, the default location falls back to defaults.
fn load_options(path: Option<String>) -> Result<keiko_rs::KeikoOptions, Error> {
	if let Some(path) = path {
		return Ok(keiko_rs::KeikoOptions::load_from_disk(path)?);
	}

	match keiko_rs::KeikoOptions::default_path() {
		Some(path) if path.exists() => Ok(keiko_rs::KeikoOptions::load_from_disk(&path).unwrap_or_else(|e| {
			log::warn!("Failed to read config file: {}", e);
			log::warn!("Using default config.");
			keiko_rs::KeikoOptions::default()
		})),
		_ => Ok(keiko_rs::KeikoOptions::default()),
	}
}

fn describe_old(entry: &UpdateEntry) -> &str {
	if entry.old_constraint.is_empty() { "*" } else { &entry.old_constraint }
}

fn print_report(report: &UpdateReport, path: &std::path::Path, dry_run: bool) {
	let result = &report.result;

	let mut sections = Vec::<&str>::new();
	for entry in result.updated() {
		if !sections.contains(&entry.section.as_str()) {
			sections.push(&entry.section);
		}
	}
	for section in sections {
		println!("{}:", section);
		for entry in result.updated().filter(|e| e.section == section) {
			if let Some(new_version) = &entry.new_version {
				println!("\t{}: {} -> {}", entry.identity, describe_old(entry), new_version);
			}
		}
	}

	let unresolved: Vec<_> = result.unresolved().collect();
	if !unresolved.is_empty() {
		println!("Skipped:");
		for entry in &unresolved {
			if let Some(reason) = entry.unresolved_reason() {
				match &entry.detail {
					Some(detail) => println!("\t{} [{}]: {:?} ({})", entry.identity, entry.section, reason, detail),
					None => println!("\t{} [{}]: {:?}", entry.identity, entry.section, reason),
				}
			}
		}
	}

	if !result.warnings.is_empty() {
		println!("Warnings:");
		for warning in &result.warnings {
			println!("\t{}: {}", warning.package, warning.message);
		}
	}

	println!(
		"{} of {} requirement(s) updated, {} skipped.",
		result.updated().count(),
		result.entries.len(),
		unresolved.len(),
	);

	if dry_run {
		println!("Dry run, {} left unchanged.", path.display());
	} else if report.written {
		println!("Wrote {}.", path.display());
	}
	if let Some(backup) = &report.backup_path {
		println!("Backup at {}.", backup.display());
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Keiko(#[from] keiko_rs::Error),
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
