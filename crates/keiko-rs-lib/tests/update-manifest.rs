use keiko_rs::KeikoOptions;
use keiko_rs::resolver::*;
use keiko_rs_test_utils::{write_manifest, MockRegistry};

const PYPROJECT: &str = r#"[project]
name = "demo"
version = "0.1.0"
dependencies = [
    # runtime
    "requests>=2.25.0",
    "fastapi[standard]>=0.100.0 ; python_version >= '3.8'",
    "missing-package>=1.0",
]

[project.optional-dependencies]
docs = ["sphinx~=7.0"]

[dependency-groups]
dev = ["pytest>=7", { include-group = "docs" }]
"#;

fn registry() -> MockRegistry {
	let mut registry = MockRegistry::new();
	registry
		.add_versions("requests", &["2.25.0", "2.31.0"]).unwrap()
		.add_release("fastapi", "0.104.1", &["starlette", "uvicorn; extra == \"standard\""]).unwrap()
		.add_versions("starlette", &["0.27.0"]).unwrap()
		.add_versions("uvicorn", &["0.24.0"]).unwrap()
		.add_versions("sphinx", &["7.0.0", "7.2.6"]).unwrap()
		.add_versions("pytest", &["7.0", "7.4.3"]).unwrap();
	registry
}

#[tokio::test]
async fn update_manifest_rewrites_in_place() {
	let _ = env_logger::builder().is_test(true).try_init();
	let (_dir, path) = write_manifest(PYPROJECT).unwrap();
	let registry = registry();

	let report = keiko_rs::update_manifest(&KeikoOptions::default(), &registry, &path, false).await.unwrap();
	assert!(report.written);
	assert_eq!(report.result.updated().count(), 4);
	assert_eq!(report.result.unresolved().next().map(|e| e.identity.as_str()), Some("missing-package"));

	let written = std::fs::read_to_string(&path).unwrap();
	assert!(written.contains("    # runtime\n    \"requests>=2.31.0\","));
	assert!(written.contains(r#""fastapi[standard]>=0.104.1 ; python_version >= '3.8'""#));
	assert!(written.contains(r#""missing-package>=1.0""#));
	assert!(written.contains(r#"docs = ["sphinx~=7.2"]"#));
	assert!(written.contains(r#"dev = ["pytest>=7.4.3", { include-group = "docs" }]"#));

	let backup = report.backup_path.unwrap();
	assert!(backup.ends_with("pyproject.toml.backup"));
	assert_eq!(std::fs::read_to_string(backup).unwrap(), PYPROJECT);
}

#[tokio::test]
async fn update_manifest_dry_run_writes_nothing() {
	let (dir, path) = write_manifest(PYPROJECT).unwrap();
	let registry = registry();

	let report = keiko_rs::update_manifest(&KeikoOptions::default(), &registry, &path, true).await.unwrap();
	assert!(!report.written);
	assert!(report.backup_path.is_none());
	assert_eq!(report.result.updated().count(), 4);
	assert_eq!(std::fs::read_to_string(&path).unwrap(), PYPROJECT);
	assert!(!dir.path().join("pyproject.toml.backup").exists());
}

#[tokio::test]
async fn update_manifest_without_backup() {
	let (dir, path) = write_manifest(PYPROJECT).unwrap();
	let registry = registry();
	let mut options = KeikoOptions::default();
	options.set_backup(false);

	let report = keiko_rs::update_manifest(&options, &registry, &path, false).await.unwrap();
	assert!(report.written);
	assert!(report.backup_path.is_none());
	assert!(!dir.path().join("pyproject.toml.backup").exists());
}

#[tokio::test]
async fn update_manifest_second_run_changes_nothing() {
	let (_dir, path) = write_manifest(PYPROJECT).unwrap();
	let registry = registry();
	let options = KeikoOptions::default();

	keiko_rs::update_manifest(&options, &registry, &path, false).await.unwrap();
	let after_first = std::fs::read_to_string(&path).unwrap();

	let report = keiko_rs::update_manifest(&options, &registry, &path, false).await.unwrap();
	assert!(!report.written);
	assert!(report.result.entries.iter().all(|e| e.status != UpdateStatus::Updated));
	assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
}

#[tokio::test]
async fn update_manifest_second_run_keeps_original_backup() {
	let (_dir, path) = write_manifest(PYPROJECT).unwrap();
	let registry = registry();
	let options = KeikoOptions::default();

	let first = keiko_rs::update_manifest(&options, &registry, &path, false).await.unwrap();
	let backup = first.backup_path.unwrap();

	let second = keiko_rs::update_manifest(&options, &registry, &path, false).await.unwrap();
	assert!(second.backup_path.is_none());
	assert_eq!(std::fs::read_to_string(backup).unwrap(), PYPROJECT);
}

#[tokio::test]
async fn update_manifest_conflicting_pins_write_nothing() {
	let contents = "[project]\nname = \"pins\"\ndependencies = [\"pkgC==1.0.0\", \"pkgC==2.0.0\"]\n";
	let (dir, path) = write_manifest(contents).unwrap();
	let mut registry = MockRegistry::new();
	registry.add_versions("pkgC", &["1.0.0", "2.0.0"]).unwrap();

	let report = keiko_rs::update_manifest(&KeikoOptions::default(), &registry, &path, false).await.unwrap();
	assert!(!report.written);
	assert_eq!(report.result.unresolved().count(), 2);
	assert!(report.result.unresolved().all(|e| e.unresolved_reason() == Some(Reason::NoCompatibleVersion)));
	assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
	assert!(!dir.path().join("pyproject.toml.backup").exists());
}

#[tokio::test]
async fn update_manifest_empty_project() {
	let (_dir, path) = write_manifest("[project]\nname = \"empty\"\n").unwrap();
	let registry = MockRegistry::new();

	let report = keiko_rs::update_manifest(&KeikoOptions::default(), &registry, &path, false).await.unwrap();
	assert!(report.result.entries.is_empty());
	assert!(!report.written);
	assert_eq!(registry.max_repeated_calls(), 0);
}

#[tokio::test]
async fn update_manifest_missing_file_is_fatal() {
	let dir = tempfile::tempdir().unwrap();
	let registry = MockRegistry::new();
	let result = keiko_rs::update_manifest(&KeikoOptions::default(), &registry, dir.path().join("pyproject.toml"), false).await;
	assert!(matches!(result, Err(keiko_rs::Error::IO(_))));
}
