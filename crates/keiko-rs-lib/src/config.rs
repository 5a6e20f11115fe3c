use serde::*;

/// Options shared by the registry client and the resolver.
///
/// Every field has a default so a partial config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeikoOptions {
	index_url: String,
	concurrency: usize,
	/// Seconds.
	timeout: u64,
	user_agent: String,
	allow_prereleases: bool,
	backup: bool,
	https_only: bool,
}

impl Default for KeikoOptions {
	fn default() -> Self {
		Self {
			index_url: crate::registry::DEFAULT_INDEX_URL.to_string(),
			concurrency: 8,
			timeout: 10,
			user_agent: concat!("keiko-rs/", env!("CARGO_PKG_VERSION")).to_string(),
			allow_prereleases: false,
			backup: true,
			https_only: true,
		}
	}
}

impl KeikoOptions {
	/// Where the config file is looked for when no path is given.
	pub fn default_path() -> Option<std::path::PathBuf> {
		#[cfg(target_os = "windows")]
		let path = std::env::var("APPDATA").ok().map(std::path::PathBuf::from);

		#[cfg(not(target_os = "windows"))]
		let path = if let Ok(e) = std::env::var("XDG_CONFIG_HOME") {
			Some(std::path::PathBuf::from(e))
		} else {
			std::env::var("HOME").ok().map(|home| std::path::PathBuf::from(home).join(".config"))
		};

		path.map(|p| p.join("keiko-rs").join("config.json"))
	}

	pub fn load_from_disk(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let file = std::fs::File::open(path.as_ref())?;
		let options: KeikoOptions = serde_json::from_reader(std::io::BufReader::new(file))?;
		if options.concurrency == 0 {
			return Err(crate::Error::Config("concurrency must be at least 1".to_string()));
		}
		if !options.is_allowed_index_url(&options.index_url) {
			return Err(crate::Error::Config(format!("index url `{}` is not allowed", options.index_url)));
		}
		log::debug!("Loaded options from {}", path.as_ref().display());
		Ok(options)
	}

	/// Plain `http://` only passes with `https_only` turned off.
	fn is_allowed_index_url(&self, index_url: &str) -> bool {
		index_url.starts_with("https://") || (!self.https_only && index_url.starts_with("http://"))
	}

	pub fn save_to_disk(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = std::fs::File::create(path)?;
		serde_json::to_writer_pretty(file, self)?;
		Ok(())
	}

	pub fn index_url(&self) -> &str {
		&self.index_url
	}
	/// returns if the url is valid or not.
	pub fn set_index_url(&mut self, index_url: &str) -> bool {
		if self.is_allowed_index_url(index_url) {
			self.index_url = index_url.to_string();
			true
		} else {
			false
		}
	}

	pub fn concurrency(&self) -> usize {
		self.concurrency
	}
	/// returns if the value is valid or not.
	pub fn set_concurrency(&mut self, concurrency: usize) -> bool {
		if concurrency > 0 {
			self.concurrency = concurrency;
			true
		} else {
			false
		}
	}

	pub fn timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.timeout)
	}
	pub fn set_timeout(&mut self, timeout: std::time::Duration) {
		self.timeout = timeout.as_secs().max(1);
	}

	pub fn user_agent(&self) -> &str {
		&self.user_agent
	}
	pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
		self.user_agent = user_agent.into();
	}

	pub fn allow_prereleases(&self) -> bool {
		self.allow_prereleases
	}
	pub fn set_allow_prereleases(&mut self, allow_prereleases: bool) {
		self.allow_prereleases = allow_prereleases;
	}

	pub fn backup(&self) -> bool {
		self.backup
	}
	pub fn set_backup(&mut self, backup: bool) {
		self.backup = backup;
	}

	pub fn https_only(&self) -> bool {
		self.https_only
	}
	pub fn set_https_only(&mut self, https_only: bool) {
		self.https_only = https_only;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn options_partial_file_uses_defaults() {
		let options: KeikoOptions = serde_json::from_str(r#"{ "concurrency": 2, "allow_prereleases": true }"#).unwrap();
		assert_eq!(options.concurrency(), 2);
		assert!(options.allow_prereleases());
		assert_eq!(options.index_url(), crate::registry::DEFAULT_INDEX_URL);
		assert!(options.backup());
	}

	#[test]
	fn options_reject_zero_concurrency() {
		let mut options = KeikoOptions::default();
		assert!(!options.set_concurrency(0));
		assert_eq!(options.concurrency(), 8);
	}

	#[test]
	fn options_plain_http_requires_https_only_off() {
		let mut options = KeikoOptions::default();
		assert!(!options.set_index_url("http://localhost:8080/pypi"));
		options.set_https_only(false);
		assert!(options.set_index_url("http://localhost:8080/pypi"));
	}

	#[test]
	fn options_disk_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("keiko-rs").join("config.json");
		let mut options = KeikoOptions::default();
		options.set_backup(false);
		options.save_to_disk(&path).unwrap();
		assert_eq!(KeikoOptions::load_from_disk(&path).unwrap(), options);
	}

	#[test]
	fn options_load_rejects_plain_http_index() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, r#"{ "index_url": "http://localhost:8080/pypi" }"#).unwrap();
		assert!(matches!(KeikoOptions::load_from_disk(&path), Err(crate::Error::Config(_))));

		std::fs::write(&path, r#"{ "index_url": "http://localhost:8080/pypi", "https_only": false }"#).unwrap();
		assert_eq!(KeikoOptions::load_from_disk(&path).unwrap().index_url(), "http://localhost:8080/pypi");
	}
}
