use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DigestError, Result};

/// Smallest chunk ceiling accepted; anything lower cannot hold a diff header.
pub const MIN_CHUNK_BYTES: usize = 256;

/// Longest lookback accepted, in days.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Attempts per generation call are capped so the backoff stays bounded.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
   pub api_base_url: String,

   /// API key for the text-generation endpoint (overridden by
   /// `GIT_DIGEST_API_KEY`). Required at run time.
   pub api_key: Option<String>,

   pub model:       String,
   pub temperature: f32,

   /// HTTP request timeout in seconds
   pub request_timeout_secs: u64,

   /// HTTP connection timeout in seconds
   pub connect_timeout_secs: u64,

   pub max_retries:        u32,
   pub initial_backoff_ms: u64,

   /// Days to look back; 0 means "since local midnight"
   pub lookback_days: u32,

   /// Most recent commits kept per branch
   pub max_commits_per_branch: usize,

   /// Byte ceiling for a single diff chunk sent to the model
   pub chunk_max_bytes: usize,

   /// Repository identity (e.g. `org/project`), substituted for `{repo}`
   pub repo_identity: String,

   /// Commit link template with `{repo}` and `{hash}` placeholders
   pub commit_url_template: String,

   /// Alternate checkout to report on instead of the current directory
   pub repo_dir: Option<PathBuf>,

   /// Chat webhook; the report is printed to the console when unset
   pub webhook_url: Option<String>,

   /// Run `git fetch --all --prune` before collecting
   pub fetch_remotes: bool,

   /// Pathspecs excluded from every diff
   pub excluded_paths: Vec<String>,

   #[serde(skip)]
   pub verbose: bool,
}

impl Default for DigestConfig {
   fn default() -> Self {
      Self {
         api_base_url:           "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
         api_key:                None,
         model:                  "qwen-plus".to_string(),
         temperature:            0.3,
         request_timeout_secs:   300,
         connect_timeout_secs:   30,
         max_retries:            3,
         initial_backoff_ms:     1000,
         lookback_days:          0,
         max_commits_per_branch: 50,
         chunk_max_bytes:        60_000,
         repo_identity:          String::new(),
         commit_url_template:    "https://github.com/{repo}/commit/{hash}".to_string(),
         repo_dir:               None,
         webhook_url:            None,
         fetch_remotes:          true,
         excluded_paths:         vec![
            "package-lock.json".to_string(),
            "yarn.lock".to_string(),
            "pnpm-lock.yaml".to_string(),
            "Cargo.lock".to_string(),
            "poetry.lock".to_string(),
            "composer.lock".to_string(),
            "go.sum".to_string(),
            "dist/".to_string(),
            "build/".to_string(),
            "target/".to_string(),
            "node_modules/".to_string(),
            "*.min.js".to_string(),
            "*.min.css".to_string(),
            "*.map".to_string(),
         ],
         verbose:                false,
      }
   }
}

impl DigestConfig {
   /// Load config from `GIT_DIGEST_CONFIG` or `~/.config/git-digest/config.toml`.
   /// Falls back to defaults when no file exists. Environment variables
   /// override file values.
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("GIT_DIGEST_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_default()
      };

      if config_path.as_os_str().is_empty() || !config_path.exists() {
         let mut config = Self::default();
         config.apply_env_overrides()?;
         return Ok(config);
      }

      Self::from_file(&config_path)
   }

   /// Load config from a specific file
   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path).map_err(|e| {
         DigestError::ConfigError(format!("failed to read {}: {e}", path.display()))
      })?;
      let mut config = Self::from_toml(&contents)?;
      config.apply_env_overrides()?;
      Ok(config)
   }

   pub fn from_toml(contents: &str) -> Result<Self> {
      toml::from_str(contents).map_err(|e| DigestError::ConfigError(format!("failed to parse: {e}")))
   }

   fn apply_env_overrides(&mut self) -> Result<()> {
      self.apply_overrides(|key| std::env::var(key).ok())
   }

   /// Apply `GIT_DIGEST_*` overrides from an arbitrary lookup.
   pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
   where
      F: Fn(&str) -> Option<String>,
   {
      if let Some(url) = lookup("GIT_DIGEST_API_URL") {
         self.api_base_url = url;
      }
      if let Some(key) = lookup("GIT_DIGEST_API_KEY").filter(|k| !k.trim().is_empty()) {
         self.api_key = Some(key);
      }
      if let Some(model) = lookup("GIT_DIGEST_MODEL") {
         self.model = model;
      }
      if let Some(days) = lookup("GIT_DIGEST_DAYS") {
         self.lookback_days = parse_number("GIT_DIGEST_DAYS", &days)?;
      }
      if let Some(cap) = lookup("GIT_DIGEST_MAX_COMMITS_PER_BRANCH") {
         self.max_commits_per_branch = parse_number("GIT_DIGEST_MAX_COMMITS_PER_BRANCH", &cap)?;
      }
      if let Some(bytes) = lookup("GIT_DIGEST_CHUNK_BYTES") {
         self.chunk_max_bytes = parse_number("GIT_DIGEST_CHUNK_BYTES", &bytes)?;
      }
      if let Some(repo) = lookup("GIT_DIGEST_REPO") {
         self.repo_identity = repo;
      }
      if let Some(dir) = lookup("GIT_DIGEST_REPO_DIR").filter(|d| !d.trim().is_empty()) {
         self.repo_dir = Some(PathBuf::from(dir));
      }
      if let Some(hook) = lookup("GIT_DIGEST_WEBHOOK_URL").filter(|h| !h.trim().is_empty()) {
         self.webhook_url = Some(hook);
      }
      if lookup("GIT_DIGEST_VERBOSE").is_some() {
         self.verbose = true;
      }
      Ok(())
   }

   /// Check settings that would make the run meaningless.
   pub fn validate(&self) -> Result<()> {
      if self.chunk_max_bytes < MIN_CHUNK_BYTES {
         return Err(DigestError::ConfigError(format!(
            "chunk_max_bytes must be at least {MIN_CHUNK_BYTES}, got {}",
            self.chunk_max_bytes
         )));
      }
      if self.max_commits_per_branch == 0 {
         return Err(DigestError::ConfigError(
            "max_commits_per_branch must be at least 1".to_string(),
         ));
      }
      if !self.commit_url_template.contains("{hash}") {
         return Err(DigestError::ConfigError(
            "commit_url_template must contain a {hash} placeholder".to_string(),
         ));
      }
      if self.commit_url_template.contains("{repo}") && self.repo_identity.trim().is_empty() {
         return Err(DigestError::ConfigError(
            "repo_identity (GIT_DIGEST_REPO) must be set when commit_url_template uses {repo}"
               .to_string(),
         ));
      }
      if self.lookback_days > MAX_LOOKBACK_DAYS {
         return Err(DigestError::ConfigError(format!(
            "lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {}",
            self.lookback_days
         )));
      }
      if self.max_retries > MAX_RETRIES {
         return Err(DigestError::ConfigError(format!(
            "max_retries must be at most {MAX_RETRIES}, got {}",
            self.max_retries
         )));
      }
      Ok(())
   }

   /// The API key, or the fatal missing-credential error.
   pub fn require_api_key(&self) -> Result<&str> {
      self
         .api_key
         .as_deref()
         .ok_or(DigestError::MissingCredential("GIT_DIGEST_API_KEY"))
   }

   /// Build the link for a commit from the URL template.
   pub fn commit_url(&self, hash: &str) -> String {
      self
         .commit_url_template
         .replace("{repo}", &self.repo_identity)
         .replace("{hash}", hash)
   }

   /// Get default config path (platform-safe)
   /// Tries HOME (Unix/Linux/macOS) then USERPROFILE (Windows)
   pub fn default_config_path() -> Result<PathBuf> {
      config_home().map(|dir| dir.join("config.toml"))
   }
}

/// `~/.config/git-digest`, if a home directory can be found.
pub fn config_home() -> Result<PathBuf> {
   if let Ok(home) = std::env::var("HOME") {
      return Ok(PathBuf::from(home).join(".config/git-digest"));
   }

   if let Ok(home) = std::env::var("USERPROFILE") {
      return Ok(PathBuf::from(home).join(".config/git-digest"));
   }

   Err(DigestError::Other("No home directory found (tried HOME and USERPROFILE)".to_string()))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
   value
      .trim()
      .parse()
      .map_err(|_| DigestError::ConfigError(format!("{key} must be a non-negative integer, got '{value}'")))
}

#[cfg(test)]
mod tests {
   use std::collections::HashMap;

   use super::*;

   fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
      let map: HashMap<String, String> = pairs
         .iter()
         .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
         .collect();
      move |key| map.get(key).cloned()
   }

   fn with_repo() -> DigestConfig {
      DigestConfig { repo_identity: "acme/widgets".to_string(), ..Default::default() }
   }

   #[test]
   fn test_defaults_plus_repo_are_valid() {
      let config = with_repo();
      assert!(config.validate().is_ok());
      assert_eq!(config.lookback_days, 0);
      assert!(config.api_key.is_none());
   }

   #[test]
   fn test_validate_requires_repo_for_repo_template() {
      let err = DigestConfig::default().validate().unwrap_err();
      assert!(err.to_string().contains("repo_identity"));

      let config = DigestConfig {
         commit_url_template: "https://git.internal/commit/{hash}".to_string(),
         ..Default::default()
      };
      assert!(config.validate().is_ok());
   }

   #[test]
   fn test_validate_rejects_huge_lookback() {
      let config = DigestConfig { lookback_days: 100_000_000, ..with_repo() };
      assert!(matches!(config.validate(), Err(DigestError::ConfigError(_))));
      let config = DigestConfig { lookback_days: MAX_LOOKBACK_DAYS, ..with_repo() };
      assert!(config.validate().is_ok());
   }

   #[test]
   fn test_validate_rejects_excessive_retries() {
      let config = DigestConfig { max_retries: 70, ..with_repo() };
      assert!(config.validate().is_err());
   }

   #[test]
   fn test_from_toml_partial() {
      let config = DigestConfig::from_toml(
         r#"
model = "qwen-max"
lookback_days = 3
repo_identity = "acme/widgets"
"#,
      )
      .unwrap();
      assert_eq!(config.model, "qwen-max");
      assert_eq!(config.lookback_days, 3);
      assert_eq!(config.repo_identity, "acme/widgets");
      // Untouched fields keep defaults
      assert_eq!(config.max_commits_per_branch, 50);
   }

   #[test]
   fn test_from_toml_rejects_garbage() {
      let err = DigestConfig::from_toml("lookback_days = \"many\"").unwrap_err();
      assert!(matches!(err, DigestError::ConfigError(_)));
   }

   #[test]
   fn test_env_overrides() {
      let mut config = DigestConfig::default();
      config
         .apply_overrides(env(&[
            ("GIT_DIGEST_API_KEY", "sk-test"),
            ("GIT_DIGEST_DAYS", "7"),
            ("GIT_DIGEST_MAX_COMMITS_PER_BRANCH", "10"),
            ("GIT_DIGEST_CHUNK_BYTES", "4096"),
            ("GIT_DIGEST_REPO_DIR", "/srv/checkout"),
            ("GIT_DIGEST_WEBHOOK_URL", "https://hooks.example/abc"),
         ]))
         .unwrap();
      assert_eq!(config.api_key.as_deref(), Some("sk-test"));
      assert_eq!(config.lookback_days, 7);
      assert_eq!(config.max_commits_per_branch, 10);
      assert_eq!(config.chunk_max_bytes, 4096);
      assert_eq!(config.repo_dir, Some(PathBuf::from("/srv/checkout")));
      assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example/abc"));
   }

   #[test]
   fn test_env_override_blank_key_ignored() {
      let mut config = DigestConfig::default();
      config
         .apply_overrides(env(&[("GIT_DIGEST_API_KEY", "  ")]))
         .unwrap();
      assert!(matches!(config.require_api_key(), Err(DigestError::MissingCredential(_))));
   }

   #[test]
   fn test_env_override_bad_number() {
      let mut config = DigestConfig::default();
      let err = config
         .apply_overrides(env(&[("GIT_DIGEST_DAYS", "-1")]))
         .unwrap_err();
      assert!(err.to_string().contains("GIT_DIGEST_DAYS"));
   }

   #[test]
   fn test_validate_rejects_small_chunks() {
      let config = DigestConfig { chunk_max_bytes: 10, ..with_repo() };
      assert!(config.validate().is_err());
   }

   #[test]
   fn test_validate_rejects_zero_cap() {
      let config = DigestConfig { max_commits_per_branch: 0, ..with_repo() };
      assert!(config.validate().is_err());
   }

   #[test]
   fn test_validate_requires_hash_placeholder() {
      let config =
         DigestConfig { commit_url_template: "https://example.com".to_string(), ..Default::default() };
      assert!(config.validate().is_err());
   }

   #[test]
   fn test_commit_url() {
      let config = DigestConfig { repo_identity: "acme/widgets".to_string(), ..Default::default() };
      assert_eq!(config.commit_url("abc123"), "https://github.com/acme/widgets/commit/abc123");
   }
}
