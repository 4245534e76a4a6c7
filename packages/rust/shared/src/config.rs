//! Application configuration for docsmith.
//!
//! User config lives at `~/.docsmith/docsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docsmith";

// ---------------------------------------------------------------------------
// Config structs (matching docsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// External link validation.
    #[serde(default)]
    pub link_validation: LinkValidationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output directory for built documentation.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Size of the content fetch worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Overall build deadline in seconds (0 disables it).
    #[serde(default)]
    pub timeout_secs: u64,

    /// Write `<name>.gitinfo.json` sidecars for locally sourced documents.
    #[serde(default)]
    pub git_info: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            workers: default_workers(),
            timeout_secs: 0,
            git_info: false,
        }
    }
}

fn default_output_dir() -> String {
    "./site".into()
}
fn default_workers() -> usize {
    10
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Base URL of the GitHub REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}

/// `[link_validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkValidationConfig {
    /// Whether external links are probed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Concurrent link probes.
    #[serde(default = "default_validation_workers")]
    pub workers: usize,

    /// Hosts that are never probed (sample/loopback hosts).
    #[serde(default = "default_ignored_hosts")]
    pub ignored_hosts: Vec<String>,

    /// Host substrings that mark a host as a sample host.
    #[serde(default = "default_ignored_host_markers")]
    pub ignored_host_markers: Vec<String>,

    /// Base delays between HTTP 429 retries, in seconds.
    #[serde(default = "default_retry_intervals")]
    pub retry_intervals_secs: Vec<u64>,

    /// Largest `Retry-After` value (seconds) that is honoured.
    #[serde(default = "default_max_retry_after")]
    pub max_retry_after_secs: u64,
}

impl Default for LinkValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: default_validation_workers(),
            ignored_hosts: default_ignored_hosts(),
            ignored_host_markers: default_ignored_host_markers(),
            retry_intervals_secs: default_retry_intervals(),
            max_retry_after_secs: default_max_retry_after(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_validation_workers() -> usize {
    5
}
fn default_ignored_hosts() -> Vec<String> {
    vec!["localhost".into(), "127.0.0.1".into(), "1.2.3.4".into()]
}
fn default_ignored_host_markers() -> Vec<String> {
    vec!["foo.bar".into()]
}
fn default_retry_intervals() -> Vec<u64> {
    vec![1, 5, 10, 20]
}
fn default_max_retry_after() -> u64 {
    5 * 60
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime link validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Hosts that are treated as valid without probing.
    pub ignored_hosts: Vec<String>,
    /// Host substrings that are treated as valid without probing.
    pub ignored_host_markers: Vec<String>,
    /// Base delay schedule for HTTP 429 retries.
    pub retry_intervals: Vec<Duration>,
    /// Upper bound for an honoured `Retry-After` header.
    pub max_retry_after: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::from(&LinkValidationConfig::default())
    }
}

impl From<&LinkValidationConfig> for ValidatorConfig {
    fn from(config: &LinkValidationConfig) -> Self {
        Self {
            ignored_hosts: config.ignored_hosts.clone(),
            ignored_host_markers: config.ignored_host_markers.clone(),
            retry_intervals: config
                .retry_intervals_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            max_retry_after: Duration::from_secs(config.max_retry_after_secs),
        }
    }
}

/// Runtime build configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Manifest describing the documentation structure.
    pub manifest: PathBuf,
    /// Root of the generated output tree.
    pub output_dir: PathBuf,
    /// Content fetch pool size.
    pub workers: usize,
    /// Link probe pool size.
    pub validation_workers: usize,
    /// Whether to validate external links.
    pub validate_links: bool,
    /// Whether to emit git-info sidecars.
    pub git_info: bool,
    /// Optional deadline for the whole build.
    pub timeout: Option<Duration>,
    /// GitHub API base URL.
    pub github_api_url: String,
    /// GitHub API token, if available.
    pub github_token: Option<String>,
    /// Link validator settings.
    pub validator: ValidatorConfig,
}

impl BuildConfig {
    /// Derive a build config from the app config for the given manifest.
    pub fn from_app(config: &AppConfig, manifest: impl Into<PathBuf>) -> Self {
        let timeout = match config.defaults.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            manifest: manifest.into(),
            output_dir: PathBuf::from(&config.defaults.output_dir),
            workers: config.defaults.workers.max(1),
            validation_workers: config.link_validation.workers.max(1),
            validate_links: config.link_validation.enabled,
            git_info: config.defaults.git_info,
            timeout,
            github_api_url: config.github.api_url.clone(),
            github_token: github_token(config),
            validator: ValidatorConfig::from(&config.link_validation),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docsmith/docsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsmithError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsmithError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the GitHub token from the configured env var, if set and non-empty.
pub fn github_token(config: &AppConfig) -> Option<String> {
    std::env::var(&config.github.token_env)
        .ok()
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("GITHUB_TOKEN"));
        assert!(toml_str.contains("retry_intervals_secs"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
workers = 3

[link_validation]
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.workers, 3);
        assert_eq!(config.defaults.output_dir, "./site");
        assert!(!config.link_validation.enabled);
        assert_eq!(config.link_validation.retry_intervals_secs, vec![1, 5, 10, 20]);
        assert_eq!(config.github.api_url, "https://api.github.com");
    }

    #[test]
    fn validator_config_from_app_config() {
        let validator = ValidatorConfig::default();
        assert_eq!(validator.retry_intervals.len(), 4);
        assert_eq!(validator.retry_intervals[1], Duration::from_secs(5));
        assert_eq!(validator.max_retry_after, Duration::from_secs(300));
        assert!(validator.ignored_hosts.contains(&"localhost".to_string()));
    }

    #[test]
    fn build_config_from_app_config() {
        let mut app = AppConfig::default();
        app.defaults.timeout_secs = 30;
        app.defaults.workers = 0;
        app.github.token_env = "DOCSMITH_TEST_NONEXISTENT_TOKEN_12345".into();

        let build = BuildConfig::from_app(&app, "docs.toml");
        assert_eq!(build.workers, 1);
        assert_eq!(build.timeout, Some(Duration::from_secs(30)));
        assert!(build.github_token.is_none());
        assert_eq!(build.manifest, PathBuf::from("docs.toml"));
    }
}
