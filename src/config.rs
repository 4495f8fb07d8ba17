//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration from
//! `.cdkwatch.toml` files.

use crate::models::TrackedLibrary;
use crate::report::{Markers, ReleaseTextOptions};
use crate::repo::Author;
use crate::upstream::GitHubSettings;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".cdkwatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Release settings.
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Tracked libraries.
    #[serde(default = "default_libraries")]
    pub libraries: Vec<TrackedLibrary>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            github: GitHubConfig::default(),
            release: ReleaseConfig::default(),
            libraries: default_libraries(),
        }
    }
}

fn default_libraries() -> Vec<TrackedLibrary> {
    vec![TrackedLibrary::new("aws-cdk", "aws/aws-cdk")]
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding one version record per library.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Document whose badge block is regenerated on release.
    #[serde(default = "default_readme")]
    pub readme: PathBuf,

    /// Manifest carrying the downstream package version.
    #[serde(default = "default_pyproject")]
    pub pyproject: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            readme: default_readme(),
            pyproject: default_pyproject(),
            verbose: false,
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("current-versions")
}

fn default_readme() -> PathBuf {
    PathBuf::from("README.md")
}

fn default_pyproject() -> PathBuf {
    PathBuf::from("pyproject.toml")
}

/// GitHub API settings. The token only ever comes from the CLI/env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Release settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Sentinel opening the generated badge block.
    #[serde(default = "default_start_marker")]
    pub start_marker: String,

    /// Sentinel closing the generated badge block.
    #[serde(default = "default_end_marker")]
    pub end_marker: String,

    /// shields.io badge color.
    #[serde(default = "default_badge_color")]
    pub badge_color: String,

    /// Prefix of the release tag name.
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Commit and tag after rendering.
    #[serde(default = "default_true")]
    pub commit: bool,

    /// Fallback commit author name.
    #[serde(default = "default_author_name")]
    pub author_name: String,

    /// Fallback commit author email.
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            start_marker: default_start_marker(),
            end_marker: default_end_marker(),
            badge_color: default_badge_color(),
            tag_prefix: default_tag_prefix(),
            commit: true,
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

fn default_start_marker() -> String {
    Markers::default().start
}

fn default_end_marker() -> String {
    Markers::default().end
}

fn default_badge_color() -> String {
    "blue".to_string()
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_true() -> bool {
    true
}

fn default_author_name() -> String {
    Author::default().name
}

fn default_author_email() -> String {
    Author::default().email
}

impl ReleaseConfig {
    pub fn markers(&self) -> Markers {
        Markers {
            start: self.start_marker.clone(),
            end: self.end_marker.clone(),
        }
    }

    pub fn text_options(&self) -> ReleaseTextOptions {
        ReleaseTextOptions {
            badge_color: self.badge_color.clone(),
            tag_prefix: self.tag_prefix.clone(),
        }
    }

    pub fn author(&self) -> Author {
        Author {
            name: self.author_name.clone(),
            email: self.author_email.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref store_dir) = args.store_dir {
            self.general.store_dir = store_dir.clone();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.libraries.is_empty() {
            bail!("At least one library must be configured");
        }

        let mut seen: HashMap<String, &str> = HashMap::new();
        for library in &self.libraries {
            crate::store::validate_library_name(&library.name)?;
            crate::upstream::github::split_repository(&library.repository)?;

            let canonical = crate::analysis::canonical_name(&library.name);
            if let Some(previous) = seen.insert(canonical, &library.name) {
                bail!(
                    "Library names '{}' and '{}' collide",
                    previous,
                    library.name
                );
            }
        }

        if self.release.start_marker.trim().is_empty() || self.release.end_marker.trim().is_empty()
        {
            bail!("Release markers must not be empty");
        }
        if self.release.start_marker == self.release.end_marker {
            bail!("Start and end markers must differ");
        }
        if self.github.timeout_seconds == 0 {
            bail!("GitHub timeout must be at least 1 second");
        }

        Ok(())
    }

    /// Restrict to the named libraries; unknown names are an error.
    pub fn select_libraries(&self, names: Option<&[String]>) -> Result<Vec<TrackedLibrary>> {
        let Some(names) = names else {
            return Ok(self.libraries.clone());
        };

        names
            .iter()
            .map(|name| {
                self.libraries
                    .iter()
                    .find(|l| &l.name == name)
                    .cloned()
                    .with_context(|| format!("Library '{}' is not configured", name))
            })
            .collect()
    }

    /// GitHub client settings, with the token supplied separately.
    pub fn github_settings(&self, token: Option<String>) -> GitHubSettings {
        GitHubSettings {
            api_url: self.github.api_url.clone(),
            timeout_seconds: self.github.timeout_seconds,
            token,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.store_dir, PathBuf::from("current-versions"));
        assert_eq!(config.libraries.len(), 1);
        assert_eq!(config.libraries[0].repository, "aws/aws-cdk");
        assert!(config.release.commit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
store_dir = "state/versions"
verbose = true

[github]
timeout_seconds = 10

[release]
badge_color = "green"
commit = false

[[libraries]]
name = "cdk-lib"
repository = "aws/aws-cdk"

[[libraries]]
name = "cdk-pipelines"
repository = "cdklabs/cdk-pipelines-github"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.store_dir, PathBuf::from("state/versions"));
        assert!(config.general.verbose);
        assert_eq!(config.general.readme, PathBuf::from("README.md"));
        assert_eq!(config.github.timeout_seconds, 10);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.release.badge_color, "green");
        assert!(!config.release.commit);
        assert_eq!(config.release.tag_prefix, "v");
        assert_eq!(config.libraries.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_colliding_names() {
        let mut config = Config::default();
        config
            .libraries
            .push(TrackedLibrary::new("AWS_CDK", "aws/aws-cdk"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_repository_and_name() {
        let mut config = Config::default();
        config.libraries = vec![TrackedLibrary::new("aws-cdk", "aws-cdk")];
        assert!(config.validate().is_err());

        config.libraries = vec![TrackedLibrary::new("../aws-cdk", "aws/aws-cdk")];
        assert!(config.validate().is_err());

        config.libraries.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_identical_markers() {
        let mut config = Config::default();
        config.release.end_marker = config.release.start_marker.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_select_libraries() {
        let mut config = Config::default();
        config
            .libraries
            .push(TrackedLibrary::new("cdk-pipelines", "cdklabs/cdk-pipelines-github"));

        assert_eq!(config.select_libraries(None).unwrap().len(), 2);

        let picked = config
            .select_libraries(Some(&["cdk-pipelines".to_string()]))
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "cdk-pipelines");

        assert!(config
            .select_libraries(Some(&["unknown".to_string()]))
            .is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[release]"));
        assert!(toml_str.contains("[[libraries]]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.libraries, Config::default().libraries);
    }
}
