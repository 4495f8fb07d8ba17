//! GitHub "latest release" client.

use super::VersionSource;
use crate::error::FetchError;
use crate::models::{TrackedLibrary, UpstreamRelease};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the GitHub API.
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_url: String,
    pub timeout_seconds: u64,
    pub token: Option<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            timeout_seconds: 30,
            token: None,
        }
    }
}

/// Subset of the release payload we care about.
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    published_at: Option<String>,
}

/// Reads the latest published release of a GitHub repository.
pub struct GitHubReleases {
    settings: GitHubSettings,
    http_client: reqwest::Client,
}

impl GitHubReleases {
    pub fn new(settings: GitHubSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("cdkwatch/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(token) = settings.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| FetchError::Payload("GitHub token is not a valid header".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    /// API URL of the latest release for `owner/repo`.
    pub fn latest_release_url(&self, repository: &str) -> Result<String, FetchError> {
        let (owner, repo) = split_repository(repository)?;
        Ok(format!(
            "{}/repos/{}/{}/releases/latest",
            self.settings.api_url.trim_end_matches('/'),
            owner,
            repo
        ))
    }
}

#[async_trait]
impl VersionSource for GitHubReleases {
    async fn latest_release(&self, library: &TrackedLibrary) -> Result<UpstreamRelease, FetchError> {
        let url = self.latest_release_url(&library.repository)?;
        debug!("GET {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.settings.timeout_seconds)
            } else {
                FetchError::Transport(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status,
                body: truncate(&body, 200),
            });
        }

        let body = response.text().await?;
        parse_release(&body)
    }
}

fn parse_release(body: &str) -> Result<UpstreamRelease, FetchError> {
    let release: GitHubRelease =
        serde_json::from_str(body).map_err(|e| FetchError::Payload(e.to_string()))?;

    if release.tag_name.trim().is_empty() {
        return Err(FetchError::Payload("release has an empty tag_name".into()));
    }

    Ok(UpstreamRelease {
        version: release.tag_name.trim().to_string(),
        published_at: release.published_at,
    })
}

/// Split `owner/repo`, rejecting anything else.
pub fn split_repository(repository: &str) -> Result<(&str, &str), FetchError> {
    match repository.split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok((owner, repo))
        }
        _ => Err(FetchError::Repository(repository.to_string())),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_payload() {
        let body = r#"{
            "url": "https://api.github.com/repos/aws/aws-cdk/releases/1",
            "tag_name": "v2.199.0",
            "name": "v2.199.0",
            "published_at": "2025-05-01T12:00:00Z",
            "assets": []
        }"#;
        let release = parse_release(body).unwrap();
        assert_eq!(release.version, "v2.199.0");
        assert_eq!(release.published_at.as_deref(), Some("2025-05-01T12:00:00Z"));
    }

    #[test]
    fn test_parse_release_rejects_bad_payloads() {
        assert!(matches!(
            parse_release(r#"{"message": "Not Found"}"#),
            Err(FetchError::Payload(_))
        ));
        assert!(matches!(
            parse_release(r#"{"tag_name": " "}"#),
            Err(FetchError::Payload(_))
        ));
        assert!(matches!(parse_release("<html>"), Err(FetchError::Payload(_))));
    }

    #[test]
    fn test_split_repository() {
        assert_eq!(split_repository("aws/aws-cdk").unwrap(), ("aws", "aws-cdk"));
        assert!(split_repository("aws-cdk").is_err());
        assert!(split_repository("/aws-cdk").is_err());
        assert!(split_repository("aws/").is_err());
        assert!(split_repository("a/b/c").is_err());
    }

    #[test]
    fn test_latest_release_url() {
        let client = GitHubReleases::new(GitHubSettings {
            api_url: "https://github.example.com/api/v3/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.latest_release_url("aws/aws-cdk").unwrap(),
            "https://github.example.com/api/v3/repos/aws/aws-cdk/releases/latest"
        );
    }

    #[test]
    fn test_unreachable_api_is_a_fetch_error() {
        let client = GitHubReleases::new(GitHubSettings {
            api_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 5,
            token: Some("secret".to_string()),
        })
        .unwrap();
        let library = TrackedLibrary::new("aws-cdk", "aws/aws-cdk");

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(client.latest_release(&library));
        assert!(result.is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
