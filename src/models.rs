//! Data models for the release gate.
//!
//! This module contains the records persisted in the version store, the
//! upstream view produced by a fetch, and the outputs of the check and
//! release steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A library whose upstream releases are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedLibrary {
    /// Unique key, also the record file stem.
    pub name: String,
    /// GitHub repository in `owner/repo` form.
    pub repository: String,
}

impl TrackedLibrary {
    pub fn new(name: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: repository.into(),
        }
    }
}

/// Last recorded upstream version of one library.
///
/// Only `version` is required on disk; unknown keys are ignored so newer
/// writers stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryVersionRecord {
    /// Library name (taken from the file name, not stored in the file).
    #[serde(skip)]
    pub name: String,
    /// Recorded upstream version, normalised without a `v` prefix.
    pub version: String,
    /// Upstream publication time of that version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// When this record was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl LibraryVersionRecord {
    /// Creates a bare record with only a version.
    #[cfg(test)]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            timestamp: None,
            processed_at: None,
        }
    }

    /// Creates a record for a freshly fetched release, stamped now.
    pub fn from_release(name: &str, release: &UpstreamRelease) -> Self {
        let version = match crate::version::normalize_for_storage(&release.version) {
            Ok(v) | Err(v) => v,
        };

        Self {
            name: name.to_string(),
            version,
            timestamp: release.published_at.clone(),
            processed_at: Some(Utc::now()),
        }
    }
}

/// Latest release of a library as reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamRelease {
    /// Version or tag name as published (may carry a `v` prefix).
    pub version: String,
    /// Publication time in UTC ISO-8601.
    #[serde(default)]
    pub published_at: Option<String>,
}

impl UpstreamRelease {
    #[cfg(test)]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            published_at: None,
        }
    }
}

/// The full result of querying every tracked library upstream.
///
/// Every tracked library ends up in exactly one of the two maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamSnapshot {
    /// Successfully fetched releases, by library name.
    pub releases: BTreeMap<String, UpstreamRelease>,
    /// Failed fetches, by library name, with the error message.
    pub failures: BTreeMap<String, String>,
}

impl UpstreamSnapshot {
    /// Builds a snapshot with no failures from `name -> version` pairs.
    #[cfg(test)]
    pub fn from_versions<I, K, V>(versions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            releases: versions
                .into_iter()
                .map(|(name, version)| (name.into(), UpstreamRelease::new(version)))
                .collect(),
            failures: BTreeMap::new(),
        }
    }

    /// All library names seen, fetched or failed.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.releases.keys().chain(self.failures.keys())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A per-library diagnostic attached to a check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDiagnostic {
    pub name: String,
    pub error: String,
}

/// Outcome of one update check. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateCheckResult {
    /// The gate bit: true iff at least one library changed.
    pub update_required: bool,
    /// Libraries with a new (or first) upstream version, sorted.
    pub updated_libraries: Vec<String>,
    /// Libraries whose upstream query failed this run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_libraries: Vec<LibraryDiagnostic>,
    /// Libraries whose stored or upstream version is not a valid semver.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_errors: Vec<LibraryDiagnostic>,
    /// Stored records for libraries that are no longer tracked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub untracked_libraries: Vec<String>,
    /// Fatal error that prevented a decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateCheckResult {
    /// The result reported when the check could not run to completion.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            update_required: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Single-line JSON for the workflow gate.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Derived release texts, computed from the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    /// `"{name} v{version}"` per library, sorted by name.
    pub entries: Vec<String>,
    /// Comma-joined entries; the tag annotation.
    pub summary: String,
    /// Badge markup, one line per library.
    pub badge_block: String,
    /// Downstream package version before the bump.
    pub current_version: String,
    /// Downstream package version after the minor bump.
    pub next_version: String,
    pub tag_name: String,
    pub commit_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ignores_unknown_keys() {
        let json = r#"{"version": "2.100.0", "markdown_files": 12, "integ_test_files": 3}"#;
        let record: LibraryVersionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.version, "2.100.0");
        assert!(record.timestamp.is_none());
        assert!(record.name.is_empty());
    }

    #[test]
    fn test_record_requires_version() {
        let json = r#"{"timestamp": "2025-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<LibraryVersionRecord>(json).is_err());
    }

    #[test]
    fn test_record_from_release_normalises_tag() {
        let release = UpstreamRelease {
            version: "v2.199.0".to_string(),
            published_at: Some("2025-05-01T12:00:00Z".to_string()),
        };
        let record = LibraryVersionRecord::from_release("aws-cdk", &release);
        assert_eq!(record.name, "aws-cdk");
        assert_eq!(record.version, "2.199.0");
        assert_eq!(record.timestamp.as_deref(), Some("2025-05-01T12:00:00Z"));
        assert!(record.processed_at.is_some());
    }

    #[test]
    fn test_check_result_serializes_kebab_case_bool() {
        let result = UpdateCheckResult {
            update_required: true,
            updated_libraries: vec!["cdk-lib".to_string()],
            ..Default::default()
        };
        let line = result.to_json_line().unwrap();
        assert_eq!(
            line,
            r#"{"update-required":true,"updated-libraries":["cdk-lib"]}"#
        );

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["update-required"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_failed_check_result() {
        let result = UpdateCheckResult::failed("corrupt store");
        let line = result.to_json_line().unwrap();
        assert!(line.starts_with(r#"{"update-required":false"#));
        assert!(line.contains(r#""error":"corrupt store""#));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_snapshot_names() {
        let mut snapshot = UpstreamSnapshot::from_versions([("b", "1.0.0")]);
        snapshot
            .failures
            .insert("a".to_string(), "timeout".to_string());
        let names: Vec<&String> = snapshot.names().collect();
        assert_eq!(names.len(), 2);
        assert!(!snapshot.is_complete());
    }
}
