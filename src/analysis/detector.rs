//! Update detection.
//!
//! Compares the recorded versions against a fresh upstream snapshot and
//! decides whether a release is warranted. Pure: nothing here touches the
//! store.

use crate::error::CheckError;
use crate::models::{LibraryDiagnostic, LibraryVersionRecord, UpdateCheckResult, UpstreamSnapshot};
use crate::version::LibraryVersion;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// How one library compares between the store and upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryStatus {
    /// Same release on both sides.
    UpToDate,
    /// Tracked upstream but never recorded.
    Missing,
    /// Upstream reports a different release.
    Changed { stored: String, upstream: String },
    /// Upstream query failed this run.
    FetchFailed(String),
    /// One side is not a semantic version; compared as plain strings.
    Unparsable {
        stored: String,
        upstream: String,
        error: String,
    },
    /// Recorded but no longer tracked.
    Untracked,
}

impl LibraryStatus {
    /// Whether this status calls for a release.
    pub fn requires_update(&self) -> bool {
        match self {
            LibraryStatus::Missing | LibraryStatus::Changed { .. } => true,
            LibraryStatus::Unparsable {
                stored, upstream, ..
            } => stored != upstream,
            LibraryStatus::UpToDate
            | LibraryStatus::FetchFailed(_)
            | LibraryStatus::Untracked => false,
        }
    }
}

/// Canonical form used to catch names that drifted in formatting.
pub fn canonical_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .replace(['_', '.', ' '], "-")
}

/// Refuse to guess when store and upstream disagree on a name's spelling.
fn detect_name_conflicts(
    current: &BTreeMap<String, LibraryVersionRecord>,
    upstream: &UpstreamSnapshot,
) -> Result<(), CheckError> {
    let stored_by_canonical: BTreeMap<String, &String> = current
        .keys()
        .map(|name| (canonical_name(name), name))
        .collect();

    for name in upstream.names() {
        if current.contains_key(name) {
            continue;
        }
        if let Some(stored) = stored_by_canonical.get(&canonical_name(name)) {
            return Err(CheckError::NameConflict {
                stored: (*stored).clone(),
                upstream: name.clone(),
            });
        }
    }

    Ok(())
}

fn compare(stored: &str, upstream: &str) -> LibraryStatus {
    match (LibraryVersion::parse(stored), LibraryVersion::parse(upstream)) {
        (Ok(s), Ok(u)) => {
            if s.is_equivalent(&u) {
                LibraryStatus::UpToDate
            } else {
                if u < s {
                    warn!("Upstream version {} is older than recorded {}", u, s);
                }
                LibraryStatus::Changed {
                    stored: s.to_string(),
                    upstream: u.to_string(),
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => LibraryStatus::Unparsable {
            stored: stored.trim().to_string(),
            upstream: crate::version::strip_v_prefix(upstream.trim()).to_string(),
            error: e.to_string(),
        },
    }
}

/// Classify every library seen in the store or upstream.
pub fn classify(
    current: &BTreeMap<String, LibraryVersionRecord>,
    upstream: &UpstreamSnapshot,
) -> Result<BTreeMap<String, LibraryStatus>, CheckError> {
    detect_name_conflicts(current, upstream)?;

    let names: BTreeSet<&String> = current.keys().chain(upstream.names()).collect();
    let mut statuses = BTreeMap::new();

    for name in names {
        let status = if let Some(error) = upstream.failures.get(name) {
            LibraryStatus::FetchFailed(error.clone())
        } else if let Some(release) = upstream.releases.get(name) {
            match current.get(name) {
                None => LibraryStatus::Missing,
                Some(record) => compare(&record.version, &release.version),
            }
        } else {
            LibraryStatus::Untracked
        };

        debug!("{}: {:?}", name, status);
        statuses.insert(name.clone(), status);
    }

    Ok(statuses)
}

/// Decide whether a release is required.
pub fn check(
    current: &BTreeMap<String, LibraryVersionRecord>,
    upstream: &UpstreamSnapshot,
) -> Result<UpdateCheckResult, CheckError> {
    let statuses = classify(current, upstream)?;
    let mut result = UpdateCheckResult::default();

    for (name, status) in &statuses {
        if status.requires_update() {
            result.updated_libraries.push(name.clone());
        }

        match status {
            LibraryStatus::UpToDate => info!("No updates available for {}", name),
            LibraryStatus::Missing => info!("{} has no recorded version yet", name),
            LibraryStatus::Changed { stored, upstream } => {
                info!("Updates are available for {}: {} -> {}", name, stored, upstream)
            }
            LibraryStatus::FetchFailed(error) => {
                result.failed_libraries.push(LibraryDiagnostic {
                    name: name.clone(),
                    error: error.clone(),
                });
            }
            LibraryStatus::Unparsable {
                stored,
                upstream,
                error,
            } => {
                warn!(
                    "Cannot compare {} semantically ({}); stored '{}' vs upstream '{}' compared as text",
                    name, error, stored, upstream
                );
                result.version_errors.push(LibraryDiagnostic {
                    name: name.clone(),
                    error: error.clone(),
                });
            }
            LibraryStatus::Untracked => {
                warn!("Recorded library {} is not tracked any more", name);
                result.untracked_libraries.push(name.clone());
            }
        }
    }

    result.update_required = !result.updated_libraries.is_empty();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(pairs: &[(&str, &str)]) -> BTreeMap<String, LibraryVersionRecord> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), LibraryVersionRecord::new(*n, *v)))
            .collect()
    }

    fn upstream(pairs: &[(&str, &str)]) -> UpstreamSnapshot {
        UpstreamSnapshot::from_versions(pairs.iter().copied())
    }

    #[test]
    fn test_unchanged_versions_need_no_update() {
        let result = check(
            &store(&[("cdk-lib", "2.100.0")]),
            &upstream(&[("cdk-lib", "2.100.0")]),
        )
        .unwrap();

        assert!(!result.update_required);
        assert!(result.updated_libraries.is_empty());
    }

    #[test]
    fn test_new_upstream_version_needs_update() {
        let result = check(
            &store(&[("cdk-lib", "2.100.0")]),
            &upstream(&[("cdk-lib", "2.101.0")]),
        )
        .unwrap();

        assert!(result.update_required);
        assert_eq!(result.updated_libraries, vec!["cdk-lib"]);
    }

    #[test]
    fn test_missing_record_needs_update() {
        let result = check(
            &store(&[("cdk-lib", "2.100.0")]),
            &upstream(&[("cdk-lib", "2.100.0"), ("cdk-pipelines", "1.5.0")]),
        )
        .unwrap();

        assert!(result.update_required);
        assert_eq!(result.updated_libraries, vec!["cdk-pipelines"]);
    }

    #[test]
    fn test_first_run_with_empty_store() {
        let result = check(&BTreeMap::new(), &upstream(&[("aws-cdk", "v2.199.0")])).unwrap();
        assert!(result.update_required);
        assert_eq!(result.updated_libraries, vec!["aws-cdk"]);
    }

    #[test]
    fn test_normalized_versions_are_equal() {
        let result = check(
            &store(&[("a", "2.100.0"), ("b", "1.5"), ("c", "3.0.0")]),
            &upstream(&[("a", "v2.100.0"), ("b", "1.5.0"), ("c", "3.0.0+build.7")]),
        )
        .unwrap();

        assert!(!result.update_required);
        assert!(result.version_errors.is_empty());
    }

    #[test]
    fn test_prerelease_is_a_change() {
        let result = check(
            &store(&[("a", "2.100.0-rc.1")]),
            &upstream(&[("a", "2.100.0")]),
        )
        .unwrap();
        assert!(result.update_required);
    }

    #[test]
    fn test_downgrade_still_counts_as_change() {
        let result = check(&store(&[("a", "2.101.0")]), &upstream(&[("a", "2.100.0")])).unwrap();
        assert!(result.update_required);
        assert_eq!(result.updated_libraries, vec!["a"]);
    }

    #[test]
    fn test_transient_failure_is_reported_not_unchanged() {
        let mut snapshot = upstream(&[("a", "1.1.0"), ("c", "3.0.0")]);
        snapshot
            .failures
            .insert("b".to_string(), "Request timed out after 30s".to_string());

        let result = check(
            &store(&[("a", "1.0.0"), ("b", "2.0.0"), ("c", "3.0.0")]),
            &snapshot,
        )
        .unwrap();

        assert!(result.update_required);
        assert_eq!(result.updated_libraries, vec!["a"]);
        assert_eq!(result.failed_libraries.len(), 1);
        assert_eq!(result.failed_libraries[0].name, "b");
        assert!(result.untracked_libraries.is_empty());
    }

    #[test]
    fn test_all_fetches_failed_gives_false_with_diagnostics() {
        let mut snapshot = UpstreamSnapshot::default();
        snapshot
            .failures
            .insert("a".to_string(), "connection refused".to_string());

        let result = check(&store(&[("a", "1.0.0")]), &snapshot).unwrap();
        assert!(!result.update_required);
        assert_eq!(result.failed_libraries.len(), 1);
    }

    #[test]
    fn test_unparsable_versions_are_reported_distinctly() {
        let result = check(
            &store(&[("same", "nightly"), ("diff", "2.0.0")]),
            &upstream(&[("same", "nightly"), ("diff", "snapshot")]),
        )
        .unwrap();

        assert_eq!(result.version_errors.len(), 2);
        // Identical raw strings do not trigger a release loop.
        assert_eq!(result.updated_libraries, vec!["diff"]);
        assert!(result.update_required);
    }

    #[test]
    fn test_untracked_records_are_diagnostics() {
        let result = check(
            &store(&[("a", "1.0.0"), ("legacy", "0.1.0")]),
            &upstream(&[("a", "1.0.0")]),
        )
        .unwrap();

        assert!(!result.update_required);
        assert_eq!(result.untracked_libraries, vec!["legacy"]);
    }

    #[test]
    fn test_name_formatting_drift_is_an_error() {
        let err = check(
            &store(&[("AWS_CDK", "2.100.0")]),
            &upstream(&[("aws-cdk", "2.100.0")]),
        )
        .unwrap_err();

        match err {
            CheckError::NameConflict { stored, upstream } => {
                assert_eq!(stored, "AWS_CDK");
                assert_eq!(upstream, "aws-cdk");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_equal_inputs_never_require_update() {
        let cases: &[&[(&str, &str)]] = &[
            &[],
            &[("a", "0.0.1")],
            &[("a", "1.2.3"), ("b", "4.5.6-beta.2"), ("c", "10.0.0")],
        ];

        for pairs in cases {
            let result = check(&store(pairs), &upstream(pairs)).unwrap();
            assert!(!result.update_required, "case {:?}", pairs);
        }
    }

    #[test]
    fn test_updated_libraries_sorted() {
        let result = check(
            &BTreeMap::new(),
            &upstream(&[("zeta", "1.0.0"), ("alpha", "1.0.0"), ("mid", "1.0.0")]),
        )
        .unwrap();
        assert_eq!(result.updated_libraries, vec!["alpha", "mid", "zeta"]);
    }
}
