//! Error types.
//!
//! Each boundary of the release gate has its own error enum so callers can
//! tell a transient upstream hiccup apart from broken local state.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the version record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access version store at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record exists but cannot be trusted.
    #[error("Corrupt version record for '{library}' at {}: {reason}", path.display())]
    Corrupt {
        library: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid library name '{0}': must be a plain file name")]
    InvalidName(String),
}

/// A single library's upstream query failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected release payload: {0}")]
    Payload(String),

    #[error("Invalid repository '{0}': expected owner/repo")]
    Repository(String),
}

/// A version string could not be read as a semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid version '{input}': {reason}")]
pub struct VersionError {
    pub input: String,
    pub reason: String,
}

/// Fatal update check failures.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(
        "Library name conflict: stored '{stored}' and upstream '{upstream}' differ only in formatting"
    )]
    NameConflict { stored: String, upstream: String },
}

/// Release path failures. None of these may leave a partial release behind.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Marker '{0}' not found in document")]
    MarkerMissing(String),

    #[error("Marker '{marker}' found {count} times, expected exactly once")]
    MarkerDuplicated { marker: String, count: usize },

    #[error("End marker appears before start marker")]
    MarkersOutOfOrder,

    #[error("Version store is empty, nothing to release")]
    EmptyStore,

    #[error("Tag '{0}' already exists")]
    TagExists(String),

    #[error("Cannot determine package version: {0}")]
    Manifest(String),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_error_names_library() {
        let err = StoreError::Corrupt {
            library: "aws-cdk".to_string(),
            path: PathBuf::from("current-versions/aws-cdk.json"),
            reason: "missing field `version`".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("'aws-cdk'"));
        assert!(message.contains("current-versions/aws-cdk.json"));
    }

    #[test]
    fn test_check_error_wraps_store_error_transparently() {
        let err: CheckError = StoreError::InvalidName("../x".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Invalid library name '../x': must be a plain file name"
        );
    }
}
